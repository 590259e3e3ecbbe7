use rusqlite::{params, Row};

use super::*;
use crate::types::HandoverState;

impl CrmDb {
    // =========================================================================
    // Handovers
    // =========================================================================

    fn map_handover_row(row: &Row<'_>) -> rusqlite::Result<DbHandover> {
        let state_raw: String = row.get(3)?;
        Ok(DbHandover {
            id: row.get(0)?,
            opportunity_id: row.get(1)?,
            quote_id: row.get(2)?,
            state: DbError::expect_enum(
                HandoverState::parse(&state_raw),
                "handovers.state",
                &state_raw,
            )?,
            deal_value: row.get(4)?,
            scope: row.get(5)?,
            expected_start_date: row.get(6)?,
            expected_end_date: row.get(7)?,
            accepted_by: row.get(8)?,
            flagged_reason: row.get(9)?,
            created_at: row.get(10)?,
            updated_at: row.get(11)?,
        })
    }

    const HANDOVER_COLUMNS: &'static str = "id, opportunity_id, quote_id, state, deal_value, \
         scope, expected_start_date, expected_end_date, accepted_by, flagged_reason, \
         created_at, updated_at";

    /// Insert a new handover row.
    pub fn insert_handover(&self, handover: &DbHandover) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO handovers (id, opportunity_id, quote_id, state, deal_value,
                                    scope, expected_start_date, expected_end_date,
                                    accepted_by, flagged_reason, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                handover.id,
                handover.opportunity_id,
                handover.quote_id,
                handover.state.as_str(),
                handover.deal_value,
                handover.scope,
                handover.expected_start_date,
                handover.expected_end_date,
                handover.accepted_by,
                handover.flagged_reason,
                handover.created_at,
                handover.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Get a handover by ID.
    pub fn get_handover(&self, id: &str) -> Result<Option<DbHandover>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM handovers WHERE id = ?1",
            Self::HANDOVER_COLUMNS
        ))?;
        let mut rows = stmt.query_map(params![id], Self::map_handover_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// Get handovers, newest first, optionally scoped to an opportunity.
    pub fn get_handovers(&self, opportunity_id: Option<&str>) -> Result<Vec<DbHandover>, DbError> {
        match opportunity_id {
            Some(opportunity_id) => {
                let mut stmt = self.conn.prepare(&format!(
                    "SELECT {} FROM handovers WHERE opportunity_id = ?1
                     ORDER BY created_at DESC",
                    Self::HANDOVER_COLUMNS
                ))?;
                let rows = stmt.query_map(params![opportunity_id], Self::map_handover_row)?;
                Ok(rows.collect::<Result<Vec<_>, _>>()?)
            }
            None => {
                let mut stmt = self.conn.prepare(&format!(
                    "SELECT {} FROM handovers ORDER BY created_at DESC",
                    Self::HANDOVER_COLUMNS
                ))?;
                let rows = stmt.query_map([], Self::map_handover_row)?;
                Ok(rows.collect::<Result<Vec<_>, _>>()?)
            }
        }
    }

    /// Conditionally resolve a handover (compare-and-swap on `pending`),
    /// setting the resolution fields in the same write.
    ///
    /// `accepted_by` and `flagged_reason` are written as given; the service
    /// decides which one applies to which target state.
    pub fn update_handover_state(
        &self,
        id: &str,
        expected: HandoverState,
        target: HandoverState,
        accepted_by: Option<&str>,
        flagged_reason: Option<&str>,
        updated_at: &str,
    ) -> Result<bool, DbError> {
        let rows = self.conn.execute(
            "UPDATE handovers SET state = ?1, accepted_by = ?2, flagged_reason = ?3,
                                  updated_at = ?4
             WHERE id = ?5 AND state = ?6",
            params![
                target.as_str(),
                accepted_by,
                flagged_reason,
                updated_at,
                id,
                expected.as_str(),
            ],
        )?;
        Ok(rows > 0)
    }

    /// Apply non-null field updates. State never changes here.
    pub fn update_handover_fields(
        &self,
        id: &str,
        update: &HandoverUpdate,
        updated_at: &str,
    ) -> Result<Option<DbHandover>, DbError> {
        let rows = self.conn.execute(
            "UPDATE handovers SET
                deal_value = COALESCE(?1, deal_value),
                scope = COALESCE(?2, scope),
                expected_start_date = COALESCE(?3, expected_start_date),
                expected_end_date = COALESCE(?4, expected_end_date),
                updated_at = ?5
             WHERE id = ?6",
            params![
                update.deal_value,
                update.scope,
                update.expected_start_date,
                update.expected_end_date,
                updated_at,
                id,
            ],
        )?;
        if rows == 0 {
            return Ok(None);
        }
        self.get_handover(id)
    }

    /// Per-state row counts for the dashboard.
    pub fn count_handovers_by_state(&self) -> Result<Vec<(String, i64)>, DbError> {
        let mut stmt = self
            .conn
            .prepare("SELECT state, COUNT(*) FROM handovers GROUP BY state")?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Most recent handovers for the activity feed.
    pub fn get_recent_handovers(&self, limit: usize) -> Result<Vec<DbHandover>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM handovers ORDER BY created_at DESC LIMIT ?1",
            Self::HANDOVER_COLUMNS
        ))?;
        let rows = stmt.query_map(params![limit as i64], Self::map_handover_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

/// Field-level handover update. `None` leaves a column untouched.
/// Resolution fields (`state`, `accepted_by`, `flagged_reason`) are not
/// part of this set; they change only through `update_handover_state`.
#[derive(Debug, Clone, Default)]
pub struct HandoverUpdate {
    pub deal_value: Option<f64>,
    pub scope: Option<String>,
    pub expected_start_date: Option<String>,
    pub expected_end_date: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::super::test_utils::test_db;
    use super::*;
    use crate::util::now_rfc3339;

    pub(crate) fn sample_handover(id: &str, state: HandoverState) -> DbHandover {
        let now = now_rfc3339();
        DbHandover {
            id: id.to_string(),
            opportunity_id: "opp-1".to_string(),
            quote_id: Some("q1".to_string()),
            state,
            deal_value: 25_000.0,
            scope: Some("Phase 1 rollout".to_string()),
            expected_start_date: None,
            expected_end_date: None,
            accepted_by: None,
            flagged_reason: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    #[test]
    fn test_insert_and_get() {
        let db = test_db();
        db.insert_handover(&sample_handover("h1", HandoverState::Pending))
            .expect("insert");

        let h = db.get_handover("h1").expect("get").expect("exists");
        assert_eq!(h.state, HandoverState::Pending);
        assert!(h.accepted_by.is_none());
    }

    #[test]
    fn test_accept_sets_accepted_by() {
        let db = test_db();
        db.insert_handover(&sample_handover("h1", HandoverState::Pending))
            .expect("insert");

        let moved = db
            .update_handover_state(
                "h1",
                HandoverState::Pending,
                HandoverState::Accepted,
                Some("ops-1"),
                None,
                &now_rfc3339(),
            )
            .expect("update");
        assert!(moved);

        let h = db.get_handover("h1").expect("get").expect("exists");
        assert_eq!(h.state, HandoverState::Accepted);
        assert_eq!(h.accepted_by.as_deref(), Some("ops-1"));
        assert!(h.flagged_reason.is_none());
    }

    #[test]
    fn test_resolution_cas_rejects_already_resolved() {
        let db = test_db();
        db.insert_handover(&sample_handover("h1", HandoverState::Accepted))
            .expect("insert");

        let moved = db
            .update_handover_state(
                "h1",
                HandoverState::Pending,
                HandoverState::Flagged,
                None,
                Some("scope unclear"),
                &now_rfc3339(),
            )
            .expect("update");
        assert!(!moved, "resolved handover must not re-resolve");
    }

    #[test]
    fn test_field_update_leaves_state_alone() {
        let db = test_db();
        db.insert_handover(&sample_handover("h1", HandoverState::Pending))
            .expect("insert");

        let update = HandoverUpdate {
            deal_value: Some(30_000.0),
            ..Default::default()
        };
        let fresh = db
            .update_handover_fields("h1", &update, &now_rfc3339())
            .expect("update")
            .expect("row exists");
        assert_eq!(fresh.deal_value, 30_000.0);
        assert_eq!(fresh.state, HandoverState::Pending);
        assert_eq!(fresh.scope.as_deref(), Some("Phase 1 rollout"));
    }
}
