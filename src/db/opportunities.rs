use rusqlite::{params, Row};

use super::*;
use crate::types::OpportunityState;

impl CrmDb {
    // =========================================================================
    // Opportunities
    // =========================================================================

    fn map_opportunity_row(row: &Row<'_>) -> rusqlite::Result<DbOpportunity> {
        let state_raw: String = row.get(4)?;
        Ok(DbOpportunity {
            id: row.get(0)?,
            account_id: row.get(1)?,
            name: row.get(2)?,
            description: row.get(3)?,
            state: DbError::expect_enum(
                OpportunityState::parse(&state_raw),
                "opportunities.state",
                &state_raw,
            )?,
            deal_value: row.get(5)?,
            expected_close_date: row.get(6)?,
            owner_id: row.get(7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }

    const OPPORTUNITY_COLUMNS: &'static str = "id, account_id, name, description, state, \
         deal_value, expected_close_date, owner_id, created_at, updated_at";

    /// Insert a new opportunity row.
    pub fn insert_opportunity(&self, opp: &DbOpportunity) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO opportunities (id, account_id, name, description, state,
                                        deal_value, expected_close_date, owner_id,
                                        created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                opp.id,
                opp.account_id,
                opp.name,
                opp.description,
                opp.state.as_str(),
                opp.deal_value,
                opp.expected_close_date,
                opp.owner_id,
                opp.created_at,
                opp.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Get an opportunity by ID.
    pub fn get_opportunity(&self, id: &str) -> Result<Option<DbOpportunity>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM opportunities WHERE id = ?1",
            Self::OPPORTUNITY_COLUMNS
        ))?;
        let mut rows = stmt.query_map(params![id], Self::map_opportunity_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// Get opportunities, newest first, optionally scoped to one account.
    pub fn get_opportunities(
        &self,
        account_id: Option<&str>,
    ) -> Result<Vec<DbOpportunity>, DbError> {
        match account_id {
            Some(account_id) => {
                let mut stmt = self.conn.prepare(&format!(
                    "SELECT {} FROM opportunities WHERE account_id = ?1
                     ORDER BY created_at DESC",
                    Self::OPPORTUNITY_COLUMNS
                ))?;
                let rows = stmt.query_map(params![account_id], Self::map_opportunity_row)?;
                Ok(rows.collect::<Result<Vec<_>, _>>()?)
            }
            None => {
                let mut stmt = self.conn.prepare(&format!(
                    "SELECT {} FROM opportunities ORDER BY created_at DESC",
                    Self::OPPORTUNITY_COLUMNS
                ))?;
                let rows = stmt.query_map([], Self::map_opportunity_row)?;
                Ok(rows.collect::<Result<Vec<_>, _>>()?)
            }
        }
    }

    /// Conditionally move an opportunity to a new state.
    ///
    /// The `WHERE state = expected` clause makes the write a compare-and-swap:
    /// a concurrent transition that lands first leaves this one with zero rows
    /// affected, reported as `false` so the caller can reject on stale state.
    pub fn update_opportunity_state(
        &self,
        id: &str,
        expected: OpportunityState,
        target: OpportunityState,
        updated_at: &str,
    ) -> Result<bool, DbError> {
        let rows = self.conn.execute(
            "UPDATE opportunities SET state = ?1, updated_at = ?2
             WHERE id = ?3 AND state = ?4",
            params![target.as_str(), updated_at, id, expected.as_str()],
        )?;
        Ok(rows > 0)
    }

    /// Apply non-null field updates. State is never touched here; transitions
    /// go through `update_opportunity_state`.
    pub fn update_opportunity_fields(
        &self,
        id: &str,
        update: &OpportunityUpdate,
        updated_at: &str,
    ) -> Result<Option<DbOpportunity>, DbError> {
        let rows = self.conn.execute(
            "UPDATE opportunities SET
                name = COALESCE(?1, name),
                description = COALESCE(?2, description),
                deal_value = COALESCE(?3, deal_value),
                expected_close_date = COALESCE(?4, expected_close_date),
                updated_at = ?5
             WHERE id = ?6",
            params![
                update.name,
                update.description,
                update.deal_value,
                update.expected_close_date,
                updated_at,
                id,
            ],
        )?;
        if rows == 0 {
            return Ok(None);
        }
        self.get_opportunity(id)
    }

    /// Per-state row counts for the dashboard.
    pub fn count_opportunities_by_state(&self) -> Result<Vec<(String, i64)>, DbError> {
        let mut stmt = self
            .conn
            .prepare("SELECT state, COUNT(*) FROM opportunities GROUP BY state")?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Most recent opportunities for the activity feed.
    pub fn get_recent_opportunities(&self, limit: usize) -> Result<Vec<DbOpportunity>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM opportunities ORDER BY created_at DESC LIMIT ?1",
            Self::OPPORTUNITY_COLUMNS
        ))?;
        let rows = stmt.query_map(params![limit as i64], Self::map_opportunity_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

/// Field-level opportunity update. `None` leaves a column untouched.
#[derive(Debug, Clone, Default)]
pub struct OpportunityUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub deal_value: Option<f64>,
    pub expected_close_date: Option<String>,
}
