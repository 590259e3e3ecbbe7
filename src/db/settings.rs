//! Reference-data tables: four name/code lists sharing one shape, plus the
//! approval thresholds. Rows are soft-deleted by clearing `is_active`.

use rusqlite::{params, Row};

use super::*;
use crate::types::Role;

/// The four uniform reference tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    RevenueModel,
    RevenueStream,
    IcpCategory,
    OpportunityStage,
}

impl ReferenceKind {
    /// Table name. Fixed set, never interpolated from user input.
    pub fn table(&self) -> &'static str {
        match self {
            ReferenceKind::RevenueModel => "revenue_models",
            ReferenceKind::RevenueStream => "revenue_streams",
            ReferenceKind::IcpCategory => "icp_categories",
            ReferenceKind::OpportunityStage => "opportunity_stages",
        }
    }
}

const REFERENCE_COLUMNS: &str =
    "id, name, code, description, display_order, is_active, created_at, updated_at";

fn map_reference_row(row: &Row<'_>) -> rusqlite::Result<DbReferenceItem> {
    Ok(DbReferenceItem {
        id: row.get(0)?,
        name: row.get(1)?,
        code: row.get(2)?,
        description: row.get(3)?,
        display_order: row.get(4)?,
        is_active: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

impl CrmDb {
    // =========================================================================
    // Reference data
    // =========================================================================

    pub fn insert_reference_item(
        &self,
        kind: ReferenceKind,
        item: &DbReferenceItem,
    ) -> Result<(), DbError> {
        self.conn.execute(
            &format!(
                "INSERT INTO {} (id, name, code, description, display_order, is_active,
                                 created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                kind.table()
            ),
            params![
                item.id,
                item.name,
                item.code,
                item.description,
                item.display_order,
                item.is_active,
                item.created_at,
                item.updated_at,
            ],
        )?;
        Ok(())
    }

    pub fn get_reference_item(
        &self,
        kind: ReferenceKind,
        id: &str,
    ) -> Result<Option<DbReferenceItem>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM {} WHERE id = ?1",
            REFERENCE_COLUMNS,
            kind.table()
        ))?;
        let mut rows = stmt.query_map(params![id], map_reference_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// List reference items in display order. `include_inactive` pulls
    /// soft-deleted rows too (the settings management screens want them).
    pub fn get_reference_items(
        &self,
        kind: ReferenceKind,
        include_inactive: bool,
    ) -> Result<Vec<DbReferenceItem>, DbError> {
        let filter = if include_inactive {
            ""
        } else {
            "WHERE is_active = 1"
        };
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM {} {} ORDER BY display_order, name",
            REFERENCE_COLUMNS,
            kind.table(),
            filter
        ))?;
        let rows = stmt.query_map([], map_reference_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn update_reference_item(
        &self,
        kind: ReferenceKind,
        id: &str,
        update: &ReferenceItemUpdate,
        updated_at: &str,
    ) -> Result<Option<DbReferenceItem>, DbError> {
        let rows = self.conn.execute(
            &format!(
                "UPDATE {} SET
                    name = COALESCE(?1, name),
                    description = COALESCE(?2, description),
                    display_order = COALESCE(?3, display_order),
                    updated_at = ?4
                 WHERE id = ?5",
                kind.table()
            ),
            params![
                update.name,
                update.description,
                update.display_order,
                updated_at,
                id
            ],
        )?;
        if rows == 0 {
            return Ok(None);
        }
        self.get_reference_item(kind, id)
    }

    /// Soft delete: clear `is_active`. Returns `false` if the id is unknown.
    pub fn deactivate_reference_item(
        &self,
        kind: ReferenceKind,
        id: &str,
        updated_at: &str,
    ) -> Result<bool, DbError> {
        let rows = self.conn.execute(
            &format!(
                "UPDATE {} SET is_active = 0, updated_at = ?1 WHERE id = ?2",
                kind.table()
            ),
            params![updated_at, id],
        )?;
        Ok(rows > 0)
    }

    // =========================================================================
    // Approval thresholds
    // =========================================================================

    fn map_threshold_row(row: &Row<'_>) -> rusqlite::Result<DbApprovalThreshold> {
        let role_raw: String = row.get(1)?;
        Ok(DbApprovalThreshold {
            id: row.get(0)?,
            approval_role: DbError::expect_enum(
                Role::parse(&role_raw),
                "approval_thresholds.approval_role",
                &role_raw,
            )?,
            min_deal_value: row.get(2)?,
            max_deal_value: row.get(3)?,
            is_active: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }

    pub fn insert_approval_threshold(
        &self,
        threshold: &DbApprovalThreshold,
    ) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO approval_thresholds (id, approval_role, min_deal_value,
                                              max_deal_value, is_active, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                threshold.id,
                threshold.approval_role.as_str(),
                threshold.min_deal_value,
                threshold.max_deal_value,
                threshold.is_active,
                threshold.created_at,
                threshold.updated_at,
            ],
        )?;
        Ok(())
    }

    pub fn get_approval_threshold(&self, id: &str) -> Result<Option<DbApprovalThreshold>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, approval_role, min_deal_value, max_deal_value, is_active,
                    created_at, updated_at
             FROM approval_thresholds WHERE id = ?1",
        )?;
        let mut rows = stmt.query_map(params![id], Self::map_threshold_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// Thresholds ordered by ascending band floor.
    pub fn get_approval_thresholds(
        &self,
        include_inactive: bool,
    ) -> Result<Vec<DbApprovalThreshold>, DbError> {
        let filter = if include_inactive {
            ""
        } else {
            "WHERE is_active = 1"
        };
        let mut stmt = self.conn.prepare(&format!(
            "SELECT id, approval_role, min_deal_value, max_deal_value, is_active,
                    created_at, updated_at
             FROM approval_thresholds {} ORDER BY min_deal_value ASC",
            filter
        ))?;
        let rows = stmt.query_map([], Self::map_threshold_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn update_approval_threshold(
        &self,
        id: &str,
        update: &ApprovalThresholdUpdate,
        updated_at: &str,
    ) -> Result<Option<DbApprovalThreshold>, DbError> {
        let rows = self.conn.execute(
            "UPDATE approval_thresholds SET
                approval_role = COALESCE(?1, approval_role),
                min_deal_value = COALESCE(?2, min_deal_value),
                max_deal_value = COALESCE(?3, max_deal_value),
                updated_at = ?4
             WHERE id = ?5",
            params![
                update.approval_role.map(|r| r.as_str()),
                update.min_deal_value,
                update.max_deal_value,
                updated_at,
                id,
            ],
        )?;
        if rows == 0 {
            return Ok(None);
        }
        self.get_approval_threshold(id)
    }

    pub fn deactivate_approval_threshold(
        &self,
        id: &str,
        updated_at: &str,
    ) -> Result<bool, DbError> {
        let rows = self.conn.execute(
            "UPDATE approval_thresholds SET is_active = 0, updated_at = ?1 WHERE id = ?2",
            params![updated_at, id],
        )?;
        Ok(rows > 0)
    }
}

/// Field-level reference item update. `None` leaves a column untouched.
#[derive(Debug, Clone, Default)]
pub struct ReferenceItemUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub display_order: Option<i64>,
}

/// Field-level threshold update.
#[derive(Debug, Clone, Default)]
pub struct ApprovalThresholdUpdate {
    pub approval_role: Option<Role>,
    pub min_deal_value: Option<f64>,
    pub max_deal_value: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::super::test_utils::test_db;
    use super::*;
    use crate::util::{new_id, now_rfc3339};

    fn sample_item(name: &str, code: &str) -> DbReferenceItem {
        let now = now_rfc3339();
        DbReferenceItem {
            id: new_id(),
            name: name.to_string(),
            code: code.to_string(),
            description: None,
            display_order: 0,
            is_active: true,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    #[test]
    fn test_reference_round_trip_per_table() {
        let db = test_db();
        for kind in [
            ReferenceKind::RevenueModel,
            ReferenceKind::RevenueStream,
            ReferenceKind::IcpCategory,
            ReferenceKind::OpportunityStage,
        ] {
            let item = sample_item("Recurring", "recurring");
            db.insert_reference_item(kind, &item).expect("insert");
            let listed = db.get_reference_items(kind, false).expect("list");
            assert_eq!(listed.len(), 1, "{} should list one row", kind.table());
            assert_eq!(listed[0].code, "recurring");
        }
    }

    #[test]
    fn test_deactivate_hides_from_active_listing() {
        let db = test_db();
        let item = sample_item("Legacy", "legacy");
        db.insert_reference_item(ReferenceKind::RevenueModel, &item)
            .expect("insert");

        assert!(db
            .deactivate_reference_item(ReferenceKind::RevenueModel, &item.id, &now_rfc3339())
            .expect("deactivate"));

        assert!(db
            .get_reference_items(ReferenceKind::RevenueModel, false)
            .expect("active list")
            .is_empty());
        assert_eq!(
            db.get_reference_items(ReferenceKind::RevenueModel, true)
                .expect("full list")
                .len(),
            1
        );
    }

    #[test]
    fn test_thresholds_ordered_by_floor() {
        let db = test_db();
        let now = now_rfc3339();
        for (min, max, role) in [
            (100_000.0, None, Role::Executive),
            (0.0, Some(100_000.0), Role::Finance),
        ] {
            db.insert_approval_threshold(&DbApprovalThreshold {
                id: new_id(),
                approval_role: role,
                min_deal_value: min,
                max_deal_value: max,
                is_active: true,
                created_at: now.clone(),
                updated_at: now.clone(),
            })
            .expect("insert");
        }

        let thresholds = db.get_approval_thresholds(false).expect("list");
        assert_eq!(thresholds.len(), 2);
        assert_eq!(thresholds[0].approval_role, Role::Finance);
        assert_eq!(thresholds[1].approval_role, Role::Executive);
    }
}
