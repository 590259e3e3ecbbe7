use rusqlite::{params, Row};

use super::*;
use crate::types::ApprovalStatus;

impl CrmDb {
    // =========================================================================
    // Approvals — append-only audit log
    // =========================================================================

    fn map_approval_row(row: &Row<'_>) -> rusqlite::Result<DbApproval> {
        let status_raw: String = row.get(3)?;
        Ok(DbApproval {
            id: row.get(0)?,
            quote_id: row.get(1)?,
            approver_id: row.get(2)?,
            status: DbError::expect_enum(
                ApprovalStatus::parse(&status_raw),
                "approvals.status",
                &status_raw,
            )?,
            comments: row.get(4)?,
            created_at: row.get(5)?,
        })
    }

    /// Append an approval record. Rows are never updated afterwards.
    pub fn insert_approval(&self, approval: &DbApproval) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO approvals (id, quote_id, approver_id, status, comments, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                approval.id,
                approval.quote_id,
                approval.approver_id,
                approval.status.as_str(),
                approval.comments,
                approval.created_at,
            ],
        )?;
        Ok(())
    }

    /// Approval history for one quote, newest first.
    pub fn get_approvals_by_quote(&self, quote_id: &str) -> Result<Vec<DbApproval>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, quote_id, approver_id, status, comments, created_at
             FROM approvals WHERE quote_id = ?1 ORDER BY created_at DESC",
        )?;
        let rows = stmt.query_map(params![quote_id], Self::map_approval_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}
