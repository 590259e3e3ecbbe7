//! Shared type definitions for the database layer.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{
    ApprovalStatus, HandoverState, OpportunityState, QuoteState, Role,
};

/// Errors specific to database operations.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Home directory not found")]
    HomeDirNotFound,

    #[error("Failed to create database directory: {0}")]
    CreateDir(std::io::Error),

    #[error("Schema migration failed: {0}")]
    Migration(String),

    #[error("Unrecognized {field} value in row: {value}")]
    BadEnumValue { field: &'static str, value: String },
}

impl DbError {
    /// Map a stored TEXT value to its enum, surfacing corrupt rows as a
    /// typed error rather than a panic.
    pub(crate) fn expect_enum<T>(
        parsed: Option<T>,
        field: &'static str,
        value: &str,
    ) -> Result<T, rusqlite::Error> {
        parsed.ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                Box::new(DbError::BadEnumValue {
                    field,
                    value: value.to_string(),
                }),
            )
        })
    }

    /// True when the underlying SQLite failure is a constraint violation
    /// (UNIQUE, FK, CHECK). Used to map races past the pre-checks onto the
    /// same caller-facing errors.
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            DbError::Sqlite(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation
        )
    }
}

/// A row from the `user_profiles` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbUserProfile {
    pub id: String,
    pub email: String,
    pub full_name: Option<String>,
    pub role: Role,
    pub created_at: String,
    pub updated_at: String,
}

/// A row from the `accounts` table. No state machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbAccount {
    pub id: String,
    pub name: String,
    pub industry: Option<String>,
    pub website: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub created_by: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// A row from the `opportunities` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbOpportunity {
    pub id: String,
    pub account_id: String,
    pub name: String,
    pub description: Option<String>,
    pub state: OpportunityState,
    pub deal_value: f64,
    pub expected_close_date: Option<String>,
    pub owner_id: String,
    pub created_at: String,
    pub updated_at: String,
}

/// A full row from the `quotes` table. Visible to executive, sales, and
/// finance callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbQuote {
    pub id: String,
    pub opportunity_id: String,
    pub quote_number: String,
    pub state: QuoteState,
    pub deal_value: f64,
    pub cost: Option<f64>,
    pub margin: Option<f64>,
    pub margin_percentage: Option<f64>,
    pub discount_percentage: Option<f64>,
    pub scope: Option<String>,
    pub valid_until: Option<String>,
    pub created_by: String,
    pub created_at: String,
    pub updated_at: String,
}

/// The restricted quote projection served to operations callers.
///
/// Cost, margin, and discount fields are not masked — they do not exist on
/// this struct, and the SELECT behind it never reads those columns.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbQuoteForOperations {
    pub id: String,
    pub opportunity_id: String,
    pub quote_number: String,
    pub state: QuoteState,
    pub deal_value: f64,
    pub scope: Option<String>,
    pub valid_until: Option<String>,
    pub created_by: String,
    pub created_at: String,
    pub updated_at: String,
}

/// A row from the `approvals` audit log. Append-only in the normal flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbApproval {
    pub id: String,
    pub quote_id: String,
    pub approver_id: String,
    pub status: ApprovalStatus,
    pub comments: Option<String>,
    pub created_at: String,
}

/// A row from the `handovers` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbHandover {
    pub id: String,
    pub opportunity_id: String,
    pub quote_id: Option<String>,
    pub state: HandoverState,
    pub deal_value: f64,
    pub scope: Option<String>,
    pub expected_start_date: Option<String>,
    pub expected_end_date: Option<String>,
    pub accepted_by: Option<String>,
    pub flagged_reason: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// A row from one of the name/code reference tables (revenue models,
/// revenue streams, ICP categories, opportunity stages).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbReferenceItem {
    pub id: String,
    pub name: String,
    pub code: String,
    pub description: Option<String>,
    pub display_order: i64,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// A row from the `approval_thresholds` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbApprovalThreshold {
    pub id: String,
    pub approval_role: Role,
    pub min_deal_value: f64,
    pub max_deal_value: Option<f64>,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}
