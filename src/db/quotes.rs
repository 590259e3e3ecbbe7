use rusqlite::{params, Row};

use super::*;
use crate::types::QuoteState;

impl CrmDb {
    // =========================================================================
    // Quotes
    // =========================================================================

    fn map_quote_row(row: &Row<'_>) -> rusqlite::Result<DbQuote> {
        let state_raw: String = row.get(3)?;
        Ok(DbQuote {
            id: row.get(0)?,
            opportunity_id: row.get(1)?,
            quote_number: row.get(2)?,
            state: DbError::expect_enum(QuoteState::parse(&state_raw), "quotes.state", &state_raw)?,
            deal_value: row.get(4)?,
            cost: row.get(5)?,
            margin: row.get(6)?,
            margin_percentage: row.get(7)?,
            discount_percentage: row.get(8)?,
            scope: row.get(9)?,
            valid_until: row.get(10)?,
            created_by: row.get(11)?,
            created_at: row.get(12)?,
            updated_at: row.get(13)?,
        })
    }

    fn map_quote_for_operations_row(row: &Row<'_>) -> rusqlite::Result<DbQuoteForOperations> {
        let state_raw: String = row.get(3)?;
        Ok(DbQuoteForOperations {
            id: row.get(0)?,
            opportunity_id: row.get(1)?,
            quote_number: row.get(2)?,
            state: DbError::expect_enum(QuoteState::parse(&state_raw), "quotes.state", &state_raw)?,
            deal_value: row.get(4)?,
            scope: row.get(5)?,
            valid_until: row.get(6)?,
            created_by: row.get(7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }

    const QUOTE_COLUMNS: &'static str = "id, opportunity_id, quote_number, state, deal_value, \
         cost, margin, margin_percentage, discount_percentage, scope, valid_until, \
         created_by, created_at, updated_at";

    /// The restricted projection for operations callers. Cost, margin, and
    /// discount columns are never read, so they cannot leak into the result.
    const QUOTE_OPERATIONS_COLUMNS: &'static str =
        "id, opportunity_id, quote_number, state, deal_value, scope, valid_until, \
         created_by, created_at, updated_at";

    /// Insert a new quote row. A duplicate quote_number violates the UNIQUE
    /// constraint; the caller maps that onto its duplicate error.
    pub fn insert_quote(&self, quote: &DbQuote) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO quotes (id, opportunity_id, quote_number, state, deal_value,
                                 cost, margin, margin_percentage, discount_percentage,
                                 scope, valid_until, created_by, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                quote.id,
                quote.opportunity_id,
                quote.quote_number,
                quote.state.as_str(),
                quote.deal_value,
                quote.cost,
                quote.margin,
                quote.margin_percentage,
                quote.discount_percentage,
                quote.scope,
                quote.valid_until,
                quote.created_by,
                quote.created_at,
                quote.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Fast-failure pre-check for quote number uniqueness. The UNIQUE
    /// constraint remains the authoritative guard.
    pub fn quote_number_exists(
        &self,
        quote_number: &str,
        exclude_id: Option<&str>,
    ) -> Result<bool, DbError> {
        let count: i64 = match exclude_id {
            Some(exclude) => self.conn.query_row(
                "SELECT COUNT(*) FROM quotes WHERE quote_number = ?1 AND id != ?2",
                params![quote_number, exclude],
                |row| row.get(0),
            )?,
            None => self.conn.query_row(
                "SELECT COUNT(*) FROM quotes WHERE quote_number = ?1",
                params![quote_number],
                |row| row.get(0),
            )?,
        };
        Ok(count > 0)
    }

    /// Get a full quote by ID.
    pub fn get_quote(&self, id: &str) -> Result<Option<DbQuote>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM quotes WHERE id = ?1",
            Self::QUOTE_COLUMNS
        ))?;
        let mut rows = stmt.query_map(params![id], Self::map_quote_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// Get a quote through the restricted operations projection.
    pub fn get_quote_for_operations(
        &self,
        id: &str,
    ) -> Result<Option<DbQuoteForOperations>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM quotes WHERE id = ?1",
            Self::QUOTE_OPERATIONS_COLUMNS
        ))?;
        let mut rows = stmt.query_map(params![id], Self::map_quote_for_operations_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// Get full quotes, newest first, optionally scoped to an opportunity.
    pub fn get_quotes(&self, opportunity_id: Option<&str>) -> Result<Vec<DbQuote>, DbError> {
        match opportunity_id {
            Some(opportunity_id) => {
                let mut stmt = self.conn.prepare(&format!(
                    "SELECT {} FROM quotes WHERE opportunity_id = ?1
                     ORDER BY created_at DESC",
                    Self::QUOTE_COLUMNS
                ))?;
                let rows = stmt.query_map(params![opportunity_id], Self::map_quote_row)?;
                Ok(rows.collect::<Result<Vec<_>, _>>()?)
            }
            None => {
                let mut stmt = self.conn.prepare(&format!(
                    "SELECT {} FROM quotes ORDER BY created_at DESC",
                    Self::QUOTE_COLUMNS
                ))?;
                let rows = stmt.query_map([], Self::map_quote_row)?;
                Ok(rows.collect::<Result<Vec<_>, _>>()?)
            }
        }
    }

    /// Restricted-projection listing for operations callers.
    pub fn get_quotes_for_operations(
        &self,
        opportunity_id: Option<&str>,
    ) -> Result<Vec<DbQuoteForOperations>, DbError> {
        match opportunity_id {
            Some(opportunity_id) => {
                let mut stmt = self.conn.prepare(&format!(
                    "SELECT {} FROM quotes WHERE opportunity_id = ?1
                     ORDER BY created_at DESC",
                    Self::QUOTE_OPERATIONS_COLUMNS
                ))?;
                let rows =
                    stmt.query_map(params![opportunity_id], Self::map_quote_for_operations_row)?;
                Ok(rows.collect::<Result<Vec<_>, _>>()?)
            }
            None => {
                let mut stmt = self.conn.prepare(&format!(
                    "SELECT {} FROM quotes ORDER BY created_at DESC",
                    Self::QUOTE_OPERATIONS_COLUMNS
                ))?;
                let rows = stmt.query_map([], Self::map_quote_for_operations_row)?;
                Ok(rows.collect::<Result<Vec<_>, _>>()?)
            }
        }
    }

    /// Conditionally move a quote to a new state (compare-and-swap on the
    /// expected current state). Returns `false` when the row was stale.
    pub fn update_quote_state(
        &self,
        id: &str,
        expected: QuoteState,
        target: QuoteState,
        updated_at: &str,
    ) -> Result<bool, DbError> {
        let rows = self.conn.execute(
            "UPDATE quotes SET state = ?1, updated_at = ?2
             WHERE id = ?3 AND state = ?4",
            params![target.as_str(), updated_at, id, expected.as_str()],
        )?;
        Ok(rows > 0)
    }

    /// Apply non-null field updates. State transitions go through
    /// `update_quote_state` only.
    pub fn update_quote_fields(
        &self,
        id: &str,
        update: &QuoteUpdate,
        updated_at: &str,
    ) -> Result<Option<DbQuote>, DbError> {
        let rows = self.conn.execute(
            "UPDATE quotes SET
                deal_value = COALESCE(?1, deal_value),
                cost = COALESCE(?2, cost),
                margin = COALESCE(?3, margin),
                margin_percentage = COALESCE(?4, margin_percentage),
                discount_percentage = COALESCE(?5, discount_percentage),
                scope = COALESCE(?6, scope),
                valid_until = COALESCE(?7, valid_until),
                updated_at = ?8
             WHERE id = ?9",
            params![
                update.deal_value,
                update.cost,
                update.margin,
                update.margin_percentage,
                update.discount_percentage,
                update.scope,
                update.valid_until,
                updated_at,
                id,
            ],
        )?;
        if rows == 0 {
            return Ok(None);
        }
        self.get_quote(id)
    }

    /// Per-state row counts for the dashboard.
    pub fn count_quotes_by_state(&self) -> Result<Vec<(String, i64)>, DbError> {
        let mut stmt = self
            .conn
            .prepare("SELECT state, COUNT(*) FROM quotes GROUP BY state")?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Most recent quotes for the activity feed.
    pub fn get_recent_quotes(&self, limit: usize) -> Result<Vec<DbQuote>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM quotes ORDER BY created_at DESC LIMIT ?1",
            Self::QUOTE_COLUMNS
        ))?;
        let rows = stmt.query_map(params![limit as i64], Self::map_quote_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

/// Field-level quote update. `None` leaves a column untouched.
#[derive(Debug, Clone, Default)]
pub struct QuoteUpdate {
    pub deal_value: Option<f64>,
    pub cost: Option<f64>,
    pub margin: Option<f64>,
    pub margin_percentage: Option<f64>,
    pub discount_percentage: Option<f64>,
    pub scope: Option<String>,
    pub valid_until: Option<String>,
}
