use rusqlite::{params, Row};

use super::*;

impl CrmDb {
    // =========================================================================
    // Accounts
    // =========================================================================

    fn map_account_row(row: &Row<'_>) -> rusqlite::Result<DbAccount> {
        Ok(DbAccount {
            id: row.get(0)?,
            name: row.get(1)?,
            industry: row.get(2)?,
            website: row.get(3)?,
            phone: row.get(4)?,
            address: row.get(5)?,
            created_by: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }

    const ACCOUNT_COLUMNS: &'static str =
        "id, name, industry, website, phone, address, created_by, created_at, updated_at";

    /// Insert a new account row.
    pub fn insert_account(&self, account: &DbAccount) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO accounts (id, name, industry, website, phone, address,
                                   created_by, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                account.id,
                account.name,
                account.industry,
                account.website,
                account.phone,
                account.address,
                account.created_by,
                account.created_at,
                account.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Get an account by ID.
    pub fn get_account(&self, id: &str) -> Result<Option<DbAccount>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM accounts WHERE id = ?1",
            Self::ACCOUNT_COLUMNS
        ))?;
        let mut rows = stmt.query_map(params![id], Self::map_account_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// Get all accounts, newest first.
    pub fn get_all_accounts(&self) -> Result<Vec<DbAccount>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM accounts ORDER BY created_at DESC",
            Self::ACCOUNT_COLUMNS
        ))?;
        let rows = stmt.query_map([], Self::map_account_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Apply non-null field updates to an account. Returns the fresh row,
    /// or None if the id does not resolve.
    pub fn update_account_fields(
        &self,
        id: &str,
        update: &AccountUpdate,
        updated_at: &str,
    ) -> Result<Option<DbAccount>, DbError> {
        let rows = self.conn.execute(
            "UPDATE accounts SET
                name = COALESCE(?1, name),
                industry = COALESCE(?2, industry),
                website = COALESCE(?3, website),
                phone = COALESCE(?4, phone),
                address = COALESCE(?5, address),
                updated_at = ?6
             WHERE id = ?7",
            params![
                update.name,
                update.industry,
                update.website,
                update.phone,
                update.address,
                updated_at,
                id,
            ],
        )?;
        if rows == 0 {
            return Ok(None);
        }
        self.get_account(id)
    }
}

/// Field-level account update. `None` leaves a column untouched.
#[derive(Debug, Clone, Default)]
pub struct AccountUpdate {
    pub name: Option<String>,
    pub industry: Option<String>,
    pub website: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::super::test_utils::test_db;
    use super::*;
    use crate::util::now_rfc3339;

    fn sample_account(id: &str, name: &str) -> DbAccount {
        let now = now_rfc3339();
        DbAccount {
            id: id.to_string(),
            name: name.to_string(),
            industry: None,
            website: None,
            phone: None,
            address: None,
            created_by: Some("user-1".to_string()),
            created_at: now.clone(),
            updated_at: now,
        }
    }

    #[test]
    fn test_insert_and_get_account() {
        let db = test_db();
        db.insert_account(&sample_account("acme", "Acme Corp"))
            .expect("insert");

        let found = db.get_account("acme").expect("get").expect("exists");
        assert_eq!(found.name, "Acme Corp");
        assert_eq!(found.created_by.as_deref(), Some("user-1"));

        assert!(db.get_account("nope").expect("get").is_none());
    }

    #[test]
    fn test_update_account_fields_partial() {
        let db = test_db();
        let mut account = sample_account("acme", "Acme Corp");
        account.industry = Some("Manufacturing".to_string());
        db.insert_account(&account).expect("insert");

        let update = AccountUpdate {
            website: Some("https://acme.example".to_string()),
            ..Default::default()
        };
        let fresh = db
            .update_account_fields("acme", &update, &now_rfc3339())
            .expect("update")
            .expect("row exists");
        assert_eq!(fresh.website.as_deref(), Some("https://acme.example"));
        // Untouched fields survive
        assert_eq!(fresh.industry.as_deref(), Some("Manufacturing"));
        assert_eq!(fresh.name, "Acme Corp");
    }

    #[test]
    fn test_update_missing_account_returns_none() {
        let db = test_db();
        let result = db
            .update_account_fields("ghost", &AccountUpdate::default(), &now_rfc3339())
            .expect("update");
        assert!(result.is_none());
    }
}
