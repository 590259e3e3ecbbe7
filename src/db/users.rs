use rusqlite::{params, Row};

use super::*;
use crate::types::Role;

impl CrmDb {
    // =========================================================================
    // User profiles
    // =========================================================================

    fn map_user_row(row: &Row<'_>) -> rusqlite::Result<DbUserProfile> {
        let role_raw: String = row.get(3)?;
        Ok(DbUserProfile {
            id: row.get(0)?,
            email: row.get(1)?,
            full_name: row.get(2)?,
            role: DbError::expect_enum(Role::parse(&role_raw), "user_profiles.role", &role_raw)?,
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
        })
    }

    /// Insert a new user profile. A duplicate email violates UNIQUE.
    pub fn insert_user_profile(&self, user: &DbUserProfile) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO user_profiles (id, email, full_name, role, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                user.id,
                user.email,
                user.full_name,
                user.role.as_str(),
                user.created_at,
                user.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Get a profile by user ID.
    pub fn get_user_profile(&self, id: &str) -> Result<Option<DbUserProfile>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, email, full_name, role, created_at, updated_at
             FROM user_profiles WHERE id = ?1",
        )?;
        let mut rows = stmt.query_map(params![id], Self::map_user_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// Get a profile by email (case-insensitive).
    pub fn get_user_profile_by_email(&self, email: &str) -> Result<Option<DbUserProfile>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, email, full_name, role, created_at, updated_at
             FROM user_profiles WHERE LOWER(email) = LOWER(?1)",
        )?;
        let mut rows = stmt.query_map(params![email], Self::map_user_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// List all profiles, newest first.
    pub fn get_all_user_profiles(&self) -> Result<Vec<DbUserProfile>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, email, full_name, role, created_at, updated_at
             FROM user_profiles ORDER BY created_at DESC",
        )?;
        let rows = stmt.query_map([], Self::map_user_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_utils::test_db;
    use super::*;
    use crate::util::now_rfc3339;

    fn sample_user(id: &str, email: &str, role: Role) -> DbUserProfile {
        let now = now_rfc3339();
        DbUserProfile {
            id: id.to_string(),
            email: email.to_string(),
            full_name: Some("Pat Doe".to_string()),
            role,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    #[test]
    fn test_insert_and_lookup() {
        let db = test_db();
        db.insert_user_profile(&sample_user("u1", "pat@example.com", Role::Finance))
            .expect("insert");

        let by_id = db.get_user_profile("u1").expect("get").expect("exists");
        assert_eq!(by_id.role, Role::Finance);

        let by_email = db
            .get_user_profile_by_email("PAT@example.com")
            .expect("get")
            .expect("case-insensitive match");
        assert_eq!(by_email.id, "u1");
    }

    #[test]
    fn test_duplicate_email_rejected() {
        let db = test_db();
        db.insert_user_profile(&sample_user("u1", "pat@example.com", Role::Sales))
            .expect("insert");
        let err = db
            .insert_user_profile(&sample_user("u2", "pat@example.com", Role::Sales))
            .expect_err("duplicate email");
        assert!(err.is_constraint_violation());
    }
}
