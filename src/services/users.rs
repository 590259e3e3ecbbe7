//! User profile management. Locked to executives, except that any caller
//! may read their own profile.

use crate::db::{CrmDb, DbUserProfile};
use crate::error::CrmError;
use crate::permissions::{ActionKind, RequestContext};
use crate::types::Role;
use crate::util::{new_id, now_rfc3339};

/// Input for a new user profile. With no role given, the user starts as
/// sales.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub full_name: Option<String>,
    pub role: Option<Role>,
}

/// Create a user profile. Email is unique, case-insensitively.
pub fn create_user(db: &CrmDb, ctx: &RequestContext, input: NewUser) -> Result<DbUserProfile, CrmError> {
    ctx.authorize(ActionKind::ManageUsers)?;

    if db.get_user_profile_by_email(&input.email)?.is_some() {
        return Err(CrmError::DuplicateEmail(input.email));
    }

    let now = now_rfc3339();
    let user = DbUserProfile {
        id: new_id(),
        email: input.email,
        full_name: input.full_name,
        role: input.role.unwrap_or(Role::Sales),
        created_at: now.clone(),
        updated_at: now,
    };
    match db.insert_user_profile(&user) {
        Ok(()) => Ok(user),
        Err(e) if e.is_constraint_violation() => Err(CrmError::DuplicateEmail(user.email)),
        Err(e) => Err(e.into()),
    }
}

/// List all profiles, newest first.
pub fn get_users(db: &CrmDb, ctx: &RequestContext) -> Result<Vec<DbUserProfile>, CrmError> {
    ctx.authorize(ActionKind::ManageUsers)?;
    Ok(db.get_all_user_profiles()?)
}

/// The caller's own profile.
pub fn get_own_profile(db: &CrmDb, ctx: &RequestContext) -> Result<DbUserProfile, CrmError> {
    let principal = ctx.principal()?;
    db.get_user_profile(&principal.user_id)?
        .ok_or(CrmError::NotFound { entity: "User" })
}
