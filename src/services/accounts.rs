//! Account actions. Accounts have no state machine; this is plain
//! role-gated CRUD.

use crate::db::accounts::AccountUpdate;
use crate::db::{CrmDb, DbAccount};
use crate::error::CrmError;
use crate::permissions::{ActionKind, RequestContext};
use crate::util::{new_id, now_rfc3339};

/// Input for a new account.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub name: String,
    pub industry: Option<String>,
    pub website: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

/// Create an account. Sales and executive only; `created_by` is the caller.
pub fn create_account(
    db: &CrmDb,
    ctx: &RequestContext,
    input: NewAccount,
) -> Result<DbAccount, CrmError> {
    let principal = ctx.authorize(ActionKind::CreateAccount)?;
    let now = now_rfc3339();
    let account = DbAccount {
        id: new_id(),
        name: input.name,
        industry: input.industry,
        website: input.website,
        phone: input.phone,
        address: input.address,
        created_by: Some(principal.user_id.clone()),
        created_at: now.clone(),
        updated_at: now,
    };
    db.insert_account(&account)?;
    Ok(account)
}

/// Edit account fields.
pub fn update_account(
    db: &CrmDb,
    ctx: &RequestContext,
    id: &str,
    update: AccountUpdate,
) -> Result<DbAccount, CrmError> {
    ctx.authorize(ActionKind::EditAccount)?;
    db.update_account_fields(id, &update, &now_rfc3339())?
        .ok_or(CrmError::NotFound { entity: "Account" })
}

/// Fetch one account. Any authenticated role may read.
pub fn get_account(db: &CrmDb, ctx: &RequestContext, id: &str) -> Result<DbAccount, CrmError> {
    ctx.principal()?;
    db.get_account(id)?
        .ok_or(CrmError::NotFound { entity: "Account" })
}

/// List all accounts, newest first.
pub fn get_accounts(db: &CrmDb, ctx: &RequestContext) -> Result<Vec<DbAccount>, CrmError> {
    ctx.principal()?;
    Ok(db.get_all_accounts()?)
}
