//! Opportunity actions, including the pipeline state transition.

use crate::db::opportunities::OpportunityUpdate;
use crate::db::{CrmDb, DbOpportunity};
use crate::error::CrmError;
use crate::permissions::{ActionKind, RequestContext};
use crate::types::OpportunityState;
use crate::util::{new_id, now_rfc3339};
use crate::workflows::{self, validate_transition};

/// Input for a new opportunity. Owner and initial state are not part of the
/// input: the owner is the caller and every opportunity starts as a lead.
#[derive(Debug, Clone)]
pub struct NewOpportunity {
    pub account_id: String,
    pub name: String,
    pub description: Option<String>,
    pub deal_value: f64,
    pub expected_close_date: Option<String>,
}

/// Create an opportunity in state `lead`, owned by the caller.
pub fn create_opportunity(
    db: &CrmDb,
    ctx: &RequestContext,
    input: NewOpportunity,
) -> Result<DbOpportunity, CrmError> {
    let principal = ctx.authorize(ActionKind::CreateOpportunity)?;

    if db.get_account(&input.account_id)?.is_none() {
        return Err(CrmError::NotFound { entity: "Account" });
    }

    let now = now_rfc3339();
    let opportunity = DbOpportunity {
        id: new_id(),
        account_id: input.account_id,
        name: input.name,
        description: input.description,
        state: OpportunityState::Lead,
        deal_value: input.deal_value,
        expected_close_date: input.expected_close_date,
        owner_id: principal.user_id.clone(),
        created_at: now.clone(),
        updated_at: now,
    };
    db.insert_opportunity(&opportunity)?;
    Ok(opportunity)
}

/// Edit core fields. State is untouchable here.
pub fn update_opportunity(
    db: &CrmDb,
    ctx: &RequestContext,
    id: &str,
    update: OpportunityUpdate,
) -> Result<DbOpportunity, CrmError> {
    ctx.authorize(ActionKind::EditOpportunity)?;
    db.update_opportunity_fields(id, &update, &now_rfc3339())?
        .ok_or(CrmError::NotFound {
            entity: "Opportunity",
        })
}

pub fn get_opportunity(
    db: &CrmDb,
    ctx: &RequestContext,
    id: &str,
) -> Result<DbOpportunity, CrmError> {
    ctx.principal()?;
    db.get_opportunity(id)?.ok_or(CrmError::NotFound {
        entity: "Opportunity",
    })
}

pub fn get_opportunities(
    db: &CrmDb,
    ctx: &RequestContext,
    account_id: Option<&str>,
) -> Result<Vec<DbOpportunity>, CrmError> {
    ctx.principal()?;
    Ok(db.get_opportunities(account_id)?)
}

/// Move an opportunity along the pipeline.
///
/// Validates against the transition table, then writes with a
/// compare-and-swap on the state just read. Zero rows affected means another
/// request moved the record first; the caller gets the same rejection as any
/// other invalid transition, built from the fresh state.
pub fn transition_opportunity_state(
    db: &CrmDb,
    ctx: &RequestContext,
    id: &str,
    target: OpportunityState,
) -> Result<(), CrmError> {
    ctx.authorize(ActionKind::TransitionOpportunity)?;

    let opportunity = db.get_opportunity(id)?.ok_or(CrmError::NotFound {
        entity: "Opportunity",
    })?;
    validate_transition(opportunity.state, target)?;

    let moved = db.update_opportunity_state(id, opportunity.state, target, &now_rfc3339())?;
    if !moved {
        return Err(stale_transition(db, id, target)?);
    }
    Ok(())
}

/// Build the rejection for a CAS miss from the row's current state.
fn stale_transition(
    db: &CrmDb,
    id: &str,
    target: OpportunityState,
) -> Result<CrmError, CrmError> {
    let fresh = db.get_opportunity(id)?.ok_or(CrmError::NotFound {
        entity: "Opportunity",
    })?;
    Ok(CrmError::InvalidTransition {
        from: fresh.state.to_string(),
        to: target.to_string(),
        valid: workflows::describe_next_states(fresh.state),
    })
}
