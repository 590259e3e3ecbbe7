//! Quote actions: creation against a qualified parent opportunity, role-split
//! state transitions with the approval audit side effect, and the
//! role-dependent read projection.

use serde::Serialize;

use crate::db::quotes::QuoteUpdate;
use crate::db::{CrmDb, DbApproval, DbQuote, DbQuoteForOperations};
use crate::error::CrmError;
use crate::permissions::{ActionKind, RequestContext};
use crate::types::{ApprovalStatus, OpportunityState, QuoteState, Role};
use crate::util::{new_id, now_rfc3339};
use crate::workflows::{self, validate_transition};

/// Input for a new quote.
#[derive(Debug, Clone)]
pub struct NewQuote {
    pub opportunity_id: String,
    pub quote_number: String,
    pub deal_value: f64,
    pub cost: Option<f64>,
    pub margin: Option<f64>,
    pub margin_percentage: Option<f64>,
    pub discount_percentage: Option<f64>,
    pub scope: Option<String>,
    pub valid_until: Option<String>,
}

/// A quote as seen by the caller's role. Operations callers get the
/// restricted variant; serialized, it simply has no cost/margin/discount
/// keys. Untagged so the projection difference is invisible in the payload
/// shape itself.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum QuoteProjection {
    Full(DbQuote),
    Operations(DbQuoteForOperations),
}

impl QuoteProjection {
    pub fn id(&self) -> &str {
        match self {
            QuoteProjection::Full(q) => &q.id,
            QuoteProjection::Operations(q) => &q.id,
        }
    }

    pub fn state(&self) -> QuoteState {
        match self {
            QuoteProjection::Full(q) => q.state,
            QuoteProjection::Operations(q) => q.state,
        }
    }
}

/// Create a quote. The parent opportunity must be in `proposal` or
/// `closed_won`, and the quote number must be globally unique. The number
/// pre-check is a fast-failure nicety; the UNIQUE constraint is the
/// authoritative guard and maps onto the same error if a race slips past.
pub fn create_quote(db: &CrmDb, ctx: &RequestContext, input: NewQuote) -> Result<DbQuote, CrmError> {
    let principal = ctx.authorize(ActionKind::CreateQuote)?;

    let opportunity = db
        .get_opportunity(&input.opportunity_id)?
        .ok_or(CrmError::NotFound {
            entity: "Opportunity",
        })?;
    if !matches!(
        opportunity.state,
        OpportunityState::Proposal | OpportunityState::ClosedWon
    ) {
        return Err(CrmError::InvalidParentState {
            child: "quote",
            parent: "Opportunity",
            required: "'proposal' or 'closed_won'".to_string(),
            actual: opportunity.state.to_string(),
        });
    }

    if db.quote_number_exists(&input.quote_number, None)? {
        return Err(CrmError::DuplicateQuoteNumber(input.quote_number));
    }

    let now = now_rfc3339();
    let quote = DbQuote {
        id: new_id(),
        opportunity_id: input.opportunity_id,
        quote_number: input.quote_number,
        state: QuoteState::Draft,
        deal_value: input.deal_value,
        cost: input.cost,
        margin: input.margin,
        margin_percentage: input.margin_percentage,
        discount_percentage: input.discount_percentage,
        scope: input.scope,
        valid_until: input.valid_until,
        created_by: principal.user_id.clone(),
        created_at: now.clone(),
        updated_at: now,
    };
    match db.insert_quote(&quote) {
        Ok(()) => Ok(quote),
        // Concurrent insert past the pre-check
        Err(e) if e.is_constraint_violation() => {
            Err(CrmError::DuplicateQuoteNumber(quote.quote_number))
        }
        Err(e) => Err(e.into()),
    }
}

/// Edit quote fields. State is untouchable here.
pub fn update_quote(
    db: &CrmDb,
    ctx: &RequestContext,
    id: &str,
    update: QuoteUpdate,
) -> Result<DbQuote, CrmError> {
    ctx.authorize(ActionKind::EditQuote)?;
    db.update_quote_fields(id, &update, &now_rfc3339())?
        .ok_or(CrmError::NotFound { entity: "Quote" })
}

/// Fetch one quote through the caller's projection.
///
/// The projection is decided per call from the supplied context — roles can
/// change out-of-band, so nothing is cached.
pub fn get_quote(db: &CrmDb, ctx: &RequestContext, id: &str) -> Result<QuoteProjection, CrmError> {
    let principal = ctx.principal()?;
    if principal.role == Role::Operations {
        let quote = db
            .get_quote_for_operations(id)?
            .ok_or(CrmError::NotFound { entity: "Quote" })?;
        Ok(QuoteProjection::Operations(quote))
    } else {
        let quote = db
            .get_quote(id)?
            .ok_or(CrmError::NotFound { entity: "Quote" })?;
        Ok(QuoteProjection::Full(quote))
    }
}

/// List quotes through the caller's projection, optionally scoped to an
/// opportunity.
pub fn get_quotes(
    db: &CrmDb,
    ctx: &RequestContext,
    opportunity_id: Option<&str>,
) -> Result<Vec<QuoteProjection>, CrmError> {
    let principal = ctx.principal()?;
    if principal.role == Role::Operations {
        Ok(db
            .get_quotes_for_operations(opportunity_id)?
            .into_iter()
            .map(QuoteProjection::Operations)
            .collect())
    } else {
        Ok(db
            .get_quotes(opportunity_id)?
            .into_iter()
            .map(QuoteProjection::Full)
            .collect())
    }
}

/// Approval history for a quote, newest first. Open to any authenticated
/// caller; the records carry no restricted financials.
pub fn get_quote_approvals(
    db: &CrmDb,
    ctx: &RequestContext,
    quote_id: &str,
) -> Result<Vec<DbApproval>, CrmError> {
    ctx.principal()?;
    Ok(db.get_approvals_by_quote(quote_id)?)
}

/// Transition a quote.
///
/// The role gate splits by target: submitting for approval belongs to sales
/// and executive; approving or rejecting belongs to finance and executive.
/// A transition into `approved`/`rejected` also appends one Approval record
/// attributed to the acting user. If that append fails after the state write
/// landed, the failure is logged and the operation still reports success —
/// the state write is the primary outcome.
pub fn transition_quote_state(
    db: &CrmDb,
    ctx: &RequestContext,
    id: &str,
    target: QuoteState,
    comments: Option<&str>,
) -> Result<(), CrmError> {
    let resolving = matches!(target, QuoteState::Approved | QuoteState::Rejected);
    let principal = if resolving {
        ctx.authorize(ActionKind::ResolveQuoteApproval)?
    } else {
        ctx.authorize(ActionKind::SubmitQuoteForApproval)?
    };
    let approver_id = principal.user_id.clone();

    let quote = db
        .get_quote(id)?
        .ok_or(CrmError::NotFound { entity: "Quote" })?;
    validate_transition(quote.state, target)?;

    let moved = db.update_quote_state(id, quote.state, target, &now_rfc3339())?;
    if !moved {
        return Err(stale_transition(db, id, target)?);
    }

    if resolving {
        let status = match target {
            QuoteState::Approved => ApprovalStatus::Approved,
            _ => ApprovalStatus::Rejected,
        };
        let approval = DbApproval {
            id: new_id(),
            quote_id: id.to_string(),
            approver_id,
            status,
            comments: comments.map(str::to_string),
            created_at: now_rfc3339(),
        };
        if let Err(e) = db.insert_approval(&approval) {
            // The state write already landed; surface the audit gap in the
            // log and report the transition as successful.
            tracing::error!(quote_id = %id, error = %e, "Failed to create approval record");
        }
    }

    Ok(())
}

/// Build the rejection for a CAS miss from the row's current state.
fn stale_transition(db: &CrmDb, id: &str, target: QuoteState) -> Result<CrmError, CrmError> {
    let fresh = db
        .get_quote(id)?
        .ok_or(CrmError::NotFound { entity: "Quote" })?;
    Ok(CrmError::InvalidTransition {
        from: fresh.state.to_string(),
        to: target.to_string(),
        valid: workflows::describe_next_states(fresh.state),
    })
}
