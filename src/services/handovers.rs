//! Handover actions: creation off a won opportunity, field edits with the
//! operations collapse, and operations-only resolution.

use crate::db::handovers::HandoverUpdate;
use crate::db::{CrmDb, DbHandover};
use crate::error::CrmError;
use crate::permissions::{ActionKind, RequestContext};
use crate::types::{HandoverState, OpportunityState, Role};
use crate::util::{new_id, now_rfc3339};
use crate::workflows::{self, validate_transition};

/// Input for a new handover.
#[derive(Debug, Clone)]
pub struct NewHandover {
    pub opportunity_id: String,
    pub quote_id: Option<String>,
    pub deal_value: f64,
    pub scope: Option<String>,
    pub expected_start_date: Option<String>,
    pub expected_end_date: Option<String>,
}

/// An edit request against a handover. What actually gets applied depends
/// on the caller's role: sales and executive may touch the delivery fields,
/// operations may only resolve, so for them everything but `state` and
/// `flagged_reason` is dropped on the floor.
#[derive(Debug, Clone, Default)]
pub struct HandoverEdit {
    pub deal_value: Option<f64>,
    pub scope: Option<String>,
    pub expected_start_date: Option<String>,
    pub expected_end_date: Option<String>,
    pub state: Option<HandoverState>,
    pub flagged_reason: Option<String>,
}

/// Create a handover in state `pending`. The parent opportunity must be
/// `closed_won` — a deal is handed to delivery only once it is won.
pub fn create_handover(
    db: &CrmDb,
    ctx: &RequestContext,
    input: NewHandover,
) -> Result<DbHandover, CrmError> {
    ctx.authorize(ActionKind::CreateHandover)?;

    let opportunity = db
        .get_opportunity(&input.opportunity_id)?
        .ok_or(CrmError::NotFound {
            entity: "Opportunity",
        })?;
    if opportunity.state != OpportunityState::ClosedWon {
        return Err(CrmError::InvalidParentState {
            child: "handover",
            parent: "Opportunity",
            required: "'closed_won'".to_string(),
            actual: opportunity.state.to_string(),
        });
    }

    let now = now_rfc3339();
    let handover = DbHandover {
        id: new_id(),
        opportunity_id: input.opportunity_id,
        quote_id: input.quote_id,
        state: HandoverState::Pending,
        deal_value: input.deal_value,
        scope: input.scope,
        expected_start_date: input.expected_start_date,
        expected_end_date: input.expected_end_date,
        accepted_by: None,
        flagged_reason: None,
        created_at: now.clone(),
        updated_at: now,
    };
    db.insert_handover(&handover)?;
    Ok(handover)
}

/// Apply an edit with the role split.
///
/// Operations callers get their edit collapsed to the resolution pair: a
/// supplied `state` routes through the resolution path, and with no `state`
/// the edit is a no-op returning the current row. Everyone else gets the
/// delivery fields applied and the resolution pair ignored.
pub fn update_handover(
    db: &CrmDb,
    ctx: &RequestContext,
    id: &str,
    edit: HandoverEdit,
) -> Result<DbHandover, CrmError> {
    ctx.authorize(ActionKind::EditHandover)?;

    if ctx.has_role(Role::Operations) {
        return match edit.state {
            Some(target) => {
                transition_handover_state(db, ctx, id, target, edit.flagged_reason.as_deref())?;
                db.get_handover(id)?
                    .ok_or(CrmError::NotFound { entity: "Handover" })
            }
            None => db
                .get_handover(id)?
                .ok_or(CrmError::NotFound { entity: "Handover" }),
        };
    }

    let update = HandoverUpdate {
        deal_value: edit.deal_value,
        scope: edit.scope,
        expected_start_date: edit.expected_start_date,
        expected_end_date: edit.expected_end_date,
    };
    db.update_handover_fields(id, &update, &now_rfc3339())?
        .ok_or(CrmError::NotFound { entity: "Handover" })
}

pub fn get_handover(db: &CrmDb, ctx: &RequestContext, id: &str) -> Result<DbHandover, CrmError> {
    ctx.principal()?;
    db.get_handover(id)?
        .ok_or(CrmError::NotFound { entity: "Handover" })
}

pub fn get_handovers(
    db: &CrmDb,
    ctx: &RequestContext,
    opportunity_id: Option<&str>,
) -> Result<Vec<DbHandover>, CrmError> {
    ctx.principal()?;
    Ok(db.get_handovers(opportunity_id)?)
}

/// Resolve a pending handover as accepted or flagged. Operations only.
///
/// Accepting stamps the caller as `accepted_by` and takes no reason;
/// flagging requires a non-empty reason. The state write is a
/// compare-and-swap on `pending`, so two resolvers cannot both win.
pub fn transition_handover_state(
    db: &CrmDb,
    ctx: &RequestContext,
    id: &str,
    target: HandoverState,
    flagged_reason: Option<&str>,
) -> Result<(), CrmError> {
    let principal = ctx.authorize(ActionKind::ResolveHandover)?;

    let handover = db
        .get_handover(id)?
        .ok_or(CrmError::NotFound { entity: "Handover" })?;
    validate_transition(handover.state, target)?;

    let (accepted_by, reason) = match target {
        HandoverState::Accepted => {
            if flagged_reason.is_some() {
                return Err(CrmError::InvalidTransitionArguments(
                    "a flag reason only applies when flagging".to_string(),
                ));
            }
            (Some(principal.user_id.as_str()), None)
        }
        HandoverState::Flagged => match flagged_reason {
            Some(reason) if !reason.trim().is_empty() => (None, Some(reason)),
            _ => {
                return Err(CrmError::InvalidTransitionArguments(
                    "flagging a handover requires a reason".to_string(),
                ))
            }
        },
        HandoverState::Pending => {
            return Err(CrmError::InvalidTransitionArguments(
                "a handover cannot return to pending".to_string(),
            ))
        }
    };

    let moved = db.update_handover_state(
        id,
        handover.state,
        target,
        accepted_by,
        reason,
        &now_rfc3339(),
    )?;
    if !moved {
        return Err(stale_transition(db, id, target)?);
    }
    Ok(())
}

/// Build the rejection for a CAS miss from the row's current state.
fn stale_transition(db: &CrmDb, id: &str, target: HandoverState) -> Result<CrmError, CrmError> {
    let fresh = db
        .get_handover(id)?
        .ok_or(CrmError::NotFound { entity: "Handover" })?;
    Ok(CrmError::InvalidTransition {
        from: fresh.state.to_string(),
        to: target.to_string(),
        valid: workflows::describe_next_states(fresh.state),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_utils::test_db;
    use crate::services::accounts::{create_account, NewAccount};
    use crate::services::opportunities::{
        create_opportunity, transition_opportunity_state, NewOpportunity,
    };
    use crate::types::Principal;

    fn ctx_as(user: &str, role: Role) -> RequestContext {
        RequestContext::new(Principal::new(user, role))
    }

    fn ctx(role: Role) -> RequestContext {
        ctx_as("user-1", role)
    }

    /// Account + opportunity walked all the way to `closed_won`.
    fn seeded_won_opportunity(db: &CrmDb) -> String {
        let sales = ctx(Role::Sales);
        let account = create_account(
            db,
            &sales,
            NewAccount {
                name: "Acme Corp".to_string(),
                industry: None,
                website: None,
                phone: None,
                address: None,
            },
        )
        .expect("account");
        let opp = create_opportunity(
            db,
            &sales,
            NewOpportunity {
                account_id: account.id,
                name: "Platform rollout".to_string(),
                description: None,
                deal_value: 80_000.0,
                expected_close_date: None,
            },
        )
        .expect("opportunity");
        for target in [
            OpportunityState::Qualified,
            OpportunityState::Proposal,
            OpportunityState::ClosedWon,
        ] {
            transition_opportunity_state(db, &sales, &opp.id, target).expect("walk");
        }
        opp.id
    }

    fn sample_input(opportunity_id: &str) -> NewHandover {
        NewHandover {
            opportunity_id: opportunity_id.to_string(),
            quote_id: None,
            deal_value: 80_000.0,
            scope: Some("Implementation".to_string()),
            expected_start_date: None,
            expected_end_date: None,
        }
    }

    #[test]
    fn test_create_requires_closed_won() {
        let db = test_db();
        let sales = ctx(Role::Sales);
        let account = create_account(
            &db,
            &sales,
            NewAccount {
                name: "Beta Inc".to_string(),
                industry: None,
                website: None,
                phone: None,
                address: None,
            },
        )
        .expect("account");
        let opp = create_opportunity(
            &db,
            &sales,
            NewOpportunity {
                account_id: account.id,
                name: "Open deal".to_string(),
                description: None,
                deal_value: 5_000.0,
                expected_close_date: None,
            },
        )
        .expect("opportunity");

        let err = create_handover(&db, &sales, sample_input(&opp.id)).expect_err("not won");
        assert_eq!(
            err.to_string(),
            "Cannot create handover. Opportunity must be 'closed_won' but is currently 'lead'"
        );
    }

    #[test]
    fn test_operations_accepts_and_is_stamped() {
        let db = test_db();
        let opp_id = seeded_won_opportunity(&db);
        let handover =
            create_handover(&db, &ctx(Role::Sales), sample_input(&opp_id)).expect("create");

        let ops = ctx_as("ops-1", Role::Operations);
        transition_handover_state(&db, &ops, &handover.id, HandoverState::Accepted, None)
            .expect("accept");

        let fresh = db.get_handover(&handover.id).expect("get").expect("exists");
        assert_eq!(fresh.state, HandoverState::Accepted);
        assert_eq!(fresh.accepted_by.as_deref(), Some("ops-1"));
        assert!(fresh.flagged_reason.is_none());
    }

    #[test]
    fn test_flag_requires_reason() {
        let db = test_db();
        let opp_id = seeded_won_opportunity(&db);
        let handover =
            create_handover(&db, &ctx(Role::Sales), sample_input(&opp_id)).expect("create");

        let ops = ctx(Role::Operations);
        let err =
            transition_handover_state(&db, &ops, &handover.id, HandoverState::Flagged, Some("  "))
                .expect_err("blank reason");
        assert!(matches!(err, CrmError::InvalidTransitionArguments(_)));

        transition_handover_state(
            &db,
            &ops,
            &handover.id,
            HandoverState::Flagged,
            Some("scope mismatch with quote"),
        )
        .expect("flag");
        let fresh = db.get_handover(&handover.id).expect("get").expect("exists");
        assert_eq!(fresh.state, HandoverState::Flagged);
        assert_eq!(
            fresh.flagged_reason.as_deref(),
            Some("scope mismatch with quote")
        );
    }

    #[test]
    fn test_accept_rejects_stray_reason() {
        let db = test_db();
        let opp_id = seeded_won_opportunity(&db);
        let handover =
            create_handover(&db, &ctx(Role::Sales), sample_input(&opp_id)).expect("create");

        let err = transition_handover_state(
            &db,
            &ctx(Role::Operations),
            &handover.id,
            HandoverState::Accepted,
            Some("unneeded"),
        )
        .expect_err("reason on accept");
        assert!(matches!(err, CrmError::InvalidTransitionArguments(_)));
    }

    #[test]
    fn test_executive_cannot_resolve() {
        let db = test_db();
        let opp_id = seeded_won_opportunity(&db);
        let handover =
            create_handover(&db, &ctx(Role::Sales), sample_input(&opp_id)).expect("create");

        let err = transition_handover_state(
            &db,
            &ctx(Role::Executive),
            &handover.id,
            HandoverState::Accepted,
            None,
        )
        .expect_err("executive may not resolve");
        assert!(matches!(err, CrmError::InsufficientPermissions { .. }));
    }

    #[test]
    fn test_resolution_is_final() {
        let db = test_db();
        let opp_id = seeded_won_opportunity(&db);
        let handover =
            create_handover(&db, &ctx(Role::Sales), sample_input(&opp_id)).expect("create");

        let ops = ctx(Role::Operations);
        transition_handover_state(&db, &ops, &handover.id, HandoverState::Accepted, None)
            .expect("accept");

        let err = transition_handover_state(
            &db,
            &ops,
            &handover.id,
            HandoverState::Flagged,
            Some("too late"),
        )
        .expect_err("already resolved");
        assert_eq!(
            err.to_string(),
            "Invalid transition from accepted to flagged. Valid transitions: none"
        );
    }

    #[test]
    fn test_operations_edit_collapses_to_resolution() {
        let db = test_db();
        let opp_id = seeded_won_opportunity(&db);
        let handover =
            create_handover(&db, &ctx(Role::Sales), sample_input(&opp_id)).expect("create");

        // Delivery fields in an operations edit are dropped, not applied
        let ops = ctx_as("ops-1", Role::Operations);
        let edit = HandoverEdit {
            deal_value: Some(1.0),
            scope: Some("rewritten".to_string()),
            state: Some(HandoverState::Accepted),
            ..Default::default()
        };
        let fresh = update_handover(&db, &ops, &handover.id, edit).expect("edit");
        assert_eq!(fresh.state, HandoverState::Accepted);
        assert_eq!(fresh.accepted_by.as_deref(), Some("ops-1"));
        assert_eq!(fresh.deal_value, 80_000.0);
        assert_eq!(fresh.scope.as_deref(), Some("Implementation"));
    }

    #[test]
    fn test_operations_edit_without_state_is_noop() {
        let db = test_db();
        let opp_id = seeded_won_opportunity(&db);
        let handover =
            create_handover(&db, &ctx(Role::Sales), sample_input(&opp_id)).expect("create");

        let edit = HandoverEdit {
            deal_value: Some(999.0),
            ..Default::default()
        };
        let fresh =
            update_handover(&db, &ctx(Role::Operations), &handover.id, edit).expect("edit");
        assert_eq!(fresh.deal_value, 80_000.0);
        assert_eq!(fresh.state, HandoverState::Pending);
    }

    #[test]
    fn test_sales_edit_applies_fields_and_ignores_resolution() {
        let db = test_db();
        let opp_id = seeded_won_opportunity(&db);
        let handover =
            create_handover(&db, &ctx(Role::Sales), sample_input(&opp_id)).expect("create");

        let edit = HandoverEdit {
            deal_value: Some(90_000.0),
            state: Some(HandoverState::Accepted),
            flagged_reason: Some("sneaky".to_string()),
            ..Default::default()
        };
        let fresh = update_handover(&db, &ctx(Role::Sales), &handover.id, edit).expect("edit");
        assert_eq!(fresh.deal_value, 90_000.0);
        assert_eq!(fresh.state, HandoverState::Pending);
        assert!(fresh.flagged_reason.is_none());
    }
}
