//! Pure state-transition engine for the three pipeline entities.
//!
//! Each workflow is a directed acyclic graph encoded as a static table from
//! current state to directly reachable states. Terminal states are sinks:
//! once an opportunity closes, a quote resolves, or a handover is accepted
//! or flagged, no further transitions exist. Validation here does no I/O;
//! persistence and role gating live in the service layer.

use std::fmt::Display;

use crate::error::CrmError;
use crate::types::{HandoverState, OpportunityState, QuoteState};

/// A state participating in one of the fixed workflows.
pub trait WorkflowState: Copy + Eq + Display + 'static {
    /// States directly reachable from `self`. Empty for terminal states.
    fn allowed_next(self) -> &'static [Self];

    /// True when no outgoing transitions exist.
    fn is_terminal(self) -> bool {
        self.allowed_next().is_empty()
    }
}

impl WorkflowState for OpportunityState {
    fn allowed_next(self) -> &'static [Self] {
        match self {
            OpportunityState::Lead => &[OpportunityState::Qualified, OpportunityState::ClosedLost],
            OpportunityState::Qualified => {
                &[OpportunityState::Proposal, OpportunityState::ClosedLost]
            }
            OpportunityState::Proposal => {
                &[OpportunityState::ClosedWon, OpportunityState::ClosedLost]
            }
            // No backward transitions after closure
            OpportunityState::ClosedWon | OpportunityState::ClosedLost => &[],
        }
    }
}

impl WorkflowState for QuoteState {
    fn allowed_next(self) -> &'static [Self] {
        match self {
            QuoteState::Draft => &[QuoteState::PendingApproval],
            QuoteState::PendingApproval => &[QuoteState::Approved, QuoteState::Rejected],
            QuoteState::Approved | QuoteState::Rejected => &[],
        }
    }
}

impl WorkflowState for HandoverState {
    fn allowed_next(self) -> &'static [Self] {
        match self {
            HandoverState::Pending => &[HandoverState::Accepted, HandoverState::Flagged],
            HandoverState::Accepted | HandoverState::Flagged => &[],
        }
    }
}

/// Membership test against the transition table. Self-loops are not listed
/// in any table, so a no-op transition is rejected like any other.
pub fn is_valid_transition<S: WorkflowState>(current: S, target: S) -> bool {
    current.allowed_next().contains(&target)
}

/// Validate a proposed transition, producing the user-facing rejection.
///
/// The terminal-state check is redundant with the table lookup but guards
/// against a misconfigured table ever reopening a closed record.
pub fn validate_transition<S: WorkflowState>(current: S, target: S) -> Result<(), CrmError> {
    if current.is_terminal() || !is_valid_transition(current, target) {
        return Err(CrmError::InvalidTransition {
            from: current.to_string(),
            to: target.to_string(),
            valid: describe_next_states(current),
        });
    }
    Ok(())
}

/// Human-readable list of valid next states, or "none" for terminals.
pub fn describe_next_states<S: WorkflowState>(current: S) -> String {
    let next = current.allowed_next();
    if next.is_empty() {
        "none".to_string()
    } else {
        next.iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }
}
