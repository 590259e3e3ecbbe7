//! Error types for the action layer.
//!
//! Authorization and validation failures are detected before any write and
//! returned to the caller with no partial mutation. Storage-level failures
//! wrap `DbError`. Nothing here crosses the crate boundary as a panic.

use thiserror::Error;

use crate::db::DbError;

#[derive(Debug, Error)]
pub enum CrmError {
    /// No resolvable principal for the request.
    #[error("Unauthorized")]
    Unauthorized,

    /// Principal resolved but its role is not in the required set.
    #[error("Insufficient permissions: requires one of [{required}]")]
    InsufficientPermissions { required: String },

    /// A create operation's prerequisite entity is not in an allowed state.
    #[error("Cannot create {child}. {parent} must be {required} but is currently '{actual}'")]
    InvalidParentState {
        child: &'static str,
        parent: &'static str,
        required: String,
        actual: String,
    },

    /// Proposed state change not in the transition table, or the current
    /// state is terminal. The message enumerates valid next states and is
    /// used verbatim in user-facing errors.
    #[error("Invalid transition from {from} to {to}. Valid transitions: {valid}")]
    InvalidTransition {
        from: String,
        to: String,
        valid: String,
    },

    /// Quote number uniqueness violation, checked pre-write and enforced
    /// post-write by the UNIQUE constraint.
    #[error("Quote number \"{0}\" already exists")]
    DuplicateQuoteNumber(String),

    /// A user with this email already exists.
    #[error("A user with email \"{0}\" already exists")]
    DuplicateEmail(String),

    /// A referenced entity id does not resolve.
    #[error("{entity} not found")]
    NotFound { entity: &'static str },

    /// A transition carried arguments that do not fit the target state,
    /// e.g. flagging a handover without a reason.
    #[error("Invalid transition arguments: {0}")]
    InvalidTransitionArguments(String),

    #[error(transparent)]
    Db(#[from] DbError),
}

impl CrmError {
    /// Build the permissions error from the role set an action requires.
    pub(crate) fn insufficient(required: &[crate::types::Role]) -> Self {
        CrmError::InsufficientPermissions {
            required: required
                .iter()
                .map(|r| r.as_str())
                .collect::<Vec<_>>()
                .join(", "),
        }
    }

    /// True for failures the caller can fix by changing the request
    /// (as opposed to storage faults).
    pub fn is_validation(&self) -> bool {
        !matches!(self, CrmError::Db(_))
    }
}

impl From<rusqlite::Error> for CrmError {
    fn from(err: rusqlite::Error) -> Self {
        CrmError::Db(DbError::Sqlite(err))
    }
}
