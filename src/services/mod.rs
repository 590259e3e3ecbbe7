//! Role-gated action layer: the single entry point for all state-mutating
//! operations.
//!
//! Every function takes the database and the caller's `RequestContext`
//! explicitly. Order of checks is uniform: role gate, then parent-state
//! preconditions, then uniqueness, then the write. Audit fields
//! (`created_by`, `owner_id`, `accepted_by`, `approver_id`) always come from
//! the resolved principal, never from caller-supplied input.

pub mod accounts;
pub mod dashboard;
pub mod handovers;
pub mod opportunities;
pub mod quotes;
pub mod settings;
pub mod users;
