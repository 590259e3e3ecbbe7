//! Lead-to-order pipeline over a local SQLite database.
//!
//! Accounts hold opportunities; opportunities in `proposal` or `closed_won`
//! carry quotes; approved quotes on won deals hand over to delivery. Each
//! entity moves through a fixed transition table, every mutation passes a
//! role gate, and state writes are compare-and-swap so concurrent callers
//! cannot double-resolve a record.
//!
//! The crate is the complete backend: embedders construct a [`db::CrmDb`],
//! resolve a [`types::Principal`] per request, wrap it in a
//! [`permissions::RequestContext`], and call into [`services`].

pub mod db;
pub mod error;
pub mod migrations;
pub mod permissions;
pub mod services;
pub mod types;
pub mod util;
pub mod workflows;

pub use db::CrmDb;
pub use error::CrmError;
pub use permissions::{ActionKind, RequestContext};
pub use types::{HandoverState, OpportunityState, Principal, QuoteState, Role};
