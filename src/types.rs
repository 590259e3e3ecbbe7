//! Core domain vocabulary: roles, workflow states, and the acting principal.
//!
//! Every enum stores as lowercase snake_case TEXT in SQLite; `as_str` /
//! `parse` are the single source of truth for that mapping.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The four fixed user roles. Single-valued per user; drives the
/// permission matrix in `permissions.rs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Executive,
    Sales,
    Finance,
    Operations,
}

impl Role {
    /// String label for SQL storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Executive => "executive",
            Role::Sales => "sales",
            Role::Finance => "finance",
            Role::Operations => "operations",
        }
    }

    /// Parse from SQL string.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "executive" => Some(Role::Executive),
            "sales" => Some(Role::Sales),
            "finance" => Some(Role::Finance),
            "operations" => Some(Role::Operations),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opportunity pipeline states. `ClosedWon` and `ClosedLost` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpportunityState {
    Lead,
    Qualified,
    Proposal,
    ClosedWon,
    ClosedLost,
}

impl OpportunityState {
    pub fn as_str(&self) -> &'static str {
        match self {
            OpportunityState::Lead => "lead",
            OpportunityState::Qualified => "qualified",
            OpportunityState::Proposal => "proposal",
            OpportunityState::ClosedWon => "closed_won",
            OpportunityState::ClosedLost => "closed_lost",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "lead" => Some(OpportunityState::Lead),
            "qualified" => Some(OpportunityState::Qualified),
            "proposal" => Some(OpportunityState::Proposal),
            "closed_won" => Some(OpportunityState::ClosedWon),
            "closed_lost" => Some(OpportunityState::ClosedLost),
            _ => None,
        }
    }
}

impl fmt::Display for OpportunityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Quote approval states. `Approved` and `Rejected` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteState {
    Draft,
    PendingApproval,
    Approved,
    Rejected,
}

impl QuoteState {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuoteState::Draft => "draft",
            QuoteState::PendingApproval => "pending_approval",
            QuoteState::Approved => "approved",
            QuoteState::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(QuoteState::Draft),
            "pending_approval" => Some(QuoteState::PendingApproval),
            "approved" => Some(QuoteState::Approved),
            "rejected" => Some(QuoteState::Rejected),
            _ => None,
        }
    }
}

impl fmt::Display for QuoteState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handover states. `Accepted` and `Flagged` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandoverState {
    Pending,
    Accepted,
    Flagged,
}

impl HandoverState {
    pub fn as_str(&self) -> &'static str {
        match self {
            HandoverState::Pending => "pending",
            HandoverState::Accepted => "accepted",
            HandoverState::Flagged => "flagged",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(HandoverState::Pending),
            "accepted" => Some(HandoverState::Accepted),
            "flagged" => Some(HandoverState::Flagged),
            _ => None,
        }
    }
}

impl fmt::Display for HandoverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status recorded on an approval audit row. Mirrors the quote outcome;
/// `Pending` exists for completeness but the normal flow only writes
/// `Approved`/`Rejected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalStatus::Pending => "pending",
            ApprovalStatus::Approved => "approved",
            ApprovalStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ApprovalStatus::Pending),
            "approved" => Some(ApprovalStatus::Approved),
            "rejected" => Some(ApprovalStatus::Rejected),
            _ => None,
        }
    }
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The resolved identity of the caller for one operation.
///
/// Constructed by the embedding layer from its identity provider and passed
/// explicitly into every service call — there is no ambient session state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub user_id: String,
    pub role: Role,
}

impl Principal {
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            role,
        }
    }
}
