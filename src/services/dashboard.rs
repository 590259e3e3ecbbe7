//! Pipeline dashboard: per-state counts and a recent-activity feed. All of
//! it is read-only and open to any authenticated caller.

use serde::Serialize;

use crate::db::{CrmDb, DbHandover, DbOpportunity, DbQuote};
use crate::error::CrmError;
use crate::permissions::RequestContext;
use crate::types::{HandoverState, OpportunityState, QuoteState};

const RECENT_PER_ENTITY: usize = 5;
const ACTIVITY_FEED_CAP: usize = 10;

/// Opportunity pipeline counts.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OpportunityCounts {
    pub lead: i64,
    pub qualified: i64,
    pub proposal: i64,
    pub closed_won: i64,
    pub closed_lost: i64,
    pub total: i64,
}

/// Quote workflow counts.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteCounts {
    pub draft: i64,
    pub pending_approval: i64,
    pub approved: i64,
    pub rejected: i64,
    pub total: i64,
}

/// Handover counts.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HandoverCounts {
    pub pending: i64,
    pub accepted: i64,
    pub flagged: i64,
    pub total: i64,
}

/// The dashboard summary: counts per entity plus the merged activity feed.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub opportunities: OpportunityCounts,
    pub quotes: QuoteCounts,
    pub handovers: HandoverCounts,
    pub recent_activity: Vec<ActivityItem>,
}

/// One entry in the activity feed.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum ActivityItem {
    Opportunity(DbOpportunity),
    Quote(DbQuote),
    Handover(DbHandover),
}

impl ActivityItem {
    fn created_at(&self) -> &str {
        match self {
            ActivityItem::Opportunity(o) => &o.created_at,
            ActivityItem::Quote(q) => &q.created_at,
            ActivityItem::Handover(h) => &h.created_at,
        }
    }
}

fn opportunity_counts(db: &CrmDb) -> Result<OpportunityCounts, CrmError> {
    let mut counts = OpportunityCounts::default();
    for (state, n) in db.count_opportunities_by_state()? {
        match OpportunityState::parse(&state) {
            Some(OpportunityState::Lead) => counts.lead = n,
            Some(OpportunityState::Qualified) => counts.qualified = n,
            Some(OpportunityState::Proposal) => counts.proposal = n,
            Some(OpportunityState::ClosedWon) => counts.closed_won = n,
            Some(OpportunityState::ClosedLost) => counts.closed_lost = n,
            None => continue,
        }
        counts.total += n;
    }
    Ok(counts)
}

fn quote_counts(db: &CrmDb) -> Result<QuoteCounts, CrmError> {
    let mut counts = QuoteCounts::default();
    for (state, n) in db.count_quotes_by_state()? {
        match QuoteState::parse(&state) {
            Some(QuoteState::Draft) => counts.draft = n,
            Some(QuoteState::PendingApproval) => counts.pending_approval = n,
            Some(QuoteState::Approved) => counts.approved = n,
            Some(QuoteState::Rejected) => counts.rejected = n,
            None => continue,
        }
        counts.total += n;
    }
    Ok(counts)
}

fn handover_counts(db: &CrmDb) -> Result<HandoverCounts, CrmError> {
    let mut counts = HandoverCounts::default();
    for (state, n) in db.count_handovers_by_state()? {
        match HandoverState::parse(&state) {
            Some(HandoverState::Pending) => counts.pending = n,
            Some(HandoverState::Accepted) => counts.accepted = n,
            Some(HandoverState::Flagged) => counts.flagged = n,
            None => continue,
        }
        counts.total += n;
    }
    Ok(counts)
}

/// Merge the newest rows of each entity into one feed, newest first.
/// RFC 3339 timestamps sort lexicographically, so plain string comparison
/// gives chronological order.
fn recent_activity(db: &CrmDb) -> Result<Vec<ActivityItem>, CrmError> {
    let mut feed: Vec<ActivityItem> = Vec::new();
    feed.extend(
        db.get_recent_opportunities(RECENT_PER_ENTITY)?
            .into_iter()
            .map(ActivityItem::Opportunity),
    );
    feed.extend(
        db.get_recent_quotes(RECENT_PER_ENTITY)?
            .into_iter()
            .map(ActivityItem::Quote),
    );
    feed.extend(
        db.get_recent_handovers(RECENT_PER_ENTITY)?
            .into_iter()
            .map(ActivityItem::Handover),
    );
    feed.sort_by(|a, b| b.created_at().cmp(a.created_at()));
    feed.truncate(ACTIVITY_FEED_CAP);
    Ok(feed)
}

/// Build the full dashboard summary.
pub fn get_dashboard_summary(
    db: &CrmDb,
    ctx: &RequestContext,
) -> Result<DashboardSummary, CrmError> {
    ctx.principal()?;
    Ok(DashboardSummary {
        opportunities: opportunity_counts(db)?,
        quotes: quote_counts(db)?,
        handovers: handover_counts(db)?,
        recent_activity: recent_activity(db)?,
    })
}
