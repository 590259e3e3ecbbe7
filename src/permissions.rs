//! Declarative role permissions and the single authorization gate.
//!
//! One table maps each gated action to the roles allowed to perform it;
//! every service consults it through `RequestContext::authorize` instead of
//! re-deriving role booleans per call site. The context carries the resolved
//! principal for exactly one operation — roles are never cached across
//! requests because an executive can change a user's role out-of-band.

use crate::error::CrmError;
use crate::types::{Principal, Role};

/// The gated actions of the pipeline. Read paths that are open to every
/// role (accounts, opportunities, handovers, approval history) do not
/// appear here; quote reads are handled by projection, not by gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    CreateAccount,
    EditAccount,
    CreateOpportunity,
    EditOpportunity,
    TransitionOpportunity,
    CreateQuote,
    EditQuote,
    SubmitQuoteForApproval,
    ResolveQuoteApproval,
    CreateHandover,
    EditHandover,
    ResolveHandover,
    ManageSettings,
    ManageUsers,
}

/// The permission matrix. Kept in one place so drift between operations
/// is impossible.
pub fn allowed_roles(action: ActionKind) -> &'static [Role] {
    use ActionKind::*;
    use Role::*;
    match action {
        CreateAccount | EditAccount => &[Executive, Sales],
        CreateOpportunity | EditOpportunity | TransitionOpportunity => &[Executive, Sales],
        CreateQuote | EditQuote | SubmitQuoteForApproval => &[Executive, Sales],
        ResolveQuoteApproval => &[Executive, Finance],
        CreateHandover => &[Executive, Sales],
        // Operations may also edit a handover, but only its resolution
        // fields; the service collapses the update set for them.
        EditHandover => &[Executive, Sales, Operations],
        ResolveHandover => &[Operations],
        ManageSettings | ManageUsers => &[Executive],
    }
}

/// Per-operation caller context: the principal resolved by the embedding
/// layer's identity provider, or nothing for an anonymous request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    principal: Option<Principal>,
}

impl RequestContext {
    pub fn new(principal: Principal) -> Self {
        Self {
            principal: Some(principal),
        }
    }

    pub fn anonymous() -> Self {
        Self { principal: None }
    }

    /// The caller's role, if a principal resolved.
    pub fn role(&self) -> Option<Role> {
        self.principal.as_ref().map(|p| p.role)
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.role() == Some(role)
    }

    /// Require a resolved principal, regardless of role.
    pub fn principal(&self) -> Result<&Principal, CrmError> {
        self.principal.as_ref().ok_or(CrmError::Unauthorized)
    }

    /// The single authorization gate: resolve the principal and check its
    /// role against the matrix for `action`.
    pub fn authorize(&self, action: ActionKind) -> Result<&Principal, CrmError> {
        let principal = self.principal()?;
        let required = allowed_roles(action);
        if required.contains(&principal.role) {
            Ok(principal)
        } else {
            Err(CrmError::insufficient(required))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(role: Role) -> RequestContext {
        RequestContext::new(Principal::new("user-1", role))
    }

    #[test]
    fn test_anonymous_is_unauthorized() {
        let err = RequestContext::anonymous()
            .authorize(ActionKind::CreateAccount)
            .expect_err("no principal");
        assert!(matches!(err, CrmError::Unauthorized));
    }

    #[test]
    fn test_sales_cannot_resolve_approval() {
        let err = ctx(Role::Sales)
            .authorize(ActionKind::ResolveQuoteApproval)
            .expect_err("sales must be rejected");
        assert!(matches!(err, CrmError::InsufficientPermissions { .. }));
    }

    #[test]
    fn test_finance_resolves_approval_but_cannot_create() {
        let finance = ctx(Role::Finance);
        assert!(finance.authorize(ActionKind::ResolveQuoteApproval).is_ok());
        assert!(finance.authorize(ActionKind::CreateQuote).is_err());
        assert!(finance.authorize(ActionKind::CreateOpportunity).is_err());
    }

    #[test]
    fn test_operations_only_resolves_handovers() {
        let ops = ctx(Role::Operations);
        assert!(ops.authorize(ActionKind::ResolveHandover).is_ok());
        assert!(ops.authorize(ActionKind::EditHandover).is_ok());
        assert!(ops.authorize(ActionKind::CreateHandover).is_err());
        assert!(ops.authorize(ActionKind::TransitionOpportunity).is_err());
    }

    #[test]
    fn test_executive_everywhere_except_handover_resolution() {
        let exec = ctx(Role::Executive);
        assert!(exec.authorize(ActionKind::CreateAccount).is_ok());
        assert!(exec.authorize(ActionKind::ResolveQuoteApproval).is_ok());
        assert!(exec.authorize(ActionKind::ManageSettings).is_ok());
        assert!(exec.authorize(ActionKind::ManageUsers).is_ok());
        // Accepting or flagging a handover belongs to operations alone.
        assert!(exec.authorize(ActionKind::ResolveHandover).is_err());
    }

    #[test]
    fn test_settings_locked_to_executive() {
        for role in [Role::Sales, Role::Finance, Role::Operations] {
            assert!(ctx(role).authorize(ActionKind::ManageSettings).is_err());
        }
    }
}
