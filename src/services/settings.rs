//! Settings management: the four reference-data lists and the approval
//! threshold bands. Every mutation here is executive-only; reads are open
//! to any authenticated caller so pickers can populate.

use crate::db::settings::{ApprovalThresholdUpdate, ReferenceItemUpdate};
use crate::db::{CrmDb, DbApprovalThreshold, DbReferenceItem};
use crate::error::CrmError;
use crate::permissions::{ActionKind, RequestContext};
use crate::types::Role;
use crate::util::{new_id, now_rfc3339, slugify};

pub use crate::db::settings::ReferenceKind;

/// Input for a new reference item. With no code given, one is derived by
/// slugifying the name.
#[derive(Debug, Clone)]
pub struct NewReferenceItem {
    pub name: String,
    pub code: Option<String>,
    pub description: Option<String>,
    pub display_order: Option<i64>,
}

pub fn create_reference_item(
    db: &CrmDb,
    ctx: &RequestContext,
    kind: ReferenceKind,
    input: NewReferenceItem,
) -> Result<DbReferenceItem, CrmError> {
    ctx.authorize(ActionKind::ManageSettings)?;

    let code = match input.code {
        Some(code) => code,
        None => slugify(&input.name),
    };
    let now = now_rfc3339();
    let item = DbReferenceItem {
        id: new_id(),
        name: input.name,
        code,
        description: input.description,
        display_order: input.display_order.unwrap_or(0),
        is_active: true,
        created_at: now.clone(),
        updated_at: now,
    };
    db.insert_reference_item(kind, &item)?;
    Ok(item)
}

/// List reference items in display order. Only executives see inactive rows.
pub fn get_reference_items(
    db: &CrmDb,
    ctx: &RequestContext,
    kind: ReferenceKind,
    include_inactive: bool,
) -> Result<Vec<DbReferenceItem>, CrmError> {
    let principal = ctx.principal()?;
    let include_inactive = include_inactive && principal.role == Role::Executive;
    Ok(db.get_reference_items(kind, include_inactive)?)
}

pub fn get_reference_item(
    db: &CrmDb,
    ctx: &RequestContext,
    kind: ReferenceKind,
    id: &str,
) -> Result<DbReferenceItem, CrmError> {
    ctx.principal()?;
    db.get_reference_item(kind, id)?.ok_or(CrmError::NotFound {
        entity: "Reference item",
    })
}

pub fn update_reference_item(
    db: &CrmDb,
    ctx: &RequestContext,
    kind: ReferenceKind,
    id: &str,
    update: ReferenceItemUpdate,
) -> Result<DbReferenceItem, CrmError> {
    ctx.authorize(ActionKind::ManageSettings)?;
    db.update_reference_item(kind, id, &update, &now_rfc3339())?
        .ok_or(CrmError::NotFound {
            entity: "Reference item",
        })
}

/// Soft delete: the row stays for history but drops out of active listings.
pub fn deactivate_reference_item(
    db: &CrmDb,
    ctx: &RequestContext,
    kind: ReferenceKind,
    id: &str,
) -> Result<(), CrmError> {
    ctx.authorize(ActionKind::ManageSettings)?;
    if !db.deactivate_reference_item(kind, id, &now_rfc3339())? {
        return Err(CrmError::NotFound {
            entity: "Reference item",
        });
    }
    Ok(())
}

/// Input for a new approval threshold band.
#[derive(Debug, Clone)]
pub struct NewApprovalThreshold {
    pub approval_role: Role,
    pub min_deal_value: f64,
    pub max_deal_value: Option<f64>,
}

pub fn create_approval_threshold(
    db: &CrmDb,
    ctx: &RequestContext,
    input: NewApprovalThreshold,
) -> Result<DbApprovalThreshold, CrmError> {
    ctx.authorize(ActionKind::ManageSettings)?;
    let now = now_rfc3339();
    let threshold = DbApprovalThreshold {
        id: new_id(),
        approval_role: input.approval_role,
        min_deal_value: input.min_deal_value,
        max_deal_value: input.max_deal_value,
        is_active: true,
        created_at: now.clone(),
        updated_at: now,
    };
    db.insert_approval_threshold(&threshold)?;
    Ok(threshold)
}

pub fn get_approval_thresholds(
    db: &CrmDb,
    ctx: &RequestContext,
    include_inactive: bool,
) -> Result<Vec<DbApprovalThreshold>, CrmError> {
    let principal = ctx.principal()?;
    let include_inactive = include_inactive && principal.role == Role::Executive;
    Ok(db.get_approval_thresholds(include_inactive)?)
}

pub fn get_approval_threshold(
    db: &CrmDb,
    ctx: &RequestContext,
    id: &str,
) -> Result<DbApprovalThreshold, CrmError> {
    ctx.principal()?;
    db.get_approval_threshold(id)?.ok_or(CrmError::NotFound {
        entity: "Approval threshold",
    })
}

pub fn update_approval_threshold(
    db: &CrmDb,
    ctx: &RequestContext,
    id: &str,
    update: ApprovalThresholdUpdate,
) -> Result<DbApprovalThreshold, CrmError> {
    ctx.authorize(ActionKind::ManageSettings)?;
    db.update_approval_threshold(id, &update, &now_rfc3339())?
        .ok_or(CrmError::NotFound {
            entity: "Approval threshold",
        })
}

pub fn deactivate_approval_threshold(
    db: &CrmDb,
    ctx: &RequestContext,
    id: &str,
) -> Result<(), CrmError> {
    ctx.authorize(ActionKind::ManageSettings)?;
    if !db.deactivate_approval_threshold(id, &now_rfc3339())? {
        return Err(CrmError::NotFound {
            entity: "Approval threshold",
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_utils::test_db;
    use crate::types::Principal;

    fn ctx(role: Role) -> RequestContext {
        RequestContext::new(Principal::new("user-1", role))
    }

    #[test]
    fn test_code_slugified_from_name() {
        let db = test_db();
        let item = create_reference_item(
            &db,
            &ctx(Role::Executive),
            ReferenceKind::RevenueModel,
            NewReferenceItem {
                name: "Annual Recurring Revenue".to_string(),
                code: None,
                description: None,
                display_order: None,
            },
        )
        .expect("create");
        assert_eq!(item.code, "annual-recurring-revenue");
        assert!(item.is_active);
    }

    #[test]
    fn test_explicit_code_wins() {
        let db = test_db();
        let item = create_reference_item(
            &db,
            &ctx(Role::Executive),
            ReferenceKind::IcpCategory,
            NewReferenceItem {
                name: "Mid-market".to_string(),
                code: Some("midmarket".to_string()),
                description: None,
                display_order: Some(2),
            },
        )
        .expect("create");
        assert_eq!(item.code, "midmarket");
        assert_eq!(item.display_order, 2);
    }

    #[test]
    fn test_sales_cannot_manage_but_can_read_active() {
        let db = test_db();
        let exec = ctx(Role::Executive);
        let item = create_reference_item(
            &db,
            &exec,
            ReferenceKind::RevenueStream,
            NewReferenceItem {
                name: "Services".to_string(),
                code: None,
                description: None,
                display_order: None,
            },
        )
        .expect("create");
        deactivate_reference_item(&db, &exec, ReferenceKind::RevenueStream, &item.id)
            .expect("deactivate");

        let sales = ctx(Role::Sales);
        let err = create_reference_item(
            &db,
            &sales,
            ReferenceKind::RevenueStream,
            NewReferenceItem {
                name: "Licensing".to_string(),
                code: None,
                description: None,
                display_order: None,
            },
        )
        .expect_err("deny");
        assert!(matches!(err, CrmError::InsufficientPermissions { .. }));

        // Even asking for inactive rows, sales sees only active ones
        let visible = get_reference_items(&db, &sales, ReferenceKind::RevenueStream, true)
            .expect("list");
        assert!(visible.is_empty());
        let full = get_reference_items(&db, &exec, ReferenceKind::RevenueStream, true)
            .expect("list");
        assert_eq!(full.len(), 1);
    }

    #[test]
    fn test_threshold_lifecycle() {
        let db = test_db();
        let exec = ctx(Role::Executive);
        let threshold = create_approval_threshold(
            &db,
            &exec,
            NewApprovalThreshold {
                approval_role: Role::Finance,
                min_deal_value: 0.0,
                max_deal_value: Some(50_000.0),
            },
        )
        .expect("create");

        let updated = update_approval_threshold(
            &db,
            &exec,
            &threshold.id,
            ApprovalThresholdUpdate {
                max_deal_value: Some(75_000.0),
                ..Default::default()
            },
        )
        .expect("update");
        assert_eq!(updated.max_deal_value, Some(75_000.0));
        assert_eq!(updated.approval_role, Role::Finance);

        deactivate_approval_threshold(&db, &exec, &threshold.id).expect("deactivate");
        assert!(get_approval_thresholds(&db, &exec, false)
            .expect("list")
            .is_empty());
    }

    #[test]
    fn test_unknown_ids_are_not_found() {
        let db = test_db();
        let exec = ctx(Role::Executive);
        assert!(matches!(
            deactivate_reference_item(&db, &exec, ReferenceKind::OpportunityStage, "ghost"),
            Err(CrmError::NotFound { .. })
        ));
        assert!(matches!(
            update_approval_threshold(&db, &exec, "ghost", ApprovalThresholdUpdate::default()),
            Err(CrmError::NotFound { .. })
        ));
    }
}
