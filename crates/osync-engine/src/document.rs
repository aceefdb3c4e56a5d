use osync_ledger::RemoteLedger;
use osync_schemas::{
    format_moment, EntityKind, PurchaseDocument, PurchasePosition, SyncConfig, SyncOrder,
};

const EXTERNAL_CODE_PREFIX: &str = "osync-";

/// Deterministic `externalCode` for the purchase document of one source order.
///
/// Same source id, same code: an orphaned document from a failed local commit
/// can be found in the target ledger by this value.
pub fn purchase_external_code(ms1_order_id: &str) -> String {
    format!("{EXTERNAL_CODE_PREFIX}{}", ms1_order_id.trim())
}

pub fn purchase_description(order: &SyncOrder) -> String {
    format!(
        "Created by ordersync. Source order ID: {}; Date: {}",
        order.ms1_order_id,
        format_moment(&order.moment)
    )
}

/// Assemble the target document. The agent is the target organization
/// itself; store, organization and group come from the order's config.
pub fn build_purchase_document(
    order: &SyncOrder,
    config: &SyncConfig,
    positions: Vec<PurchasePosition>,
    target: &dyn RemoteLedger,
) -> PurchaseDocument {
    let organization = target.entity_ref(EntityKind::Organization, &config.target_organization_id);
    PurchaseDocument {
        moment: order.moment,
        external_code: purchase_external_code(&order.ms1_order_id),
        description: purchase_description(order),
        agent: organization.clone(),
        organization,
        store: target.entity_ref(EntityKind::Store, &config.target_store_id),
        group: target.entity_ref(EntityKind::Group, &config.target_group_id),
        positions,
    }
}
