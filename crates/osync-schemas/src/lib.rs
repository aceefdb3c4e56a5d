//! osync-schemas
//!
//! Typed documents exchanged with the two remote ledgers, plus the tracked
//! per-order sync state persisted by the store. No IO lives here.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

mod tracking;

pub use tracking::*;

/// Ledger timestamp wire format (`2024-01-15 10:30:00.000`).
pub const LEDGER_MOMENT_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Format a business moment the way the ledger API expects it in filters and payloads.
pub fn format_moment(moment: &NaiveDateTime) -> String {
    moment.format(LEDGER_MOMENT_FORMAT).to_string()
}

/// Parse a ledger moment. Accepts the millisecond form and the plain `%H:%M:%S` form.
pub fn parse_moment(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    NaiveDateTime::parse_from_str(raw, LEDGER_MOMENT_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S"))
        .ok()
}

// ---------------------------------------------------------------------------
// Entity references
// ---------------------------------------------------------------------------

/// Kinds of ledger entities the engine references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    CustomerOrder,
    PurchaseOrder,
    Counterparty,
    Organization,
    Group,
    Store,
    Product,
    Variant,
    Service,
    Bundle,
    State,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::CustomerOrder => "customerorder",
            EntityKind::PurchaseOrder => "purchaseorder",
            EntityKind::Counterparty => "counterparty",
            EntityKind::Organization => "organization",
            EntityKind::Group => "group",
            EntityKind::Store => "store",
            EntityKind::Product => "product",
            EntityKind::Variant => "variant",
            EntityKind::Service => "service",
            EntityKind::Bundle => "bundle",
            EntityKind::State => "state",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "customerorder" => Some(EntityKind::CustomerOrder),
            "purchaseorder" => Some(EntityKind::PurchaseOrder),
            "counterparty" => Some(EntityKind::Counterparty),
            "organization" => Some(EntityKind::Organization),
            "group" => Some(EntityKind::Group),
            "store" => Some(EntityKind::Store),
            "product" => Some(EntityKind::Product),
            "variant" => Some(EntityKind::Variant),
            "service" => Some(EntityKind::Service),
            "bundle" => Some(EntityKind::Bundle),
            "state" => Some(EntityKind::State),
            _ => None,
        }
    }
}

/// A typed pointer to a ledger entity (`meta.href` + `meta.type` on the wire).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    pub kind: EntityKind,
    pub href: String,
}

impl EntityRef {
    pub fn new(kind: EntityKind, href: impl Into<String>) -> Self {
        Self {
            kind,
            href: href.into(),
        }
    }

    /// Build the canonical href `{base}/entity/{kind}/{id}`.
    pub fn for_id(base_url: &str, kind: EntityKind, id: &str) -> Self {
        Self::new(
            kind,
            format!(
                "{}/entity/{}/{}",
                base_url.trim_end_matches('/'),
                kind.as_str(),
                id.trim()
            ),
        )
    }

    /// Trailing path segment of the href (the entity id), if any.
    pub fn id(&self) -> Option<&str> {
        self.href
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .filter(|s| !s.is_empty())
    }
}

// ---------------------------------------------------------------------------
// Source ledger documents
// ---------------------------------------------------------------------------

/// A sales order as observed in the source ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceOrder {
    pub id: String,
    pub name: Option<String>,
    pub moment: NaiveDateTime,
    /// Order total in minor currency units.
    pub amount: i64,
    pub state_href: String,
    pub agent_href: Option<String>,
}

/// One line item of a source order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourcePosition {
    pub quantity: f64,
    /// Unit price in minor currency units.
    pub price: i64,
    pub assortment: EntityRef,
    /// External article code used to match the target catalog.
    pub article: Option<String>,
}

// ---------------------------------------------------------------------------
// Target ledger documents
// ---------------------------------------------------------------------------

/// A catalog item of the target ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub item: EntityRef,
    pub article: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchasePosition {
    pub quantity: f64,
    pub price: i64,
    pub assortment: EntityRef,
}

/// Purchase document submitted to the target ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseDocument {
    pub moment: NaiveDateTime,
    /// Deterministic per source order; lets an operator find orphaned documents.
    pub external_code: String,
    pub description: String,
    pub organization: EntityRef,
    pub agent: EntityRef,
    pub store: EntityRef,
    pub group: EntityRef,
    pub positions: Vec<PurchasePosition>,
}

impl PurchaseDocument {
    /// Sum of `quantity * price` over all positions, in minor units.
    pub fn total(&self) -> i64 {
        self.positions
            .iter()
            .map(|p| line_total(p.quantity, p.price))
            .sum()
    }
}

/// Reference returned by the target ledger after a create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRef {
    pub id: String,
    pub href: String,
}

/// Filter for source order discovery.
///
/// `states` is an OR-set; an empty set matches no state restriction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderQuery {
    pub counterparty: EntityRef,
    pub states: Vec<String>,
    pub moment_after: NaiveDateTime,
}

/// `quantity * price` rounded to whole minor units.
pub fn line_total(quantity: f64, price: i64) -> i64 {
    (quantity * price as f64).round() as i64
}
