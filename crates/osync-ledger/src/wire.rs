//! JSON wire shapes of the ledger REST API and their conversion to typed documents.
//!
//! Amounts arrive as floats in minor units; they are rounded to `i64` here and
//! nowhere else.

use osync_schemas::{
    format_moment, parse_moment, CatalogEntry, DocumentRef, EntityKind, EntityRef,
    PurchaseDocument, SourceOrder, SourcePosition,
};
use serde::{Deserialize, Serialize};

use crate::LedgerError;

#[derive(Debug, Deserialize)]
pub(crate) struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    pub rows: Vec<T>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct WireMeta {
    pub href: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct WireRef {
    pub meta: WireMeta,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireOrder {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub moment: String,
    #[serde(default)]
    pub sum: f64,
    #[serde(default)]
    pub state: Option<WireRef>,
    #[serde(default)]
    pub agent: Option<WireRef>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireAssortment {
    pub meta: WireMeta,
    #[serde(default)]
    pub article: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WirePosition {
    pub quantity: f64,
    #[serde(default)]
    pub price: f64,
    pub assortment: WireAssortment,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireCatalogRow {
    pub meta: WireMeta,
    #[serde(default)]
    pub article: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireCreated {
    pub id: String,
    pub meta: WireMeta,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireErrorBody {
    #[serde(default)]
    pub errors: Vec<WireErrorItem>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireErrorItem {
    #[serde(default)]
    pub error: Option<String>,
}

// ---------------------------------------------------------------------------
// Outbound
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub(crate) struct WireMetaOut<'a> {
    pub href: &'a str,
    #[serde(rename = "type")]
    pub kind: &'static str,
    #[serde(rename = "mediaType")]
    pub media_type: &'static str,
}

#[derive(Debug, Serialize)]
pub(crate) struct WireRefOut<'a> {
    pub meta: WireMetaOut<'a>,
}

impl<'a> From<&'a EntityRef> for WireRefOut<'a> {
    fn from(r: &'a EntityRef) -> Self {
        Self {
            meta: WireMetaOut {
                href: &r.href,
                kind: r.kind.as_str(),
                media_type: "application/json",
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct WirePurchasePosition<'a> {
    pub quantity: f64,
    pub price: i64,
    pub assortment: WireRefOut<'a>,
}

#[derive(Debug, Serialize)]
pub(crate) struct WirePurchaseDocument<'a> {
    pub moment: String,
    #[serde(rename = "externalCode")]
    pub external_code: &'a str,
    pub description: &'a str,
    pub organization: WireRefOut<'a>,
    pub agent: WireRefOut<'a>,
    pub store: WireRefOut<'a>,
    pub group: WireRefOut<'a>,
    pub positions: Vec<WirePurchasePosition<'a>>,
}

impl<'a> From<&'a PurchaseDocument> for WirePurchaseDocument<'a> {
    fn from(doc: &'a PurchaseDocument) -> Self {
        Self {
            moment: format_moment(&doc.moment),
            external_code: &doc.external_code,
            description: &doc.description,
            organization: (&doc.organization).into(),
            agent: (&doc.agent).into(),
            store: (&doc.store).into(),
            group: (&doc.group).into(),
            positions: doc
                .positions
                .iter()
                .map(|p| WirePurchasePosition {
                    quantity: p.quantity,
                    price: p.price,
                    assortment: (&p.assortment).into(),
                })
                .collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Conversion
// ---------------------------------------------------------------------------

/// Round a wire float to whole minor units.
pub(crate) fn to_minor_units(v: f64) -> i64 {
    if v.is_finite() {
        v.round() as i64
    } else {
        0
    }
}

fn entity_ref(meta: WireMeta, fallback: EntityKind) -> EntityRef {
    let kind = meta
        .kind
        .as_deref()
        .and_then(EntityKind::parse)
        .unwrap_or(fallback);
    EntityRef::new(kind, meta.href)
}

impl TryFrom<WireOrder> for SourceOrder {
    type Error = LedgerError;

    fn try_from(w: WireOrder) -> Result<Self, LedgerError> {
        let moment = parse_moment(&w.moment).ok_or_else(|| {
            LedgerError::Decode(format!("order {} has unparseable moment '{}'", w.id, w.moment))
        })?;
        let state_href = w
            .state
            .map(|s| s.meta.href)
            .ok_or_else(|| LedgerError::Decode(format!("order {} has no state", w.id)))?;
        Ok(SourceOrder {
            id: w.id,
            name: w.name,
            moment,
            amount: to_minor_units(w.sum),
            state_href,
            agent_href: w.agent.map(|a| a.meta.href),
        })
    }
}

impl From<WirePosition> for SourcePosition {
    fn from(w: WirePosition) -> Self {
        SourcePosition {
            quantity: w.quantity,
            price: to_minor_units(w.price),
            article: w.assortment.article,
            assortment: entity_ref(w.assortment.meta, EntityKind::Product),
        }
    }
}

impl From<WireCatalogRow> for CatalogEntry {
    fn from(w: WireCatalogRow) -> Self {
        CatalogEntry {
            item: entity_ref(w.meta, EntityKind::Product),
            article: w.article,
            name: w.name,
        }
    }
}

impl From<WireCreated> for DocumentRef {
    fn from(w: WireCreated) -> Self {
        DocumentRef {
            id: w.id,
            href: w.meta.href,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_without_state_is_a_decode_error() {
        let w: WireOrder = serde_json::from_value(serde_json::json!({
            "id": "o-1",
            "moment": "2024-02-01 09:00:00.000",
            "sum": 1500000.0
        }))
        .unwrap();
        let err = SourceOrder::try_from(w).unwrap_err();
        assert!(matches!(err, LedgerError::Decode(_)));
    }

    #[test]
    fn purchase_document_serializes_meta_objects() {
        let store = EntityRef::new(EntityKind::Store, "https://t/entity/store/s1");
        let org = EntityRef::new(EntityKind::Organization, "https://t/entity/organization/o1");
        let group = EntityRef::new(EntityKind::Group, "https://t/entity/group/g1");
        let doc = PurchaseDocument {
            moment: parse_moment("2024-02-01 09:00:00").unwrap(),
            external_code: "osync-o-1".into(),
            description: "d".into(),
            organization: org.clone(),
            agent: org,
            store,
            group,
            positions: vec![],
        };
        let v = serde_json::to_value(WirePurchaseDocument::from(&doc)).unwrap();
        assert_eq!(v["store"]["meta"]["type"], "store");
        assert_eq!(v["externalCode"], "osync-o-1");
        assert_eq!(v["moment"], "2024-02-01 09:00:00.000");
    }
}
