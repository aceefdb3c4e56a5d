//! osync-ledger
//!
//! Boundary to the remote ledgers. The engine sees two instances of one
//! capability: the source ledger (sales orders) and the target ledger
//! (catalog + purchase documents). Each instance fails independently.
//!
//! This crate owns the trait, the error taxonomy, and the reqwest-backed
//! implementation. It does not touch the database.

mod http;
mod wire;

use osync_schemas::{
    CatalogEntry, DocumentRef, EntityKind, EntityRef, OrderQuery, PurchaseDocument, SourceOrder,
    SourcePosition,
};

pub use http::{build_order_filter, HttpLedger, EXPAND_PAGE_LIMIT};

// ---------------------------------------------------------------------------
// LedgerError
// ---------------------------------------------------------------------------

/// Failure of one remote ledger call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Connect failure, timeout, or the request never completed.
    Transport(String),
    /// 5xx or 429 from the ledger.
    Unavailable { status: u16, message: String },
    /// Any other 4xx: the ledger refused the request as issued.
    Rejected { status: u16, message: String },
    /// 404 for a single-entity lookup.
    NotFound(String),
    /// Response body did not match the expected document shape.
    Decode(String),
}

impl LedgerError {
    /// Transient errors are retried by the next scheduled pass.
    pub fn is_transient(&self) -> bool {
        matches!(self, LedgerError::Transport(_) | LedgerError::Unavailable { .. })
    }
}

impl std::fmt::Display for LedgerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LedgerError::Transport(m) => write!(f, "ledger transport error: {m}"),
            LedgerError::Unavailable { status, message } => {
                write!(f, "ledger unavailable (HTTP {status}): {message}")
            }
            LedgerError::Rejected { status, message } => {
                write!(f, "ledger rejected request (HTTP {status}): {message}")
            }
            LedgerError::NotFound(what) => write!(f, "ledger entity not found: {what}"),
            LedgerError::Decode(m) => write!(f, "ledger response malformed: {m}"),
        }
    }
}

impl std::error::Error for LedgerError {}

pub type LedgerResult<T> = std::result::Result<T, LedgerError>;

// ---------------------------------------------------------------------------
// RemoteLedger
// ---------------------------------------------------------------------------

/// One remote ledger instance.
///
/// Implementations must be safe to share across tasks; the engine holds them
/// behind `Arc<dyn RemoteLedger>`.
#[async_trait::async_trait]
pub trait RemoteLedger: Send + Sync {
    /// Short name used in logs (`"source"`, `"target"`).
    fn ledger_name(&self) -> &str;

    /// API root used to build entity hrefs.
    fn base_url(&self) -> &str;

    /// Typed reference to an entity of this ledger by id.
    fn entity_ref(&self, kind: EntityKind, id: &str) -> EntityRef {
        EntityRef::for_id(self.base_url(), kind, id)
    }

    /// Orders matching the query, across all pages.
    async fn find_orders(&self, query: &OrderQuery) -> LedgerResult<Vec<SourceOrder>>;

    /// Current state of one order.
    async fn get_order(&self, order_id: &str) -> LedgerResult<SourceOrder>;

    /// Line items of one order, with article codes expanded.
    async fn get_positions(&self, order_id: &str) -> LedgerResult<Vec<SourcePosition>>;

    /// Every active catalog item.
    async fn get_catalog_snapshot(&self) -> LedgerResult<Vec<CatalogEntry>>;

    /// Purchase document carrying `external_code`, if one exists.
    async fn find_purchase_document(&self, external_code: &str) -> LedgerResult<Option<DocumentRef>>;

    /// Create a purchase document and return its reference.
    async fn create_purchase_document(&self, doc: &PurchaseDocument) -> LedgerResult<DocumentRef>;
}
