//! In-memory [`RemoteLedger`] used as either the source or the target side.
//!
//! Failures are injected per call kind and stay in place until cleared.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use osync_ledger::{LedgerError, LedgerResult, RemoteLedger};
use osync_schemas::{
    CatalogEntry, DocumentRef, EntityKind, EntityRef, OrderQuery, PurchaseDocument, SourceOrder,
    SourcePosition,
};

#[derive(Debug, Default)]
struct Inner {
    orders: BTreeMap<String, SourceOrder>,
    positions: HashMap<String, Vec<SourcePosition>>,
    catalog: Vec<CatalogEntry>,
    created: Vec<PurchaseDocument>,
    create_attempts: u32,
    find_calls: u32,
    find_errors: HashMap<String, LedgerError>,
    position_errors: HashMap<String, LedgerError>,
    get_order_errors: HashMap<String, LedgerError>,
    catalog_error: Option<LedgerError>,
    create_error: Option<LedgerError>,
    /// Returned after the document has been stored.
    create_error_after_commit: Option<LedgerError>,
    create_delay: Option<Duration>,
    lookup_calls: u32,
    lookup_error: Option<LedgerError>,
}

#[derive(Debug)]
pub struct FakeLedger {
    name: String,
    base_url: String,
    inner: Mutex<Inner>,
}

impl FakeLedger {
    pub fn new(name: &str, base_url: &str) -> Self {
        Self {
            name: name.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            inner: Mutex::new(Inner::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Reference of the `index`-th stored document (`po-1`, `po-2`, ...).
    fn document_ref(&self, index: usize) -> DocumentRef {
        let id = format!("po-{}", index + 1);
        let href = EntityRef::for_id(&self.base_url, EntityKind::PurchaseOrder, &id).href;
        DocumentRef { id, href }
    }

    // -- source side ---------------------------------------------------------

    pub fn put_order(&self, order: SourceOrder, positions: Vec<SourcePosition>) {
        let mut g = self.lock();
        g.positions.insert(order.id.clone(), positions);
        g.orders.insert(order.id.clone(), order);
    }

    /// Edit a stored order in place (amount or state change at the source).
    pub fn update_order(&self, id: &str, f: impl FnOnce(&mut SourceOrder)) {
        if let Some(o) = self.lock().orders.get_mut(id) {
            f(o);
        }
    }

    pub fn remove_order(&self, id: &str) {
        let mut g = self.lock();
        g.orders.remove(id);
        g.positions.remove(id);
    }

    /// Fail `find_orders` for one counterparty href.
    pub fn fail_find_for(&self, counterparty_href: &str, err: LedgerError) {
        self.lock().find_errors.insert(counterparty_href.to_string(), err);
    }

    pub fn fail_positions_for(&self, order_id: &str, err: LedgerError) {
        self.lock().position_errors.insert(order_id.to_string(), err);
    }

    pub fn clear_positions_failure(&self, order_id: &str) {
        self.lock().position_errors.remove(order_id);
    }

    pub fn fail_get_order_for(&self, order_id: &str, err: LedgerError) {
        self.lock().get_order_errors.insert(order_id.to_string(), err);
    }

    pub fn find_calls(&self) -> u32 {
        self.lock().find_calls
    }

    // -- target side ---------------------------------------------------------

    pub fn set_catalog(&self, entries: Vec<CatalogEntry>) {
        self.lock().catalog = entries;
    }

    pub fn add_catalog_entry(&self, entry: CatalogEntry) {
        self.lock().catalog.push(entry);
    }

    pub fn fail_catalog(&self, err: Option<LedgerError>) {
        self.lock().catalog_error = err;
    }

    pub fn fail_creates(&self, err: Option<LedgerError>) {
        self.lock().create_error = err;
    }

    /// Store the document, then answer with `err` (garbled or lost response).
    pub fn fail_creates_after_commit(&self, err: Option<LedgerError>) {
        self.lock().create_error_after_commit = err;
    }

    /// Hold each create response for `delay` after the document is stored.
    pub fn delay_creates(&self, delay: Option<Duration>) {
        self.lock().create_delay = delay;
    }

    pub fn fail_lookups(&self, err: Option<LedgerError>) {
        self.lock().lookup_error = err;
    }

    pub fn lookup_calls(&self) -> u32 {
        self.lock().lookup_calls
    }

    /// Documents stored by the ledger, in order.
    pub fn created(&self) -> Vec<PurchaseDocument> {
        self.lock().created.clone()
    }

    pub fn create_count(&self) -> usize {
        self.lock().created.len()
    }

    /// Create calls including failed ones.
    pub fn create_attempts(&self) -> u32 {
        self.lock().create_attempts
    }
}

#[async_trait::async_trait]
impl RemoteLedger for FakeLedger {
    fn ledger_name(&self) -> &str {
        &self.name
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn find_orders(&self, query: &OrderQuery) -> LedgerResult<Vec<SourceOrder>> {
        let mut g = self.lock();
        g.find_calls += 1;
        if let Some(err) = g.find_errors.get(&query.counterparty.href) {
            return Err(err.clone());
        }
        Ok(g.orders
            .values()
            .filter(|o| o.agent_href.as_deref() == Some(query.counterparty.href.as_str()))
            .filter(|o| query.states.is_empty() || query.states.contains(&o.state_href))
            .filter(|o| o.moment >= query.moment_after)
            .cloned()
            .collect())
    }

    async fn get_order(&self, order_id: &str) -> LedgerResult<SourceOrder> {
        let g = self.lock();
        if let Some(err) = g.get_order_errors.get(order_id) {
            return Err(err.clone());
        }
        g.orders
            .get(order_id)
            .cloned()
            .ok_or_else(|| LedgerError::NotFound(format!("customerorder/{order_id}")))
    }

    async fn get_positions(&self, order_id: &str) -> LedgerResult<Vec<SourcePosition>> {
        let g = self.lock();
        if let Some(err) = g.position_errors.get(order_id) {
            return Err(err.clone());
        }
        g.positions
            .get(order_id)
            .cloned()
            .ok_or_else(|| LedgerError::NotFound(format!("customerorder/{order_id}/positions")))
    }

    async fn get_catalog_snapshot(&self) -> LedgerResult<Vec<CatalogEntry>> {
        let g = self.lock();
        if let Some(err) = &g.catalog_error {
            return Err(err.clone());
        }
        Ok(g.catalog.clone())
    }

    async fn find_purchase_document(&self, external_code: &str) -> LedgerResult<Option<DocumentRef>> {
        let mut g = self.lock();
        g.lookup_calls += 1;
        if let Some(err) = &g.lookup_error {
            return Err(err.clone());
        }
        Ok(g.created
            .iter()
            .position(|d| d.external_code == external_code)
            .map(|i| self.document_ref(i)))
    }

    async fn create_purchase_document(&self, doc: &PurchaseDocument) -> LedgerResult<DocumentRef> {
        let (result, delay) = {
            let mut g = self.lock();
            g.create_attempts += 1;
            if let Some(err) = &g.create_error {
                return Err(err.clone());
            }
            g.created.push(doc.clone());
            let created = self.document_ref(g.created.len() - 1);
            let result = match &g.create_error_after_commit {
                Some(err) => Err(err.clone()),
                None => Ok(created),
            };
            (result, g.create_delay)
        };
        if let Some(d) = delay {
            tokio::time::sleep(d).await;
        }
        result
    }
}
