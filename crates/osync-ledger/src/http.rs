//! reqwest-backed [`RemoteLedger`] speaking the ledger JSON REST API.
//!
//! The bearer token is resolved by the caller and passed in; do not log it.

use std::time::Duration;

use anyhow::Context;
use osync_config::LedgerSettings;
use osync_schemas::{
    format_moment, CatalogEntry, DocumentRef, OrderQuery, PurchaseDocument, SourceOrder,
    SourcePosition,
};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::wire::{
    ListResponse, WireCatalogRow, WireCreated, WireErrorBody, WireOrder, WirePosition,
    WirePurchaseDocument,
};
use crate::{LedgerError, LedgerResult, RemoteLedger};

/// The ledger ignores `expand` on pages larger than this.
pub const EXPAND_PAGE_LIMIT: u32 = 100;

/// Build the list filter for order discovery.
///
/// Repeated `state=` terms are OR-ed by the ledger; the moment bound is
/// inclusive.
pub fn build_order_filter(query: &OrderQuery) -> String {
    let mut parts = vec![format!("agent={}", query.counterparty.href)];
    for state in &query.states {
        parts.push(format!("state={state}"));
    }
    parts.push(format!("moment>={}", format_moment(&query.moment_after)));
    parts.join(";")
}

#[derive(Clone)]
pub struct HttpLedger {
    name: String,
    base_url: String,
    token: String,
    page_limit: u32,
    http: reqwest::Client,
}

impl std::fmt::Debug for HttpLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpLedger")
            .field("name", &self.name)
            .field("base_url", &self.base_url)
            .field("token", &"<REDACTED>")
            .field("page_limit", &self.page_limit)
            .finish()
    }
}

impl HttpLedger {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            page_limit: 1000,
            http: reqwest::Client::new(),
        }
    }

    /// Client with the configured timeout and page size.
    pub fn from_settings(
        name: impl Into<String>,
        settings: &LedgerSettings,
        token: impl Into<String>,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .context("ledger http client build failed")?;
        Ok(Self {
            name: name.into(),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            token: token.into(),
            page_limit: settings.page_limit,
            http,
        })
    }

    pub fn with_page_limit(mut self, page_limit: u32) -> Self {
        self.page_limit = page_limit.max(1);
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> LedgerResult<T> {
        let url = self.url(path);
        debug!(ledger = %self.name, %url, "ledger GET");
        let resp = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .query(query)
            .send()
            .await
            .map_err(|e| LedgerError::Transport(e.to_string()))?;
        decode_response(resp, &url).await
    }

    /// Follow limit/offset pages until a short page comes back.
    async fn get_all_rows<T: DeserializeOwned>(
        &self,
        path: &str,
        extra: &[(&str, String)],
        page_limit: u32,
    ) -> LedgerResult<Vec<T>> {
        let limit = page_limit.max(1);
        let mut offset: u64 = 0;
        let mut out = Vec::new();
        loop {
            let mut query: Vec<(&str, String)> = extra.to_vec();
            query.push(("limit", limit.to_string()));
            query.push(("offset", offset.to_string()));

            let page: ListResponse<T> = self.get_json(path, &query).await?;
            let n = page.rows.len();
            out.extend(page.rows);
            if n < limit as usize {
                break;
            }
            offset += n as u64;
        }
        Ok(out)
    }
}

#[async_trait::async_trait]
impl RemoteLedger for HttpLedger {
    fn ledger_name(&self) -> &str {
        &self.name
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn find_orders(&self, query: &OrderQuery) -> LedgerResult<Vec<SourceOrder>> {
        let rows: Vec<WireOrder> = self
            .get_all_rows(
                "entity/customerorder",
                &[("filter", build_order_filter(query))],
                self.page_limit,
            )
            .await?;
        rows.into_iter().map(SourceOrder::try_from).collect()
    }

    async fn get_order(&self, order_id: &str) -> LedgerResult<SourceOrder> {
        let wire: WireOrder = self
            .get_json(&format!("entity/customerorder/{order_id}"), &[])
            .await?;
        SourceOrder::try_from(wire)
    }

    async fn get_positions(&self, order_id: &str) -> LedgerResult<Vec<SourcePosition>> {
        let rows: Vec<WirePosition> = self
            .get_all_rows(
                &format!("entity/customerorder/{order_id}/positions"),
                &[("expand", "assortment".to_string())],
                self.page_limit.min(EXPAND_PAGE_LIMIT),
            )
            .await?;
        Ok(rows.into_iter().map(SourcePosition::from).collect())
    }

    async fn get_catalog_snapshot(&self) -> LedgerResult<Vec<CatalogEntry>> {
        let rows: Vec<WireCatalogRow> = self
            .get_all_rows(
                "entity/assortment",
                &[("filter", "archived=false".to_string())],
                self.page_limit,
            )
            .await?;
        Ok(rows.into_iter().map(CatalogEntry::from).collect())
    }

    async fn find_purchase_document(&self, external_code: &str) -> LedgerResult<Option<DocumentRef>> {
        let page: ListResponse<WireCreated> = self
            .get_json(
                "entity/purchaseorder",
                &[
                    ("filter", format!("externalCode={external_code}")),
                    ("limit", "1".to_string()),
                ],
            )
            .await?;
        Ok(page.rows.into_iter().next().map(DocumentRef::from))
    }

    async fn create_purchase_document(&self, doc: &PurchaseDocument) -> LedgerResult<DocumentRef> {
        let url = self.url("entity/purchaseorder");
        debug!(ledger = %self.name, external_code = %doc.external_code, "ledger create purchase document");
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(&WirePurchaseDocument::from(doc))
            .send()
            .await
            .map_err(|e| LedgerError::Transport(e.to_string()))?;
        let created: WireCreated = decode_response(resp, &url).await?;
        Ok(created.into())
    }
}

async fn decode_response<T: DeserializeOwned>(resp: reqwest::Response, url: &str) -> LedgerResult<T> {
    let status = resp.status();
    let body = resp
        .text()
        .await
        .map_err(|e| LedgerError::Transport(e.to_string()))?;

    if !status.is_success() {
        return Err(classify_status(status, error_message(&body), url));
    }

    serde_json::from_str(&body).map_err(|e| LedgerError::Decode(format!("{url}: {e}")))
}

fn classify_status(status: StatusCode, message: String, url: &str) -> LedgerError {
    let code = status.as_u16();
    if status == StatusCode::NOT_FOUND {
        LedgerError::NotFound(url.to_string())
    } else if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        LedgerError::Unavailable { status: code, message }
    } else {
        LedgerError::Rejected { status: code, message }
    }
}

/// First `errors[].error` text of an error body, else the raw body (truncated).
fn error_message(body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<WireErrorBody>(body) {
        let msgs: Vec<String> = parsed.errors.into_iter().filter_map(|e| e.error).collect();
        if !msgs.is_empty() {
            return msgs.join("; ");
        }
    }
    body.chars().take(200).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use osync_schemas::{parse_moment, EntityKind, EntityRef};

    #[test]
    fn filter_lists_each_state_and_inclusive_moment() {
        let q = OrderQuery {
            counterparty: EntityRef::new(EntityKind::Counterparty, "https://src/entity/counterparty/c1"),
            states: vec!["https://src/s/a".into(), "https://src/s/b".into()],
            moment_after: parse_moment("2024-01-01 00:00:00").unwrap(),
        };
        assert_eq!(
            build_order_filter(&q),
            "agent=https://src/entity/counterparty/c1;state=https://src/s/a;state=https://src/s/b;moment>=2024-01-01 00:00:00.000"
        );
    }

    #[test]
    fn error_body_message_extracted() {
        let body = r#"{"errors":[{"error":"bad store"},{"error":"bad group"}]}"#;
        assert_eq!(error_message(body), "bad store; bad group");
        assert_eq!(error_message("gateway down"), "gateway down");
    }

    #[test]
    fn status_classification() {
        assert!(classify_status(StatusCode::BAD_GATEWAY, String::new(), "u").is_transient());
        assert!(classify_status(StatusCode::TOO_MANY_REQUESTS, String::new(), "u").is_transient());
        assert!(matches!(
            classify_status(StatusCode::NOT_FOUND, String::new(), "u"),
            LedgerError::NotFound(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::PRECONDITION_FAILED, String::new(), "u"),
            LedgerError::Rejected { status: 412, .. }
        ));
    }
}
