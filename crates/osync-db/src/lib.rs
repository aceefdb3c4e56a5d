//! osync-db
//!
//! Persistence for sync configs and tracked orders.
//!
//! [`SyncStore`] is the seam the engine talks to; [`PgSyncStore`] is the
//! Postgres implementation. Every write commits on its own except
//! [`SyncStore::insert_orders`], which commits one batch per call.

use anyhow::{Context, Result};
use osync_schemas::{
    NewSyncConfig, NewSyncOrder, Page, SyncConfig, SyncOrder, SyncOrderFilter, SyncStatus,
};
use sqlx::{postgres::PgPoolOptions, PgPool};

mod pg;

pub use pg::PgSyncStore;

pub const ENV_DB_URL: &str = "OSYNC_DATABASE_URL";

/// Connect to Postgres using OSYNC_DATABASE_URL.
pub async fn connect_from_env() -> Result<PgPool> {
    let url = std::env::var(ENV_DB_URL).with_context(|| format!("missing env var {ENV_DB_URL}"))?;
    connect(&url).await
}

pub async fn connect(url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(url)
        .await
        .context("failed to connect to Postgres")?;
    Ok(pool)
}

/// Run embedded SQLx migrations.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("db migrate failed")?;
    Ok(())
}

/// Simple status query (connectivity + schema presence).
pub async fn status(pool: &PgPool) -> Result<DbStatus> {
    let (one,): (i32,) = sqlx::query_as::<_, (i32,)>("select 1")
        .fetch_one(pool)
        .await
        .context("status connectivity query failed")?;

    let (exists,): (bool,) = sqlx::query_as::<_, (bool,)>(
        r#"
        select exists (
            select 1
            from information_schema.tables
            where table_schema='public' and table_name='sync_orders'
        )
        "#,
    )
    .fetch_one(pool)
    .await
    .context("status table-exists query failed")?;

    Ok(DbStatus {
        ok: one == 1,
        has_sync_tables: exists,
    })
}

#[derive(Debug, Clone)]
pub struct DbStatus {
    pub ok: bool,
    pub has_sync_tables: bool,
}

// ---------------------------------------------------------------------------
// SyncStore
// ---------------------------------------------------------------------------

/// Record store for configs and tracked orders.
#[async_trait::async_trait]
pub trait SyncStore: Send + Sync {
    async fn list_active_configs(&self) -> Result<Vec<SyncConfig>>;

    async fn list_configs(&self) -> Result<Vec<SyncConfig>>;

    async fn get_config(&self, id: i64) -> Result<Option<SyncConfig>>;

    async fn insert_config(&self, cfg: &NewSyncConfig) -> Result<SyncConfig>;

    async fn get_order(&self, id: i64) -> Result<Option<SyncOrder>>;

    async fn find_by_source_id(&self, ms1_order_id: &str) -> Result<Option<SyncOrder>>;

    /// Insert all rows in one transaction. Rows whose `ms1_order_id` is
    /// already tracked are skipped. Returns the number actually inserted.
    async fn insert_orders(&self, rows: &[NewSyncOrder]) -> Result<u64>;

    /// Persist the mutable columns of `order` and bump `modified`.
    /// Refuses a row that violates the status invariant.
    async fn save_order(&self, order: &SyncOrder) -> Result<SyncOrder>;

    /// All rows in `status`, oldest first.
    async fn list_by_status(&self, status: SyncStatus) -> Result<Vec<SyncOrder>>;

    /// Filtered listing, newest first.
    async fn list_orders(&self, filter: &SyncOrderFilter) -> Result<Page<SyncOrder>>;
}

/// Store-side invariant check shared by implementations.
pub fn ensure_order_invariant(order: &SyncOrder) -> Result<()> {
    if let Some(v) = order.invariant_violation() {
        anyhow::bail!(
            "refusing to save sync order id={} ms1_order_id={}: {}",
            order.id,
            order.ms1_order_id,
            v
        );
    }
    Ok(())
}

/// Escape `%`, `_` and `\` for an ILIKE substring pattern.
pub fn like_pattern(term: &str) -> String {
    let mut out = String::with_capacity(term.len() + 2);
    out.push('%');
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('%');
    out
}
