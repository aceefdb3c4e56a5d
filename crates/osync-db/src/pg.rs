use anyhow::{anyhow, Context, Result};
use osync_schemas::{
    ModificationStatus, NewSyncConfig, NewSyncOrder, Page, SyncConfig, SyncOrder,
    SyncOrderFilter, SyncStatus,
};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use tracing::debug;

use crate::{ensure_order_invariant, like_pattern, SyncStore};

const ORDER_COLUMNS: &str = "id, ms1_order_id, ms2_purchase_id, ms1_state_href, order_amount, \
     sync_status, modification_status, info_msg, error_msg, moment, config_id, created, modified";

const CONFIG_COLUMNS: &str = "id, name, source_counterparty_id, target_organization_id, \
     target_group_id, target_store_id, start_sync_datetime, description, is_active, \
     created_at, updated_at";

/// Postgres-backed [`SyncStore`].
#[derive(Debug, Clone)]
pub struct PgSyncStore {
    pool: PgPool,
}

impl PgSyncStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn config_from_row(row: &PgRow) -> Result<SyncConfig> {
    Ok(SyncConfig {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        source_counterparty_id: row.try_get("source_counterparty_id")?,
        target_organization_id: row.try_get("target_organization_id")?,
        target_group_id: row.try_get("target_group_id")?,
        target_store_id: row.try_get("target_store_id")?,
        start_sync_datetime: row.try_get("start_sync_datetime")?,
        description: row.try_get("description")?,
        is_active: row.try_get("is_active")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn order_from_row(row: &PgRow) -> Result<SyncOrder> {
    let status: String = row.try_get("sync_status")?;
    let modification: Option<String> = row.try_get("modification_status")?;
    Ok(SyncOrder {
        id: row.try_get("id")?,
        ms1_order_id: row.try_get("ms1_order_id")?,
        ms2_purchase_id: row.try_get("ms2_purchase_id")?,
        ms1_state_href: row.try_get("ms1_state_href")?,
        order_amount: row.try_get("order_amount")?,
        sync_status: SyncStatus::parse(&status)
            .ok_or_else(|| anyhow!("invalid sync_status in db: {status}"))?,
        modification_status: modification
            .map(|m| {
                ModificationStatus::parse(&m)
                    .ok_or_else(|| anyhow!("invalid modification_status in db: {m}"))
            })
            .transpose()?,
        info_msg: row.try_get("info_msg")?,
        error_msg: row.try_get("error_msg")?,
        moment: row.try_get("moment")?,
        config_id: row.try_get("config_id")?,
        created: row.try_get("created")?,
        modified: row.try_get("modified")?,
    })
}

/// Append the listing predicates as a WHERE clause.
fn push_filter_clause(qb: &mut QueryBuilder<'_, Postgres>, filter: &SyncOrderFilter) {
    qb.push(" where true");
    if let Some(st) = filter.sync_status {
        qb.push(" and sync_status = ").push_bind(st.as_str());
    }
    if let Some(ms) = filter.modification_status {
        qb.push(" and modification_status = ").push_bind(ms.as_str());
    }
    if let Some(cfg) = filter.config_id {
        qb.push(" and config_id = ").push_bind(cfg);
    }
    if let Some(after) = filter.created_after {
        qb.push(" and created >= ").push_bind(after);
    }
    if let Some(before) = filter.created_before {
        qb.push(" and created <= ").push_bind(before);
    }
    if let Some(term) = filter.search_term() {
        let pattern = like_pattern(term);
        qb.push(" and (ms1_order_id ilike ")
            .push_bind(pattern.clone())
            .push(" or coalesce(ms2_purchase_id, '') ilike ")
            .push_bind(pattern.clone())
            .push(" or coalesce(info_msg, '') ilike ")
            .push_bind(pattern.clone())
            .push(" or coalesce(error_msg, '') ilike ")
            .push_bind(pattern)
            .push(")");
    }
}

#[async_trait::async_trait]
impl SyncStore for PgSyncStore {
    async fn list_active_configs(&self) -> Result<Vec<SyncConfig>> {
        let rows = sqlx::query(&format!(
            "select {CONFIG_COLUMNS} from sync_configs where is_active order by id"
        ))
        .fetch_all(&self.pool)
        .await
        .context("list_active_configs failed")?;
        rows.iter().map(config_from_row).collect()
    }

    async fn list_configs(&self) -> Result<Vec<SyncConfig>> {
        let rows = sqlx::query(&format!("select {CONFIG_COLUMNS} from sync_configs order by id"))
            .fetch_all(&self.pool)
            .await
            .context("list_configs failed")?;
        rows.iter().map(config_from_row).collect()
    }

    async fn get_config(&self, id: i64) -> Result<Option<SyncConfig>> {
        let row = sqlx::query(&format!("select {CONFIG_COLUMNS} from sync_configs where id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("get_config failed")?;
        row.as_ref().map(config_from_row).transpose()
    }

    async fn insert_config(&self, cfg: &NewSyncConfig) -> Result<SyncConfig> {
        let row = sqlx::query(&format!(
            r#"
            insert into sync_configs (
              name, source_counterparty_id, target_organization_id, target_group_id,
              target_store_id, start_sync_datetime, description, is_active
            ) values ($1, $2, $3, $4, $5, $6, $7, $8)
            returning {CONFIG_COLUMNS}
            "#
        ))
        .bind(&cfg.name)
        .bind(&cfg.source_counterparty_id)
        .bind(&cfg.target_organization_id)
        .bind(&cfg.target_group_id)
        .bind(&cfg.target_store_id)
        .bind(cfg.start_sync_datetime)
        .bind(&cfg.description)
        .bind(cfg.is_active)
        .fetch_one(&self.pool)
        .await
        .context("insert_config failed")?;
        config_from_row(&row)
    }

    async fn get_order(&self, id: i64) -> Result<Option<SyncOrder>> {
        let row = sqlx::query(&format!("select {ORDER_COLUMNS} from sync_orders where id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("get_order failed")?;
        row.as_ref().map(order_from_row).transpose()
    }

    async fn find_by_source_id(&self, ms1_order_id: &str) -> Result<Option<SyncOrder>> {
        let row = sqlx::query(&format!(
            "select {ORDER_COLUMNS} from sync_orders where ms1_order_id = $1"
        ))
        .bind(ms1_order_id)
        .fetch_optional(&self.pool)
        .await
        .context("find_by_source_id failed")?;
        row.as_ref().map(order_from_row).transpose()
    }

    async fn insert_orders(&self, rows: &[NewSyncOrder]) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await.context("insert_orders begin failed")?;
        let mut inserted = 0u64;
        for r in rows {
            let res = sqlx::query(
                r#"
                insert into sync_orders (
                  ms1_order_id, ms1_state_href, order_amount, sync_status, moment, config_id
                ) values ($1, $2, $3, $4, $5, $6)
                on conflict (ms1_order_id) do nothing
                "#,
            )
            .bind(&r.ms1_order_id)
            .bind(&r.ms1_state_href)
            .bind(r.order_amount)
            .bind(r.sync_status.as_str())
            .bind(r.moment)
            .bind(r.config_id)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("insert_orders failed for ms1_order_id={}", r.ms1_order_id))?;
            inserted += res.rows_affected();
        }
        tx.commit().await.context("insert_orders commit failed")?;

        debug!(requested = rows.len(), inserted, "insert_orders committed");
        Ok(inserted)
    }

    async fn save_order(&self, order: &SyncOrder) -> Result<SyncOrder> {
        ensure_order_invariant(order)?;

        let row = sqlx::query(&format!(
            r#"
            update sync_orders
            set ms2_purchase_id = $2,
                ms1_state_href = $3,
                order_amount = $4,
                sync_status = $5,
                modification_status = $6,
                info_msg = $7,
                error_msg = $8,
                modified = now()
            where id = $1
            returning {ORDER_COLUMNS}
            "#
        ))
        .bind(order.id)
        .bind(&order.ms2_purchase_id)
        .bind(&order.ms1_state_href)
        .bind(order.order_amount)
        .bind(order.sync_status.as_str())
        .bind(order.modification_status.map(|m| m.as_str()))
        .bind(&order.info_msg)
        .bind(&order.error_msg)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("save_order failed for id={}", order.id))?;

        match row {
            Some(r) => order_from_row(&r),
            None => Err(anyhow!("save_order: sync order id={} does not exist", order.id)),
        }
    }

    async fn list_by_status(&self, status: SyncStatus) -> Result<Vec<SyncOrder>> {
        let rows = sqlx::query(&format!(
            "select {ORDER_COLUMNS} from sync_orders where sync_status = $1 order by id"
        ))
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await
        .context("list_by_status failed")?;
        rows.iter().map(order_from_row).collect()
    }

    async fn list_orders(&self, filter: &SyncOrderFilter) -> Result<Page<SyncOrder>> {
        let (skip, limit) = filter.window();

        let mut count_q: QueryBuilder<'_, Postgres> =
            QueryBuilder::new("select count(*)::bigint as n from sync_orders");
        push_filter_clause(&mut count_q, filter);
        let total: i64 = count_q
            .build()
            .fetch_one(&self.pool)
            .await
            .context("list_orders count failed")?
            .try_get("n")?;

        let mut page_q: QueryBuilder<'_, Postgres> =
            QueryBuilder::new(format!("select {ORDER_COLUMNS} from sync_orders"));
        push_filter_clause(&mut page_q, filter);
        page_q
            .push(" order by created desc, id desc limit ")
            .push_bind(limit)
            .push(" offset ")
            .push_bind(skip);
        let rows = page_q
            .build()
            .fetch_all(&self.pool)
            .await
            .context("list_orders page failed")?;

        Ok(Page {
            items: rows.iter().map(order_from_row).collect::<Result<Vec<_>>>()?,
            total,
            skip,
            limit,
        })
    }
}
