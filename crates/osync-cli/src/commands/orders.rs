use anyhow::{Context, Result};
use osync_db::SyncStore;
use osync_schemas::{SyncOrder, SyncOrderFilter};

use super::{build_engine, open_store, print_json};

pub async fn list(filter: SyncOrderFilter) -> Result<()> {
    let store = open_store().await?;
    let page = store.list_orders(&filter).await?;
    println!(
        "total={} skip={} limit={} shown={}",
        page.total,
        page.skip,
        page.limit,
        page.items.len()
    );
    for o in &page.items {
        println!("{}", order_line(o));
    }
    Ok(())
}

pub async fn get(id: i64) -> Result<()> {
    let store = open_store().await?;
    let order = store
        .get_order(id)
        .await?
        .with_context(|| format!("sync order id={id} not found"))?;
    print_json(&order)
}

pub async fn resync(id: i64, config_paths: &[String]) -> Result<()> {
    let engine = build_engine(config_paths).await?;
    let order = engine
        .resync_order(id)
        .await
        .with_context(|| format!("resync of sync order id={id} failed"))?;
    println!("{}", order_line(&order));
    Ok(())
}

pub async fn approve(id: i64, config_paths: &[String]) -> Result<()> {
    let engine = build_engine(config_paths).await?;
    let order = engine
        .approve_modification(id)
        .await
        .with_context(|| format!("approve of sync order id={id} failed"))?;
    println!("{}", order_line(&order));
    Ok(())
}

pub async fn mark_resynced(id: i64, config_paths: &[String]) -> Result<()> {
    let engine = build_engine(config_paths).await?;
    let order = engine
        .mark_resynced(id)
        .await
        .with_context(|| format!("mark-resynced of sync order id={id} failed"))?;
    println!("{}", order_line(&order));
    Ok(())
}

fn order_line(o: &SyncOrder) -> String {
    format!(
        "id={} ms1_order_id={} status={} modification={} ms2_purchase_id={} amount={} error={}",
        o.id,
        o.ms1_order_id,
        o.sync_status.as_str(),
        o.modification_status.map(|m| m.as_str()).unwrap_or(""),
        o.ms2_purchase_id.as_deref().unwrap_or(""),
        o.order_amount,
        o.error_msg.as_deref().unwrap_or("").replace('\n', " | "),
    )
}
