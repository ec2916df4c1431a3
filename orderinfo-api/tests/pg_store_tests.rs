#![cfg(feature = "db-tests")]
//! PostgreSQL order store integration tests.
//!
//! Requires a reachable database configured through the `ORDERS_DB_*`
//! variables. Each test uses its own identifiers so runs do not collide.

use futures_util::TryStreamExt;
use orderinfo_api::{ApiError, ApiResult, DbConfig, PgOrderStore};
use orderinfo_storage::{warm_up, OrderCache, OrderStore, PutOutcome};
use orderinfo_core::Order;
use orderinfo_test_utils::fixtures::{nanosecond_order_payload, order_with_items, sample_order};
use std::time::{SystemTime, UNIX_EPOCH};

async fn test_store() -> ApiResult<PgOrderStore> {
    let store = PgOrderStore::from_config(&DbConfig::from_env())?;
    store.ensure_schema().await?;
    Ok(store)
}

fn unique_uid(prefix: &str) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    format!("{prefix}-{nanos}")
}

#[tokio::test]
async fn test_put_then_get_round_trips_aggregate() -> ApiResult<()> {
    let store = test_store().await?;
    let order = order_with_items(&unique_uid("roundtrip"), 4);

    assert_eq!(store.put(&order).await?, PutOutcome::Inserted);
    assert_eq!(store.get(&order.order_uid).await?, order);
    Ok(())
}

#[tokio::test]
async fn test_second_put_keeps_first_aggregate() -> ApiResult<()> {
    let store = test_store().await?;
    let first = order_with_items(&unique_uid("dup"), 2);
    let mut second = order_with_items(&first.order_uid, 3);
    second.track_number = "OTHER".to_string();

    assert_eq!(store.put(&first).await?, PutOutcome::Inserted);
    assert_eq!(store.put(&second).await?, PutOutcome::AlreadyPresent);

    let stored = store.get(&first.order_uid).await?;
    assert_eq!(stored, first);
    assert_eq!(stored.items.len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_decoded_creation_time_survives_the_store() -> ApiResult<()> {
    let store = test_store().await?;
    let order = Order::from_slice(&nanosecond_order_payload(&unique_uid("nanos")))
        .map_err(|e| ApiError::invalid_input(e.to_string()))?;

    store.put(&order).await?;
    assert_eq!(store.get(&order.order_uid).await?.date_created, order.date_created);
    Ok(())
}

#[tokio::test]
async fn test_unknown_order_is_not_found() -> ApiResult<()> {
    let store = test_store().await?;
    let err = store.get(&unique_uid("missing")).await.unwrap_err();
    assert!(err.is_not_found());
    Ok(())
}

#[tokio::test]
async fn test_order_without_items() -> ApiResult<()> {
    let store = test_store().await?;
    let mut order = sample_order();
    order.order_uid = unique_uid("no-items");
    order.items.clear();

    store.put(&order).await?;
    assert!(store.get(&order.order_uid).await?.items.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_listing_and_warm_up_include_stored_orders() -> ApiResult<()> {
    let store = test_store().await?;
    let order = order_with_items(&unique_uid("listed"), 1);
    store.put(&order).await?;

    let uids: Vec<String> = store.list_order_uids().await?.try_collect().await?;
    assert!(uids.contains(&order.order_uid));

    let cache = OrderCache::new();
    let report = warm_up(&cache, &store).await;
    assert!(report.completed);
    assert!(cache.contains(&order.order_uid));
    Ok(())
}

#[tokio::test]
async fn test_ping() -> ApiResult<()> {
    let store = test_store().await?;
    store.ping().await?;
    Ok(())
}
