//! Order Info Test Utilities
//!
//! Centralized test infrastructure for the order info workspace:
//! - Proptest generators for the order aggregate
//! - Instrumented store doubles
//! - Test fixtures for common scenarios
//! - Custom assertions for store results

// Re-export the in-memory store from its source crate
pub use orderinfo_storage::{InMemoryOrderStore, OrderStore, OrderUidStream, PutOutcome};

// Re-export core types for convenience
pub use orderinfo_core::{
    Delivery, Item, Order, OrderUid, Payment, StoreError, StoreResult, Timestamp,
};

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};

// ============================================================================
// STORE DOUBLES
// ============================================================================

/// In-memory store that counts calls per operation.
#[derive(Debug, Default)]
pub struct CountingStore {
    inner: InMemoryOrderStore,
    puts: AtomicUsize,
    gets: AtomicUsize,
    lists: AtomicUsize,
}

impl CountingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_orders(orders: impl IntoIterator<Item = Order>) -> Self {
        Self {
            inner: InMemoryOrderStore::with_orders(orders),
            ..Default::default()
        }
    }

    /// Number of `put` calls so far.
    pub fn put_calls(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    /// Number of `get` calls so far.
    pub fn get_calls(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    /// Number of `list_order_uids` calls so far.
    pub fn list_calls(&self) -> usize {
        self.lists.load(Ordering::SeqCst)
    }

    /// Number of stored orders.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[async_trait]
impl OrderStore for CountingStore {
    async fn put(&self, order: &Order) -> StoreResult<PutOutcome> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.inner.put(order).await
    }

    async fn get(&self, order_uid: &str) -> StoreResult<Order> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.inner.get(order_uid).await
    }

    async fn list_order_uids(&self) -> StoreResult<OrderUidStream> {
        self.lists.fetch_add(1, Ordering::SeqCst);
        self.inner.list_order_uids().await
    }

    async fn ping(&self) -> StoreResult<()> {
        self.inner.ping().await
    }
}

/// In-memory store with injectable failures.
///
/// Failures are keyed by order identifier for `put` and `get`, and are
/// global for enumeration and `ping`.
#[derive(Debug, Default)]
pub struct FailingStore {
    inner: InMemoryOrderStore,
    fail_put_for: RwLock<HashSet<String>>,
    fail_get_for: RwLock<HashSet<String>>,
    fail_list: AtomicBool,
    /// Enumeration yields an error after this many identifiers (0 = never).
    break_list_after: AtomicUsize,
    fail_ping: AtomicBool,
}

impl FailingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_orders(orders: impl IntoIterator<Item = Order>) -> Self {
        Self {
            inner: InMemoryOrderStore::with_orders(orders),
            ..Default::default()
        }
    }

    /// Make `put` fail for this identifier.
    pub fn fail_put(&self, order_uid: &str) {
        self.fail_put_for
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(order_uid.to_string());
    }

    /// Make `get` fail (with a non-NotFound error) for this identifier.
    pub fn fail_get(&self, order_uid: &str) {
        self.fail_get_for
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(order_uid.to_string());
    }

    /// Clear all per-identifier failures.
    pub fn heal(&self) {
        self.fail_put_for
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.fail_get_for
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.fail_list.store(false, Ordering::SeqCst);
        self.break_list_after.store(0, Ordering::SeqCst);
        self.fail_ping.store(false, Ordering::SeqCst);
    }

    /// Make enumeration fail to start.
    pub fn fail_list(&self) {
        self.fail_list.store(true, Ordering::SeqCst);
    }

    /// Make enumeration fail after `n` identifiers.
    pub fn break_list_after(&self, n: usize) {
        self.break_list_after.store(n, Ordering::SeqCst);
    }

    /// Make `ping` fail.
    pub fn fail_ping(&self) {
        self.fail_ping.store(true, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    fn is_marked(set: &RwLock<HashSet<String>>, order_uid: &str) -> bool {
        set.read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(order_uid)
    }
}

#[async_trait]
impl OrderStore for FailingStore {
    async fn put(&self, order: &Order) -> StoreResult<PutOutcome> {
        if Self::is_marked(&self.fail_put_for, &order.order_uid) {
            return Err(StoreError::TransactionFailed {
                order_uid: order.order_uid.clone(),
                reason: "injected failure".to_string(),
            });
        }
        self.inner.put(order).await
    }

    async fn get(&self, order_uid: &str) -> StoreResult<Order> {
        if Self::is_marked(&self.fail_get_for, order_uid) {
            return Err(StoreError::query_failed("get", "injected failure"));
        }
        self.inner.get(order_uid).await
    }

    async fn list_order_uids(&self) -> StoreResult<OrderUidStream> {
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(StoreError::Connection {
                reason: "injected failure".to_string(),
            });
        }
        let uids = self.inner.list_order_uids().await?;
        match self.break_list_after.load(Ordering::SeqCst) {
            0 => Ok(uids),
            n => Ok(uids
                .take(n)
                .chain(stream::once(async {
                    Err(StoreError::query_failed("list", "injected failure"))
                }))
                .boxed()),
        }
    }

    async fn ping(&self) -> StoreResult<()> {
        if self.fail_ping.load(Ordering::SeqCst) {
            return Err(StoreError::Connection {
                reason: "injected failure".to_string(),
            });
        }
        Ok(())
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for generating order aggregates.

    use super::*;
    use proptest::prelude::*;

    /// Generate a non-blank order identifier.
    pub fn arb_order_uid() -> impl Strategy<Value = OrderUid> {
        "[a-z0-9]{8,24}"
    }

    /// Generate a Timestamp with microsecond precision (2020-2030).
    pub fn arb_timestamp() -> impl Strategy<Value = Timestamp> {
        (1577836800i64..1893456000i64, 0u32..1_000_000).prop_map(|(secs, micros)| {
            chrono::DateTime::from_timestamp(secs, micros * 1_000)
                .unwrap_or_else(chrono::Utc::now)
        })
    }

    fn arb_text() -> impl Strategy<Value = String> {
        "[A-Za-z0-9 ]{0,24}"
    }

    /// Generate a Delivery.
    pub fn arb_delivery() -> impl Strategy<Value = Delivery> {
        (
            arb_text(),
            "\\+[0-9]{7,12}",
            "[0-9]{5,7}",
            arb_text(),
            arb_text(),
            arb_text(),
            "[a-z]{1,10}@[a-z]{1,8}\\.com",
        )
            .prop_map(|(name, phone, zip, city, address, region, email)| Delivery {
                name,
                phone,
                zip,
                city,
                address,
                region,
                email,
            })
    }

    /// Generate a Payment.
    pub fn arb_payment() -> impl Strategy<Value = Payment> {
        (
            "[a-z0-9]{8,24}",
            arb_text(),
            prop_oneof![Just("USD"), Just("RUB"), Just("EUR")],
            arb_text(),
            0i32..1_000_000,
            1577836800i64..1893456000i64,
            arb_text(),
            0i32..10_000,
            0i32..1_000_000,
            0i32..1_000,
        )
            .prop_map(
                |(
                    transaction,
                    request_id,
                    currency,
                    provider,
                    amount,
                    payment_dt,
                    bank,
                    delivery_cost,
                    goods_total,
                    custom_fee,
                )| Payment {
                    transaction,
                    request_id,
                    currency: currency.to_string(),
                    provider,
                    amount,
                    payment_dt,
                    bank,
                    delivery_cost,
                    goods_total,
                    custom_fee,
                },
            )
    }

    /// Generate an Item.
    pub fn arb_item() -> impl Strategy<Value = Item> {
        (
            1i64..100_000_000,
            "[A-Z]{4,16}",
            0i32..100_000,
            "[a-z0-9]{8,24}",
            arb_text(),
            0i32..100,
            "[0-9]{1,2}",
            0i32..100_000,
            1i64..100_000_000,
            arb_text(),
            100i32..500,
        )
            .prop_map(
                |(
                    chrt_id,
                    track_number,
                    price,
                    rid,
                    name,
                    sale,
                    size,
                    total_price,
                    nm_id,
                    brand,
                    status,
                )| Item {
                    chrt_id,
                    track_number,
                    price,
                    rid,
                    name,
                    sale,
                    size,
                    total_price,
                    nm_id,
                    brand,
                    status,
                },
            )
    }

    /// Generate an Order with the given identifier.
    pub fn arb_order_with_uid(order_uid: OrderUid) -> impl Strategy<Value = Order> {
        (
            (
                "[A-Z]{4,16}",
                "[A-Z]{2,6}",
                arb_delivery(),
                arb_payment(),
                prop::collection::vec(arb_item(), 0..5),
            ),
            (
                prop_oneof![Just("en"), Just("ru")],
                arb_text(),
                "[a-z0-9]{1,12}",
                arb_text(),
                "[0-9]{1,2}",
                0i32..1000,
                arb_timestamp(),
                "[0-9]{1,2}",
            ),
        )
            .prop_map(
                move |(
                    (track_number, entry, delivery, payment, items),
                    (
                        locale,
                        internal_signature,
                        customer_id,
                        delivery_service,
                        shardkey,
                        sm_id,
                        date_created,
                        oof_shard,
                    ),
                )| Order {
                    order_uid: order_uid.clone(),
                    track_number,
                    entry,
                    delivery,
                    payment,
                    items,
                    locale: locale.to_string(),
                    internal_signature,
                    customer_id,
                    delivery_service,
                    shardkey,
                    sm_id,
                    date_created,
                    oof_shard,
                },
            )
    }

    /// Generate an Order.
    pub fn arb_order() -> impl Strategy<Value = Order> {
        arb_order_uid().prop_flat_map(arb_order_with_uid)
    }

    /// Generate up to `max` orders with pairwise distinct identifiers.
    pub fn arb_distinct_orders(max: usize) -> impl Strategy<Value = Vec<Order>> {
        prop::collection::vec(arb_order(), 0..=max).prop_map(|orders| {
            let mut seen = HashSet::new();
            orders
                .into_iter()
                .filter(|order| seen.insert(order.order_uid.clone()))
                .collect()
        })
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built test fixtures for common testing scenarios.

    use super::*;
    use chrono::TimeZone;

    /// Identifier of [`sample_order`].
    pub const SAMPLE_ORDER_UID: &str = "b563feb7b2b84b6test";

    /// The canonical sample order as producers publish it.
    pub const SAMPLE_ORDER_JSON: &str = include_str!("../fixtures/sample_order.json");

    /// The canonical sample order.
    pub fn sample_order() -> Order {
        Order {
            order_uid: SAMPLE_ORDER_UID.to_string(),
            track_number: "WBILMTESTTRACK".to_string(),
            entry: "WBIL".to_string(),
            delivery: Delivery {
                name: "Test Testov".to_string(),
                phone: "+9720000000".to_string(),
                zip: "2639809".to_string(),
                city: "Kiryat Mozkin".to_string(),
                address: "Ploshad Mira 15".to_string(),
                region: "Kraiot".to_string(),
                email: "test@gmail.com".to_string(),
            },
            payment: Payment {
                transaction: SAMPLE_ORDER_UID.to_string(),
                request_id: String::new(),
                currency: "USD".to_string(),
                provider: "wbpay".to_string(),
                amount: 1817,
                payment_dt: 1637907727,
                bank: "alpha".to_string(),
                delivery_cost: 1500,
                goods_total: 317,
                custom_fee: 0,
            },
            items: vec![Item {
                chrt_id: 9934930,
                track_number: "WBILMTESTTRACK".to_string(),
                price: 453,
                rid: "ab4219087a764ae0btest".to_string(),
                name: "Mascaras".to_string(),
                sale: 30,
                size: "0".to_string(),
                total_price: 317,
                nm_id: 2389212,
                brand: "Vivienne Sabo".to_string(),
                status: 202,
            }],
            locale: "en".to_string(),
            internal_signature: String::new(),
            customer_id: "test".to_string(),
            delivery_service: "meest".to_string(),
            shardkey: "9".to_string(),
            sm_id: 99,
            date_created: chrono::Utc
                .with_ymd_and_hms(2021, 11, 26, 6, 22, 19)
                .single()
                .unwrap_or_else(chrono::Utc::now),
            oof_shard: "1".to_string(),
        }
    }

    /// The sample order under a different identifier.
    pub fn order_with_uid(order_uid: &str) -> Order {
        let mut order = sample_order();
        order.order_uid = order_uid.to_string();
        order.payment.transaction = order_uid.to_string();
        order
    }

    /// An order with `count` distinct items, in a known order.
    pub fn order_with_items(order_uid: &str, count: usize) -> Order {
        let mut order = order_with_uid(order_uid);
        let template = order.items[0].clone();
        order.items = (0..count)
            .map(|i| Item {
                chrt_id: template.chrt_id + i as i64,
                name: format!("item-{i}"),
                rid: format!("{}-{i}", template.rid),
                ..template.clone()
            })
            .collect();
        order
    }

    /// Serialize an order as an event payload.
    pub fn order_payload(order: &Order) -> Vec<u8> {
        serde_json::to_vec(order).unwrap_or_default()
    }

    /// A creation time finer than the store keeps.
    pub const NANOSECOND_DATE_CREATED: &str = "2021-11-26T06:22:19.123456789Z";

    /// The same instant at the precision the store keeps.
    pub const MICROSECOND_DATE_CREATED: &str = "2021-11-26T06:22:19.123456Z";

    /// The sample payload under `order_uid` with a nanosecond `date_created`.
    pub fn nanosecond_order_payload(order_uid: &str) -> Vec<u8> {
        let mut value = serde_json::to_value(order_with_uid(order_uid)).unwrap_or_default();
        value["date_created"] = serde_json::Value::from(NANOSECOND_DATE_CREATED);
        serde_json::to_vec(&value).unwrap_or_default()
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Custom assertion functions for store results.

    use super::*;

    /// Assert that a StoreResult is Ok.
    #[track_caller]
    pub fn assert_ok<T: std::fmt::Debug>(result: &StoreResult<T>) {
        assert!(result.is_ok(), "Expected Ok, got Err: {:?}", result);
    }

    /// Assert that a StoreResult is a NotFound error for the given identifier.
    #[track_caller]
    pub fn assert_not_found<T: std::fmt::Debug>(result: &StoreResult<T>, order_uid: &str) {
        match result {
            Err(StoreError::NotFound { order_uid: got }) => {
                assert_eq!(got, order_uid, "Wrong identifier in NotFound error");
            }
            other => panic!("Expected NotFound for {}, got: {:?}", order_uid, other),
        }
    }

    /// Assert that two aggregates are deep-equal, naming the first differing part.
    #[track_caller]
    pub fn assert_same_order(actual: &Order, expected: &Order) {
        assert_eq!(actual.order_uid, expected.order_uid, "order_uid differs");
        assert_eq!(actual.delivery, expected.delivery, "delivery differs");
        assert_eq!(actual.payment, expected.payment, "payment differs");
        assert_eq!(actual.items, expected.items, "items differ");
        assert_eq!(actual, expected, "root fields differ");
    }
}

#[cfg(test)]
mod tests {
    use super::assertions::*;
    use super::fixtures::*;
    use super::*;
    use futures_util::TryStreamExt;

    #[test]
    fn test_sample_json_matches_sample_order() {
        let decoded = Order::from_slice(SAMPLE_ORDER_JSON.as_bytes()).unwrap();
        assert_same_order(&decoded, &sample_order());
    }

    #[test]
    fn test_order_with_items_keeps_sequence() {
        let order = order_with_items("A1", 3);
        let names: Vec<_> = order.items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["item-0", "item-1", "item-2"]);
    }

    #[tokio::test]
    async fn test_counting_store_counts() {
        let store = CountingStore::new();
        store.put(&order_with_uid("A1")).await.unwrap();
        let _ = store.get("A1").await;
        let _ = store.get("B9").await;
        assert_eq!(store.put_calls(), 1);
        assert_eq!(store.get_calls(), 2);
    }

    #[tokio::test]
    async fn test_failing_store_injects_and_heals() {
        let store = FailingStore::with_orders(vec![order_with_uid("A1"), order_with_uid("B2")]);
        store.fail_get("A1");
        assert!(matches!(
            store.get("A1").await,
            Err(StoreError::QueryFailed { .. })
        ));
        assert_not_found(&store.get("C3").await, "C3");

        store.break_list_after(1);
        let collected: Result<Vec<String>, _> =
            store.list_order_uids().await.unwrap().try_collect().await;
        assert!(collected.is_err());

        store.heal();
        assert_ok(&store.get("A1").await);
        let uids: Vec<String> = store.list_order_uids().await.unwrap().try_collect().await.unwrap();
        assert_eq!(uids.len(), 2);
    }
}
