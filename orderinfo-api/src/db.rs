//! Database Connection Pool Module
//!
//! This module provides PostgreSQL connection pooling using deadpool-postgres
//! and the PostgreSQL implementation of [`OrderStore`].
//!
//! One `put` is one transaction covering the root row, delivery, payment and
//! every item. The root insert is `ON CONFLICT DO NOTHING`; when it affects
//! no row the transaction commits without touching the child tables, so the
//! first write of an identifier wins and child rows are never duplicated.

use async_trait::async_trait;
use deadpool_postgres::{
    Config, ManagerConfig, Pool, PoolConfig, RecyclingMethod, Runtime, Timeouts,
};
use futures_util::StreamExt;
use orderinfo_core::{Delivery, Item, Order, Payment, StoreError, StoreResult};
use orderinfo_storage::{OrderStore, OrderUidStream, PutOutcome};
use std::future::Future;
use std::time::{Duration, Instant};
use tokio_postgres::{NoTls, Row};

use crate::config::{env_var, parse_flag};
use crate::constants::*;
use crate::error::{ApiError, ApiResult};
use crate::telemetry::metrics;

// ============================================================================
// CONNECTION POOL CONFIGURATION
// ============================================================================

/// Database connection pool configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct DbConfig {
    /// PostgreSQL host
    pub host: String,
    /// PostgreSQL port
    pub port: u16,
    /// Database name
    pub dbname: String,
    /// Database user
    pub user: String,
    /// Database password
    pub password: String,
    /// Maximum pool size
    pub max_size: usize,
    /// Connection timeout
    pub timeout: Duration,
    /// Create the tables at startup when missing
    pub bootstrap_schema: bool,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            dbname: DEFAULT_DB_NAME.to_string(),
            user: DEFAULT_DB_USER.to_string(),
            password: DEFAULT_DB_PASSWORD.to_string(),
            max_size: DEFAULT_DB_POOL_SIZE,
            timeout: Duration::from_secs(DEFAULT_DB_TIMEOUT_SECS),
            bootstrap_schema: true,
        }
    }
}

impl DbConfig {
    /// Create a new database configuration from environment variables.
    pub fn from_env() -> Self {
        Self::from_source(env_var)
    }

    /// Build from an arbitrary variable source.
    pub fn from_source(get: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            host: get("ORDERS_DB_HOST").unwrap_or(defaults.host),
            port: get("ORDERS_DB_PORT")
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(defaults.port),
            dbname: get("ORDERS_DB_NAME").unwrap_or(defaults.dbname),
            user: get("ORDERS_DB_USER").unwrap_or(defaults.user),
            password: get("ORDERS_DB_PASSWORD").unwrap_or(defaults.password),
            max_size: get("ORDERS_DB_POOL_SIZE")
                .and_then(|s| s.trim().parse().ok())
                .filter(|size| *size > 0)
                .unwrap_or(defaults.max_size),
            timeout: get("ORDERS_DB_TIMEOUT")
                .and_then(|s| s.trim().parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            bootstrap_schema: parse_flag(get("ORDERS_DB_BOOTSTRAP_SCHEMA"), defaults.bootstrap_schema),
        }
    }

    /// Create a connection pool from this configuration.
    pub fn create_pool(&self) -> ApiResult<Pool> {
        let mut cfg = Config::new();
        cfg.host = Some(self.host.clone());
        cfg.port = Some(self.port);
        cfg.dbname = Some(self.dbname.clone());
        cfg.user = Some(self.user.clone());
        cfg.password = Some(self.password.clone());

        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });

        let mut pool_cfg = PoolConfig::new(self.max_size);
        pool_cfg.timeouts = Timeouts {
            wait: Some(self.timeout),
            create: Some(self.timeout),
            recycle: Some(self.timeout),
        };
        cfg.pool = Some(pool_cfg);

        let pool = cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| ApiError::database_error(format!("Failed to create pool: {}", e)))?;

        Ok(pool)
    }
}

// ============================================================================
// SQL
// ============================================================================

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS orders (
    order_uid          TEXT PRIMARY KEY,
    track_number       TEXT NOT NULL,
    entry              TEXT NOT NULL,
    locale             TEXT NOT NULL,
    internal_signature TEXT NOT NULL,
    customer_id        TEXT NOT NULL,
    delivery_service   TEXT NOT NULL,
    shardkey           TEXT NOT NULL,
    sm_id              INTEGER NOT NULL,
    date_created       TIMESTAMPTZ NOT NULL,
    oof_shard          TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS deliveries (
    order_uid TEXT PRIMARY KEY REFERENCES orders (order_uid) ON DELETE CASCADE,
    name      TEXT NOT NULL,
    phone     TEXT NOT NULL,
    zip       TEXT NOT NULL,
    city      TEXT NOT NULL,
    address   TEXT NOT NULL,
    region    TEXT NOT NULL,
    email     TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS payments (
    order_uid     TEXT PRIMARY KEY REFERENCES orders (order_uid) ON DELETE CASCADE,
    transaction   TEXT NOT NULL,
    request_id    TEXT NOT NULL,
    currency      TEXT NOT NULL,
    provider      TEXT NOT NULL,
    amount        INTEGER NOT NULL,
    payment_dt    BIGINT NOT NULL,
    bank          TEXT NOT NULL,
    delivery_cost INTEGER NOT NULL,
    goods_total   INTEGER NOT NULL,
    custom_fee    INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS items (
    order_uid    TEXT NOT NULL REFERENCES orders (order_uid) ON DELETE CASCADE,
    position     INTEGER NOT NULL,
    chrt_id      BIGINT NOT NULL,
    track_number TEXT NOT NULL,
    price        INTEGER NOT NULL,
    rid          TEXT NOT NULL,
    name         TEXT NOT NULL,
    sale         INTEGER NOT NULL,
    size         TEXT NOT NULL,
    total_price  INTEGER NOT NULL,
    nm_id        BIGINT NOT NULL,
    brand        TEXT NOT NULL,
    status       INTEGER NOT NULL,
    PRIMARY KEY (order_uid, position)
);
"#;

const INSERT_ORDER: &str = "
    INSERT INTO orders (order_uid, track_number, entry, locale, internal_signature, customer_id,
                        delivery_service, shardkey, sm_id, date_created, oof_shard)
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
    ON CONFLICT (order_uid) DO NOTHING";

const INSERT_DELIVERY: &str = "
    INSERT INTO deliveries (order_uid, name, phone, zip, city, address, region, email)
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8)";

const INSERT_PAYMENT: &str = "
    INSERT INTO payments (order_uid, transaction, request_id, currency, provider, amount,
                          payment_dt, bank, delivery_cost, goods_total, custom_fee)
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)";

const INSERT_ITEM: &str = "
    INSERT INTO items (order_uid, position, chrt_id, track_number, price, rid, name, sale, size,
                       total_price, nm_id, brand, status)
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)";

const SELECT_ORDER: &str = "
    SELECT order_uid, track_number, entry, locale, internal_signature, customer_id,
           delivery_service, shardkey, sm_id, date_created, oof_shard
    FROM orders WHERE order_uid = $1";

const SELECT_DELIVERY: &str = "
    SELECT name, phone, zip, city, address, region, email
    FROM deliveries WHERE order_uid = $1";

const SELECT_PAYMENT: &str = "
    SELECT transaction, request_id, currency, provider, amount, payment_dt, bank,
           delivery_cost, goods_total, custom_fee
    FROM payments WHERE order_uid = $1";

const SELECT_ITEMS: &str = "
    SELECT chrt_id, track_number, price, rid, name, sale, size, total_price, nm_id, brand, status
    FROM items WHERE order_uid = $1 ORDER BY position";

const SELECT_ORDER_UIDS: &str = "SELECT order_uid FROM orders ORDER BY order_uid";

// ============================================================================
// ROW DECODING
// ============================================================================

fn order_from_row(row: &Row) -> Result<Order, tokio_postgres::Error> {
    Ok(Order {
        order_uid: row.try_get("order_uid")?,
        track_number: row.try_get("track_number")?,
        entry: row.try_get("entry")?,
        delivery: Delivery::default(),
        payment: Payment::default(),
        items: Vec::new(),
        locale: row.try_get("locale")?,
        internal_signature: row.try_get("internal_signature")?,
        customer_id: row.try_get("customer_id")?,
        delivery_service: row.try_get("delivery_service")?,
        shardkey: row.try_get("shardkey")?,
        sm_id: row.try_get("sm_id")?,
        date_created: row.try_get("date_created")?,
        oof_shard: row.try_get("oof_shard")?,
    })
}

fn delivery_from_row(row: &Row) -> Result<Delivery, tokio_postgres::Error> {
    Ok(Delivery {
        name: row.try_get("name")?,
        phone: row.try_get("phone")?,
        zip: row.try_get("zip")?,
        city: row.try_get("city")?,
        address: row.try_get("address")?,
        region: row.try_get("region")?,
        email: row.try_get("email")?,
    })
}

fn payment_from_row(row: &Row) -> Result<Payment, tokio_postgres::Error> {
    Ok(Payment {
        transaction: row.try_get("transaction")?,
        request_id: row.try_get("request_id")?,
        currency: row.try_get("currency")?,
        provider: row.try_get("provider")?,
        amount: row.try_get("amount")?,
        payment_dt: row.try_get("payment_dt")?,
        bank: row.try_get("bank")?,
        delivery_cost: row.try_get("delivery_cost")?,
        goods_total: row.try_get("goods_total")?,
        custom_fee: row.try_get("custom_fee")?,
    })
}

fn item_from_row(row: &Row) -> Result<Item, tokio_postgres::Error> {
    Ok(Item {
        chrt_id: row.try_get("chrt_id")?,
        track_number: row.try_get("track_number")?,
        price: row.try_get("price")?,
        rid: row.try_get("rid")?,
        name: row.try_get("name")?,
        sale: row.try_get("sale")?,
        size: row.try_get("size")?,
        total_price: row.try_get("total_price")?,
        nm_id: row.try_get("nm_id")?,
        brand: row.try_get("brand")?,
        status: row.try_get("status")?,
    })
}

// ============================================================================
// POSTGRES ORDER STORE
// ============================================================================

/// PostgreSQL order store over a deadpool connection pool.
#[derive(Clone)]
pub struct PgOrderStore {
    pool: Pool,
}

impl PgOrderStore {
    /// Create a new store with the given pool.
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Create a new store from configuration.
    pub fn from_config(config: &DbConfig) -> ApiResult<Self> {
        let pool = config.create_pool()?;
        Ok(Self::new(pool))
    }

    /// Get a connection from the pool.
    async fn get_conn(&self) -> StoreResult<deadpool_postgres::Object> {
        self.pool.get().await.map_err(|e| StoreError::Connection {
            reason: e.to_string(),
        })
    }

    /// Create the order tables when they do not exist yet.
    pub async fn ensure_schema(&self) -> StoreResult<()> {
        let conn = self.get_conn().await?;
        conn.batch_execute(SCHEMA_SQL)
            .await
            .map_err(|e| StoreError::query_failed("ensure_schema", e))?;
        tracing::info!("Order schema ready");
        Ok(())
    }

    async fn insert_order(&self, order: &Order) -> StoreResult<PutOutcome> {
        let tx_failed = |e: tokio_postgres::Error| StoreError::TransactionFailed {
            order_uid: order.order_uid.clone(),
            reason: e.to_string(),
        };

        let mut conn = self.get_conn().await?;
        let tx = conn.transaction().await.map_err(tx_failed)?;

        let inserted = tx
            .execute(
                INSERT_ORDER,
                &[
                    &order.order_uid,
                    &order.track_number,
                    &order.entry,
                    &order.locale,
                    &order.internal_signature,
                    &order.customer_id,
                    &order.delivery_service,
                    &order.shardkey,
                    &order.sm_id,
                    &order.date_created,
                    &order.oof_shard,
                ],
            )
            .await
            .map_err(tx_failed)?;

        if inserted == 0 {
            tx.commit().await.map_err(tx_failed)?;
            return Ok(PutOutcome::AlreadyPresent);
        }

        let d = &order.delivery;
        tx.execute(
            INSERT_DELIVERY,
            &[
                &order.order_uid,
                &d.name,
                &d.phone,
                &d.zip,
                &d.city,
                &d.address,
                &d.region,
                &d.email,
            ],
        )
        .await
        .map_err(tx_failed)?;

        let p = &order.payment;
        tx.execute(
            INSERT_PAYMENT,
            &[
                &order.order_uid,
                &p.transaction,
                &p.request_id,
                &p.currency,
                &p.provider,
                &p.amount,
                &p.payment_dt,
                &p.bank,
                &p.delivery_cost,
                &p.goods_total,
                &p.custom_fee,
            ],
        )
        .await
        .map_err(tx_failed)?;

        if !order.items.is_empty() {
            let stmt = tx.prepare_cached(INSERT_ITEM).await.map_err(tx_failed)?;
            for (position, item) in order.items.iter().enumerate() {
                let position =
                    i32::try_from(position).map_err(|_| StoreError::TransactionFailed {
                        order_uid: order.order_uid.clone(),
                        reason: "too many items".to_string(),
                    })?;
                tx.execute(
                    &stmt,
                    &[
                        &order.order_uid,
                        &position,
                        &item.chrt_id,
                        &item.track_number,
                        &item.price,
                        &item.rid,
                        &item.name,
                        &item.sale,
                        &item.size,
                        &item.total_price,
                        &item.nm_id,
                        &item.brand,
                        &item.status,
                    ],
                )
                .await
                .map_err(tx_failed)?;
            }
        }

        tx.commit().await.map_err(tx_failed)?;
        Ok(PutOutcome::Inserted)
    }

    async fn select_order(&self, order_uid: &str) -> StoreResult<Order> {
        let query_failed = |e: tokio_postgres::Error| StoreError::query_failed("get", e);
        let incomplete = |reason: &str| StoreError::IncompleteAggregate {
            order_uid: order_uid.to_string(),
            reason: reason.to_string(),
        };

        let conn = self.get_conn().await?;

        let row = conn
            .query_opt(SELECT_ORDER, &[&order_uid])
            .await
            .map_err(query_failed)?
            .ok_or_else(|| StoreError::not_found(order_uid))?;
        let mut order = order_from_row(&row).map_err(query_failed)?;

        let row = conn
            .query_opt(SELECT_DELIVERY, &[&order_uid])
            .await
            .map_err(query_failed)?
            .ok_or_else(|| incomplete("delivery row missing"))?;
        order.delivery = delivery_from_row(&row).map_err(query_failed)?;

        let row = conn
            .query_opt(SELECT_PAYMENT, &[&order_uid])
            .await
            .map_err(query_failed)?
            .ok_or_else(|| incomplete("payment row missing"))?;
        order.payment = payment_from_row(&row).map_err(query_failed)?;

        order.items = conn
            .query(SELECT_ITEMS, &[&order_uid])
            .await
            .map_err(query_failed)?
            .iter()
            .map(item_from_row)
            .collect::<Result<_, _>>()
            .map_err(query_failed)?;

        Ok(order)
    }
}

/// Run a store operation, recording its outcome and latency.
async fn timed<T>(operation: &str, fut: impl Future<Output = StoreResult<T>>) -> StoreResult<T> {
    let start = Instant::now();
    let result = fut.await;
    if let Some(metrics) = metrics() {
        // NotFound is an expected answer, not a failed operation
        let success = matches!(&result, Ok(_) | Err(StoreError::NotFound { .. }));
        metrics.record_store_operation(operation, success, start.elapsed().as_secs_f64());
    }
    result
}

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn put(&self, order: &Order) -> StoreResult<PutOutcome> {
        timed("put", self.insert_order(order)).await
    }

    async fn get(&self, order_uid: &str) -> StoreResult<Order> {
        timed("get", self.select_order(order_uid)).await
    }

    async fn list_order_uids(&self) -> StoreResult<OrderUidStream> {
        let conn = self.get_conn().await?;
        let rows = timed("list", async {
            conn.query_raw(SELECT_ORDER_UIDS, std::iter::empty::<String>())
                .await
                .map_err(|e| StoreError::query_failed("list", e))
        })
        .await?;

        // The pooled connection moves into the stream and returns to the
        // pool once the enumeration is dropped.
        let uids = rows.map(move |row| {
            let _conn = &conn;
            row.and_then(|row| row.try_get::<_, String>(0))
                .map_err(|e| StoreError::query_failed("list", e))
        });
        Ok(uids.boxed())
    }

    async fn ping(&self) -> StoreResult<()> {
        let conn = self.get_conn().await?;
        conn.simple_query("SELECT 1")
            .await
            .map_err(|e| StoreError::query_failed("ping", e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_db_config_defaults() {
        let config = DbConfig::from_source(|_| None);
        assert_eq!(config, DbConfig::default());
        assert_eq!(config.dbname, "order_db");
        assert_eq!(config.user, "order_user");
        assert_eq!(config.max_size, 16);
        assert!(config.bootstrap_schema);
    }

    #[test]
    fn test_db_config_from_source() {
        let vars: HashMap<&str, &str> = [
            ("ORDERS_DB_HOST", "db.internal"),
            ("ORDERS_DB_PORT", "6543"),
            ("ORDERS_DB_POOL_SIZE", "0"),
            ("ORDERS_DB_TIMEOUT", "5"),
            ("ORDERS_DB_BOOTSTRAP_SCHEMA", "false"),
        ]
        .into_iter()
        .collect();
        let config = DbConfig::from_source(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.host, "db.internal");
        assert_eq!(config.port, 6543);
        // zero falls back to the default
        assert_eq!(config.max_size, 16);
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert!(!config.bootstrap_schema);
    }

    #[test]
    fn test_create_pool_is_lazy() {
        // No connection is attempted until the first checkout.
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let _guard = rt.enter();
        let pool = DbConfig::default().create_pool().unwrap();
        assert_eq!(pool.status().size, 0);
        assert_eq!(pool.status().max_size, 16);
    }

    #[test]
    fn test_schema_declares_child_keys() {
        assert!(SCHEMA_SQL.contains("PRIMARY KEY (order_uid, position)"));
        assert!(INSERT_ORDER.contains("ON CONFLICT (order_uid) DO NOTHING"));
        assert!(SELECT_ITEMS.contains("ORDER BY position"));
    }
}
