use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::{DatabaseConfig, StoreConfig};
use crate::domain::order::{Delivery, Item, Order, OrderLine, Payment};
use crate::metrics::Metrics;
use crate::utils::{retry_on_transient, RetryResult};

use super::errors::{map_unique_violation, StoreError};
use super::queries;
use super::OrderStore;

// ============================================================================
// Postgres Order Store
// ============================================================================
//
// Every public call runs under its own timeout and is retried while the
// failure is transient. A save is one READ COMMITTED transaction; the
// primary key on orders.order_uid is what makes it idempotent.
//
// ============================================================================

pub async fn connect_pool(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_idle_connections.min(config.max_connections))
        .max_lifetime(config.max_lifetime)
        .acquire_timeout(config.connect_timeout)
        .connect(&config.dsn)
        .await
}

pub struct PgOrderStore {
    pool: PgPool,
    config: StoreConfig,
    metrics: Arc<Metrics>,
    cancel: CancellationToken,
}

impl PgOrderStore {
    pub fn new(
        pool: PgPool,
        config: StoreConfig,
        metrics: Arc<Metrics>,
        cancel: CancellationToken,
    ) -> Self {
        Self { pool, config, metrics, cancel }
    }

    /// Creates the tables and indexes if they are missing.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(queries::SCHEMA).execute(&self.pool).await?;
        tracing::info!("Database schema ready");
        Ok(())
    }

    async fn with_retry<T, F, Fut>(
        &self,
        operation: &'static str,
        timeout: Duration,
        mut call: F,
    ) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let metrics = &self.metrics;
        let result = retry_on_transient(&self.config.retry, &self.cancel, |attempt| {
            if attempt > 1 {
                metrics.record_retry_attempt(operation);
            }
            let fut = call();
            async move {
                match tokio::time::timeout(timeout, fut).await {
                    Ok(result) => result,
                    Err(_) => Err(StoreError::Timeout { operation, timeout }),
                }
            }
        })
        .await;

        match result {
            RetryResult::Success(value) => Ok(value),
            RetryResult::PermanentFailure(err) => Err(err),
            RetryResult::Failed(err) => {
                metrics.record_retry_exhausted(operation);
                Err(StoreError::Fatal {
                    operation,
                    attempts: self.config.retry.max_attempts,
                    source: Box::new(err),
                })
            }
            RetryResult::Cancelled => Err(StoreError::Cancelled),
        }
    }

    async fn insert_order(&self, order: &Order, created: DateTime<Utc>) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(queries::SET_READ_COMMITTED).execute(&mut *tx).await?;

        let d = &order.delivery;
        sqlx::query(queries::INSERT_DELIVERY)
            .bind(d.delivery_uid)
            .bind(&d.name)
            .bind(&d.phone)
            .bind(&d.zip)
            .bind(&d.city)
            .bind(&d.address)
            .bind(&d.region)
            .bind(&d.email)
            .execute(&mut *tx)
            .await?;

        let p = &order.payment;
        sqlx::query(queries::INSERT_PAYMENT)
            .bind(p.payment_uid)
            .bind(&p.transaction)
            .bind(&p.request_id)
            .bind(&p.currency)
            .bind(&p.provider)
            .bind(p.amount)
            .bind(p.payment_dt)
            .bind(&p.bank)
            .bind(p.delivery_cost)
            .bind(p.goods_total)
            .bind(p.custom_fee)
            .execute(&mut *tx)
            .await?;

        sqlx::query(queries::INSERT_ORDER)
            .bind(order.order_uid)
            .bind(&order.track_number)
            .bind(&order.entry)
            .bind(d.delivery_uid)
            .bind(p.payment_uid)
            .bind(&order.locale)
            .bind(&order.internal_signature)
            .bind(&order.customer_id)
            .bind(&order.delivery_service)
            .bind(&order.shardkey)
            .bind(order.sm_id)
            .bind(created)
            .bind(&order.oof_shard)
            .execute(&mut *tx)
            .await
            .map_err(|err| map_unique_violation(err, order.order_uid))?;

        for (line_no, line) in order.items.iter().enumerate() {
            let item = &line.item;
            sqlx::query(queries::UPSERT_ITEM)
                .bind(item.nm_id)
                .bind(item.chrt_id)
                .bind(&item.track_number)
                .bind(&item.rid)
                .bind(&item.name)
                .bind(&item.size)
                .bind(&item.brand)
                .bind(item.status)
                .execute(&mut *tx)
                .await?;

            sqlx::query(queries::INSERT_ORDER_LINE)
                .bind(line.order_line_uid)
                .bind(order.order_uid)
                .bind(line_no as i32)
                .bind(item.nm_id)
                .bind(line.price)
                .bind(line.sale)
                .bind(line.total_price)
                .bind(line.quantity)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn fetch_order(&self, sql: &str, uid: Uuid) -> Result<Order, StoreError> {
        let rows = sqlx::query(sql).bind(uid).fetch_all(&self.pool).await?;
        let mut orders = hydrate(&rows)?;
        match orders.len() {
            0 => Err(StoreError::NotFound(uid)),
            1 => Ok(orders.remove(0)),
            n => Err(StoreError::Corrupt(format!("{n} orders returned for {uid}"))),
        }
    }

    async fn fetch_recent(&self, sql: &str, limit: i64) -> Result<Vec<Order>, StoreError> {
        let rows = sqlx::query(sql).bind(limit).fetch_all(&self.pool).await?;
        hydrate(&rows)
    }
}

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn exists(&self, uid: Uuid) -> Result<bool, StoreError> {
        let pool = &self.pool;
        self.with_retry("exists", self.config.exists_timeout, || async move {
            let found: bool = sqlx::query_scalar(queries::EXISTS)
                .bind(uid)
                .fetch_one(pool)
                .await?;
            Ok::<_, StoreError>(found)
        })
        .await
    }

    async fn save(&self, order: Order) -> Result<Order, StoreError> {
        let created = DateTime::parse_from_rfc3339(&order.date_created)
            .map(|ts| ts.with_timezone(&Utc))
            .map_err(|err| StoreError::Unstorable(format!("date_created: {err}")))?;

        let saved = self
            .with_retry("save", self.config.save_timeout, || {
                let attempt = fresh_attempt(&order);
                async move { self.insert_order(&attempt, created).await.map(|()| attempt) }
            })
            .await?;

        tracing::debug!(order_uid = %saved.order_uid, lines = saved.items.len(), "Order persisted");
        Ok(saved)
    }

    async fn get(&self, uid: Uuid) -> Result<Order, StoreError> {
        let sql = queries::get_order();
        self.with_retry("get", self.config.get_timeout, || self.fetch_order(&sql, uid))
            .await
    }

    async fn most_recent(&self, n: usize) -> Result<Vec<Order>, StoreError> {
        if n == 0 {
            return Ok(Vec::new());
        }
        let sql = queries::most_recent_orders();
        let limit = i64::try_from(n).unwrap_or(i64::MAX);
        let timeout = scaled_timeout(self.config.get_timeout, n);
        self.with_retry("most_recent", timeout, || self.fetch_recent(&sql, limit))
            .await
    }
}

/// Copy of `order` with new persistence ids. An attempt whose commit landed
/// but whose reply was lost must not collide with itself on a retry; the
/// order header then reports `AlreadyExists`.
fn fresh_attempt(order: &Order) -> Order {
    let mut attempt = order.clone();
    attempt.assign_identifiers();
    attempt
}

/// Bulk reads get one `get` budget per requested order.
fn scaled_timeout(per_order: Duration, n: usize) -> Duration {
    per_order.saturating_mul(u32::try_from(n).unwrap_or(u32::MAX))
}

/// Folds joined rows into orders. Rows of one order must be adjacent and in
/// line order, which both hydrating queries guarantee.
fn hydrate(rows: &[PgRow]) -> Result<Vec<Order>, StoreError> {
    let mut orders: Vec<Order> = Vec::new();

    for row in rows {
        let uid: Uuid = row.try_get("order_uid")?;
        let line = line_from_row(row)?;

        match orders.last_mut() {
            Some(order) if order.order_uid == uid => order.items.push(line),
            _ => {
                let mut order = header_from_row(row, uid)?;
                order.items.push(line);
                orders.push(order);
            }
        }
    }

    Ok(orders)
}

fn header_from_row(row: &PgRow, order_uid: Uuid) -> Result<Order, sqlx::Error> {
    let created: DateTime<Utc> = row.try_get("date_created")?;

    Ok(Order {
        order_uid,
        track_number: row.try_get("track_number")?,
        entry: row.try_get("entry")?,
        delivery: Delivery {
            delivery_uid: row.try_get("delivery_uid")?,
            name: row.try_get("delivery_name")?,
            phone: row.try_get("phone")?,
            zip: row.try_get("zip")?,
            city: row.try_get("city")?,
            address: row.try_get("address")?,
            region: row.try_get("region")?,
            email: row.try_get("email")?,
        },
        payment: Payment {
            payment_uid: row.try_get("payment_uid")?,
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
        },
        items: Vec::new(),
        locale: row.try_get("locale")?,
        internal_signature: row.try_get("internal_signature")?,
        customer_id: row.try_get("customer_id")?,
        delivery_service: row.try_get("delivery_service")?,
        shardkey: row.try_get("shardkey")?,
        sm_id: row.try_get("sm_id")?,
        date_created: created.to_rfc3339_opts(SecondsFormat::AutoSi, true),
        oof_shard: row.try_get("oof_shard")?,
    })
}

fn line_from_row(row: &PgRow) -> Result<OrderLine, sqlx::Error> {
    Ok(OrderLine {
        order_line_uid: row.try_get("order_line_uid")?,
        item: Item {
            nm_id: row.try_get("nm_id")?,
            chrt_id: row.try_get("chrt_id")?,
            track_number: row.try_get("item_track_number")?,
            rid: row.try_get("rid")?,
            name: row.try_get("item_name")?,
            size: row.try_get("size")?,
            brand: row.try_get("brand")?,
            status: row.try_get("status")?,
        },
        price: row.try_get("price")?,
        sale: row.try_get("sale")?,
        total_price: row.try_get("total_price")?,
        quantity: row.try_get("quantity")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bulk_timeout_scales_with_request_size() {
        let base = Duration::from_secs(2);
        assert_eq!(scaled_timeout(base, 1), base);
        assert_eq!(scaled_timeout(base, 10), Duration::from_secs(20));
        assert_eq!(scaled_timeout(Duration::MAX, 3), Duration::MAX);
    }

    #[test]
    fn test_each_save_attempt_gets_fresh_ids() {
        let payload = crate::ingestion::pipeline::tests::sample_json(Uuid::new_v4(), 1817);
        let order: Order = serde_json::from_slice(&payload).unwrap();

        let first = fresh_attempt(&order);
        let second = fresh_attempt(&order);

        assert_eq!(first.order_uid, second.order_uid);
        assert_ne!(first.delivery.delivery_uid, Uuid::nil());
        assert_ne!(first.delivery.delivery_uid, second.delivery.delivery_uid);
        assert_ne!(first.payment.payment_uid, second.payment.payment_uid);
        assert_ne!(first.items[0].order_line_uid, second.items[0].order_line_uid);
        assert_eq!(first.items[0].item.nm_id, second.items[0].item.nm_id);
    }

    #[test]
    fn test_hydrating_no_rows_yields_no_orders() {
        assert!(hydrate(&[]).unwrap().is_empty());
    }
}
