// ============================================================================
// SQL for the Postgres order store
// ============================================================================

pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS deliveries (
    delivery_uid UUID PRIMARY KEY,
    name         TEXT NOT NULL,
    phone        TEXT NOT NULL,
    zip          TEXT NOT NULL,
    city         TEXT NOT NULL,
    address      TEXT NOT NULL,
    region       TEXT NOT NULL,
    email        TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS payments (
    payment_uid   UUID PRIMARY KEY,
    transaction   TEXT NOT NULL,
    request_id    TEXT NOT NULL,
    currency      TEXT NOT NULL,
    provider      TEXT NOT NULL,
    amount        BIGINT NOT NULL,
    payment_dt    BIGINT NOT NULL,
    bank          TEXT NOT NULL,
    delivery_cost BIGINT NOT NULL,
    goods_total   BIGINT NOT NULL,
    custom_fee    BIGINT NOT NULL
);

CREATE TABLE IF NOT EXISTS orders (
    order_uid          UUID PRIMARY KEY,
    track_number       TEXT NOT NULL,
    entry              TEXT NOT NULL,
    delivery_uid       UUID NOT NULL REFERENCES deliveries (delivery_uid) ON DELETE CASCADE,
    payment_uid        UUID NOT NULL REFERENCES payments (payment_uid) ON DELETE CASCADE,
    locale             TEXT NOT NULL,
    internal_signature TEXT NOT NULL,
    customer_id        TEXT NOT NULL,
    delivery_service   TEXT NOT NULL,
    shardkey           TEXT NOT NULL,
    sm_id              INTEGER NOT NULL,
    date_created       TIMESTAMPTZ NOT NULL,
    oof_shard          TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS orders_date_created_idx ON orders (date_created DESC);

CREATE TABLE IF NOT EXISTS items (
    nm_id        BIGINT PRIMARY KEY,
    chrt_id      BIGINT NOT NULL,
    track_number TEXT NOT NULL,
    rid          TEXT NOT NULL,
    name         TEXT NOT NULL,
    size         TEXT NOT NULL,
    brand        TEXT NOT NULL,
    status       INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS order_lines (
    order_line_uid UUID PRIMARY KEY,
    order_uid      UUID NOT NULL REFERENCES orders (order_uid) ON DELETE CASCADE,
    line_no        INTEGER NOT NULL,
    nm_id          BIGINT NOT NULL REFERENCES items (nm_id),
    price          BIGINT NOT NULL,
    sale           INTEGER NOT NULL,
    total_price    BIGINT NOT NULL,
    quantity       INTEGER NOT NULL,
    UNIQUE (order_uid, line_no)
);
"#;

pub const SET_READ_COMMITTED: &str = "SET TRANSACTION ISOLATION LEVEL READ COMMITTED";

pub const EXISTS: &str = "SELECT EXISTS (SELECT 1 FROM orders WHERE order_uid = $1)";

pub const INSERT_DELIVERY: &str = r#"
INSERT INTO deliveries (delivery_uid, name, phone, zip, city, address, region, email)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
"#;

pub const INSERT_PAYMENT: &str = r#"
INSERT INTO payments (
    payment_uid, transaction, request_id, currency, provider, amount,
    payment_dt, bank, delivery_cost, goods_total, custom_fee
) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
"#;

pub const INSERT_ORDER: &str = r#"
INSERT INTO orders (
    order_uid, track_number, entry, delivery_uid, payment_uid, locale,
    internal_signature, customer_id, delivery_service, shardkey, sm_id,
    date_created, oof_shard
) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
"#;

/// Catalog items are shared between orders; the first writer wins.
pub const UPSERT_ITEM: &str = r#"
INSERT INTO items (nm_id, chrt_id, track_number, rid, name, size, brand, status)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
ON CONFLICT (nm_id) DO NOTHING
"#;

pub const INSERT_ORDER_LINE: &str = r#"
INSERT INTO order_lines (
    order_line_uid, order_uid, line_no, nm_id, price, sale, total_price, quantity
) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
"#;

/// One row per order line. Callers append a WHERE/ORDER BY clause that keeps
/// the lines of one order adjacent and in `line_no` order.
const SELECT_HYDRATED: &str = r#"
SELECT
    o.order_uid, o.track_number, o.entry, o.locale, o.internal_signature,
    o.customer_id, o.delivery_service, o.shardkey, o.sm_id, o.date_created, o.oof_shard,
    d.delivery_uid, d.name AS delivery_name, d.phone, d.zip, d.city, d.address, d.region, d.email,
    p.payment_uid, p.transaction, p.request_id, p.currency, p.provider, p.amount,
    p.payment_dt, p.bank, p.delivery_cost, p.goods_total, p.custom_fee,
    ol.order_line_uid, ol.price, ol.sale, ol.total_price, ol.quantity,
    i.nm_id, i.chrt_id, i.track_number AS item_track_number, i.rid,
    i.name AS item_name, i.size, i.brand, i.status
FROM orders o
JOIN deliveries d ON d.delivery_uid = o.delivery_uid
JOIN payments p ON p.payment_uid = o.payment_uid
JOIN order_lines ol ON ol.order_uid = o.order_uid
JOIN items i ON i.nm_id = ol.nm_id
"#;

pub fn get_order() -> String {
    format!("{SELECT_HYDRATED} WHERE o.order_uid = $1 ORDER BY ol.line_no")
}

/// The `$1` most recently created orders, oldest first.
pub fn most_recent_orders() -> String {
    format!(
        "{SELECT_HYDRATED} WHERE o.order_uid IN \
         (SELECT order_uid FROM orders ORDER BY date_created DESC, order_uid LIMIT $1) \
         ORDER BY o.date_created ASC, o.order_uid, ol.line_no"
    )
}
