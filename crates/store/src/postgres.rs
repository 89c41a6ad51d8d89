use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use common::{EventId, MerchItemId, Money, OrderId, ReservationId};
use domain::{
    Event, EventStatus, EventUpdate, MerchItem, MerchItemUpdate, Order, OrderLine, Requester,
    Reservation, SocialMetadata, ValidationError,
};
use sqlx::{PgConnection, PgPool, Postgres, Row, Transaction, postgres::PgRow};
use uuid::Uuid;

use crate::{
    Result, StoreError,
    memory::DEFAULT_LOCK_TIMEOUT,
    store::{Store, StoreTx},
};

const EVENT_COLUMNS: &str =
    "id, title, starts_at, venue, location, description, total_seats, seats_taken, status";

const RESERVATION_COLUMNS: &str = "id, event_id, name, email, phone, kind, seats, status, \
     instagram, twitter, role, referral, created_at";

const MERCH_COLUMNS: &str = "id, name, description, price_minor, stock, category";

const ORDER_COLUMNS: &str = "id, external_payment_reference, processor, customer_email, \
     customer_name, total_minor, status, created_at";

/// PostgreSQL-backed store.
///
/// Ledger rows are locked with `SELECT ... FOR UPDATE`; payment references
/// are serialized with transaction-scoped advisory locks. Every transaction
/// sets `lock_timeout`, so a stuck lock surfaces as `Contention` instead of
/// hanging the request.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
    lock_timeout: Duration,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self::with_lock_timeout(pool, DEFAULT_LOCK_TIMEOUT)
    }

    pub fn with_lock_timeout(pool: PgPool, lock_timeout: Duration) -> Self {
        Self { pool, lock_timeout }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    async fn begin_tx(&self) -> Result<Transaction<'static, Postgres>> {
        let mut tx = self.pool.begin().await?;
        let set_timeout = format!(
            "SET LOCAL lock_timeout = '{}ms'",
            self.lock_timeout.as_millis()
        );
        sqlx::query(&set_timeout).execute(&mut *tx).await?;
        Ok(tx)
    }
}

fn to_u32(column: &str, value: i32) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| StoreError::Invariant(format!("{column} is negative: {value}")))
}

fn to_i32(field: &'static str, value: u32) -> Result<i32> {
    i32::try_from(value).map_err(|_| ValidationError::new(field, "value is too large").into())
}

fn parse<T>(column: &str, raw: String) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    raw.parse()
        .map_err(|e| StoreError::Invariant(format!("bad {column} column: {e}")))
}

fn row_to_event(row: PgRow) -> Result<Event> {
    Ok(Event {
        id: EventId::from_uuid(row.try_get::<Uuid, _>("id")?),
        title: row.try_get("title")?,
        starts_at: row.try_get("starts_at")?,
        venue: row.try_get("venue")?,
        location: row.try_get("location")?,
        description: row.try_get("description")?,
        total_seats: to_u32("total_seats", row.try_get("total_seats")?)?,
        seats_taken: to_u32("seats_taken", row.try_get("seats_taken")?)?,
        status: parse("status", row.try_get("status")?)?,
    })
}

fn row_to_reservation(row: PgRow) -> Result<Reservation> {
    Ok(Reservation {
        id: ReservationId::from_uuid(row.try_get::<Uuid, _>("id")?),
        event_id: EventId::from_uuid(row.try_get::<Uuid, _>("event_id")?),
        requester: Requester {
            name: row.try_get("name")?,
            email: row.try_get("email")?,
            phone: row.try_get("phone")?,
        },
        kind: parse("kind", row.try_get("kind")?)?,
        seats: to_u32("seats", row.try_get("seats")?)?,
        status: parse("status", row.try_get("status")?)?,
        social: SocialMetadata {
            instagram: row.try_get("instagram")?,
            twitter: row.try_get("twitter")?,
            role: row.try_get("role")?,
            referral: row.try_get("referral")?,
        },
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_merch_item(row: PgRow) -> Result<MerchItem> {
    Ok(MerchItem {
        id: MerchItemId::from_uuid(row.try_get::<Uuid, _>("id")?),
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        price: Money::from_minor(row.try_get("price_minor")?),
        stock: to_u32("stock", row.try_get("stock")?)?,
        category: row.try_get("category")?,
    })
}

async fn fetch_event(
    conn: &mut PgConnection,
    id: EventId,
    for_update: bool,
) -> Result<Option<Event>> {
    let lock = if for_update { " FOR UPDATE" } else { "" };
    let sql = format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = $1{lock}");
    sqlx::query(&sql)
        .bind(id.as_uuid())
        .fetch_optional(conn)
        .await?
        .map(row_to_event)
        .transpose()
}

async fn fetch_merch_item(
    conn: &mut PgConnection,
    id: MerchItemId,
    for_update: bool,
) -> Result<Option<MerchItem>> {
    let lock = if for_update { " FOR UPDATE" } else { "" };
    let sql = format!("SELECT {MERCH_COLUMNS} FROM merch_items WHERE id = $1{lock}");
    sqlx::query(&sql)
        .bind(id.as_uuid())
        .fetch_optional(conn)
        .await?
        .map(row_to_merch_item)
        .transpose()
}

/// Loads an order header row together with its lines.
async fn complete_order(conn: &mut PgConnection, row: PgRow) -> Result<Order> {
    let id: Uuid = row.try_get("id")?;

    let line_rows = sqlx::query(
        r#"
        SELECT merch_item_id, name, unit_price_minor, quantity
        FROM order_lines
        WHERE order_id = $1
        ORDER BY position ASC
        "#,
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;

    let lines = line_rows
        .into_iter()
        .map(|line| {
            Ok(OrderLine {
                merch_item_id: MerchItemId::from_uuid(line.try_get::<Uuid, _>("merch_item_id")?),
                name: line.try_get("name")?,
                unit_price: Money::from_minor(line.try_get("unit_price_minor")?),
                quantity: to_u32("quantity", line.try_get("quantity")?)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Order {
        id: OrderId::from_uuid(id),
        external_payment_reference: row.try_get("external_payment_reference")?,
        processor: parse("processor", row.try_get("processor")?)?,
        customer_email: row.try_get("customer_email")?,
        customer_name: row.try_get("customer_name")?,
        lines,
        total_amount: Money::from_minor(row.try_get("total_minor")?),
        status: parse("status", row.try_get("status")?)?,
        created_at: row.try_get("created_at")?,
    })
}

async fn fetch_order_by_reference(
    conn: &mut PgConnection,
    reference: &str,
) -> Result<Option<Order>> {
    let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE external_payment_reference = $1");
    let row = sqlx::query(&sql)
        .bind(reference)
        .fetch_optional(&mut *conn)
        .await?;

    match row {
        Some(row) => Ok(Some(complete_order(conn, row).await?)),
        None => Ok(None),
    }
}

async fn write_event(conn: &mut PgConnection, event: &Event) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE events
        SET title = $2, starts_at = $3, venue = $4, location = $5, description = $6,
            total_seats = $7, status = $8
        WHERE id = $1
        "#,
    )
    .bind(event.id.as_uuid())
    .bind(&event.title)
    .bind(event.starts_at)
    .bind(&event.venue)
    .bind(&event.location)
    .bind(&event.description)
    .bind(to_i32("total_seats", event.total_seats)?)
    .bind(event.status.as_str())
    .execute(conn)
    .await?;
    Ok(())
}

async fn write_merch_item(conn: &mut PgConnection, item: &MerchItem) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE merch_items
        SET name = $2, description = $3, price_minor = $4, stock = $5, category = $6
        WHERE id = $1
        "#,
    )
    .bind(item.id.as_uuid())
    .bind(&item.name)
    .bind(&item.description)
    .bind(item.price.minor())
    .bind(to_i32("stock", item.stock)?)
    .bind(&item.category)
    .execute(conn)
    .await?;
    Ok(())
}

/// Transaction over a [`PostgresStore`]. Dropping it rolls back.
pub struct PostgresTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTx for PostgresTx {
    async fn lock_event(&mut self, id: EventId) -> Result<Option<Event>> {
        fetch_event(&mut self.tx, id, true).await
    }

    async fn record_booking(
        &mut self,
        id: EventId,
        seats_taken: u32,
        status: EventStatus,
    ) -> Result<()> {
        let result = sqlx::query("UPDATE events SET seats_taken = $2, status = $3 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(to_i32("seats_taken", seats_taken)?)
            .bind(status.as_str())
            .execute(&mut *self.tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("event", id));
        }
        Ok(())
    }

    async fn insert_reservation(&mut self, reservation: &Reservation) -> Result<()> {
        let sql = format!(
            "INSERT INTO reservations ({RESERVATION_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)"
        );
        sqlx::query(&sql)
            .bind(reservation.id.as_uuid())
            .bind(reservation.event_id.as_uuid())
            .bind(&reservation.requester.name)
            .bind(&reservation.requester.email)
            .bind(&reservation.requester.phone)
            .bind(reservation.kind.as_str())
            .bind(to_i32("seats", reservation.seats)?)
            .bind(reservation.status.as_str())
            .bind(&reservation.social.instagram)
            .bind(&reservation.social.twitter)
            .bind(&reservation.social.role)
            .bind(&reservation.social.referral)
            .bind(reservation.created_at)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn lock_payment_reference(&mut self, reference: &str) -> Result<()> {
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
            .bind(reference)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn find_order_by_reference(&mut self, reference: &str) -> Result<Option<Order>> {
        fetch_order_by_reference(&mut self.tx, reference).await
    }

    async fn lock_merch_item(&mut self, id: MerchItemId) -> Result<Option<MerchItem>> {
        fetch_merch_item(&mut self.tx, id, true).await
    }

    async fn set_stock(&mut self, id: MerchItemId, stock: u32) -> Result<()> {
        let result = sqlx::query("UPDATE merch_items SET stock = $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(to_i32("stock", stock)?)
            .execute(&mut *self.tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("merch item", id));
        }
        Ok(())
    }

    async fn insert_order(&mut self, order: &Order) -> Result<()> {
        let sql = format!(
            "INSERT INTO orders ({ORDER_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)"
        );
        sqlx::query(&sql)
            .bind(order.id.as_uuid())
            .bind(&order.external_payment_reference)
            .bind(order.processor.as_str())
            .bind(&order.customer_email)
            .bind(&order.customer_name)
            .bind(order.total_amount.minor())
            .bind(order.status.as_str())
            .bind(order.created_at)
            .execute(&mut *self.tx)
            .await?;

        for (position, line) in order.lines.iter().enumerate() {
            let position = i32::try_from(position)
                .map_err(|_| StoreError::Invariant("too many order lines".to_string()))?;
            sqlx::query(
                r#"
                INSERT INTO order_lines
                    (order_id, position, merch_item_id, name, unit_price_minor, quantity)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(order.id.as_uuid())
            .bind(position)
            .bind(line.merch_item_id.as_uuid())
            .bind(&line.name)
            .bind(line.unit_price.minor())
            .bind(to_i32("quantity", line.quantity)?)
            .execute(&mut *self.tx)
            .await?;
        }
        Ok(())
    }

    async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl Store for PostgresStore {
    type Tx = PostgresTx;

    async fn begin(&self) -> Result<PostgresTx> {
        Ok(PostgresTx {
            tx: self.begin_tx().await?,
        })
    }

    async fn get_event(&self, id: EventId) -> Result<Option<Event>> {
        let mut conn = self.pool.acquire().await?;
        fetch_event(&mut conn, id, false).await
    }

    async fn create_event(&self, event: &Event) -> Result<()> {
        let sql = format!(
            "INSERT INTO events ({EVENT_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"
        );
        sqlx::query(&sql)
            .bind(event.id.as_uuid())
            .bind(&event.title)
            .bind(event.starts_at)
            .bind(&event.venue)
            .bind(&event.location)
            .bind(&event.description)
            .bind(to_i32("total_seats", event.total_seats)?)
            .bind(to_i32("seats_taken", event.seats_taken)?)
            .bind(event.status.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update_event(&self, id: EventId, update: EventUpdate) -> Result<Event> {
        let mut tx = self.begin_tx().await?;
        let mut event = fetch_event(&mut tx, id, true)
            .await?
            .ok_or_else(|| StoreError::not_found("event", id))?;

        event.apply_update(update)?;
        write_event(&mut tx, &event).await?;
        tx.commit().await?;
        Ok(event)
    }

    async fn get_merch_item(&self, id: MerchItemId) -> Result<Option<MerchItem>> {
        let mut conn = self.pool.acquire().await?;
        fetch_merch_item(&mut conn, id, false).await
    }

    async fn create_merch_item(&self, item: &MerchItem) -> Result<()> {
        let sql =
            format!("INSERT INTO merch_items ({MERCH_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6)");
        sqlx::query(&sql)
            .bind(item.id.as_uuid())
            .bind(&item.name)
            .bind(&item.description)
            .bind(item.price.minor())
            .bind(to_i32("stock", item.stock)?)
            .bind(&item.category)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update_merch_item(
        &self,
        id: MerchItemId,
        update: MerchItemUpdate,
    ) -> Result<MerchItem> {
        let mut tx = self.begin_tx().await?;
        let mut item = fetch_merch_item(&mut tx, id, true)
            .await?
            .ok_or_else(|| StoreError::not_found("merch item", id))?;

        item.apply_update(update)?;
        write_merch_item(&mut tx, &item).await?;
        tx.commit().await?;
        Ok(item)
    }

    async fn get_reservation(&self, id: ReservationId) -> Result<Option<Reservation>> {
        let sql = format!("SELECT {RESERVATION_COLUMNS} FROM reservations WHERE id = $1");
        sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .map(row_to_reservation)
            .transpose()
    }

    async fn list_reservations(&self, event_id: EventId) -> Result<Vec<Reservation>> {
        let sql = format!(
            "SELECT {RESERVATION_COLUMNS} FROM reservations \
             WHERE event_id = $1 ORDER BY created_at ASC, id ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(event_id.as_uuid())
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(row_to_reservation).collect()
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        let mut conn = self.pool.acquire().await?;
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&mut *conn)
            .await?;

        match row {
            Some(row) => Ok(Some(complete_order(&mut conn, row).await?)),
            None => Ok(None),
        }
    }

    async fn find_order_by_reference(&self, reference: &str) -> Result<Option<Order>> {
        let mut conn = self.pool.acquire().await?;
        fetch_order_by_reference(&mut conn, reference).await
    }
}
