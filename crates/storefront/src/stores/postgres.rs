//! `PostgreSQL`-backed stores.
//!
//! # Tables
//!
//! - `storefront.carts` - one row per signed-in user; `items` is JSONB. A
//!   trigger publishes `NOTIFY cart_changed, '<user_id>'` on every change.
//!   One listener connection per store fans those out to every
//!   [`PgCartStore::subscribe`] stream.
//! - `storefront.orders` - placed orders, indexed by owner.
//!
//! Queries are checked at runtime so the crate builds without a live
//! database.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgListener, PgRow};
use sqlx::{PgPool, Row};
use tokio::sync::{OnceCell, broadcast, mpsc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use zenro_core::{
    CartLine, CheckoutTotals, Email, Money, OrderId, OrderOwner, OrderRecord, OrderStatus,
    PaymentMethod, UserId, VisitorId,
};

use super::StoreError;
use super::orders::OrderStore;
use super::remote::{CartDocument, CartSubscription, RemoteCartStore, SnapshotEvent};

/// Notification channel raised by the `storefront.carts` trigger.
pub const CART_CHANGED_CHANNEL: &str = "cart_changed";

/// Buffered events per subscription.
const SUBSCRIPTION_BUFFER: usize = 16;

/// Buffered notifications on the shared change feed.
const CHANGE_FEED_CAPACITY: usize = 1024;

/// Pause before retrying a failed change feed connection.
const CHANGE_FEED_RETRY: Duration = Duration::from_secs(1);

// =============================================================================
// Cart store
// =============================================================================

/// A notification on the shared change feed.
#[derive(Debug, Clone, PartialEq, Eq)]
enum CartChange {
    /// The cart of this user id changed.
    User(String),
    /// The listener reconnected; notifications may have been missed.
    Resync,
}

#[derive(Debug)]
struct ChangeFeed {
    changes: broadcast::Sender<CartChange>,
    started: OnceCell<()>,
}

/// Remote cart store over `storefront.carts`.
///
/// Subscriptions share a single `LISTEN` connection, started on the first
/// [`RemoteCartStore::subscribe`], so open subscriptions do not hold pool
/// connections.
#[derive(Debug, Clone)]
pub struct PgCartStore {
    pool: PgPool,
    feed: Arc<ChangeFeed>,
}

impl PgCartStore {
    /// Create a store on an existing pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Self {
            pool,
            feed: Arc::new(ChangeFeed {
                changes,
                started: OnceCell::new(),
            }),
        }
    }

    /// Receiver on the shared change feed, starting the listener if needed.
    ///
    /// The receiver is created before the listener is confirmed, so every
    /// notification after a successful return is delivered.
    async fn change_feed(&self) -> Result<broadcast::Receiver<CartChange>, StoreError> {
        let changes = self.feed.changes.subscribe();
        self.feed
            .started
            .get_or_try_init(|| async {
                let mut listener = PgListener::connect_with(&self.pool).await?;
                listener.listen(CART_CHANGED_CHANNEL).await?;
                tokio::spawn(run_change_feed(listener, self.feed.changes.clone()));
                info!(channel = CART_CHANGED_CHANNEL, "Started cart change feed");
                Ok::<_, StoreError>(())
            })
            .await?;
        Ok(changes)
    }
}

/// Forward `cart_changed` notifications to the broadcast channel.
///
/// A dropped connection is re-established by the listener on the next
/// receive; subscribers are told to re-read since changes may have been
/// missed meanwhile.
async fn run_change_feed(mut listener: PgListener, changes: broadcast::Sender<CartChange>) {
    loop {
        match listener.try_recv().await {
            Ok(Some(notification)) => {
                let _ = changes.send(CartChange::User(notification.payload().to_owned()));
            }
            Ok(None) => {
                warn!("Cart change feed connection lost, reconnecting");
                let _ = changes.send(CartChange::Resync);
            }
            Err(e) => {
                warn!(error = %e, "Cart change feed failed, retrying");
                tokio::time::sleep(CHANGE_FEED_RETRY).await;
                let _ = changes.send(CartChange::Resync);
            }
        }
    }
}

/// Deliver the initial read, then a fresh read whenever `user_id`'s cart
/// may have changed. Returns once the subscriber or the feed is gone.
async fn follow_changes<R, Fut>(
    mut changes: broadcast::Receiver<CartChange>,
    user_id: &UserId,
    events: &mpsc::Sender<SnapshotEvent>,
    read: R,
) where
    R: Fn() -> Fut,
    Fut: Future<Output = SnapshotEvent>,
{
    if events.send(read().await).await.is_err() {
        return;
    }

    loop {
        let reread = match changes.recv().await {
            Ok(CartChange::User(changed)) => changed == user_id.as_str(),
            Ok(CartChange::Resync) => true,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                debug!(%user_id, skipped, "Cart change feed lagged, re-reading");
                true
            }
            Err(broadcast::error::RecvError::Closed) => return,
        };
        if reread && events.send(read().await).await.is_err() {
            return;
        }
    }
}

#[async_trait]
impl RemoteCartStore for PgCartStore {
    async fn read_once(&self, user_id: &UserId) -> Result<Option<CartDocument>, StoreError> {
        let row: Option<(serde_json::Value, DateTime<Utc>)> = sqlx::query_as(
            r"
            SELECT items, updated_at
            FROM storefront.carts
            WHERE user_id = $1
            ",
        )
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some((items, updated_at)) => Ok(Some(CartDocument {
                items: serde_json::from_value(items)?,
                updated_at: Some(updated_at),
            })),
            None => Ok(None),
        }
    }

    async fn subscribe(&self, user_id: &UserId) -> Result<CartSubscription, StoreError> {
        // Joined before the initial read so a change landing in between is
        // still delivered.
        let changes = self.change_feed().await?;

        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let store = self.clone();
        let user_id = user_id.clone();

        let producer = tokio::spawn(async move {
            follow_changes(changes, &user_id, &tx, || store.read_once(&user_id)).await;
        });

        debug!(channel = CART_CHANGED_CHANNEL, "Opened cart subscription");
        Ok(CartSubscription::new(rx, producer.abort_handle()))
    }

    async fn merge_write(&self, user_id: &UserId, items: &[CartLine]) -> Result<(), StoreError> {
        let items = serde_json::to_value(items)?;

        sqlx::query(
            r"
            INSERT INTO storefront.carts (user_id, items, updated_at)
            VALUES ($1, $2, now())
            ON CONFLICT (user_id) DO UPDATE
            SET items = EXCLUDED.items,
                updated_at = EXCLUDED.updated_at
            ",
        )
        .bind(user_id.as_str())
        .bind(items)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

// =============================================================================
// Order store
// =============================================================================

/// Order history over `storefront.orders`.
#[derive(Debug, Clone)]
pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    /// Create a store on an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Split an owner into its `(owner_kind, owner_id)` columns.
fn owner_columns(owner: &OrderOwner) -> (&'static str, String) {
    match owner {
        OrderOwner::User(id) => ("user", id.as_str().to_owned()),
        OrderOwner::Visitor(id) => ("visitor", id.to_string()),
    }
}

/// Rebuild an owner from its columns.
fn owner_from_columns(kind: &str, id: &str) -> Result<OrderOwner, StoreError> {
    match kind {
        "user" => Ok(OrderOwner::User(UserId::new(id))),
        "visitor" => Uuid::parse_str(id)
            .map(|uuid| OrderOwner::Visitor(VisitorId::from_uuid(uuid)))
            .map_err(|e| StoreError::DataCorruption(format!("invalid visitor id in orders: {e}"))),
        other => Err(StoreError::DataCorruption(format!(
            "unknown order owner kind: {other}"
        ))),
    }
}

fn order_from_row(row: &PgRow) -> Result<OrderRecord, StoreError> {
    let kind: String = row.try_get("owner_kind")?;
    let owner_id: String = row.try_get("owner_id")?;
    let email: String = row.try_get("email")?;
    let lines: serde_json::Value = row.try_get("lines")?;
    let payment_method: String = row.try_get("payment_method")?;
    let status: String = row.try_get("status")?;

    let email = Email::parse(&email)
        .map_err(|e| StoreError::DataCorruption(format!("invalid email in orders: {e}")))?;
    let payment_method = PaymentMethod::parse(&payment_method).ok_or_else(|| {
        StoreError::DataCorruption(format!("unknown payment method: {payment_method}"))
    })?;
    let status = OrderStatus::parse(&status)
        .ok_or_else(|| StoreError::DataCorruption(format!("unknown order status: {status}")))?;

    Ok(OrderRecord {
        id: OrderId::from_uuid(row.try_get("id")?),
        owner: owner_from_columns(&kind, &owner_id)?,
        placed_at: row.try_get("placed_at")?,
        full_name: row.try_get("full_name")?,
        email,
        lines: serde_json::from_value(lines)?,
        totals: CheckoutTotals {
            subtotal: Money::new(row.try_get::<Decimal, _>("subtotal")?),
            shipping: Money::new(row.try_get::<Decimal, _>("shipping")?),
            tax: Money::new(row.try_get::<Decimal, _>("tax")?),
            total: Money::new(row.try_get::<Decimal, _>("total")?),
        },
        payment_method,
        status,
    })
}

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn record(&self, order: &OrderRecord) -> Result<(), StoreError> {
        let (owner_kind, owner_id) = owner_columns(&order.owner);
        let lines = serde_json::to_value(&order.lines)?;

        sqlx::query(
            r"
            INSERT INTO storefront.orders (
                id, owner_kind, owner_id, placed_at, full_name, email, lines,
                subtotal, shipping, tax, total, payment_method, status
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ",
        )
        .bind(order.id.as_uuid())
        .bind(owner_kind)
        .bind(owner_id)
        .bind(order.placed_at)
        .bind(&order.full_name)
        .bind(order.email.as_str())
        .bind(lines)
        .bind(order.totals.subtotal.amount())
        .bind(order.totals.shipping.amount())
        .bind(order.totals.tax.amount())
        .bind(order.totals.total.amount())
        .bind(order.payment_method.as_str())
        .bind(order.status.as_str())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_for(&self, owner: &OrderOwner) -> Result<Vec<OrderRecord>, StoreError> {
        let (owner_kind, owner_id) = owner_columns(owner);

        let rows = sqlx::query(
            r"
            SELECT id, owner_kind, owner_id, placed_at, full_name, email, lines,
                   subtotal, shipping, tax, total, payment_method, status
            FROM storefront.orders
            WHERE owner_kind = $1 AND owner_id = $2
            ORDER BY placed_at DESC
            ",
        )
        .bind(owner_kind)
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(order_from_row).collect()
    }
}
