//! In-memory store implementations.
//!
//! Used when no database is configured and throughout the test suites. The
//! cart store can simulate outages, slow change feeds and slow writes so the
//! engine's failure and isolation behaviour can be exercised without a
//! database.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{broadcast, mpsc};
use tracing::debug;

use zenro_core::{CartLine, OrderOwner, OrderRecord, UserId};

use super::StoreError;
use super::orders::OrderStore;
use super::remote::{CartDocument, CartSubscription, RemoteCartStore, SnapshotEvent};

/// Capacity of the change-notification channel shared by all subscriptions.
const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// Buffered events per subscription.
const SUBSCRIPTION_BUFFER: usize = 16;

// =============================================================================
// Cart store
// =============================================================================

/// Remote cart store held in process memory.
///
/// Cloning is cheap; clones share the same documents.
#[derive(Debug, Clone)]
pub struct MemoryCartStore {
    inner: Arc<MemoryCartInner>,
}

#[derive(Debug)]
struct MemoryCartInner {
    documents: Mutex<HashMap<UserId, CartDocument>>,
    changes: broadcast::Sender<UserId>,
    writes: Mutex<Vec<(UserId, Vec<CartLine>)>>,
    delivery_delays: Mutex<HashMap<UserId, Duration>>,
    write_latency: Mutex<Duration>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl Default for MemoryCartStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCartStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(MemoryCartInner {
                documents: Mutex::new(HashMap::new()),
                changes,
                writes: Mutex::new(Vec::new()),
                delivery_delays: Mutex::new(HashMap::new()),
                write_latency: Mutex::new(Duration::ZERO),
                fail_reads: AtomicBool::new(false),
                fail_writes: AtomicBool::new(false),
            }),
        }
    }

    /// Write a document as another device would, notifying subscribers.
    ///
    /// Not counted in [`MemoryCartStore::write_count`].
    pub fn put_document(&self, user_id: &UserId, items: Vec<CartLine>) {
        self.store(user_id, items);
    }

    /// The user's current document.
    #[must_use]
    pub fn document(&self, user_id: &UserId) -> Option<CartDocument> {
        self.inner
            .documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(user_id)
            .cloned()
    }

    /// Number of engine writes accepted so far.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.inner
            .writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Every accepted write, in order.
    #[must_use]
    pub fn writes(&self) -> Vec<(UserId, Vec<CartLine>)> {
        self.inner
            .writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Delay every snapshot delivered to `user_id`'s subscriptions.
    pub fn set_delivery_delay(&self, user_id: &UserId, delay: Duration) {
        self.inner
            .delivery_delays
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(user_id.clone(), delay);
    }

    /// Delay every write before it lands.
    pub fn set_write_latency(&self, latency: Duration) {
        *self
            .inner
            .write_latency
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = latency;
    }

    /// Make reads and subscription deliveries fail.
    pub fn set_fail_reads(&self, fail: bool) {
        self.inner.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make writes fail.
    pub fn set_fail_writes(&self, fail: bool) {
        self.inner.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn store(&self, user_id: &UserId, items: Vec<CartLine>) {
        self.inner
            .documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                user_id.clone(),
                CartDocument {
                    items,
                    updated_at: Some(Utc::now()),
                },
            );
        // No receivers is fine: nobody is subscribed.
        let _ = self.inner.changes.send(user_id.clone());
    }

    fn delivery_delay(&self, user_id: &UserId) -> Duration {
        self.inner
            .delivery_delays
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(user_id)
            .copied()
            .unwrap_or_default()
    }

    fn current(&self, user_id: &UserId) -> SnapshotEvent {
        if self.inner.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("cart store offline".to_owned()));
        }
        Ok(self.document(user_id))
    }
}

#[async_trait]
impl RemoteCartStore for MemoryCartStore {
    async fn read_once(&self, user_id: &UserId) -> Result<Option<CartDocument>, StoreError> {
        self.current(user_id)
    }

    async fn subscribe(&self, user_id: &UserId) -> Result<CartSubscription, StoreError> {
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        // Subscribe before spawning so no change between now and the first
        // delivery is missed.
        let mut changes = self.inner.changes.subscribe();
        let store = self.clone();
        let user_id = user_id.clone();

        debug!(%user_id, "Opening in-memory cart subscription");
        let producer = tokio::spawn(async move {
            let delay = store.delivery_delay(&user_id);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            if tx.send(store.current(&user_id)).await.is_err() {
                return;
            }

            loop {
                match changes.recv().await {
                    Ok(changed) if changed != user_id => {}
                    Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {
                        if !delay.is_zero() {
                            tokio::time::sleep(delay).await;
                        }
                        if tx.send(store.current(&user_id)).await.is_err() {
                            return;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        let _ = tx.send(Err(StoreError::SubscriptionClosed)).await;
                        return;
                    }
                }
            }
        });

        Ok(CartSubscription::new(rx, producer.abort_handle()))
    }

    async fn merge_write(&self, user_id: &UserId, items: &[CartLine]) -> Result<(), StoreError> {
        let latency = *self
            .inner
            .write_latency
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        if self.inner.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("cart store offline".to_owned()));
        }

        self.inner
            .writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((user_id.clone(), items.to_vec()));
        self.store(user_id, items.to_vec());
        Ok(())
    }
}

// =============================================================================
// Order store
// =============================================================================

/// Order history held in process memory.
#[derive(Debug, Default)]
pub struct MemoryOrderStore {
    orders: Mutex<Vec<OrderRecord>>,
}

impl MemoryOrderStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn record(&self, order: &OrderRecord) -> Result<(), StoreError> {
        self.orders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(order.clone());
        Ok(())
    }

    async fn list_for(&self, owner: &OrderOwner) -> Result<Vec<OrderRecord>, StoreError> {
        let orders = self.orders.lock().unwrap_or_else(PoisonError::into_inner);
        // Reverse insertion order first so equal timestamps stay newest-first.
        let mut found: Vec<OrderRecord> = orders
            .iter()
            .rev()
            .filter(|order| &order.owner == owner)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.placed_at.cmp(&a.placed_at));
        Ok(found)
    }
}
