//! Remote cart store contract.
//!
//! One document per signed-in user holds the authoritative server-side cart.
//! Writes have merge semantics: writing `items` never clobbers sibling
//! fields on the same document (creation time, audit columns).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::AbortHandle;

use zenro_core::{CartLine, UserId};

use super::StoreError;

/// The stored cart document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartDocument {
    #[serde(default)]
    pub items: Vec<CartLine>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// One delivery on a cart subscription: the current document, `None` if the
/// user has no document yet, or an error from the change feed.
pub type SnapshotEvent = Result<Option<CartDocument>, StoreError>;

/// Remote per-user cart persistence.
#[async_trait]
pub trait RemoteCartStore: Send + Sync {
    /// Read the user's cart document once.
    async fn read_once(&self, user_id: &UserId) -> Result<Option<CartDocument>, StoreError>;

    /// Open a change subscription on the user's cart document.
    ///
    /// The first event delivered is the document's current state.
    async fn subscribe(&self, user_id: &UserId) -> Result<CartSubscription, StoreError>;

    /// Replace the document's `items`, creating the document if needed.
    async fn merge_write(&self, user_id: &UserId, items: &[CartLine]) -> Result<(), StoreError>;
}

/// A cancellable stream of snapshot events for one cart document.
///
/// Dropping the subscription (or calling [`CartSubscription::stop`]) stops
/// the producer feeding it, so no further events are delivered.
#[derive(Debug)]
pub struct CartSubscription {
    events: mpsc::Receiver<SnapshotEvent>,
    producer: Option<AbortHandle>,
}

impl CartSubscription {
    /// Wrap a receiver fed by the task behind `producer`.
    #[must_use]
    pub const fn new(events: mpsc::Receiver<SnapshotEvent>, producer: AbortHandle) -> Self {
        Self {
            events,
            producer: Some(producer),
        }
    }

    /// Subscription with no producer task (events pushed by the caller).
    #[must_use]
    pub const fn from_receiver(events: mpsc::Receiver<SnapshotEvent>) -> Self {
        Self {
            events,
            producer: None,
        }
    }

    /// Wait for the next event. `None` once the feed has ended.
    pub async fn next(&mut self) -> Option<SnapshotEvent> {
        self.events.recv().await
    }

    /// Stop the subscription.
    pub fn stop(mut self) {
        self.halt();
    }

    fn halt(&mut self) {
        if let Some(producer) = self.producer.take() {
            producer.abort();
        }
        self.events.close();
    }
}

impl Drop for CartSubscription {
    fn drop(&mut self) {
        self.halt();
    }
}
