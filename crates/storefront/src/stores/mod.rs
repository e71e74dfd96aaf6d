//! Persistence targets for the cart engine.
//!
//! # Stores
//!
//! - [`LocalStore`] - synchronous, best-effort slots that survive reloads
//!   (one per signed-in user, one for guests). Never fails: unreadable data
//!   reads as absent and failed writes are logged and dropped.
//! - [`RemoteCartStore`] - the authoritative per-user cart document with
//!   point reads, merge-writes and change subscriptions.
//! - [`OrderStore`] - placed orders and per-owner history.
//!
//! Each contract has an in-memory implementation for tests and local
//! development, plus a durable one (`FileLocalStore`, `PgCartStore`,
//! `PgOrderStore`).

pub mod local;
pub mod memory;
pub mod orders;
pub mod postgres;
pub mod remote;

pub use local::{FileLocalStore, LocalStore, MemoryLocalStore};
pub use memory::{MemoryCartStore, MemoryOrderStore};
pub use orders::OrderStore;
pub use postgres::{PgCartStore, PgOrderStore};
pub use remote::{CartDocument, CartSubscription, RemoteCartStore, SnapshotEvent};

use thiserror::Error;

/// Errors raised by remote stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Stored payload could not be decoded.
    #[error("Malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Stored row holds a value the domain types reject.
    #[error("Data corruption: {0}")]
    DataCorruption(String),

    /// The store is unreachable (used by in-memory doubles to simulate outages).
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// The change feed ended unexpectedly.
    #[error("Subscription closed")]
    SubscriptionClosed,
}
