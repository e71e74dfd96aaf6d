//! Integration tests for the ZenRo cart synchronization engine.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p zenro-integration-tests
//! ```
//!
//! The tests drive [`CartEngine`] against the in-memory remote store and
//! either the in-memory or the file-backed local store, on a paused tokio
//! clock so debounce timing is exact.
//!
//! # Test Categories
//!
//! - `cart_sync` - Cart rules, debounce, hydration and session isolation
//! - `local_mirror` - Reload behaviour over the file-backed local store

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::sync::Arc;

use zenro_core::{Identity, Money, ProductSnapshot, Session};
use zenro_storefront::cart::{CartEngine, EngineConfig, SyncContext};
use zenro_storefront::stores::{LocalStore, MemoryCartStore, MemoryLocalStore};

/// The classic tee used across scenarios (₦39,500).
#[must_use]
pub fn classic_tee() -> ProductSnapshot {
    ProductSnapshot::new("1", "ZenRo Classic Tee", Money::from_units(39_500))
}

/// A second product (₦52,000).
#[must_use]
pub fn cargo_pant() -> ProductSnapshot {
    ProductSnapshot::new("2", "Utility Cargo Pant", Money::from_units(52_000))
}

/// A signed-in session for `user_id`.
#[must_use]
pub fn user(user_id: &str) -> Session {
    Session::User(Identity::new(user_id))
}

/// An engine together with handles on its stores.
pub struct Harness<L: LocalStore + 'static = MemoryLocalStore> {
    pub engine: CartEngine,
    pub local: Arc<L>,
    pub remote: MemoryCartStore,
}

impl<L: LocalStore + 'static> Harness<L> {
    /// Build an engine over `local` and `remote` with `config`.
    pub fn with(local: Arc<L>, remote: MemoryCartStore, config: EngineConfig) -> Self {
        let engine = CartEngine::new(
            SyncContext::new(local.clone(), Arc::new(remote.clone())),
            config,
        );
        Self {
            engine,
            local,
            remote,
        }
    }

    /// A new engine over the same stores, as after a page reload.
    #[must_use]
    pub fn reload(&self) -> Self {
        self.engine.shutdown();
        Self::with(self.local.clone(), self.remote.clone(), EngineConfig::default())
    }

    /// Switch session and wait for hydration to finish.
    pub async fn switch_to(&self, session: Session) {
        self.engine.on_session_change(session.clone());
        self.engine.wait_for_session(&session).await;
    }
}

impl Harness {
    /// Default configuration over fresh in-memory stores.
    #[must_use]
    pub fn new() -> Self {
        Self::with(
            Arc::new(MemoryLocalStore::new()),
            MemoryCartStore::new(),
            EngineConfig::default(),
        )
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}
