//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::StorefrontConfig;
use crate::registry::CartRegistry;
use crate::stores::{
    MemoryCartStore, MemoryOrderStore, OrderStore, PgCartStore, PgOrderStore, RemoteCartStore,
};

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like the cart registry and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: Option<PgPool>,
    carts: CartRegistry,
    orders: Arc<dyn OrderStore>,
}

impl AppState {
    /// Create application state.
    ///
    /// With a pool, carts and orders are stored in `PostgreSQL`; without
    /// one they are kept in process memory.
    #[must_use]
    pub fn new(config: StorefrontConfig, pool: Option<PgPool>) -> Self {
        let (remote, orders): (Arc<dyn RemoteCartStore>, Arc<dyn OrderStore>) = match &pool {
            Some(pool) => (
                Arc::new(PgCartStore::new(pool.clone())),
                Arc::new(PgOrderStore::new(pool.clone())),
            ),
            None => (
                Arc::new(MemoryCartStore::new()),
                Arc::new(MemoryOrderStore::new()),
            ),
        };
        Self::with_stores(config, pool, remote, orders)
    }

    /// Create application state over explicit stores.
    #[must_use]
    pub fn with_stores(
        config: StorefrontConfig,
        pool: Option<PgPool>,
        remote: Arc<dyn RemoteCartStore>,
        orders: Arc<dyn OrderStore>,
    ) -> Self {
        let carts = CartRegistry::new(
            config.data_dir.clone(),
            remote,
            config.cart.engine_config(),
            config.cart.engine_idle,
        );

        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                carts,
                orders,
            }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get the database connection pool, if one is configured.
    #[must_use]
    pub fn pool(&self) -> Option<&PgPool> {
        self.inner.pool.as_ref()
    }

    /// Get the per-visitor cart engines.
    #[must_use]
    pub fn carts(&self) -> &CartRegistry {
        &self.inner.carts
    }

    /// Get the order store.
    #[must_use]
    pub fn orders(&self) -> &dyn OrderStore {
        self.inner.orders.as_ref()
    }
}
