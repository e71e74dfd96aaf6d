//! One cart engine per browser visitor.
//!
//! Engines are created on first use and cached with an idle timeout. An
//! evicted engine is shut down: its identity listener, pending write timer
//! and remote subscription are cancelled. Its cart survives in the
//! visitor's local slot files and, for signed-in users, the remote store.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use moka::notification::RemovalCause;
use tracing::debug;

use zenro_core::VisitorId;

use crate::cart::{CartEngine, EngineConfig, SyncContext};
use crate::identity::WatchIdentityProvider;
use crate::stores::{FileLocalStore, RemoteCartStore};

/// Upper bound on live engines.
const MAX_ENGINES: u64 = 10_000;

/// A visitor's engine and the identity provider feeding it.
#[derive(Debug, Clone)]
pub struct VisitorCart {
    pub engine: CartEngine,
    pub identity: WatchIdentityProvider,
}

/// Cache of per-visitor engines.
#[derive(Clone)]
pub struct CartRegistry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    engines: Cache<VisitorId, VisitorCart>,
    data_dir: PathBuf,
    remote: Arc<dyn RemoteCartStore>,
    engine_config: EngineConfig,
}

impl CartRegistry {
    /// Create a registry.
    ///
    /// Each visitor's local slots live under `data_dir/<visitor id>/`.
    #[must_use]
    pub fn new(
        data_dir: impl Into<PathBuf>,
        remote: Arc<dyn RemoteCartStore>,
        engine_config: EngineConfig,
        idle: Duration,
    ) -> Self {
        let engines = Cache::builder()
            .max_capacity(MAX_ENGINES)
            .time_to_idle(idle)
            .eviction_listener(|visitor: Arc<VisitorId>, cart: VisitorCart, cause: RemovalCause| {
                debug!(visitor = %visitor, ?cause, "Shutting down visitor cart engine");
                cart.engine.shutdown();
            })
            .build();

        Self {
            inner: Arc::new(RegistryInner {
                engines,
                data_dir: data_dir.into(),
                remote,
                engine_config,
            }),
        }
    }

    /// The visitor's engine, created and attached on first use.
    pub async fn get(&self, visitor: VisitorId) -> VisitorCart {
        self.inner
            .engines
            .get_with(visitor, async { self.create(visitor) })
            .await
    }

    /// Drop a visitor's engine.
    pub async fn evict(&self, visitor: VisitorId) {
        self.inner.engines.invalidate(&visitor).await;
    }

    /// Number of cached engines (approximate until pending maintenance runs).
    #[must_use]
    pub fn len(&self) -> u64 {
        self.inner.engines.entry_count()
    }

    /// Whether no engines are cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn create(&self, visitor: VisitorId) -> VisitorCart {
        let local = FileLocalStore::new(self.inner.data_dir.join(visitor.to_string()));
        let ctx = SyncContext::new(Arc::new(local), Arc::clone(&self.inner.remote));
        let engine = CartEngine::new(ctx, self.inner.engine_config.clone());
        let identity = WatchIdentityProvider::default();
        engine.attach(&identity);

        debug!(%visitor, "Created visitor cart engine");
        VisitorCart { engine, identity }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::stores::MemoryCartStore;
    use zenro_core::{Money, ProductSnapshot};

    fn registry(dir: &std::path::Path) -> CartRegistry {
        CartRegistry::new(
            dir,
            Arc::new(MemoryCartStore::new()),
            EngineConfig::default(),
            Duration::from_secs(60),
        )
    }

    fn tee() -> ProductSnapshot {
        ProductSnapshot::new("1", "Tee", Money::from_units(10_000))
    }

    #[tokio::test]
    async fn test_same_visitor_shares_engine() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(dir.path());
        let visitor = VisitorId::generate();

        registry.get(visitor).await.engine.add_item(&tee(), None, 1.0);
        assert_eq!(registry.get(visitor).await.engine.cart_count(), 1);
        assert_eq!(registry.get(VisitorId::generate()).await.engine.cart_count(), 0);
    }

    #[tokio::test]
    async fn test_evicted_engine_reloads_from_local_slot() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(dir.path());
        let visitor = VisitorId::generate();

        registry.get(visitor).await.engine.add_item(&tee(), None, 2.0);
        registry.evict(visitor).await;

        assert_eq!(registry.get(visitor).await.engine.cart_count(), 2);
    }
}
