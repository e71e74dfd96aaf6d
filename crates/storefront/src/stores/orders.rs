//! Order history contract.

use async_trait::async_trait;

use zenro_core::{OrderOwner, OrderRecord};

use super::StoreError;

/// Placed-order persistence.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Persist a newly placed order.
    async fn record(&self, order: &OrderRecord) -> Result<(), StoreError>;

    /// An owner's orders, newest first.
    async fn list_for(&self, owner: &OrderOwner) -> Result<Vec<OrderRecord>, StoreError>;
}
