//! Order placement.
//!
//! Checkout reads the engine's cart, validates the form, prices the order,
//! records it and then settles the cart through the engine: the ordered
//! lines are taken out, and anything added while the order was being
//! recorded stays. An emptied cart is persisted before the confirmation is
//! returned.

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info, instrument};

use zenro_core::{
    CheckoutForm, CheckoutTotals, FieldError, Money, OrderId, OrderOwner, OrderRecord,
    OrderStatus, PaymentMethod, Session, VisitorId,
};

use crate::cart::CartEngine;
use crate::stores::{OrderStore, StoreError};

/// Why an order could not be placed.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("Your cart is empty")]
    EmptyCart,

    #[error("Checkout form has {} invalid field(s)", .0.len())]
    Invalid(Vec<FieldError>),

    #[error("Could not record order: {0}")]
    Store(#[from] StoreError),
}

/// Who owns an order placed in `session` by `visitor`.
#[must_use]
pub fn owner_for(session: &Session, visitor: VisitorId) -> OrderOwner {
    session
        .user_id()
        .map_or(OrderOwner::Visitor(visitor), |id| OrderOwner::User(id.clone()))
}

/// Payment authorisation. The gateway is not integrated; every method is
/// accepted as authorised.
fn authorize_payment(method: PaymentMethod, total: Money) {
    debug!(method = method.as_str(), %total, "Payment authorised");
}

/// Place an order for the engine's current cart.
///
/// # Errors
///
/// Returns [`CheckoutError::EmptyCart`] for an empty cart,
/// [`CheckoutError::Invalid`] with every failing field, or
/// [`CheckoutError::Store`] if the order could not be recorded. The ordered
/// lines leave the cart only once the order is recorded.
#[instrument(skip_all, fields(payment_method = form.payment_method.as_str()))]
pub async fn place_order(
    engine: &CartEngine,
    orders: &dyn OrderStore,
    owner: OrderOwner,
    form: &CheckoutForm,
) -> Result<OrderRecord, CheckoutError> {
    let cart = engine.cart();
    if cart.is_empty() {
        return Err(CheckoutError::EmptyCart);
    }
    let email = form.validate().map_err(CheckoutError::Invalid)?;
    let totals = CheckoutTotals::for_cart(&cart);

    authorize_payment(form.payment_method, totals.total);

    let order = OrderRecord {
        id: OrderId::generate(),
        owner,
        placed_at: Utc::now(),
        full_name: form.full_name.trim().to_owned(),
        email,
        lines: cart.to_vec(),
        totals,
        payment_method: form.payment_method,
        status: OrderStatus::Pending,
    };
    orders.record(&order).await?;
    engine.settle(&cart).await;

    info!(order_id = %order.id, total = %order.totals.total, "Order placed");
    Ok(order)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::cart::{EngineConfig, SyncContext};
    use crate::stores::{LocalStore, MemoryCartStore, MemoryLocalStore, MemoryOrderStore};
    use zenro_core::{ProductSnapshot, SlotKey};

    fn form() -> CheckoutForm {
        CheckoutForm {
            full_name: " Ada Obi ".to_owned(),
            email: "ada@zenro.ng".to_owned(),
            phone: "08030000000".to_owned(),
            address: "12 Admiralty Way".to_owned(),
            city: "Lekki".to_owned(),
            state: "Lagos".to_owned(),
            postal_code: "106104".to_owned(),
            ..CheckoutForm::default()
        }
    }

    fn engine(local: Arc<MemoryLocalStore>) -> CartEngine {
        CartEngine::new(
            SyncContext::new(local, Arc::new(MemoryCartStore::new())),
            EngineConfig::default(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_place_order_records_and_clears() {
        let local = Arc::new(MemoryLocalStore::new());
        let engine = engine(local.clone());
        let orders = MemoryOrderStore::new();
        let tee = ProductSnapshot::new("1", "ZenRo Classic Tee", Money::from_units(39_500));
        engine.add_item(&tee, Some("M"), 2.0);

        let visitor = VisitorId::generate();
        let owner = owner_for(&Session::Guest, visitor);
        let order = place_order(&engine, &orders, owner.clone(), &form())
            .await
            .unwrap();

        assert_eq!(order.full_name, "Ada Obi");
        assert_eq!(order.totals.total, Money::from_units(88_425));
        assert_eq!(order.lines.len(), 1);
        assert!(engine.cart().is_empty());
        assert_eq!(local.read(&SlotKey::Guest), Some(Vec::new()));
        assert_eq!(orders.list_for(&owner).await.unwrap().len(), 1);
    }

    /// Adds an item to the cart while the order is being recorded.
    struct ShopperKeepsBrowsing {
        engine: CartEngine,
        orders: MemoryOrderStore,
    }

    #[async_trait::async_trait]
    impl OrderStore for ShopperKeepsBrowsing {
        async fn record(&self, order: &OrderRecord) -> Result<(), StoreError> {
            let pant = ProductSnapshot::new("2", "Cargo Pant", Money::from_units(52_000));
            self.engine.add_item(&pant, Some("32"), 1.0);
            self.orders.record(order).await
        }

        async fn list_for(&self, owner: &OrderOwner) -> Result<Vec<OrderRecord>, StoreError> {
            self.orders.list_for(owner).await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_items_added_during_checkout_stay_in_cart() {
        let local = Arc::new(MemoryLocalStore::new());
        let engine = engine(local.clone());
        let tee = ProductSnapshot::new("1", "ZenRo Classic Tee", Money::from_units(39_500));
        engine.add_item(&tee, Some("M"), 1.0);
        let orders = ShopperKeepsBrowsing {
            engine: engine.clone(),
            orders: MemoryOrderStore::new(),
        };

        let order = place_order(
            &engine,
            &orders,
            OrderOwner::Visitor(VisitorId::generate()),
            &form(),
        )
        .await
        .unwrap();

        assert_eq!(order.lines.len(), 1);
        let cart = engine.cart();
        assert_eq!(cart.len(), 1);
        assert_eq!(cart.lines()[0].product_id.as_str(), "2");
        assert_eq!(local.read(&SlotKey::Guest).map(|lines| lines.len()), Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_cart_is_rejected() {
        let engine = engine(Arc::new(MemoryLocalStore::new()));
        let orders = MemoryOrderStore::new();

        let err = place_order(
            &engine,
            &orders,
            OrderOwner::Visitor(VisitorId::generate()),
            &form(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, CheckoutError::EmptyCart));
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_form_keeps_cart() {
        let engine = engine(Arc::new(MemoryLocalStore::new()));
        let orders = MemoryOrderStore::new();
        let tee = ProductSnapshot::new("1", "Tee", Money::from_units(10_000));
        engine.add_item(&tee, None, 1.0);

        let bad = CheckoutForm {
            email: "not-an-email".to_owned(),
            city: String::new(),
            ..form()
        };
        let err = place_order(
            &engine,
            &orders,
            OrderOwner::Visitor(VisitorId::generate()),
            &bad,
        )
        .await
        .unwrap_err();

        let CheckoutError::Invalid(fields) = err else {
            panic!("expected validation failure");
        };
        let names: Vec<_> = fields.iter().map(|f| f.field).collect();
        assert_eq!(names, vec!["email", "city"]);
        assert_eq!(engine.cart_count(), 1);
    }

    #[test]
    fn test_owner_follows_session() {
        let visitor = VisitorId::generate();
        assert_eq!(
            owner_for(&Session::Guest, visitor),
            OrderOwner::Visitor(visitor)
        );
        let user = Session::User(zenro_core::Identity::new("u1"));
        assert_eq!(
            owner_for(&user, visitor),
            OrderOwner::User(zenro_core::UserId::new("u1"))
        );
    }
}
