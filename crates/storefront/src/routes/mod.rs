//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                 - Liveness check
//! GET    /health/ready           - Readiness check (database ping when configured)
//!
//! # Cart
//! GET    /api/cart               - Cart snapshot
//! DELETE /api/cart               - Clear cart (persisted immediately)
//! POST   /api/cart/items         - Add item
//! PATCH  /api/cart/items         - Set a line's quantity
//! DELETE /api/cart/items         - Remove a line
//!
//! # Checkout
//! POST   /api/checkout           - Place order for the current cart
//! GET    /api/orders             - Order history (signed-in user, else this visitor)
//! ```

pub mod cart;
pub mod checkout;
pub mod health;
pub mod orders;

use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

/// Create the cart API router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show).delete(cart::clear))
        .route(
            "/items",
            post(cart::add).patch(cart::update).delete(cart::remove),
        )
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .nest("/api/cart", cart_routes())
        .route("/api/checkout", post(checkout::place))
        .route("/api/orders", get(orders::index))
}
