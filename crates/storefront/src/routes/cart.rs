//! Cart route handlers.
//!
//! Every handler works on the visitor's [`CurrentCart`] and answers with
//! the resulting [`CartView`]. Invalid mutations (quantity below 1, a line
//! that does not exist) are not errors: the unchanged cart is returned.

use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use zenro_core::{CartLine, CurrencyCode, Money, ProductId, ProductSnapshot};

use crate::cart::{CartSnapshot, SyncErrorKind};
use crate::error::add_breadcrumb;
use crate::middleware::CurrentCart;

/// Cart as returned to the client.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartView {
    pub items: Vec<CartLine>,
    pub count: u64,
    pub subtotal: Money,
    pub subtotal_display: String,
    pub signed_in: bool,
    pub syncing: bool,
    pub hydrating: bool,
    pub last_error: Option<SyncErrorKind>,
    /// Advisory message for the last error, if it should be shown.
    pub banner: Option<String>,
}

impl From<CartSnapshot> for CartView {
    fn from(snapshot: CartSnapshot) -> Self {
        let subtotal = snapshot.cart.subtotal();
        let banner = snapshot
            .last_error
            .filter(|kind| *kind == SyncErrorKind::RemoteHydrationFailed)
            .map(|kind| kind.to_string());

        Self {
            count: snapshot.count,
            subtotal,
            subtotal_display: subtotal.display(CurrencyCode::default()),
            signed_in: !snapshot.session.is_guest(),
            syncing: snapshot.syncing,
            hydrating: snapshot.hydrating,
            last_error: snapshot.last_error,
            banner,
            items: snapshot.cart.into_lines(),
        }
    }
}

/// Add-to-cart request.
#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub product: ProductSnapshot,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub quantity: Option<f64>,
}

/// Quantity update request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateItemRequest {
    pub product_id: ProductId,
    #[serde(default)]
    pub size: Option<String>,
    pub quantity: i64,
}

/// Line removal request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveItemRequest {
    pub product_id: ProductId,
    #[serde(default)]
    pub size: Option<String>,
}

/// Show the cart.
#[instrument(skip_all, fields(visitor = %cart.visitor))]
pub async fn show(cart: CurrentCart) -> Json<CartView> {
    Json(cart.engine.snapshot().into())
}

/// Add an item.
#[instrument(skip_all, fields(visitor = %cart.visitor, product_id = %request.product.id))]
pub async fn add(cart: CurrentCart, Json(request): Json<AddItemRequest>) -> Json<CartView> {
    add_breadcrumb(
        "cart",
        "Added item",
        Some(&[("product_id", request.product.id.as_str())]),
    );
    let snapshot = cart.engine.add_item(
        &request.product,
        request.size.as_deref(),
        request.quantity.unwrap_or(1.0),
    );
    Json(snapshot.into())
}

/// Set a line's quantity.
#[instrument(skip_all, fields(visitor = %cart.visitor, product_id = %request.product_id))]
pub async fn update(cart: CurrentCart, Json(request): Json<UpdateItemRequest>) -> Json<CartView> {
    let snapshot =
        cart.engine
            .update_quantity(&request.product_id, request.size.as_deref(), request.quantity);
    Json(snapshot.into())
}

/// Remove a line.
#[instrument(skip_all, fields(visitor = %cart.visitor, product_id = %request.product_id))]
pub async fn remove(cart: CurrentCart, Json(request): Json<RemoveItemRequest>) -> Json<CartView> {
    let snapshot = cart
        .engine
        .remove_item(&request.product_id, request.size.as_deref());
    Json(snapshot.into())
}

/// Clear the cart.
#[instrument(skip_all, fields(visitor = %cart.visitor))]
pub async fn clear(cart: CurrentCart) -> Json<CartView> {
    add_breadcrumb("cart", "Cleared cart", None);
    Json(cart.engine.clear().await.into())
}
