//! Checkout route handler.

use axum::{Json, extract::State, http::StatusCode};
use tracing::instrument;

use zenro_core::{CheckoutForm, OrderRecord};

use crate::checkout::{owner_for, place_order};
use crate::error::{Result, add_breadcrumb};
use crate::middleware::CurrentCart;
use crate::state::AppState;

/// Place an order for the visitor's cart.
///
/// Responds `201 Created` with the recorded order. An empty cart is a
/// `400`; an invalid form is a `422` listing every failing field.
#[instrument(skip_all, fields(visitor = %cart.visitor))]
pub async fn place(
    State(state): State<AppState>,
    cart: CurrentCart,
    Json(form): Json<CheckoutForm>,
) -> Result<(StatusCode, Json<OrderRecord>)> {
    add_breadcrumb("checkout", "Placing order", None);
    let owner = owner_for(&cart.session, cart.visitor);
    let order = place_order(&cart.engine, state.orders(), owner, &form).await?;
    Ok((StatusCode::CREATED, Json(order)))
}
