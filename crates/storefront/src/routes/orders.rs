//! Order history.

use axum::{Json, extract::State};

use zenro_core::OrderRecord;

use crate::checkout::owner_for;
use crate::error::Result;
use crate::middleware::CurrentCart;
use crate::state::AppState;

/// List the current owner's orders, newest first.
pub async fn index(
    State(state): State<AppState>,
    cart: CurrentCart,
) -> Result<Json<Vec<OrderRecord>>> {
    let owner = owner_for(&cart.session, cart.visitor);
    Ok(Json(state.orders().list_for(&owner).await?))
}
