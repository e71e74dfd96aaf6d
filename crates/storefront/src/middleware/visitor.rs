//! Per-request cart context.

use std::time::Duration;

use axum::{extract::FromRequestParts, http::request::Parts};
use tokio::time::timeout;
use tracing::{debug, warn};

use zenro_core::{Session, VisitorId};

use crate::cart::CartEngine;
use crate::error::{AppError, clear_sentry_user, set_sentry_user};
use crate::middleware::identity::identity_from_headers;
use crate::middleware::session::visitor_id;
use crate::state::AppState;

/// How long a request waits for the engine to adopt a changed identity.
const IDENTITY_SETTLE_TIMEOUT: Duration = Duration::from_secs(5);

/// Extractor resolving the visitor's cart engine for this request.
///
/// Forwards the gateway identity to the visitor's identity provider and
/// waits (bounded) until the engine has switched to, and hydrated, that
/// session, so the handler sees the cart of whoever is making the request.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(cart: CurrentCart) -> Json<u64> {
///     Json(cart.engine.cart_count())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CurrentCart {
    pub visitor: VisitorId,
    pub session: Session,
    pub engine: CartEngine,
}

impl FromRequestParts<AppState> for CurrentCart {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        // Set by SessionManagerLayer
        let http_session = parts
            .extensions
            .get::<tower_sessions::Session>()
            .cloned()
            .ok_or_else(|| AppError::Internal("session layer not installed".to_owned()))?;
        let visitor = visitor_id(&http_session).await?;
        let cart = state.carts().get(visitor).await;

        let identity = identity_from_headers(&parts.headers, &state.config().identity_header_prefix);
        match &identity {
            Some(identity) => set_sentry_user(
                &identity.user_id,
                identity.email.as_ref().map(zenro_core::Email::as_str),
            ),
            None => clear_sentry_user(),
        }
        if cart.identity.observe(identity.clone()) {
            debug!(%visitor, signed_in = identity.is_some(), "Gateway identity changed");
        }

        let session = Session::from(identity);
        if timeout(IDENTITY_SETTLE_TIMEOUT, cart.engine.wait_for_session(&session))
            .await
            .is_err()
        {
            warn!(%visitor, "Cart engine did not settle on the request identity in time");
        }

        Ok(Self {
            visitor,
            session,
            engine: cart.engine,
        })
    }
}
