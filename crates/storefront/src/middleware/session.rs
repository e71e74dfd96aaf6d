//! Session middleware configuration.
//!
//! The session only carries the visitor id; the cart itself lives in the
//! visitor's engine.

use tower_sessions::{Expiry, Session, SessionManagerLayer, SessionStore};

use zenro_core::VisitorId;

use crate::config::StorefrontConfig;

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "zenro_session";

/// Session key holding the visitor id.
pub const VISITOR_ID_KEY: &str = "visitor_id";

/// Session expiry time in seconds (30 days).
const SESSION_EXPIRY_SECONDS: i64 = 30 * 24 * 60 * 60;

/// Create the session layer over `store`.
///
/// # Arguments
///
/// * `store` - Session store (`PostgresStore` in production, `MemoryStore` without a database)
/// * `config` - Storefront configuration (for cookie security)
#[must_use]
pub fn create_session_layer<S>(store: S, config: &StorefrontConfig) -> SessionManagerLayer<S>
where
    S: SessionStore + Clone,
{
    SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(
            tower_sessions::cookie::time::Duration::seconds(SESSION_EXPIRY_SECONDS),
        ))
        .with_secure(config.is_secure())
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_http_only(true)
        .with_path("/")
}

/// The visitor id stored in the session, assigning a new one on first visit.
///
/// # Errors
///
/// Returns an error if the session cannot be read or modified.
pub async fn visitor_id(session: &Session) -> Result<VisitorId, tower_sessions::session::Error> {
    if let Some(visitor) = session.get::<VisitorId>(VISITOR_ID_KEY).await? {
        return Ok(visitor);
    }
    let visitor = VisitorId::generate();
    session.insert(VISITOR_ID_KEY, visitor).await?;
    Ok(visitor)
}
