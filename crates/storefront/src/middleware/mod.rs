//! HTTP middleware stack for storefront.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (capture errors, one hub per request)
//! 2. `TraceLayer` (request span)
//! 3. Request ID (add unique ID to each request)
//! 4. Session layer (tower-sessions; `PostgreSQL` or in-memory store)
//!
//! Handlers then take a [`CurrentCart`], which resolves the visitor, the
//! gateway identity and the visitor's cart engine.

pub mod identity;
pub mod request_id;
pub mod session;
pub mod visitor;

pub use identity::identity_from_headers;
pub use request_id::request_id_middleware;
pub use session::{create_session_layer, visitor_id};
pub use visitor::CurrentCart;
