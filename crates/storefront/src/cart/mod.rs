//! Cart synchronization.
//!
//! [`CartEngine`] owns the in-memory cart for one browser. It follows
//! identity transitions, hydrates from the authoritative store for the new
//! session, mirrors every change into the local slot for that session, and
//! debounces writes to the authoritative store through a
//! [`WriteScheduler`].
//!
//! # Persistence targets
//!
//! | Session | Authoritative store            | Local mirror slot |
//! |---------|--------------------------------|-------------------|
//! | guest   | local `guest` slot             | `guest`           |
//! | user    | remote document for `user_id`  | `user:<user_id>`  |
//!
//! Failures never escape the engine. They are logged and surfaced as
//! [`SyncErrorKind`] on the published [`CartSnapshot`].

mod engine;
mod scheduler;

pub use engine::CartEngine;
pub use scheduler::WriteScheduler;

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use zenro_core::{Cart, Session};

use crate::stores::{LocalStore, RemoteCartStore};

/// Default quiet interval before a cart write.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(800);

/// Default image for lines whose product carries none.
pub const DEFAULT_PLACEHOLDER_IMAGE: &str = "/static/images/placeholder-tee.webp";

/// Sync failures the engine surfaces or records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SyncErrorKind {
    /// Remote read or subscribe failed while hydrating a signed-in session.
    #[error("could not load your saved cart")]
    RemoteHydrationFailed,

    /// A remote write failed; the next mutation retries with newer state.
    #[error("could not save your cart")]
    RemoteWriteFailed,

    /// A local slot held unparsable data and was treated as empty.
    #[error("local cart data was unreadable")]
    MalformedLocalPayload,

    /// Quantity below 1, or remove/update of a line that does not exist.
    #[error("mutation had no effect")]
    InvalidMutation,
}

/// What to do with a guest cart when the visitor signs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HandoffPolicy {
    /// The user's remote cart replaces the guest cart.
    #[default]
    Replace,
    /// Guest lines are folded into the user's remote cart.
    Merge,
}

impl HandoffPolicy {
    /// Parse `replace` or `merge`.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "replace" => Some(Self::Replace),
            "merge" => Some(Self::Merge),
            _ => None,
        }
    }
}

/// How a signed-in session reads its remote cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HydrationMode {
    /// Keep a live subscription and apply later remote changes.
    #[default]
    Subscribe,
    /// Read the document once at sign-in.
    ReadOnce,
}

impl HydrationMode {
    /// Parse `subscribe` or `read-once`.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "subscribe" => Some(Self::Subscribe),
            "read-once" | "read_once" => Some(Self::ReadOnce),
            _ => None,
        }
    }
}

/// Engine tuning.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub debounce: Duration,
    pub handoff: HandoffPolicy,
    pub hydration: HydrationMode,
    pub placeholder_image: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            handoff: HandoffPolicy::default(),
            hydration: HydrationMode::default(),
            placeholder_image: DEFAULT_PLACEHOLDER_IMAGE.to_owned(),
        }
    }
}

/// The stores an engine persists to.
#[derive(Clone)]
pub struct SyncContext {
    pub local: Arc<dyn LocalStore>,
    pub remote: Arc<dyn RemoteCartStore>,
}

impl SyncContext {
    #[must_use]
    pub fn new(local: Arc<dyn LocalStore>, remote: Arc<dyn RemoteCartStore>) -> Self {
        Self { local, remote }
    }
}

impl std::fmt::Debug for SyncContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncContext").finish_non_exhaustive()
    }
}

/// Read-only view of the engine state, published after every change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartSnapshot {
    pub cart: Cart,
    pub count: u64,
    pub session: Session,
    pub hydrating: bool,
    pub syncing: bool,
    pub last_error: Option<SyncErrorKind>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_parsing() {
        assert_eq!(HandoffPolicy::parse("Merge"), Some(HandoffPolicy::Merge));
        assert_eq!(HandoffPolicy::parse(" replace "), Some(HandoffPolicy::Replace));
        assert_eq!(HandoffPolicy::parse("union"), None);

        assert_eq!(HydrationMode::parse("read-once"), Some(HydrationMode::ReadOnce));
        assert_eq!(HydrationMode::parse("subscribe"), Some(HydrationMode::Subscribe));
        assert_eq!(HydrationMode::parse("poll"), None);
    }

    #[test]
    fn test_error_kind_serializes_camel_case() {
        let json = serde_json::to_string(&SyncErrorKind::RemoteHydrationFailed).unwrap_or_default();
        assert_eq!(json, "\"remoteHydrationFailed\"");
    }
}
