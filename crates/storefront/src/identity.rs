//! Identity provider contract.
//!
//! The engine never asks "who is signed in?"; it is told. A provider hands
//! out [`IdentityStream`]s that yield the current identity immediately and
//! then every sign-in/sign-out transition after it.

use tokio::sync::watch;

use zenro_core::Identity;

/// Source of identity transitions.
pub trait IdentityProvider: Send + Sync {
    /// Subscribe to identity transitions.
    ///
    /// The returned stream's first item is the identity at subscribe time.
    fn subscribe(&self) -> IdentityStream;
}

/// Stream of identity transitions (`None` = signed out).
#[derive(Debug)]
pub struct IdentityStream {
    rx: watch::Receiver<Option<Identity>>,
    primed: bool,
}

impl IdentityStream {
    /// Wait for the next identity. `None` once the provider is gone.
    pub async fn next(&mut self) -> Option<Option<Identity>> {
        if !self.primed {
            self.primed = true;
            return Some(self.rx.borrow_and_update().clone());
        }
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }
}

/// Identity provider backed by a watch channel.
///
/// Used by the HTTP layer (one per visitor, fed from gateway headers) and
/// by tests.
#[derive(Debug, Clone)]
pub struct WatchIdentityProvider {
    tx: watch::Sender<Option<Identity>>,
}

impl Default for WatchIdentityProvider {
    fn default() -> Self {
        Self::new(None)
    }
}

impl WatchIdentityProvider {
    /// Create a provider with an initial identity.
    #[must_use]
    pub fn new(initial: Option<Identity>) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx }
    }

    /// Report a sign-in.
    pub fn sign_in(&self, identity: Identity) {
        self.tx.send_replace(Some(identity));
    }

    /// Report a sign-out.
    pub fn sign_out(&self) {
        self.tx.send_replace(None);
    }

    /// Report the identity seen now; subscribers are only woken on change.
    ///
    /// Returns whether the identity changed.
    pub fn observe(&self, identity: Option<Identity>) -> bool {
        self.tx.send_if_modified(|current| {
            if *current == identity {
                false
            } else {
                *current = identity;
                true
            }
        })
    }

    /// The identity currently reported.
    #[must_use]
    pub fn current(&self) -> Option<Identity> {
        self.tx.borrow().clone()
    }
}

impl IdentityProvider for WatchIdentityProvider {
    fn subscribe(&self) -> IdentityStream {
        IdentityStream {
            rx: self.tx.subscribe(),
            primed: false,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stream_yields_current_identity_first() {
        let provider = WatchIdentityProvider::new(Some(Identity::new("u1")));
        let mut stream = provider.subscribe();

        assert_eq!(stream.next().await, Some(Some(Identity::new("u1"))));

        provider.sign_out();
        assert_eq!(stream.next().await, Some(None));
    }

    #[tokio::test]
    async fn test_observe_only_notifies_on_change() {
        let provider = WatchIdentityProvider::default();
        assert!(!provider.observe(None));
        assert!(provider.observe(Some(Identity::new("u1"))));
        assert!(!provider.observe(Some(Identity::new("u1"))));
        assert_eq!(provider.current(), Some(Identity::new("u1")));
    }

    #[tokio::test]
    async fn test_stream_ends_when_provider_dropped() {
        let provider = WatchIdentityProvider::default();
        let mut stream = provider.subscribe();
        assert_eq!(stream.next().await, Some(None));

        drop(provider);
        assert_eq!(stream.next().await, None);
    }
}
