//! Session identity and local persistence slots.
//!
//! A [`Session`] is derived from identity-provider transitions, never stored
//! on its own. It decides which persistence target is authoritative for the
//! cart: a guest's cart lives in the local guest slot, a signed-in user's
//! cart in the remote document keyed by their [`UserId`].

use core::fmt;

use serde::{Deserialize, Serialize};

use super::email::Email;
use super::id::UserId;

/// What the identity provider reports for a signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub user_id: UserId,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email: Option<Email>,
}

impl Identity {
    /// Identity with only a user id.
    #[must_use]
    pub fn new(user_id: impl Into<UserId>) -> Self {
        Self {
            user_id: user_id.into(),
            display_name: None,
            email: None,
        }
    }
}

/// The current identity context.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Session {
    #[default]
    Guest,
    User(Identity),
}

impl Session {
    /// Whether no user is signed in.
    #[must_use]
    pub const fn is_guest(&self) -> bool {
        matches!(self, Self::Guest)
    }

    /// The signed-in user's id, if any.
    #[must_use]
    pub const fn user_id(&self) -> Option<&UserId> {
        match self {
            Self::Guest => None,
            Self::User(identity) => Some(&identity.user_id),
        }
    }

    /// The local slot mirroring this session's cart.
    #[must_use]
    pub fn slot(&self) -> SlotKey {
        match self {
            Self::Guest => SlotKey::Guest,
            Self::User(identity) => SlotKey::User(identity.user_id.clone()),
        }
    }

    /// Whether two sessions belong to the same principal.
    ///
    /// Profile fields (display name, email) can change without a sign-in
    /// transition, so only the user id is compared.
    #[must_use]
    pub fn same_principal(&self, other: &Self) -> bool {
        self.user_id() == other.user_id()
    }
}

impl From<Option<Identity>> for Session {
    fn from(identity: Option<Identity>) -> Self {
        identity.map_or(Self::Guest, Self::User)
    }
}

/// A local persistence slot: one for guests, one per signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SlotKey {
    Guest,
    User(UserId),
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Guest => f.write_str("guest"),
            Self::User(id) => write!(f, "user:{id}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_keys() {
        assert_eq!(SlotKey::Guest.to_string(), "guest");
        assert_eq!(SlotKey::User(UserId::new("abc")).to_string(), "user:abc");
    }

    #[test]
    fn test_session_from_identity() {
        assert_eq!(Session::from(None), Session::Guest);

        let session = Session::from(Some(Identity::new("u1")));
        assert_eq!(session.user_id(), Some(&UserId::new("u1")));
        assert_eq!(session.slot(), SlotKey::User(UserId::new("u1")));
    }

    #[test]
    fn test_same_principal_ignores_profile() {
        let mut renamed = Identity::new("u1");
        renamed.display_name = Some("Ada".to_owned());

        let a = Session::User(Identity::new("u1"));
        let b = Session::User(renamed);
        assert!(a.same_principal(&b));
        assert!(!a.same_principal(&Session::Guest));
        assert!(Session::Guest.same_principal(&Session::Guest));
    }
}
