//! Identity forwarded by the authentication gateway.
//!
//! The gateway in front of the storefront authenticates shoppers and
//! forwards who they are as request headers:
//!
//! - `<prefix>-id` - stable user id (absent for guests)
//! - `<prefix>-email` - email address (optional)
//! - `<prefix>-name` - display name (optional)
//!
//! The default prefix is `x-zenro-user`.

use axum::http::HeaderMap;

use zenro_core::{Email, Identity, UserId};

fn header<'a>(headers: &'a HeaderMap, prefix: &str, suffix: &str) -> Option<&'a str> {
    headers
        .get(format!("{prefix}-{suffix}"))
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// The signed-in identity carried by `headers`, if any.
///
/// An unparsable email is dropped rather than rejecting the request.
#[must_use]
pub fn identity_from_headers(headers: &HeaderMap, prefix: &str) -> Option<Identity> {
    let user_id = header(headers, prefix, "id")?;
    Some(Identity {
        user_id: UserId::new(user_id),
        display_name: header(headers, prefix, "name").map(str::to_owned),
        email: header(headers, prefix, "email").and_then(|email| Email::parse(email).ok()),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    const PREFIX: &str = "x-zenro-user";

    #[test]
    fn test_no_id_header_means_guest() {
        let mut headers = HeaderMap::new();
        headers.insert("x-zenro-user-email", HeaderValue::from_static("ada@zenro.ng"));
        assert_eq!(identity_from_headers(&headers, PREFIX), None);

        headers.insert("x-zenro-user-id", HeaderValue::from_static("   "));
        assert_eq!(identity_from_headers(&headers, PREFIX), None);
    }

    #[test]
    fn test_full_identity() {
        let mut headers = HeaderMap::new();
        headers.insert("x-zenro-user-id", HeaderValue::from_static("u-42"));
        headers.insert("x-zenro-user-email", HeaderValue::from_static("ada@zenro.ng"));
        headers.insert("x-zenro-user-name", HeaderValue::from_static("Ada"));

        let identity = identity_from_headers(&headers, PREFIX).unwrap();
        assert_eq!(identity.user_id, UserId::new("u-42"));
        assert_eq!(identity.display_name.as_deref(), Some("Ada"));
        assert_eq!(identity.email.unwrap().as_str(), "ada@zenro.ng");
    }

    #[test]
    fn test_invalid_email_is_dropped() {
        let mut headers = HeaderMap::new();
        headers.insert("x-zenro-user-id", HeaderValue::from_static("u-42"));
        headers.insert("x-zenro-user-email", HeaderValue::from_static("not an email"));

        let identity = identity_from_headers(&headers, PREFIX).unwrap();
        assert_eq!(identity.email, None);
    }
}
