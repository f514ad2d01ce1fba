//! Session-related types.
//!
//! Everything the portal remembers about a visitor lives in one encrypted
//! cookie holding a [`SessionData`].

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

/// Contents of the session cookie.
///
/// Implements `Debug` manually to redact the customer token.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionData {
    /// Vendor customer entity id, e.g. `864:1005`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,
    /// Vendor-issued customer token. Never leaves the server except inside
    /// the encrypted cookie.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl SessionData {
    /// Session for a customer who just registered or signed in.
    #[must_use]
    pub fn signed_in(customer_id: String, customer_token: String, email: Option<String>) -> Self {
        Self {
            customer_id: Some(customer_id),
            customer_token: Some(customer_token),
            email,
        }
    }

    /// Both the customer id and the token are present.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.customer_id.as_deref().is_some_and(|s| !s.is_empty())
            && self.customer_token.as_deref().is_some_and(|s| !s.is_empty())
    }

    /// The authenticated identity, if any.
    #[must_use]
    pub fn authenticated(&self) -> Option<AuthenticatedCustomer> {
        if !self.is_authenticated() {
            return None;
        }

        Some(AuthenticatedCustomer {
            customer_id: self.customer_id.clone()?,
            customer_token: SecretString::from(self.customer_token.clone()?),
            email: self.email.clone(),
        })
    }
}

impl std::fmt::Debug for SessionData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionData")
            .field("customer_id", &self.customer_id)
            .field("customer_token", &self.customer_token.as_ref().map(|_| "[REDACTED]"))
            .field("email", &self.email)
            .finish()
    }
}

/// A signed-in customer, as handed to route handlers.
#[derive(Debug, Clone)]
pub struct AuthenticatedCustomer {
    pub customer_id: String,
    pub customer_token: SecretString,
    pub email: Option<String>,
}

impl AuthenticatedCustomer {
    /// Whether `customer_id` (typically a path parameter) is this customer.
    #[must_use]
    pub fn owns(&self, customer_id: &str) -> bool {
        self.customer_id == customer_id
    }

    /// Token for vendor calls made on this customer's behalf.
    #[must_use]
    pub const fn token(&self) -> &SecretString {
        &self.customer_token
    }

    #[must_use]
    pub fn token_str(&self) -> &str {
        self.customer_token.expose_secret()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_is_authenticated_requires_both_fields() {
        assert!(!SessionData::default().is_authenticated());

        let only_id = SessionData {
            customer_id: Some("1:1".into()),
            ..Default::default()
        };
        assert!(!only_id.is_authenticated());

        let empty_token = SessionData {
            customer_id: Some("1:1".into()),
            customer_token: Some(String::new()),
            email: None,
        };
        assert!(!empty_token.is_authenticated());

        assert!(SessionData::signed_in("1:1".into(), "t".into(), None).is_authenticated());
    }

    #[test]
    fn test_serialized_field_names() {
        let data = SessionData::signed_in("1:1".into(), "t".into(), Some("a@b.co".into()));
        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(json["customerId"], "1:1");
        assert_eq!(json["customerToken"], "t");
        assert_eq!(json["email"], "a@b.co");
    }

    #[test]
    fn test_debug_redacts_token() {
        let data = SessionData::signed_in("1:1".into(), "very-private".into(), None);
        let debug = format!("{data:?}");
        assert!(debug.contains("1:1"));
        assert!(!debug.contains("very-private"));
    }

    #[test]
    fn test_owns() {
        let customer = SessionData::signed_in("864:1005".into(), "t".into(), None)
            .authenticated()
            .unwrap();
        assert!(customer.owns("864:1005"));
        assert!(!customer.owns("864:1006"));
        assert_eq!(customer.token_str(), "t");
    }
}
