//! Composite entity identifiers.
//!
//! The vendor platform identifies every record (customers, recurring accounts,
//! receipts) with a composite `"<numeric>:<numeric>"` string such as `864:1005`.
//! Use the `define_id!` macro to create type-safe wrappers that prevent
//! accidentally mixing IDs from different entity types.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing an [`EntityId`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EntityIdError {
    /// The input string is empty.
    #[error("entity ID cannot be empty")]
    Empty,
    /// The input does not match `<digits>:<digits>`.
    #[error("Invalid entity ID format")]
    InvalidFormat,
}

/// A vendor entity identifier of the form `<digits>:<digits>`.
///
/// ## Examples
///
/// ```
/// use topedge_core::EntityId;
///
/// assert!(EntityId::parse("864:1005").is_ok());
/// assert!(EntityId::parse("864").is_err());
/// assert!(EntityId::parse("864:").is_err());
/// assert!(EntityId::parse("a:1").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntityId(String);

impl EntityId {
    /// Parse an `EntityId` from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty or is not two non-empty runs of
    /// ASCII digits separated by a single colon.
    pub fn parse(s: &str) -> Result<Self, EntityIdError> {
        if s.is_empty() {
            return Err(EntityIdError::Empty);
        }

        let (site, record) = s.split_once(':').ok_or(EntityIdError::InvalidFormat)?;
        if !is_digits(site) || !is_digits(record) {
            return Err(EntityIdError::InvalidFormat);
        }

        Ok(Self(s.to_owned()))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the `EntityId` and returns its inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for EntityId {
    type Err = EntityIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for EntityId {
    type Error = EntityIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<EntityId> for String {
    fn from(id: EntityId) -> Self {
        id.0
    }
}

impl AsRef<str> for EntityId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Macro to define a type-safe entity ID wrapper.
///
/// Creates a newtype wrapper around [`EntityId`] with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `PartialEq`, `Eq`, `Hash`
/// - `parse()`, `as_str()` and `Display`
///
/// # Example
///
/// ```rust
/// # use topedge_core::define_id;
/// define_id!(VehicleId);
/// define_id!(TagId);
///
/// let vehicle = VehicleId::parse("12:34").unwrap();
/// let tag = TagId::parse("12:34").unwrap();
///
/// // These are different types, so this won't compile:
/// // let _: VehicleId = tag;
/// # let _ = (vehicle, tag);
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            PartialEq,
            Eq,
            Hash,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name($crate::EntityId);

        impl $name {
            /// Parse the ID from its `<digits>:<digits>` string form.
            ///
            /// # Errors
            ///
            /// Returns an error if the input is not a valid entity ID.
            pub fn parse(s: &str) -> ::core::result::Result<Self, $crate::EntityIdError> {
                $crate::EntityId::parse(s).map(Self)
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                self.0.as_str()
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                ::core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<$crate::EntityId> for $name {
            fn from(id: $crate::EntityId) -> Self {
                Self(id)
            }
        }

        impl From<$name> for $crate::EntityId {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id!(CustomerId);
define_id!(AccountId);
define_id!(ReceiptId);

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid() {
        assert!(EntityId::parse("864:1005").is_ok());
        assert!(EntityId::parse("1:1").is_ok());
        assert!(EntityId::parse("45678:1001").is_ok());
    }

    #[test]
    fn test_parse_empty() {
        assert_eq!(EntityId::parse(""), Err(EntityIdError::Empty));
    }

    #[test]
    fn test_parse_invalid_format() {
        for input in ["864", "864:", ":1005", "864:1005:1", "a:1", "1:b", " 1:1", "1:1 "] {
            assert_eq!(
                EntityId::parse(input),
                Err(EntityIdError::InvalidFormat),
                "{input} should be rejected"
            );
        }
    }

    #[test]
    fn test_deserialize_rejects_bad_format() {
        let result: Result<EntityId, _> = serde_json::from_str("\"123\"");
        assert!(result.is_err());

        let id: EntityId = serde_json::from_str("\"12:34\"").unwrap();
        assert_eq!(id.as_str(), "12:34");
    }

    #[test]
    fn test_typed_wrapper() {
        let customer = CustomerId::parse("864:1005").unwrap();
        assert_eq!(customer.as_str(), "864:1005");
        assert_eq!(customer.to_string(), "864:1005");
        assert_eq!(serde_json::to_string(&customer).unwrap(), "\"864:1005\"");
        assert!(ReceiptId::parse("nope").is_err());
    }
}
