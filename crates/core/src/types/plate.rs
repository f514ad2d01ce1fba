//! License plate type.
//!
//! Plates identify a vehicle for license-plate-recognition (LPR) plans and
//! also serve as the "product code" factor when a new member links their
//! purchase to a portal session.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`LicensePlate`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum LicensePlateError {
    /// The plate has fewer than 3 or more than 10 characters.
    #[error("license plate must be {min}-{max} characters")]
    Length {
        /// Minimum allowed length.
        min: usize,
        /// Maximum allowed length.
        max: usize,
    },
    /// The plate contains something other than ASCII letters and digits.
    #[error("license plate must contain only letters and numbers")]
    Charset,
}

/// A normalized (uppercased) license plate: 3-10 ASCII alphanumerics.
///
/// ```
/// use topedge_core::LicensePlate;
///
/// let plate = LicensePlate::parse(" abc123 ").unwrap();
/// assert_eq!(plate.as_str(), "ABC123");
/// assert!(LicensePlate::parse("AB").is_err());
/// assert!(LicensePlate::parse("ABC-123").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LicensePlate(String);

impl LicensePlate {
    /// Minimum plate length.
    pub const MIN_LENGTH: usize = 3;
    /// Maximum plate length.
    pub const MAX_LENGTH: usize = 10;

    /// Parse and normalize a plate. Surrounding whitespace is ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the trimmed input has the wrong length or contains
    /// characters other than ASCII letters and digits.
    pub fn parse(s: &str) -> Result<Self, LicensePlateError> {
        let trimmed = s.trim();

        if !trimmed.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(LicensePlateError::Charset);
        }

        if !(Self::MIN_LENGTH..=Self::MAX_LENGTH).contains(&trimmed.len()) {
            return Err(LicensePlateError::Length {
                min: Self::MIN_LENGTH,
                max: Self::MAX_LENGTH,
            });
        }

        Ok(Self(trimmed.to_ascii_uppercase()))
    }

    /// Returns the plate as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the plate and returns its inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for LicensePlate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
