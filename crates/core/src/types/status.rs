//! Recurring account status.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Status name of a recurring (membership) account as reported by the vendor.
///
/// The vendor uses free-form names (`Active`, `Suspended`, `Terminated`, ...)
/// and has been seen to emit both `Active` and `ACTIVE`, so the raw string is
/// kept and only the "is this the active account" question is answered here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct AccountStatus(String);

impl AccountStatus {
    /// Create a status from its vendor name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the vendor status name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is the `Active` status.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.0 == "Active" || self.0 == "ACTIVE"
    }
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AccountStatus {
    fn from(name: &str) -> Self {
        Self(name.to_owned())
    }
}
