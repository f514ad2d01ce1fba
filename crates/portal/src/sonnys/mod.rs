//! Clients for the car-wash platform's eCommerce and BackOffice REST APIs.
//!
//! # Architecture
//!
//! - One `reqwest::Client` per API, carrying the static `X-Sonnys-API-Key` and
//!   `X-Sonnys-API-ID` credentials as default headers
//! - The vendor is the source of truth: nothing is persisted locally
//! - BackOffice reads are cached in memory via `moka` for a short revalidation
//!   window; eCommerce calls are never cached
//! - Non-2xx responses are normalized once into [`VendorError`]
//!
//! # Example
//!
//! ```rust,ignore
//! use topedge_portal::sonnys::{BackOfficeClient, EcomClient};
//!
//! let backoffice = BackOfficeClient::new(&config.backoffice, config.backoffice_revalidate)?;
//! let account = backoffice.get_recurring_account(&customer_id).await?;
//!
//! let ecom = EcomClient::new(&config.ecom)?;
//! let plans = ecom.list_recurring_plans().await?;
//! ```

mod backoffice;
mod ecom;
pub mod errors;
mod transport;
pub mod types;

pub use backoffice::BackOfficeClient;
pub use ecom::EcomClient;
pub use errors::{ErrorCode, VendorError};
pub use types::*;

use serde_json::Value;
use thiserror::Error;

/// Errors that can occur when calling the vendor APIs.
#[derive(Debug, Error)]
pub enum SonnysError {
    /// Transport failure (connect, TLS, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The vendor answered with a non-2xx status.
    #[error("Vendor error: {0}")]
    Api(VendorError),

    /// A 2xx body did not have the expected shape.
    #[error("Unexpected response from {path}: {reason}")]
    Decode { path: String, reason: String },

    /// A lookup found no matching vendor record.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The client could not be built from configuration.
    #[error("Invalid client configuration: {0}")]
    Config(String),
}

impl SonnysError {
    /// The error code surfaced to the browser.
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Api(err) => err.code.clone(),
            Self::NotFound(_) => ErrorCode::EntityNotFound,
            Self::Http(_) | Self::Decode { .. } | Self::Config(_) => ErrorCode::UnexpectedFailure,
        }
    }

    /// The HTTP status surfaced to the browser.
    ///
    /// Vendor errors keep the vendor's own status.
    #[must_use]
    pub const fn status(&self) -> u16 {
        match self {
            Self::Api(err) => err.status,
            Self::NotFound(_) => 404,
            Self::Http(_) | Self::Decode { .. } | Self::Config(_) => 500,
        }
    }

    /// Structured details to forward, if any.
    #[must_use]
    pub const fn details(&self) -> Option<&Value> {
        match self {
            Self::Api(err) => err.details.as_ref(),
            _ => None,
        }
    }

    /// Whether this is an `EntityNotFoundError`, local or vendor-reported.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.code() == ErrorCode::EntityNotFound
    }
}
