//! Core types for the Top Edge portal.
//!
//! This module provides type-safe wrappers for vendor-owned domain concepts.

pub mod amount;
pub mod email;
pub mod id;
pub mod plate;
pub mod status;

pub use amount::Amount;
pub use email::{Email, EmailError};
pub use id::*;
pub use plate::{LicensePlate, LicensePlateError};
pub use status::AccountStatus;
