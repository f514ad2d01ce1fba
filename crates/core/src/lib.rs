//! Top Edge Core - Shared types library.
//!
//! This crate provides the domain types shared by the portal binary and its
//! integration tests:
//! - `portal` - Customer portal and backend-for-frontend over the car-wash platform
//! - `integration-tests` - End-to-end tests against a fake vendor platform
//!
//! # Architecture
//!
//! The core crate contains only types and parsing rules - no I/O, no HTTP
//! clients, no session handling. Every entity these types describe is owned
//! by the vendor platform; the portal only reads or creates them over HTTP.
//!
//! # Modules
//!
//! - [`types`] - Composite entity IDs, emails, license plates, money amounts
//!   and account statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
