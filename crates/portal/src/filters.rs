//! Custom Askama template filters.

#![allow(clippy::unnecessary_wraps)]

use std::fmt::Display;

/// Returns the current year.
///
/// Usage in templates: `{{ ""|current_year }}`
#[askama::filter_fn]
pub fn current_year(_value: impl Display, _env: &dyn askama::Values) -> askama::Result<i32> {
    use chrono::Datelike;
    Ok(chrono::Utc::now().year())
}

/// Formats a dollar amount, e.g. `19.99` as `$19.99`.
///
/// Usage in templates: `{{ plan.price|money }}`
#[askama::filter_fn]
pub fn money(value: impl Display, _env: &dyn askama::Values) -> askama::Result<String> {
    Ok(format!("${value}"))
}

/// Shortens a vendor timestamp to its date part.
///
/// `2025-03-01T00:00:00Z` becomes `2025-03-01`; anything else is shown as is.
///
/// Usage in templates: `{{ billing.date|day }}`
#[askama::filter_fn]
pub fn day(value: impl Display, _env: &dyn askama::Values) -> askama::Result<String> {
    let value = value.to_string();
    Ok(value
        .split_once('T')
        .map_or_else(|| value.clone(), |(date, _)| date.to_owned()))
}
