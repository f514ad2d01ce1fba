//! Server-rendered customer pages under `/portal`.
//!
//! Pages have no scripts. Everything a step needs from the previous one comes
//! in through the query string or hidden form fields.

pub mod account;
pub mod join;

use axum::{
    Router,
    routing::{get, post},
};

use crate::error::AppError;
use crate::state::AppState;

/// Banner text for a failed vendor call.
pub(crate) fn banner(err: impl Into<AppError>) -> String {
    err.into().public_message()
}

/// Create the join-flow router.
pub fn join_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(join::plans))
        .route("/cart", get(join::cart_page).post(join::cart_submit))
        .route(
            "/checkout",
            get(join::checkout_page).post(join::checkout_submit),
        )
        .route("/done", get(join::done_page).post(join::done_submit))
}

/// Create the `/portal` router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(account::landing))
        .route("/login", get(account::login_page).post(account::login))
        .route("/dashboard", get(account::dashboard))
        .route("/logout", post(account::logout))
        .nest("/join", join_routes())
}
