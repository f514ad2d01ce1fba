//! JSON backend-for-frontend routes under `/api`.
//!
//! Every handler follows the same order: check the session and path ownership
//! (where required), parse and validate, call the vendor once, wrap the result.
//! Success bodies are `{ ok: true, data }`; failures are [`AppError`]
//! envelopes.

pub mod auth;
pub mod backoffice;
pub mod ecom;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{FromRequest, FromRequestParts, Query, Request},
    http::request::Parts,
    response::IntoResponse,
    routing::{get, post},
};
use serde::{Serialize, de::DeserializeOwned};

use crate::error::AppError;
use crate::state::AppState;
use crate::validation::ValidationErrors;

/// Successful response envelope.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub ok: bool,
    pub data: T,
}

/// Wrap `data` in a success envelope.
pub fn ok<T: Serialize>(data: T) -> Json<Envelope<T>> {
    Json(Envelope { ok: true, data })
}

/// JSON body extractor that reports malformed input as a validation error.
///
/// The content type is not checked; anything that parses as the target type
/// is accepted.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| ValidationErrors::single("body", e.body_text()))?;

        serde_json::from_slice(&bytes)
            .map(Self)
            .map_err(|e| ValidationErrors::single("body", e.to_string()).into())
    }
}

/// Query string extractor that reports bad input as a validation error.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiQuery<T>(pub T);

impl<S, T> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Query::try_from_uri(&parts.uri)
            .map(|Query(value)| Self(value))
            .map_err(|e| ValidationErrors::single("query", e.body_text()).into())
    }
}

/// Unknown `/api` paths answer with an envelope too.
async fn not_found() -> impl IntoResponse {
    AppError::Sonnys(crate::sonnys::SonnysError::NotFound(
        "Unknown API route".to_string(),
    ))
}

/// Create the `/api` router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/auth/logout", post(auth::logout))
        .route(
            "/backoffice/customer/search",
            get(backoffice::search_customer),
        )
        .route(
            "/backoffice/customer/{customer_id}",
            get(backoffice::get_customer),
        )
        .route(
            "/backoffice/recurring/account/{customer_id}",
            get(backoffice::get_recurring_account),
        )
        .route(
            "/backoffice/recurring/account/{customer_id}/billings",
            get(backoffice::get_recurring_billings),
        )
        .route("/backoffice/site/list", get(backoffice::list_sites))
        .route("/ecom/customer/register", post(ecom::register_customer))
        .route(
            "/ecom/customer/{customer_id}/order/receipt/{receipt_id}",
            get(ecom::get_receipt),
        )
        .route("/ecom/inventory/recurring", get(ecom::list_recurring_plans))
        .route(
            "/ecom/shop/detailed-pending-order",
            post(ecom::create_detailed_pending_order),
        )
        .route("/ecom/shop/payment", post(ecom::process_payment))
        .route(
            "/ecom/shop/customer/{customer_id}/payment",
            post(ecom::process_customer_payment),
        )
        .fallback(not_found)
}
