//! BackOffice read routes.
//!
//! These are not session-gated; the vendor credentials are the app's own.

use axum::{
    Json,
    extract::{Path, State},
};
use tracing::instrument;

use super::{ApiQuery, Envelope, ok};
use crate::error::Result;
use crate::sonnys::{Customer, RecurringAccount, RecurringBilling, Site};
use crate::state::AppState;
use crate::validation::{BillingsQuery, CustomerSearchQuery, entity_id};

/// `GET /api/backoffice/customer/search`
#[instrument(skip(state, query))]
pub async fn search_customer(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<CustomerSearchQuery>,
) -> Result<Json<Envelope<Vec<Customer>>>> {
    let search = query.validate()?;
    let customers = state.backoffice().search_customer(&search).await?;
    Ok(ok(customers))
}

/// `GET /api/backoffice/customer/{customerId}`
#[instrument(skip(state))]
pub async fn get_customer(
    State(state): State<AppState>,
    Path(customer_id): Path<String>,
) -> Result<Json<Envelope<Customer>>> {
    let customer_id = entity_id("customerId", &customer_id)?;
    let customer = state.backoffice().get_customer(&customer_id).await?;
    Ok(ok(customer))
}

/// `GET /api/backoffice/recurring/account/{customerId}`
///
/// 404 `EntityNotFoundError` when the customer has no membership.
#[instrument(skip(state))]
pub async fn get_recurring_account(
    State(state): State<AppState>,
    Path(customer_id): Path<String>,
) -> Result<Json<Envelope<RecurringAccount>>> {
    let customer_id = entity_id("customerId", &customer_id)?;
    let account = state
        .backoffice()
        .get_recurring_account(&customer_id)
        .await?;
    Ok(ok(account))
}

/// `GET /api/backoffice/recurring/account/{customerId}/billings`
///
/// An empty list, not a 404, when there is nothing to show.
#[instrument(skip(state, query))]
pub async fn get_recurring_billings(
    State(state): State<AppState>,
    Path(customer_id): Path<String>,
    ApiQuery(query): ApiQuery<BillingsQuery>,
) -> Result<Json<Envelope<Vec<RecurringBilling>>>> {
    let customer_id = entity_id("customerId", &customer_id)?;
    let limit = query.validate()?;
    let billings = state
        .backoffice()
        .get_recurring_billings(&customer_id, limit)
        .await?;
    Ok(ok(billings))
}

/// `GET /api/backoffice/site/list`
#[instrument(skip(state))]
pub async fn list_sites(State(state): State<AppState>) -> Result<Json<Envelope<Vec<Site>>>> {
    Ok(ok(state.backoffice().list_sites().await?))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    use crate::routes::test_support::{self, FakeVendor};

    async fn get(vendor: &FakeVendor, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = test_support::app(vendor)
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        (status, test_support::json(response).await)
    }

    #[tokio::test]
    async fn test_search_needs_a_criterion() {
        let (status, body) = get(&FakeVendor::unreachable(), "/api/backoffice/customer/search").await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["code"], "PayloadValidationError");
        assert!(!body["details"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_account_prefers_active() {
        let vendor = FakeVendor::start().await;
        let (status, body) = get(&vendor, "/api/backoffice/recurring/account/864:1005").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["id"], "1:2");
    }

    #[tokio::test]
    async fn test_account_missing_is_404() {
        let vendor = FakeVendor::start().await;
        let (status, body) = get(&vendor, "/api/backoffice/recurring/account/864:9999").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "EntityNotFoundError");
    }

    #[tokio::test]
    async fn test_billings_missing_account_is_empty() {
        let vendor = FakeVendor::start().await;
        let (status, body) =
            get(&vendor, "/api/backoffice/recurring/account/864:9999/billings").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_billings_limit_checked() {
        let (status, body) = get(
            &FakeVendor::unreachable(),
            "/api/backoffice/recurring/account/864:1005/billings?limit=500",
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["details"][0]["path"], "limit");
    }

    #[tokio::test]
    async fn test_sites_unwrapped() {
        let vendor = FakeVendor::start().await;
        let (status, body) = get(&vendor, "/api/backoffice/site/list").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"][0]["code"], "DEF");
    }
}
