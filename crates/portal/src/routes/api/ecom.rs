//! eCommerce routes: catalog, orders, payments, registration and receipts.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Serialize;
use tracing::instrument;

use super::{ApiJson, Envelope, ok};
use crate::error::{AppError, Result, add_breadcrumb, set_sentry_user};
use crate::middleware::Session;
use crate::models::SessionData;
use crate::sonnys::{DetailedPendingOrder, OrderReceipt, PaymentResponse, RecurringPlan};
use crate::state::AppState;
use crate::validation::{
    CustomerPaymentInput, PaymentInput, PendingOrderInput, RegisterInput, entity_id,
};

/// What a successful registration tells the browser. The token stays in the
/// cookie.
#[derive(Debug, Serialize)]
pub struct Registered {
    pub id: String,
}

/// `POST /api/ecom/customer/register`
///
/// Checks the three identity factors with the vendor and signs the customer in.
#[instrument(skip(state, session, input))]
pub async fn register_customer(
    State(state): State<AppState>,
    mut session: Session,
    ApiJson(input): ApiJson<RegisterInput>,
) -> Result<(Session, Json<Envelope<Registered>>)> {
    let request = input.validate()?;
    let customer = state.ecom().register_customer(&request).await?;

    set_sentry_user(&customer.id, Some(&request.email));
    add_breadcrumb("auth", "Customer signed in", None);
    tracing::info!(customer_id = %customer.id, "Customer registered");

    session.set(SessionData::signed_in(
        customer.id.clone(),
        customer.customer_token,
        Some(request.email),
    ));

    Ok((session, ok(Registered { id: customer.id })))
}

/// `GET /api/ecom/customer/{customerId}/order/receipt/{receiptId}`
///
/// The session is checked before the ids, so an anonymous caller always gets
/// a 401 whatever the path holds.
#[instrument(skip(state, session))]
pub async fn get_receipt(
    State(state): State<AppState>,
    session: Session,
    Path((customer_id, receipt_id)): Path<(String, String)>,
) -> Result<Json<Envelope<OrderReceipt>>> {
    let customer = session.require_auth()?;
    if !customer.owns(&customer_id) {
        return Err(AppError::CustomerMismatch);
    }

    let customer_id = entity_id("customerId", &customer_id)?;
    let receipt_id = entity_id("receiptId", &receipt_id)?;

    let receipt = state
        .ecom()
        .get_receipt(&customer_id, &receipt_id, customer.token())
        .await?;
    Ok(ok(receipt))
}

/// `GET /api/ecom/inventory/recurring`
#[instrument(skip(state))]
pub async fn list_recurring_plans(
    State(state): State<AppState>,
) -> Result<Json<Envelope<Vec<RecurringPlan>>>> {
    Ok(ok(state.ecom().list_recurring_plans().await?))
}

/// `POST /api/ecom/shop/detailed-pending-order`
#[instrument(skip(state, input))]
pub async fn create_detailed_pending_order(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<PendingOrderInput>,
) -> Result<Json<Envelope<DetailedPendingOrder>>> {
    let request = input.validate()?;
    let order = state.ecom().create_detailed_pending_order(&request).await?;

    add_breadcrumb(
        "checkout",
        "Pending order created",
        Some(&[("site_code", request.site_code.as_str())]),
    );
    Ok(ok(order))
}

/// `POST /api/ecom/shop/payment`
///
/// Guest checkout. A reused pending-order token fails at the vendor like any
/// other declined payment.
#[instrument(skip(state, input))]
pub async fn process_payment(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<PaymentInput>,
) -> Result<Json<Envelope<PaymentResponse>>> {
    let request = input.validate()?;
    let payment = state.ecom().process_payment(&request).await?;

    add_breadcrumb(
        "checkout",
        "Payment processed",
        Some(&[("customer_id", payment.customer_id.as_str())]),
    );
    Ok(ok(payment))
}

/// `POST /api/ecom/shop/customer/{customerId}/payment`
///
/// Session, then ownership, then the body. A malformed body is only reported
/// to the customer it belongs to.
#[instrument(skip(state, session, body))]
pub async fn process_customer_payment(
    State(state): State<AppState>,
    session: Session,
    Path(customer_id): Path<String>,
    body: std::result::Result<ApiJson<CustomerPaymentInput>, AppError>,
) -> Result<Json<Envelope<PaymentResponse>>> {
    let customer = session.require_auth()?;
    if !customer.owns(&customer_id) {
        return Err(AppError::CustomerMismatch);
    }

    let customer_id = entity_id("customerId", &customer_id)?;
    let ApiJson(input) = body?;
    let pending_order_token = input.validate()?;

    let payment = state
        .ecom()
        .process_customer_payment(&customer_id, customer.token(), &pending_order_token)
        .await?;
    Ok(ok(payment))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::{
        body::Body,
        http::{Request, StatusCode, header},
    };
    use serde_json::json;
    use tower::ServiceExt;

    use crate::routes::test_support::{self, FakeVendor};

    fn post_json(uri: &str, body: &serde_json::Value) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_receipt_requires_session() {
        let response = test_support::app(&FakeVendor::unreachable())
            .oneshot(
                Request::get("/api/ecom/customer/864:1005/order/receipt/1:77")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = test_support::json(response).await;
        assert_eq!(body["code"], "NotAuthorizedError");
        assert_eq!(body["message"], "Authentication required");
    }

    #[tokio::test]
    async fn test_receipt_of_another_customer_is_forbidden() {
        let response = test_support::app(&FakeVendor::unreachable())
            .oneshot(
                Request::get("/api/ecom/customer/864:2000/order/receipt/1:77")
                    .header(header::COOKIE, test_support::signed_in_cookie("864:1005"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let body = test_support::json(response).await;
        assert_eq!(body["code"], "NotAuthorizedError");
        assert_eq!(body["message"], "Customer ID mismatch");
        assert!(body.get("data").is_none());
    }

    #[tokio::test]
    async fn test_receipt_passes_customer_token() {
        let vendor = FakeVendor::start().await;
        let response = test_support::app(&vendor)
            .oneshot(
                Request::get("/api/ecom/customer/864:1005/order/receipt/1:77")
                    .header(header::COOKIE, test_support::signed_in_cookie("864:1005"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = test_support::json(response).await;
        assert_eq!(body["ok"], true);
        assert_eq!(body["data"]["itemCount"], 1);
    }

    #[tokio::test]
    async fn test_bad_ids_without_session_are_unauthorized() {
        for uri in [
            "/api/ecom/customer/abc/order/receipt/1:77",
            "/api/ecom/customer/864:1005/order/receipt/bogus",
        ] {
            let response = test_support::app(&FakeVendor::unreachable())
                .oneshot(Request::get(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{uri}");
            let body = test_support::json(response).await;
            assert_eq!(body["code"], "NotAuthorizedError");
        }
    }

    #[tokio::test]
    async fn test_bad_receipt_id_of_own_customer_is_rejected() {
        let response = test_support::app(&FakeVendor::unreachable())
            .oneshot(
                Request::get("/api/ecom/customer/864:1005/order/receipt/bogus")
                    .header(header::COOKIE, test_support::signed_in_cookie("864:1005"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = test_support::json(response).await;
        assert_eq!(body["details"][0]["path"], "receiptId");
    }

    #[tokio::test]
    async fn test_register_sets_session_cookie() {
        let vendor = FakeVendor::start().await;
        let response = test_support::app(&vendor)
            .oneshot(post_json(
                "/api/ecom/customer/register",
                &json!({
                    "email": "ada@example.com",
                    "productCode": "ABC123",
                    "lastFourCreditCard": "4242",
                }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
        assert!(cookie.starts_with("sonnys_portal="));
        assert!(cookie.contains("HttpOnly"));
        assert!(!cookie.contains("tok-1005"));

        let body = test_support::json(response).await;
        assert_eq!(body, json!({ "ok": true, "data": { "id": "864:1005" } }));
    }

    #[tokio::test]
    async fn test_register_vendor_rejection_keeps_friendly_message() {
        let vendor = FakeVendor::start().await;
        let response = test_support::app(&vendor)
            .oneshot(post_json(
                "/api/ecom/customer/register",
                &json!({
                    "email": "ada@example.com",
                    "productCode": "ABC123",
                    "lastFourCreditCard": "1111",
                }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().get(header::SET_COOKIE).is_none());
        let body = test_support::json(response).await;
        assert_eq!(body["code"], "BadCustomerCredentialsError");
        assert_eq!(
            body["message"],
            crate::sonnys::ErrorCode::BadCustomerCredentials.friendly_message()
        );
    }

    #[tokio::test]
    async fn test_pending_order_for_lpr_plan() {
        let vendor = FakeVendor::start().await;
        let response = test_support::app(&vendor)
            .oneshot(post_json(
                "/api/ecom/shop/detailed-pending-order",
                &json!({
                    "siteCode": "DEF",
                    "orderItems": [{ "id": "123", "quantity": 1, "licensePlate": "ABC123" }],
                }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = test_support::json(response).await;
        assert_eq!(body["data"]["token"], "po_123");
        assert!(body["data"]["totalAmount"].is_number());
        assert!(body["data"]["expiresAt"].is_string());
    }

    #[tokio::test]
    async fn test_pending_order_validation_never_reaches_vendor() {
        let response = test_support::app(&FakeVendor::unreachable())
            .oneshot(post_json(
                "/api/ecom/shop/detailed-pending-order",
                &json!({ "siteCode": "D", "orderItems": [] }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = test_support::json(response).await;
        assert_eq!(body["code"], "PayloadValidationError");
        assert!(!body["details"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_customer_payment_checks_session_before_body() {
        for body in [json!({}), json!({ "pendingOrderToken": "" })] {
            let response = test_support::app(&FakeVendor::unreachable())
                .oneshot(post_json("/api/ecom/shop/customer/864:1005/payment", &body))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        }

        let response = test_support::app(&FakeVendor::unreachable())
            .oneshot(
                Request::post("/api/ecom/shop/customer/864:1005/payment")
                    .body(Body::from("{not json"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_customer_payment_body_checked_for_owner() {
        let mut request = post_json(
            "/api/ecom/shop/customer/864:1005/payment",
            &json!({ "pendingOrderToken": "" }),
        );
        request.headers_mut().insert(
            header::COOKIE,
            test_support::signed_in_cookie("864:1005").parse().unwrap(),
        );
        let response = test_support::app(&FakeVendor::unreachable())
            .oneshot(request)
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = test_support::json(response).await;
        assert_eq!(body["details"][0]["path"], "pendingOrderToken");
    }
}
