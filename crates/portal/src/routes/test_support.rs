//! In-process fixtures for route tests: a small fake vendor and a portal
//! router pointed at it.

#![allow(clippy::unwrap_used)]

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use axum::{
    Json, Router,
    extract::Path,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use secrecy::SecretString;
use serde_json::{Value, json};
use url::Url;

use crate::config::{PortalConfig, SentryConfig, SessionConfig, VendorApiConfig};
use crate::middleware::SessionCodec;
use crate::models::SessionData;
use crate::state::AppState;

pub const SESSION_SECRET: &str = "k3J9xQ2mW8vN4pL7tR1yZ6bC5fH0dG2sA9eU";
pub const COOKIE_NAME: &str = "sonnys_portal";

/// Where the fake vendor listens.
pub struct FakeVendor {
    pub base: Url,
}

impl FakeVendor {
    /// A base URL nothing listens on, for tests that must not reach a vendor.
    pub fn unreachable() -> Self {
        Self {
            base: Url::parse("http://127.0.0.1:9/").unwrap(),
        }
    }

    /// Serve the fake vendor on an ephemeral port.
    pub async fn start() -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, vendor_routes()).await.unwrap();
        });
        Self {
            base: Url::parse(&format!("http://{addr}/")).unwrap(),
        }
    }
}

fn vendor_error(status: StatusCode, kind: &str, message: &str) -> Response {
    (
        status,
        Json(json!({ "errorType": kind, "errorMessage": message })),
    )
        .into_response()
}

fn vendor_routes() -> Router {
    Router::new()
        .route(
            "/customer/register",
            post(|Json(body): Json<Value>| async move {
                if body["lastFourCreditCard"] == "4242" {
                    Json(json!({ "data": { "id": "864:1005", "customerToken": "tok-1005" } }))
                        .into_response()
                } else {
                    vendor_error(
                        StatusCode::UNAUTHORIZED,
                        "BadCustomerCredentialsError",
                        "no match",
                    )
                }
            }),
        )
        .route(
            "/recurring/account/list",
            get(|| async {
                Json(json!({ "data": { "accounts": [
                    { "id": "1:1", "customerId": "864:1005", "statusName": "Suspended" },
                    { "id": "1:2", "customerId": "864:1005", "statusName": "Active" },
                ] } }))
            }),
        )
        .route(
            "/recurring/account/{id}/detail",
            get(|Path(id): Path<String>| async move {
                Json(json!({ "data": {
                    "id": id,
                    "planName": "Unlimited Wash",
                    "status": "Active",
                    "billingAmount": "29.99",
                    "nextBillDate": "2025-04-01T00:00:00Z",
                } }))
            }),
        )
        .route(
            "/recurring/account/{id}/billings",
            get(|| async {
                Json(json!({ "data": [
                    { "amountCharged": 29.99, "date": "2025-03-01T00:00:00Z", "lastFourCC": "4242" },
                ] }))
            }),
        )
        .route(
            "/inventory/recurring",
            get(|| async {
                Json(json!({ "data": [
                    { "id": "123", "name": "Unlimited Wash", "price": 29.99, "lprEnabled": true },
                    { "id": "456", "name": "Basic Wash", "price": 9.99, "lprEnabled": false },
                ] }))
            }),
        )
        .route(
            "/site/list",
            get(|| async { Json(json!({ "data": { "sites": [{ "code": "DEF", "name": "Main St" }] } })) }),
        )
        .route(
            "/shop/detailed-pending-order",
            post(|Json(body): Json<Value>| async move {
                if body["discountCode"] == "BAD" {
                    return vendor_error(
                        StatusCode::UNPROCESSABLE_ENTITY,
                        "PayloadValidationError",
                        "invalid discount",
                    );
                }
                Json(json!({ "data": {
                    "token": "po_123",
                    "expiresAt": "2025-03-01T00:15:00Z",
                    "totalAmount": 29.99,
                    "subTotal": 29.99,
                    "totalTax": 0,
                } }))
                .into_response()
            }),
        )
        .route(
            "/shop/payment",
            post(|Json(body): Json<Value>| async move {
                if body["pendingOrderToken"] == "used" {
                    return vendor_error(
                        StatusCode::UNPROCESSABLE_ENTITY,
                        "PayloadValidationError",
                        "token already used",
                    );
                }
                Json(json!({ "data": [
                    { "customerId": "864:2000", "secretToken": "s", "receiptId": "1:77" },
                ] }))
                .into_response()
            }),
        )
        .route(
            "/customer/{customer_id}/order/receipt/{receipt_id}",
            get(|headers: HeaderMap| async move {
                if headers.get("x-sonnys-customer-token").is_none() {
                    return vendor_error(
                        StatusCode::UNAUTHORIZED,
                        "MissingCustomerCredentialsError",
                        "no token",
                    );
                }
                Json(json!({ "data": { "itemCount": 1, "total": 29.99 } })).into_response()
            }),
        )
}

pub fn config(vendor: &FakeVendor) -> PortalConfig {
    let api = |id: &str| VendorApiConfig {
        base_url: vendor.base.clone(),
        api_key: SecretString::from("test-key"),
        api_id: id.to_owned(),
    };

    PortalConfig {
        host: IpAddr::V4(Ipv4Addr::LOCALHOST),
        port: 0,
        base_url: "http://localhost:3000".to_string(),
        session: SessionConfig {
            secret: SecretString::from(SESSION_SECRET),
            cookie_name: COOKIE_NAME.to_string(),
            max_age_seconds: 28_800,
            secure: false,
        },
        ecom: api("ecom"),
        backoffice: api("backoffice"),
        backoffice_revalidate: Duration::ZERO,
        default_site_code: "DEF".to_string(),
        sentry: SentryConfig::default(),
    }
}

/// The full portal router wired to `vendor`.
pub fn app(vendor: &FakeVendor) -> Router {
    crate::app(AppState::new(config(vendor)).unwrap())
}

/// A `Cookie` header value for a signed-in customer.
pub fn signed_in_cookie(customer_id: &str) -> String {
    let codec =
        SessionCodec::from_secret(SESSION_SECRET.as_bytes(), COOKIE_NAME, 28_800, false).unwrap();
    let data = SessionData::signed_in(
        customer_id.to_owned(),
        "tok-1005".to_owned(),
        Some("ada@example.com".to_owned()),
    );
    format!("{COOKIE_NAME}={}", codec.seal(&data).unwrap())
}

pub async fn text(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
