//! End-to-end harness for the Top Edge customer portal.
//!
//! [`TestContext::start`] serves two things on ephemeral ports inside the test
//! process:
//!
//! - a fake vendor platform answering the eCommerce and BackOffice paths the
//!   portal consumes, recording every request it sees, and
//! - the real portal router, configured to talk to that fake.
//!
//! Tests drive the portal with a cookie-keeping `reqwest` client that does not
//! follow redirects, so each step of a page flow can be inspected.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p topedge-integration-tests
//! ```
//!
//! # Fake customers
//!
//! | Customer    | Accounts (list order)             | Billings        |
//! |-------------|-----------------------------------|-----------------|
//! | `864:1005`  | `1:1` Suspended, `1:2` Active     | one charge      |
//! | `864:1006`  | `2:0` Cancelled, `2:1` ACTIVE     | none            |
//! | `864:1007`  | `3:1` Active                      | endpoint fails  |
//! | `864:1008`  | `4:1` Suspended, `4:2` Cancelled  | none            |
//! | anyone else | none                              | -               |

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use reqwest::Client;
use secrecy::SecretString;
use serde_json::{Value, json};
use topedge_portal::config::{PortalConfig, SentryConfig, SessionConfig, VendorApiConfig};
use topedge_portal::state::AppState;
use url::Url;

/// Session secret used by the portal under test.
pub const SESSION_SECRET: &str = "Zq8r2LkP9wX4vN7mB3tY6hJ1cF5gD0sA";

/// Valid last four digits for every fake customer.
pub const CARD_LAST_FOUR: &str = "4242";

/// Token the fake vendor hands out on registration.
pub const CUSTOMER_TOKEN: &str = "tok-1005";

const ECOM_API_KEY: &str = "ecom-key";
const BACKOFFICE_API_KEY: &str = "backoffice-key";

/// One request as seen by the fake vendor.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: Method,
    /// Path and query, e.g. `/recurring/account/list?limit=100`.
    pub uri: String,
    pub api_key: Option<String>,
    pub api_id: Option<String>,
    pub customer_token: Option<String>,
    pub body: Value,
}

#[derive(Clone, Default)]
struct VendorState {
    log: Arc<Mutex<Vec<Recorded>>>,
    /// Set once a guest payment succeeds; the new member's account then lists.
    joined: Arc<AtomicBool>,
}

impl VendorState {
    fn record(&self, method: Method, uri: &Uri, headers: &HeaderMap, body: Value) {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned)
        };
        self.log.lock().unwrap().push(Recorded {
            method,
            uri: uri
                .path_and_query()
                .map_or_else(|| uri.path().to_owned(), ToString::to_string),
            api_key: header("x-sonnys-api-key"),
            api_id: header("x-sonnys-api-id"),
            customer_token: header("x-sonnys-customer-token"),
            body,
        });
    }
}

fn vendor_error(status: StatusCode, kind: &str, message: &str) -> Response {
    (
        status,
        Json(json!({ "errorType": kind, "errorMessage": message })),
    )
        .into_response()
}

fn accounts(joined: bool) -> Value {
    let mut accounts = json!([
        { "id": "1:1", "customerId": "864:1005", "statusName": "Suspended" },
        { "id": "1:2", "customerId": "864:1005", "statusName": "Active" },
        { "id": "2:0", "customerId": "864:1006", "statusName": "Cancelled" },
        { "id": "2:1", "customerId": "864:1006", "statusName": "ACTIVE" },
        { "id": "3:1", "customerId": "864:1007", "statusName": "Active" },
        { "id": "4:1", "customerId": "864:1008", "statusName": "Suspended" },
        { "id": "4:2", "customerId": "864:1008", "statusName": "Cancelled" },
    ]);
    if joined && let Some(list) = accounts.as_array_mut() {
        list.push(json!({ "id": "5:1", "customerId": "864:2000", "statusName": "Active" }));
    }
    accounts
}

async fn vendor_get(
    State(vendor): State<VendorState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    vendor.record(method, &uri, &headers, Value::Null);
    let segments: Vec<&str> = uri.path().trim_matches('/').split('/').collect();

    match segments.as_slice() {
        ["recurring", "account", "list"] => {
            let joined = vendor.joined.load(Ordering::SeqCst);
            Json(json!({ "data": { "accounts": accounts(joined) } })).into_response()
        }
        ["recurring", "account", id, "detail"] => Json(json!({ "data": {
            "id": id,
            "planName": "Unlimited Wash",
            "status": "Active",
            "billingAmount": "29.99",
            "nextBillDate": "2025-04-01T00:00:00Z",
            "vehicles": [{ "id": "7:1", "plate": "ABC123" }],
        } }))
        .into_response(),
        ["recurring", "account", "3:1", "billings"] => vendor_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "ServerUnexpectedFailure",
            "billing service down",
        ),
        ["recurring", "account", "1:2", "billings"] => Json(json!({ "data": [
            { "amountCharged": "29.99", "date": "2025-03-01T00:00:00Z", "lastFourCC": CARD_LAST_FOUR },
        ] }))
        .into_response(),
        ["recurring", "account", _, "billings"] => Json(json!({ "data": null })).into_response(),
        ["site", "list"] => Json(json!({ "data": { "sites": [
            { "code": "DEF", "name": "Main Street" },
            { "code": "BAY", "name": "Bayshore" },
        ] } }))
        .into_response(),
        ["customer", "search"] => Json(json!([
            { "id": "864:1005", "firstName": "Ada", "lastName": "Lovelace", "email": "ada@example.com" },
        ]))
        .into_response(),
        ["customer", customer_id, "order", "receipt", receipt_id] => {
            if headers.get("x-sonnys-customer-token").is_none() {
                return vendor_error(
                    StatusCode::UNAUTHORIZED,
                    "MissingCustomerCredentialsError",
                    "customer token required",
                );
            }
            Json(json!({ "data": {
                "transId": receipt_id,
                "itemCount": 1,
                "total": 29.99,
                "transItems": [{ "name": "Unlimited Wash", "price": 29.99, "quantity": 1 }],
                "customer": customer_id,
            } }))
            .into_response()
        }
        ["customer", id] => Json(json!({ "data": {
            "id": id,
            "firstName": "Ada",
            "lastName": "Lovelace",
            "email": "ada@example.com",
        } }))
        .into_response(),
        ["inventory", "recurring"] => Json(json!({ "data": [
            { "id": "123", "name": "Unlimited Wash", "price": 29.99, "lprEnabled": true },
            { "id": "456", "name": "Basic Wash", "price": "9.99", "lprEnabled": false },
        ] }))
        .into_response(),
        _ => vendor_error(StatusCode::NOT_FOUND, "EntityNotFoundError", "no such path"),
    }
}

async fn vendor_post(
    State(vendor): State<VendorState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    vendor.record(method, &uri, &headers, body.clone());
    let segments: Vec<&str> = uri.path().trim_matches('/').split('/').collect();

    match segments.as_slice() {
        ["customer", "register"] => {
            if body["lastFourCreditCard"] == CARD_LAST_FOUR {
                Json(json!({ "data": { "id": "864:1005", "customerToken": CUSTOMER_TOKEN } }))
                    .into_response()
            } else {
                vendor_error(
                    StatusCode::UNAUTHORIZED,
                    "BadCustomerCredentialsError",
                    "credentials do not match",
                )
            }
        }
        ["shop", "detailed-pending-order"] => {
            if body["discountCode"] == "BOGUS" {
                return vendor_error(
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "PayloadValidationError",
                    "discount code not found",
                );
            }
            Json(json!({ "data": {
                "token": "po_123",
                "expiresAt": "2025-03-01T00:15:00Z",
                "skipTrialPriceForRecurring": false,
                "totalAmount": 29.99,
                "subTotal": 29.99,
                "totalTax": "0.00",
            } }))
            .into_response()
        }
        ["shop", "payment"] | ["shop", "customer", _, "payment"] => {
            if body["pendingOrderToken"] == "po_used" {
                return vendor_error(
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "PayloadValidationError",
                    "pending order already paid",
                );
            }
            vendor.joined.store(true, Ordering::SeqCst);
            Json(json!({ "data": [{
                "customerId": "864:2000",
                "secretToken": "secret",
                "receiptId": "1:77",
            }] }))
            .into_response()
        }
        _ => vendor_error(StatusCode::NOT_FOUND, "EntityNotFoundError", "no such path"),
    }
}

fn vendor_routes(state: VendorState) -> Router {
    Router::new()
        .route("/{*path}", get(vendor_get).post(vendor_post))
        .with_state(state)
}

async fn serve(router: Router) -> Url {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    Url::parse(&format!("http://{addr}/")).unwrap()
}

/// Portal configuration pointed at a vendor base URL.
#[must_use]
pub fn portal_config(vendor: &Url) -> PortalConfig {
    PortalConfig {
        host: IpAddr::V4(Ipv4Addr::LOCALHOST),
        port: 0,
        base_url: "http://localhost:3000".to_string(),
        session: SessionConfig {
            secret: SecretString::from(SESSION_SECRET),
            cookie_name: "sonnys_portal".to_string(),
            max_age_seconds: 28_800,
            secure: false,
        },
        ecom: VendorApiConfig {
            base_url: vendor.join("ecom/").unwrap(),
            api_key: SecretString::from(ECOM_API_KEY),
            api_id: "ecom-id".to_string(),
        },
        backoffice: VendorApiConfig {
            base_url: vendor.join("backoffice/").unwrap(),
            api_key: SecretString::from(BACKOFFICE_API_KEY),
            api_id: "backoffice-id".to_string(),
        },
        backoffice_revalidate: Duration::from_secs(60),
        default_site_code: "DEF".to_string(),
        sentry: SentryConfig::default(),
    }
}

/// A running portal and fake vendor.
pub struct TestContext {
    /// Cookie-keeping client that does not follow redirects.
    pub client: Client,
    pub portal_url: Url,
    vendor: VendorState,
}

impl TestContext {
    /// Start the fake vendor and the portal.
    pub async fn start() -> Self {
        let vendor = VendorState::default();
        let vendor_url = serve(
            Router::new()
                .nest("/ecom", vendor_routes(vendor.clone()))
                .nest("/backoffice", vendor_routes(vendor.clone())),
        )
        .await;

        let state = AppState::new(portal_config(&vendor_url)).unwrap();
        let portal_url = serve(topedge_portal::app(state)).await;

        let client = Client::builder()
            .cookie_store(true)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap();

        Self {
            client,
            portal_url,
            vendor,
        }
    }

    /// Absolute portal URL for `path`.
    #[must_use]
    pub fn url(&self, path: &str) -> Url {
        self.portal_url.join(path.trim_start_matches('/')).unwrap()
    }

    /// Every vendor request so far, oldest first.
    #[must_use]
    pub fn vendor_requests(&self) -> Vec<Recorded> {
        self.vendor.log.lock().unwrap().clone()
    }

    /// Vendor requests whose path and query start with `prefix`.
    #[must_use]
    pub fn vendor_requests_to(&self, prefix: &str) -> Vec<Recorded> {
        self.vendor_requests()
            .into_iter()
            .filter(|r| r.uri.starts_with(prefix))
            .collect()
    }

    /// Sign in through the JSON API with the fake customer's factors.
    pub async fn sign_in(&self) {
        let response = self
            .client
            .post(self.url("/api/ecom/customer/register"))
            .json(&json!({
                "email": "ada@example.com",
                "productCode": "ABC123",
                "lastFourCreditCard": CARD_LAST_FOUR,
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);
    }

    /// `GET` a portal path and return status and JSON body.
    pub async fn get_json(&self, path: &str) -> (reqwest::StatusCode, Value) {
        let response = self.client.get(self.url(path)).send().await.unwrap();
        let status = response.status();
        (status, response.json().await.unwrap())
    }

    /// `POST` JSON to a portal path and return status and JSON body.
    pub async fn post_json(&self, path: &str, body: &Value) -> (reqwest::StatusCode, Value) {
        let response = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .unwrap();
        let status = response.status();
        (status, response.json().await.unwrap())
    }
}

/// Query parameters of a redirect `Location`.
#[must_use]
pub fn location_query(response: &reqwest::Response) -> Vec<(String, String)> {
    let location = response
        .headers()
        .get(reqwest::header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    Url::parse("http://portal.test")
        .unwrap()
        .join(location)
        .unwrap()
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

/// Path of a redirect `Location`.
#[must_use]
pub fn location_path(response: &reqwest::Response) -> String {
    let location = response
        .headers()
        .get(reqwest::header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    location
        .split_once('?')
        .map_or(location, |(path, _)| path)
        .to_owned()
}
