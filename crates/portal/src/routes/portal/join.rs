//! Join flow pages: choose a plan, price the order, pay, link the purchase.
//!
//! See [`crate::checkout`] for the step rules and the continuation each step
//! hands to the next.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use chrono::Datelike;
use serde::Deserialize;
use tracing::instrument;

use super::banner;
use crate::checkout::{
    CartParams, CheckoutForm, CheckoutParams, DoneForm, DoneParams, Step, cart_plate,
};
use crate::error::{add_breadcrumb, set_sentry_user};
use crate::filters;
use crate::middleware::Session;
use crate::models::SessionData;
use crate::sonnys::{RecurringPlan, RegisterRequest, Site};
use crate::state::AppState;
use crate::validation::{Issue, OrderItemInput, PendingOrderInput};

const MISSING_INFORMATION: &str = "Missing required information. Please contact support.";
const INVALID_CARD: &str = "Invalid card information";

fn restart() -> Response {
    Redirect::to(Step::restart()).into_response()
}

fn current_year() -> i32 {
    chrono::Utc::now().year()
}

// =============================================================================
// Templates
// =============================================================================

#[derive(Template, WebTemplate)]
#[template(path = "portal/join/plans.html")]
pub struct PlansTemplate {
    pub step: Step,
    pub plans: Vec<RecurringPlan>,
    pub site_code: Option<String>,
    pub error: Option<String>,
}

#[derive(Template, WebTemplate)]
#[template(path = "portal/join/cart.html")]
pub struct CartTemplate {
    pub step: Step,
    pub plan: RecurringPlan,
    pub sites: Vec<Site>,
    pub site_code: String,
    pub license_plate: String,
    pub discount_code: String,
    pub error: Option<String>,
}

#[derive(Template, WebTemplate)]
#[template(path = "portal/join/checkout.html")]
pub struct CheckoutTemplate {
    pub step: Step,
    pub params: CheckoutParams,
    /// Previously entered values, minus card number and security code.
    pub form: CheckoutForm,
    pub current_year: i32,
    pub issues: Vec<Issue>,
    pub error: Option<String>,
}

impl CheckoutTemplate {
    fn value<'a>(field: &'a Option<String>) -> &'a str {
        field.as_deref().unwrap_or_default()
    }

    /// Message for a form field, if it failed validation.
    pub fn issue(&self, field: &str) -> Option<&str> {
        self.issues
            .iter()
            .find(|issue| issue.path == field)
            .map(|issue| issue.message.as_str())
    }

    pub fn token(&self) -> &str {
        self.params.pending_order_token().unwrap_or_default()
    }

    pub fn plate(&self) -> &str {
        self.params.license_plate().unwrap_or_default()
    }

    pub fn first_name(&self) -> &str {
        Self::value(&self.form.first_name)
    }

    pub fn last_name(&self) -> &str {
        Self::value(&self.form.last_name)
    }

    pub fn email(&self) -> &str {
        Self::value(&self.form.email)
    }

    pub fn phone(&self) -> &str {
        Self::value(&self.form.phone)
    }

    pub fn card_full_name(&self) -> &str {
        Self::value(&self.form.card_full_name)
    }

    pub fn exp_month(&self) -> &str {
        Self::value(&self.form.exp_month)
    }

    pub fn exp_year(&self) -> &str {
        Self::value(&self.form.exp_year)
    }

    pub fn street(&self) -> &str {
        Self::value(&self.form.street)
    }

    pub fn city(&self) -> &str {
        Self::value(&self.form.city)
    }

    pub fn state(&self) -> &str {
        Self::value(&self.form.state)
    }

    pub fn postal_code(&self) -> &str {
        Self::value(&self.form.postal_code)
    }

    pub fn billing_phone(&self) -> &str {
        Self::value(&self.form.billing_phone)
    }
}

#[derive(Template, WebTemplate)]
#[template(path = "portal/join/done.html")]
pub struct DoneTemplate {
    pub step: Step,
    pub customer_id: String,
    pub receipt_id: String,
    pub params: DoneParams,
    pub error: Option<String>,
    /// Set when the purchase cannot be linked from this page.
    pub notice: Option<&'static str>,
}

impl DoneTemplate {
    fn new(customer_id: &str, receipt_id: &str, params: DoneParams) -> Self {
        let linkable = params.email().is_some() && params.license_plate().is_some();
        Self {
            step: Step::Done,
            customer_id: customer_id.to_owned(),
            receipt_id: receipt_id.to_owned(),
            params,
            error: None,
            notice: (!linkable).then_some(MISSING_INFORMATION),
        }
    }

    pub fn email(&self) -> &str {
        self.params.email().unwrap_or_default()
    }

    pub fn plate(&self) -> &str {
        self.params.license_plate().unwrap_or_default()
    }
}

// =============================================================================
// Step 1: plans
// =============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlansQuery {
    pub site_code: Option<String>,
}

/// `GET /portal/join`
#[instrument(skip(state))]
pub async fn plans(State(state): State<AppState>, Query(query): Query<PlansQuery>) -> Response {
    let (plans, error) = match state.ecom().list_recurring_plans().await {
        Ok(plans) => (plans, None),
        Err(e) => {
            tracing::warn!(error = %e, "Plan catalog unavailable");
            (Vec::new(), Some(banner(e)))
        }
    };

    PlansTemplate {
        step: Step::Plans,
        plans,
        site_code: query.site_code.filter(|s| !s.trim().is_empty()),
        error,
    }
    .into_response()
}

// =============================================================================
// Step 2: cart
// =============================================================================

/// Cart form: the continuation plus what the customer typed.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartForm {
    #[serde(flatten)]
    pub params: CartParams,
    pub license_plate: Option<String>,
    pub discount_code: Option<String>,
}

async fn find_plan(state: &AppState, plan_id: &str) -> Result<Option<RecurringPlan>, String> {
    state
        .ecom()
        .list_recurring_plans()
        .await
        .map(|plans| plans.into_iter().find(|plan| plan.id == plan_id))
        .map_err(banner)
}

async fn sites(state: &AppState) -> Vec<Site> {
    state.backoffice().list_sites().await.unwrap_or_else(|e| {
        tracing::debug!(error = %e, "Site list unavailable");
        Vec::new()
    })
}

/// `GET /portal/join/cart?planId=..&siteCode=..`
#[instrument(skip(state))]
pub async fn cart_page(State(state): State<AppState>, Query(params): Query<CartParams>) -> Response {
    let Some(plan_id) = params.plan_id() else {
        return restart();
    };

    let plan = match find_plan(&state, plan_id).await {
        Ok(Some(plan)) => plan,
        Ok(None) => return restart(),
        Err(error) => {
            return PlansTemplate {
                step: Step::Plans,
                plans: Vec::new(),
                site_code: None,
                error: Some(error),
            }
            .into_response();
        }
    };

    CartTemplate {
        step: Step::Cart,
        plan,
        sites: sites(&state).await,
        site_code: params
            .site_code_or(&state.config().default_site_code)
            .to_owned(),
        license_plate: String::new(),
        discount_code: String::new(),
        error: None,
    }
    .into_response()
}

/// `POST /portal/join/cart`
///
/// Prices the order with the vendor and moves on to payment carrying the
/// pending-order token.
#[instrument(skip(state, form))]
pub async fn cart_submit(State(state): State<AppState>, Form(form): Form<CartForm>) -> Response {
    let Some(plan_id) = form.params.plan_id() else {
        return restart();
    };

    let plan = match find_plan(&state, plan_id).await {
        Ok(Some(plan)) => plan,
        Ok(None) => return restart(),
        Err(error) => return cart_error(&state, RecurringPlan::default(), &form, error).await,
    };

    let plate = match cart_plate(form.license_plate.as_deref(), plan.lpr_enabled) {
        Ok(plate) => plate,
        Err(e) => return cart_error(&state, plan, &form, e.to_string()).await,
    };

    let input = PendingOrderInput {
        site_code: Some(
            form.params
                .site_code_or(&state.config().default_site_code)
                .to_owned(),
        ),
        order_items: Some(vec![OrderItemInput {
            id: Some(plan.id.clone()),
            quantity: Some(1),
            license_plate: plate.as_ref().map(|p| p.as_str().to_owned()),
        }]),
        discount_code: form
            .discount_code
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_owned),
    };

    let request = match input.validate() {
        Ok(request) => request,
        Err(errors) => {
            let message = errors
                .issues()
                .first()
                .map_or_else(String::new, |issue| issue.message.clone());
            return cart_error(&state, plan, &form, message).await;
        }
    };

    match state.ecom().create_detailed_pending_order(&request).await {
        Ok(order) => {
            add_breadcrumb(
                "checkout",
                "Pending order created",
                Some(&[("site_code", request.site_code.as_str())]),
            );
            let next = CheckoutParams {
                pending_order_token: Some(order.token),
                license_plate: plate.map(|p| p.into_inner()),
            };
            Redirect::to(&Step::Checkout.url(&next)).into_response()
        }
        Err(e) => {
            tracing::warn!(error = %e, "Pending order rejected");
            cart_error(&state, plan, &form, banner(e)).await
        }
    }
}

async fn cart_error(
    state: &AppState,
    plan: RecurringPlan,
    form: &CartForm,
    error: String,
) -> Response {
    CartTemplate {
        step: Step::Cart,
        plan,
        sites: sites(state).await,
        site_code: form
            .params
            .site_code_or(&state.config().default_site_code)
            .to_owned(),
        license_plate: form.license_plate.clone().unwrap_or_default(),
        discount_code: form.discount_code.clone().unwrap_or_default(),
        error: Some(error),
    }
    .into_response()
}

// =============================================================================
// Step 3: checkout
// =============================================================================

/// `GET /portal/join/checkout?pendingOrderToken=..&licensePlate=..`
pub async fn checkout_page(Query(params): Query<CheckoutParams>) -> Response {
    if params.pending_order_token().is_none() {
        return restart();
    }

    CheckoutTemplate {
        step: Step::Checkout,
        params,
        form: CheckoutForm::default(),
        current_year: current_year(),
        issues: Vec::new(),
        error: None,
    }
    .into_response()
}

/// `POST /portal/join/checkout`
///
/// Pays for the pending order as a guest. The token is single-use, so a
/// repeated submission comes back from the vendor as an ordinary failure.
#[instrument(skip(state, form))]
pub async fn checkout_submit(
    State(state): State<AppState>,
    Form(form): Form<CheckoutForm>,
) -> Response {
    let params = form.params();
    if params.pending_order_token().is_none() {
        return restart();
    }

    let current_year = current_year();
    let rerender = |form: CheckoutForm, issues: Vec<Issue>, error: Option<String>| {
        CheckoutTemplate {
            step: Step::Checkout,
            params: form.params(),
            form: CheckoutForm {
                card_number: None,
                security_code: None,
                ..form
            },
            current_year,
            issues,
            error,
        }
        .into_response()
    };

    let request = match form.validate(current_year) {
        Ok(request) => request,
        Err(errors) => {
            return rerender(
                form,
                errors.issues().to_vec(),
                Some("Please correct the highlighted fields".to_string()),
            );
        }
    };

    match state.ecom().process_payment(&request).await {
        Ok(payment) => {
            add_breadcrumb(
                "checkout",
                "Payment processed",
                Some(&[("customer_id", payment.customer_id.as_str())]),
            );
            tracing::info!(customer_id = %payment.customer_id, "Join payment processed");

            let next = DoneParams {
                customer_id: Some(payment.customer_id),
                receipt_id: Some(payment.receipt_id),
                email: Some(request.customer.email),
                license_plate: params.license_plate().map(str::to_owned),
            };
            Redirect::to(&Step::Done.url(&next)).into_response()
        }
        Err(e) => {
            tracing::warn!(error = %e, "Join payment failed");
            rerender(form, Vec::new(), Some(banner(e)))
        }
    }
}

// =============================================================================
// Step 4: done
// =============================================================================

/// `GET /portal/join/done?customerId=..&receiptId=..&email=..&licensePlate=..`
pub async fn done_page(Query(params): Query<DoneParams>) -> Response {
    let Some((customer_id, receipt_id)) = params.receipt() else {
        return restart();
    };

    DoneTemplate::new(customer_id, receipt_id, params.clone()).into_response()
}

/// `POST /portal/join/done`
///
/// Links the purchase to a portal session with the same three-factor check
/// the login page uses; the plate is the product code.
#[instrument(skip(state, session, form))]
pub async fn done_submit(
    State(state): State<AppState>,
    mut session: Session,
    Form(form): Form<DoneForm>,
) -> Response {
    if form.skipped() {
        return Redirect::to("/portal").into_response();
    }

    let Some((customer_id, receipt_id)) = form.params.receipt() else {
        return restart();
    };
    let (Some(email), Some(plate)) = (form.params.email(), form.params.license_plate()) else {
        tracing::warn!("Purchase cannot be linked without email and plate");
        return Redirect::to("/portal").into_response();
    };

    let rerender = |error: String| {
        let mut page = DoneTemplate::new(customer_id, receipt_id, form.params.clone());
        page.error = Some(error);
        page.into_response()
    };

    let Some(last_four) = form.last_four() else {
        return rerender(INVALID_CARD.to_string());
    };

    let request = RegisterRequest {
        email: email.to_owned(),
        product_code: plate.to_owned(),
        last_four_credit_card: last_four.to_owned(),
    };

    match state.ecom().register_customer(&request).await {
        Ok(customer) => {
            set_sentry_user(&customer.id, Some(email));
            add_breadcrumb("auth", "Purchase linked to session", None);

            session.set(SessionData::signed_in(
                customer.id,
                customer.customer_token,
                Some(request.email),
            ));
            (session, Redirect::to("/portal/dashboard")).into_response()
        }
        Err(e) => {
            tracing::warn!(error = %e, "Linking purchase failed");
            rerender(banner(e))
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::{
        body::Body,
        http::{Request, StatusCode, header},
    };
    use tower::ServiceExt;

    use crate::routes::test_support::{self, FakeVendor};

    fn form(uri: &str, body: &str) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_owned()))
            .unwrap()
    }

    async fn location_of(request: Request<Body>, vendor: &FakeVendor) -> String {
        let response = test_support::app(vendor).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        response.headers()[header::LOCATION]
            .to_str()
            .unwrap()
            .to_owned()
    }

    #[tokio::test]
    async fn test_steps_without_state_restart() {
        let vendor = FakeVendor::unreachable();
        for uri in [
            "/portal/join/cart",
            "/portal/join/checkout",
            "/portal/join/done?customerId=864:2000",
        ] {
            let request = Request::get(uri).body(Body::empty()).unwrap();
            assert_eq!(location_of(request, &vendor).await, "/portal/join", "{uri}");
        }
    }

    #[tokio::test]
    async fn test_plans_listed() {
        let vendor = FakeVendor::start().await;
        let response = test_support::app(&vendor)
            .oneshot(Request::get("/portal/join").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let html = test_support::text(response).await;
        assert!(html.contains("Unlimited Wash"));
        assert!(html.contains("$9.99"));
    }

    #[tokio::test]
    async fn test_cart_requires_plate_for_lpr_plan() {
        let vendor = FakeVendor::start().await;
        let response = test_support::app(&vendor)
            .oneshot(form("/portal/join/cart", "planId=123&siteCode=DEF"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let html = test_support::text(response).await;
        assert!(html.contains("License plate is required for this plan"));
    }

    #[tokio::test]
    async fn test_cart_carries_token_and_uppercased_plate() {
        let vendor = FakeVendor::start().await;
        let location = location_of(
            form(
                "/portal/join/cart",
                "planId=123&siteCode=DEF&licensePlate=abc123",
            ),
            &vendor,
        )
        .await;
        assert_eq!(
            location,
            "/portal/join/checkout?licensePlate=ABC123&pendingOrderToken=po_123"
        );
    }

    #[tokio::test]
    async fn test_cart_shows_vendor_rejection() {
        let vendor = FakeVendor::start().await;
        let response = test_support::app(&vendor)
            .oneshot(form(
                "/portal/join/cart",
                "planId=456&siteCode=DEF&discountCode=BAD",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let html = test_support::text(response).await;
        assert!(html.contains("Invalid request data. Please check your input."));
    }

    #[tokio::test]
    async fn test_checkout_pays_and_moves_on() {
        let vendor = FakeVendor::start().await;
        let body = "pendingOrderToken=po_123&licensePlate=ABC123&firstName=Ada&lastName=Lovelace\
            &email=ada%40example.com&phone=8135551234&cardFullName=Ada+Lovelace\
            &cardNumber=4111+1111+1111+1111&expMonth=4&expYear=2099&securityCode=123\
            &street=1+Main+St&city=Tampa&state=FL&postalCode=33601&billingPhone=8135551234";
        let location = location_of(form("/portal/join/checkout", body), &vendor).await;
        assert_eq!(
            location,
            "/portal/join/done?customerId=864%3A2000&email=ada%40example.com\
             &licensePlate=ABC123&receiptId=1%3A77"
        );
    }

    #[tokio::test]
    async fn test_checkout_reused_token_is_a_payment_error() {
        let vendor = FakeVendor::start().await;
        let body = "pendingOrderToken=used&firstName=Ada&lastName=Lovelace\
            &email=ada%40example.com&phone=8135551234&cardFullName=Ada+Lovelace\
            &cardNumber=4111111111111111&expMonth=4&expYear=2099&securityCode=123\
            &street=1+Main+St&city=Tampa&state=FL&postalCode=33601&billingPhone=8135551234";
        let response = test_support::app(&vendor)
            .oneshot(form("/portal/join/checkout", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let html = test_support::text(response).await;
        assert!(html.contains("Invalid request data. Please check your input."));
        assert!(!html.contains("4111111111111111"));
    }

    #[tokio::test]
    async fn test_done_links_session() {
        let vendor = FakeVendor::start().await;
        let response = test_support::app(&vendor)
            .oneshot(form(
                "/portal/join/done",
                "customerId=864%3A2000&receiptId=1%3A77&email=ada%40example.com\
                 &licensePlate=ABC123&lastFour=4242",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/portal/dashboard");
        assert!(response.headers().contains_key(header::SET_COOKIE));
    }

    #[tokio::test]
    async fn test_done_skip_and_missing_plate_leave_without_session() {
        let vendor = FakeVendor::unreachable();
        for body in [
            "customerId=864%3A2000&receiptId=1%3A77&skip=1",
            "customerId=864%3A2000&receiptId=1%3A77&email=ada%40example.com&lastFour=4242",
        ] {
            let response = test_support::app(&vendor)
                .oneshot(form("/portal/join/done", body))
                .await
                .unwrap();
            assert_eq!(response.headers()[header::LOCATION], "/portal");
            assert!(response.headers().get(header::SET_COOKIE).is_none());
        }
    }

    #[tokio::test]
    async fn test_done_bad_last_four() {
        let vendor = FakeVendor::unreachable();
        let response = test_support::app(&vendor)
            .oneshot(form(
                "/portal/join/done",
                "customerId=864%3A2000&receiptId=1%3A77&email=ada%40example.com\
                 &licensePlate=ABC123&lastFour=42",
            ))
            .await
            .unwrap();
        let html = test_support::text(response).await;
        assert!(html.contains("Invalid card information"));
    }
}
