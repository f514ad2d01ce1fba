//! Landing, sign-in, dashboard and sign-out pages.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tracing::instrument;

use super::banner;
use crate::error::{add_breadcrumb, clear_sentry_user, set_sentry_user};
use crate::filters;
use crate::middleware::Session;
use crate::models::SessionData;
use crate::sonnys::{RecurringAccount, RecurringBilling};
use crate::state::AppState;
use crate::validation::{DEFAULT_BILLINGS_LIMIT, RegisterInput};

// =============================================================================
// Form Types
// =============================================================================

/// Three-factor sign-in form.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginForm {
    pub email: Option<String>,
    pub product_code: Option<String>,
    pub last_four: Option<String>,
}

impl LoginForm {
    fn input(&self) -> RegisterInput {
        let trimmed = |v: &Option<String>| {
            v.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
        };
        RegisterInput {
            email: trimmed(&self.email),
            product_code: trimmed(&self.product_code).map(|s| s.to_ascii_uppercase()),
            last_four_credit_card: trimmed(&self.last_four),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    pub error: Option<String>,
}

// =============================================================================
// Templates
// =============================================================================

#[derive(Template, WebTemplate)]
#[template(path = "portal/index.html")]
pub struct LandingTemplate {
    pub signed_in: bool,
}

#[derive(Template, WebTemplate)]
#[template(path = "portal/login.html")]
pub struct LoginTemplate {
    pub error: Option<String>,
    pub email: String,
}

/// What the dashboard knows about the membership.
pub enum Membership {
    Active(Box<RecurringAccount>),
    /// The customer has no recurring account.
    None,
    /// The lookup failed; holds the banner text.
    Unavailable(String),
}

#[derive(Template, WebTemplate)]
#[template(path = "portal/dashboard.html")]
pub struct DashboardTemplate {
    pub email: Option<String>,
    pub membership: Membership,
    pub billings: Vec<RecurringBilling>,
}

// =============================================================================
// Handlers
// =============================================================================

/// `GET /portal`
pub async fn landing(session: Session) -> impl IntoResponse {
    LandingTemplate {
        signed_in: session.is_authenticated(),
    }
}

/// `GET /portal/login`
pub async fn login_page(session: Session, Query(query): Query<MessageQuery>) -> Response {
    if session.is_authenticated() {
        return Redirect::to("/portal/dashboard").into_response();
    }

    LoginTemplate {
        error: query.error,
        email: String::new(),
    }
    .into_response()
}

/// `POST /portal/login`
///
/// The vendor's register call doubles as login: it checks email, product code
/// (RFID tag or plate) and the card's last four digits.
#[instrument(skip(state, session, form))]
pub async fn login(
    State(state): State<AppState>,
    mut session: Session,
    Form(form): Form<LoginForm>,
) -> Response {
    let input = form.input();
    let email = input.email.clone().unwrap_or_default();

    let request = match input.validate() {
        Ok(request) => request,
        Err(errors) => {
            let error = errors
                .issues()
                .first()
                .map(|issue| issue.message.clone());
            return LoginTemplate { error, email }.into_response();
        }
    };

    match state.ecom().register_customer(&request).await {
        Ok(customer) => {
            set_sentry_user(&customer.id, Some(&request.email));
            add_breadcrumb("auth", "Customer signed in", None);
            tracing::info!(customer_id = %customer.id, "Customer signed in");

            session.set(SessionData::signed_in(
                customer.id,
                customer.customer_token,
                Some(request.email),
            ));
            (session, Redirect::to("/portal/dashboard")).into_response()
        }
        Err(e) => {
            tracing::warn!(error = %e, "Sign-in failed");
            LoginTemplate {
                error: Some(banner(e)),
                email,
            }
            .into_response()
        }
    }
}

/// `GET /portal/dashboard`
#[instrument(skip(state, session))]
pub async fn dashboard(State(state): State<AppState>, session: Session) -> Response {
    let Ok(customer) = session.require_auth() else {
        return Redirect::to("/portal/login").into_response();
    };

    let backoffice = state.backoffice();
    let (account, billings) = tokio::join!(
        backoffice.get_recurring_account(&customer.customer_id),
        backoffice.get_recurring_billings(&customer.customer_id, DEFAULT_BILLINGS_LIMIT),
    );

    let membership = match account {
        Ok(account) => Membership::Active(Box::new(account)),
        Err(e) if e.is_not_found() => Membership::None,
        Err(e) => {
            tracing::warn!(error = %e, "Recurring account lookup failed");
            Membership::Unavailable(banner(e))
        }
    };

    DashboardTemplate {
        email: customer.email,
        membership,
        billings: billings.unwrap_or_default(),
    }
    .into_response()
}

/// `POST /portal/logout`
pub async fn logout(mut session: Session) -> impl IntoResponse {
    session.clear();
    clear_sentry_user();
    (session, Redirect::to("/portal"))
}
