//! HTTP route handlers for the portal.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                                   - Liveness check
//!
//! # JSON backend-for-frontend
//! POST /api/auth/logout                          - Clear the session
//! GET  /api/backoffice/customer/search           - Search customers
//! GET  /api/backoffice/customer/{id}             - Customer detail
//! GET  /api/backoffice/recurring/account/{id}    - Membership of a customer
//! GET  /api/backoffice/recurring/account/{id}/billings - Billing history
//! GET  /api/backoffice/site/list                 - Wash sites
//! POST /api/ecom/customer/register               - Three-factor sign-in
//! GET  /api/ecom/customer/{id}/order/receipt/{receipt} - Receipt (session)
//! GET  /api/ecom/inventory/recurring             - Plan catalog
//! POST /api/ecom/shop/detailed-pending-order     - Price an order
//! POST /api/ecom/shop/payment                    - Guest payment
//! POST /api/ecom/shop/customer/{id}/payment      - Member payment (session)
//!
//! # Pages
//! GET  /portal                                   - Landing
//! GET  /portal/login, POST /portal/login         - Sign in
//! GET  /portal/dashboard                         - Membership and billing (session)
//! POST /portal/logout                            - Sign out
//! GET  /portal/join                              - Join: choose a plan
//! GET  /portal/join/cart, POST                   - Join: vehicle and site
//! GET  /portal/join/checkout, POST               - Join: payment
//! GET  /portal/join/done, POST                   - Join: link the purchase
//! ```

pub mod api;
pub mod portal;

#[cfg(test)]
pub(crate) mod test_support;

use axum::{Router, response::Redirect, routing::get};

use crate::state::AppState;

/// Create all routes for the portal.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(|| async { Redirect::to("/portal") }))
        .nest("/api", api::routes())
        .nest("/portal", portal::routes())
}
