//! Session routes.

use axum::Json;
use serde::Serialize;

use super::{Envelope, ok};
use crate::error::clear_sentry_user;
use crate::middleware::Session;

#[derive(Debug, Serialize)]
pub struct LogoutMessage {
    pub message: &'static str,
}

/// `POST /api/auth/logout`
///
/// Always succeeds, signed in or not.
#[tracing::instrument(skip(session))]
pub async fn logout(mut session: Session) -> (Session, Json<Envelope<LogoutMessage>>) {
    session.clear();
    clear_sentry_user();

    (
        session,
        ok(LogoutMessage {
            message: "Logged out successfully",
        }),
    )
}
