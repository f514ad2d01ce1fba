//! Unified error handling with Sentry integration.
//!
//! Every BFF handler returns `Result<_, AppError>`. Errors are written as the
//! JSON envelope `{ ok: false, code, message, details? }`; server errors are
//! captured to Sentry before responding.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::sonnys::{ErrorCode, SonnysError};
use crate::validation::ValidationErrors;

/// Application-level error type for the portal.
#[derive(Debug, Error)]
pub enum AppError {
    /// Request failed local validation.
    #[error("Invalid request data: {0}")]
    Validation(#[from] ValidationErrors),

    /// No signed-in customer.
    #[error("Authentication required")]
    Unauthenticated,

    /// Path customer id differs from the session's.
    #[error("Customer ID mismatch")]
    CustomerMismatch,

    /// Vendor API call failed.
    #[error("Vendor API error: {0}")]
    Sonnys(#[from] SonnysError),
}

impl AppError {
    /// Error code surfaced to the browser.
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Validation(_) => ErrorCode::PayloadValidation,
            Self::Unauthenticated | Self::CustomerMismatch => ErrorCode::NotAuthorized,
            Self::Sonnys(err) => err.code(),
        }
    }

    /// HTTP status of the response.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::CustomerMismatch => StatusCode::FORBIDDEN,
            Self::Sonnys(err) => {
                StatusCode::from_u16(err.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }

    /// Message shown to the customer.
    ///
    /// Local rejections keep their literal wording; everything else uses the
    /// friendly sentence for its code so vendor internals never leak.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::Validation(_) => "Invalid request data".to_string(),
            Self::Unauthenticated | Self::CustomerMismatch => self.to_string(),
            Self::Sonnys(_) => self.code().friendly_message().to_string(),
        }
    }

    fn details(&self) -> Option<Value> {
        match self {
            Self::Validation(errors) => serde_json::to_value(errors).ok(),
            Self::Sonnys(err) => err.details().cloned(),
            _ => None,
        }
    }
}

/// Failure half of the response envelope.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub ok: bool,
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else {
            tracing::debug!(error = %self, status = %status, "Request rejected");
        }

        let body = ErrorBody {
            ok: false,
            code: self.code(),
            message: self.public_message(),
            details: self.details(),
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a customer id.
///
/// Call this after successful authentication to associate errors with customers.
pub fn set_sentry_user(customer_id: &str, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(customer_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the customer.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for customer actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("checkout", "Pending order created", Some(&[("site_code", "DEF")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::to_bytes;
    use serde_json::json;

    use super::*;
    use crate::sonnys::VendorError;

    async fn body_of(err: AppError) -> (StatusCode, Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_app_error_display() {
        assert_eq!(AppError::Unauthenticated.to_string(), "Authentication required");
        assert_eq!(AppError::CustomerMismatch.to_string(), "Customer ID mismatch");
    }

    #[tokio::test]
    async fn test_validation_envelope() {
        let (status, body) =
            body_of(ValidationErrors::single("email", "Invalid email").into()).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            body,
            json!({
                "ok": false,
                "code": "PayloadValidationError",
                "message": "Invalid request data",
                "details": [{"path": "email", "message": "Invalid email"}]
            })
        );
    }

    #[tokio::test]
    async fn test_auth_envelopes() {
        let (status, body) = body_of(AppError::Unauthenticated).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "NotAuthorizedError");
        assert_eq!(body["message"], "Authentication required");
        assert!(body.get("details").is_none());

        let (status, body) = body_of(AppError::CustomerMismatch).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["code"], "NotAuthorizedError");
        assert_eq!(body["message"], "Customer ID mismatch");
    }

    #[tokio::test]
    async fn test_vendor_error_uses_vendor_status_and_friendly_message() {
        let vendor = VendorError::from_response(
            401,
            r#"{"type":"BadCustomerCredentialsError","message":"internal detail","details":["x"]}"#,
        );
        let (status, body) = body_of(SonnysError::Api(vendor).into()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "BadCustomerCredentialsError");
        assert_eq!(
            body["message"],
            "Invalid customer credentials. Please verify your information."
        );
        assert_eq!(body["details"], json!(["x"]));
    }

    #[tokio::test]
    async fn test_not_found_is_404() {
        let (status, body) = body_of(SonnysError::NotFound("account".into()).into()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "EntityNotFoundError");
        assert_eq!(body["message"], "The requested resource was not found.");
    }

    #[tokio::test]
    async fn test_unreadable_vendor_body_is_500() {
        let vendor = VendorError::from_response(502, "<html>Bad Gateway</html>");
        let (status, body) = body_of(SonnysError::Api(vendor).into()).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["code"], "UnexpectedFailure");
        assert_eq!(
            body["message"],
            "An unexpected error occurred. Please try again."
        );
    }
}
