//! Vendor error normalization.
//!
//! Both vendor APIs report failures as a JSON body with loosely agreed field
//! names. [`VendorError::from_response`] folds every variant we have seen into
//! one shape and never fails, even for HTML error pages or empty bodies.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Error code reported by the vendor (or assigned locally).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NotAuthorized,
    BadClientCredentials,
    MissingClientCredentials,
    BadCustomerCredentials,
    MissingCustomerCredentials,
    EntityNotFound,
    PayloadValidation,
    RequestRateExceed,
    UnexpectedFailure,
    ServerUnexpectedFailure,
    /// Any code outside the known set, kept verbatim.
    Other(String),
}

impl ErrorCode {
    /// Parse a vendor code string.
    #[must_use]
    pub fn parse(code: &str) -> Self {
        match code {
            "NotAuthorizedError" => Self::NotAuthorized,
            "BadClientCredentialsError" => Self::BadClientCredentials,
            "MissingClientCredentialsError" => Self::MissingClientCredentials,
            "BadCustomerCredentialsError" => Self::BadCustomerCredentials,
            "MissingCustomerCredentialsError" => Self::MissingCustomerCredentials,
            "EntityNotFoundError" => Self::EntityNotFound,
            "PayloadValidationError" => Self::PayloadValidation,
            "RequestRateExceedError" => Self::RequestRateExceed,
            "UnexpectedFailure" => Self::UnexpectedFailure,
            "ServerUnexpectedFailure" => Self::ServerUnexpectedFailure,
            other => Self::Other(other.to_owned()),
        }
    }

    /// The wire name of this code.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::NotAuthorized => "NotAuthorizedError",
            Self::BadClientCredentials => "BadClientCredentialsError",
            Self::MissingClientCredentials => "MissingClientCredentialsError",
            Self::BadCustomerCredentials => "BadCustomerCredentialsError",
            Self::MissingCustomerCredentials => "MissingCustomerCredentialsError",
            Self::EntityNotFound => "EntityNotFoundError",
            Self::PayloadValidation => "PayloadValidationError",
            Self::RequestRateExceed => "RequestRateExceedError",
            Self::UnexpectedFailure => "UnexpectedFailure",
            Self::ServerUnexpectedFailure => "ServerUnexpectedFailure",
            Self::Other(code) => code,
        }
    }

    /// Human-readable sentence shown to customers for this code.
    #[must_use]
    pub const fn friendly_message(&self) -> &'static str {
        match self {
            Self::NotAuthorized => "Authentication failed. Please try again.",
            Self::BadClientCredentials => "Invalid API credentials. Please contact support.",
            Self::MissingClientCredentials => "Missing authentication information.",
            Self::BadCustomerCredentials => {
                "Invalid customer credentials. Please verify your information."
            }
            Self::MissingCustomerCredentials => "Customer authentication required.",
            Self::EntityNotFound => "The requested resource was not found.",
            Self::PayloadValidation => "Invalid request data. Please check your input.",
            Self::RequestRateExceed => "Too many requests. Please try again in a moment.",
            Self::UnexpectedFailure => "An unexpected error occurred. Please try again.",
            Self::ServerUnexpectedFailure => "Server error. Please try again later.",
            Self::Other(_) => "An error occurred. Please try again.",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ErrorCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ErrorCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = String::deserialize(deserializer)?;
        Ok(Self::parse(&code))
    }
}

/// A normalized non-2xx vendor response.
#[derive(Debug, Clone, PartialEq)]
pub struct VendorError {
    pub code: ErrorCode,
    pub message: String,
    pub details: Option<Value>,
    pub status: u16,
}

const DEFAULT_MESSAGE: &str = "An unexpected error occurred";

impl VendorError {
    /// Normalize a failed vendor response from its status and raw body.
    ///
    /// - `code`: `type`, then `errorType`, else `UnexpectedFailure`
    /// - `message`: `message`, then `errorMessage`, else a generic sentence
    /// - `details`: the first truthy of `messages`, `details`, `errors`,
    ///   `validationErrors`, else the whole body
    #[must_use]
    pub fn from_response(status: u16, body: &str) -> Self {
        let Ok(parsed) = serde_json::from_str::<Value>(body) else {
            let trimmed = body.trim();
            return Self {
                code: ErrorCode::UnexpectedFailure,
                message: DEFAULT_MESSAGE.to_owned(),
                details: (!trimmed.is_empty()).then(|| Value::String(trimmed.to_owned())),
                status,
            };
        };

        let code = first_string(&parsed, &["type", "errorType"])
            .map_or(ErrorCode::UnexpectedFailure, ErrorCode::parse);
        let message = first_string(&parsed, &["message", "errorMessage"])
            .unwrap_or(DEFAULT_MESSAGE)
            .to_owned();
        let details = ["messages", "details", "errors", "validationErrors"]
            .iter()
            .find_map(|key| parsed.get(key).filter(|v| is_truthy(v)).cloned())
            .unwrap_or(parsed);

        Self {
            code,
            message,
            details: Some(details),
            status,
        }
    }
}

impl fmt::Display for VendorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.code, self.status, self.message)
    }
}

fn first_string<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|key| value.get(key).and_then(Value::as_str).filter(|s| !s.is_empty()))
}

/// JavaScript-style truthiness, which is what the vendor's own SDKs rely on.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f.abs() > 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
