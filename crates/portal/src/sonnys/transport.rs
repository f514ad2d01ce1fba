//! Shared HTTP plumbing for both vendor APIs.

use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, instrument, warn};
use url::Url;

use super::{SonnysError, VendorError};
use crate::config::VendorApiConfig;

pub const API_KEY_HEADER: HeaderName = HeaderName::from_static("x-sonnys-api-key");
pub const API_ID_HEADER: HeaderName = HeaderName::from_static("x-sonnys-api-id");
pub const CUSTOMER_TOKEN_HEADER: HeaderName = HeaderName::from_static("x-sonnys-customer-token");

/// A `reqwest::Client` bound to one vendor base URL and its credentials.
pub struct Transport {
    client: reqwest::Client,
    base_url: Url,
    api: &'static str,
}

impl Transport {
    /// Build a transport whose every request carries the API key and API ID.
    pub fn new(config: &VendorApiConfig, api: &'static str) -> Result<Self, SonnysError> {
        let mut api_key = HeaderValue::from_str(config.api_key.expose_secret())
            .map_err(|e| SonnysError::Config(format!("{api} API key: {e}")))?;
        api_key.set_sensitive(true);
        let api_id = HeaderValue::from_str(&config.api_id)
            .map_err(|e| SonnysError::Config(format!("{api} API ID: {e}")))?;

        let mut headers = HeaderMap::new();
        headers.insert(API_KEY_HEADER, api_key);
        headers.insert(API_ID_HEADER, api_id);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| SonnysError::Config(format!("{api} HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            api,
        })
    }

    /// Resolve a vendor path (e.g. `/site/list`) against the base URL.
    fn url(&self, path: &str) -> Result<Url, SonnysError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| SonnysError::Config(format!("{}{path}: {e}", self.base_url)))
    }

    /// `GET` a path, optionally on behalf of a customer.
    pub async fn get(
        &self,
        path: &str,
        customer_token: Option<&SecretString>,
    ) -> Result<Value, SonnysError> {
        let request = with_token(self.client.get(self.url(path)?), customer_token)?;
        self.send(path, request).await
    }

    /// `POST` a JSON body to a path, optionally on behalf of a customer.
    pub async fn post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
        customer_token: Option<&SecretString>,
    ) -> Result<Value, SonnysError> {
        let request = with_token(self.client.post(self.url(path)?).json(body), customer_token)?;
        self.send(path, request).await
    }

    #[instrument(skip(self, request), fields(api = self.api))]
    async fn send(
        &self,
        path: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<Value, SonnysError> {
        let response = request.send().await?;
        let status = response.status();

        // Read as text first so error bodies of any shape can be normalized
        let body = response.text().await?;

        if !status.is_success() {
            let error = VendorError::from_response(status.as_u16(), &body);
            warn!(
                status = %status,
                code = %error.code,
                message = %error.message,
                "Vendor API returned non-success status"
            );
            return Err(SonnysError::Api(error));
        }

        debug!(status = %status, bytes = body.len(), "Vendor API response");

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&body).map_err(|e| SonnysError::Decode {
            path: path.to_owned(),
            reason: e.to_string(),
        })
    }
}

fn with_token(
    request: reqwest::RequestBuilder,
    customer_token: Option<&SecretString>,
) -> Result<reqwest::RequestBuilder, SonnysError> {
    let Some(token) = customer_token else {
        return Ok(request);
    };

    let mut value = HeaderValue::from_str(token.expose_secret())
        .map_err(|_| SonnysError::Config("customer token is not a valid header value".into()))?;
    value.set_sensitive(true);
    Ok(request.header(CUSTOMER_TOKEN_HEADER, value))
}

/// Strip the vendor's `{ "data": ... }` envelope if present.
pub fn unwrap_data(body: Value) -> Value {
    match body {
        Value::Object(mut map) if map.contains_key("data") => {
            map.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    }
}

/// Decode a response body as `T`, accepting both `{ "data": T }` and bare `T`.
pub fn decode<T: DeserializeOwned>(path: &str, body: Value) -> Result<T, SonnysError> {
    serde_json::from_value(unwrap_data(body)).map_err(|e| SonnysError::Decode {
        path: path.to_owned(),
        reason: e.to_string(),
    })
}

/// Build `path?k=v&...` from the non-empty pairs.
pub fn with_query(path: &str, pairs: &[(&str, Option<&str>)]) -> String {
    let mut query = url::form_urlencoded::Serializer::new(String::new());
    let mut any = false;
    for (key, value) in pairs {
        if let Some(value) = value.filter(|v| !v.is_empty()) {
            query.append_pair(key, value);
            any = true;
        }
    }

    if any {
        format!("{path}?{}", query.finish())
    } else {
        path.to_owned()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde::Deserialize;
    use serde_json::json;

    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Site {
        code: String,
    }

    #[test]
    fn test_decode_accepts_envelope_and_bare() {
        let wrapped: Vec<Site> = decode("/x", json!({"data": [{"code": "DEF"}]})).unwrap();
        let bare: Vec<Site> = decode("/x", json!([{"code": "DEF"}])).unwrap();
        assert_eq!(wrapped, bare);
    }

    #[test]
    fn test_decode_reports_path() {
        let err = decode::<Vec<Site>>("/site/list", json!({"data": 3})).unwrap_err();
        assert!(matches!(err, SonnysError::Decode { ref path, .. } if path == "/site/list"));
    }

    #[test]
    fn test_unwrap_data_null() {
        assert_eq!(unwrap_data(json!({"data": null})), Value::Null);
        assert_eq!(unwrap_data(json!({"other": 1})), json!({"other": 1}));
    }

    #[test]
    fn test_with_query_skips_empty_values() {
        assert_eq!(
            with_query(
                "/customer/search",
                &[
                    ("email", Some("a+b@example.com")),
                    ("firstName", None),
                    ("lastName", Some(""))
                ]
            ),
            "/customer/search?email=a%2Bb%40example.com"
        );
        assert_eq!(with_query("/site/list", &[("x", None)]), "/site/list");
    }
}
