//! Encrypted cookie sessions.
//!
//! The session lives entirely in one cookie: a JSON [`SessionData`] sealed with
//! the `cookie` crate's private jar (AES-256-GCM, cookie name bound as
//! associated data). There is no server-side session table, so the sealed
//! payload carries its own expiry and `open` refuses anything past it.
//!
//! [`SessionCodec`] is the pure seal/open pair. [`Session`] is the per-request
//! extractor handed to handlers; any change is written back as a `Set-Cookie`
//! response part.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{FromRef, FromRequestParts};
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderValue};
use axum::response::{IntoResponseParts, ResponseParts};
use chrono::Utc;
use cookie::{Cookie, CookieJar, Key, SameSite};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::SessionConfig;
use crate::error::AppError;
use crate::models::session::{AuthenticatedCustomer, SessionData};

/// Minimum session secret length in bytes.
pub const MIN_SECRET_BYTES: usize = 32;

/// Errors building a [`SessionCodec`].
#[derive(Debug, Error)]
pub enum SessionKeyError {
    #[error("session secret must be at least {MIN_SECRET_BYTES} bytes (got {0})")]
    SecretTooShort(usize),
}

/// Seals and opens session cookies.
#[derive(Clone)]
pub struct SessionCodec {
    inner: Arc<SessionCodecInner>,
}

struct SessionCodecInner {
    key: Key,
    name: String,
    max_age_seconds: i64,
    secure: bool,
}

/// What actually goes inside the encrypted cookie.
#[derive(Serialize, Deserialize)]
struct Sealed<D> {
    /// Unix seconds after which the payload is refused.
    exp: i64,
    data: D,
}

impl SessionCodec {
    /// Build a codec from session configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the secret is shorter than 32 bytes.
    pub fn new(config: &SessionConfig) -> Result<Self, SessionKeyError> {
        Self::from_secret(
            config.secret.expose_secret().as_bytes(),
            &config.cookie_name,
            config.max_age_seconds,
            config.secure,
        )
    }

    /// Build a codec from raw parts.
    ///
    /// The encryption key is derived from `secret` with HKDF, so any
    /// sufficiently long secret works.
    ///
    /// # Errors
    ///
    /// Returns an error if the secret is shorter than 32 bytes.
    pub fn from_secret(
        secret: &[u8],
        name: &str,
        max_age_seconds: i64,
        secure: bool,
    ) -> Result<Self, SessionKeyError> {
        if secret.len() < MIN_SECRET_BYTES {
            return Err(SessionKeyError::SecretTooShort(secret.len()));
        }

        Ok(Self {
            inner: Arc::new(SessionCodecInner {
                key: Key::derive_from(secret),
                name: name.to_owned(),
                max_age_seconds,
                secure,
            }),
        })
    }

    /// Cookie name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Encrypt session data into a cookie value valid for `max_age_seconds`.
    ///
    /// # Errors
    ///
    /// Returns an error if the data cannot be serialized.
    pub fn seal(&self, data: &SessionData) -> Result<String, serde_json::Error> {
        self.seal_at(data, Utc::now().timestamp())
    }

    fn seal_at(&self, data: &SessionData, now: i64) -> Result<String, serde_json::Error> {
        let json = serde_json::to_string(&Sealed {
            exp: now.saturating_add(self.inner.max_age_seconds),
            data,
        })?;

        let mut jar = CookieJar::new();
        jar.private_mut(&self.inner.key)
            .add(Cookie::new(self.inner.name.clone(), json));

        Ok(jar
            .get(&self.inner.name)
            .map(|cookie| cookie.value().to_owned())
            .unwrap_or_default())
    }

    /// Decrypt a cookie value.
    ///
    /// Returns `None` for anything that was not sealed by this codec under
    /// this cookie name (tampered, truncated, foreign-key or non-JSON values)
    /// and for payloads whose expiry has passed.
    #[must_use]
    pub fn open(&self, value: &str) -> Option<SessionData> {
        self.open_at(value, Utc::now().timestamp())
    }

    fn open_at(&self, value: &str, now: i64) -> Option<SessionData> {
        let mut jar = CookieJar::new();
        jar.add_original(Cookie::new(self.inner.name.clone(), value.to_owned()));

        let cookie = jar.private(&self.inner.key).get(&self.inner.name)?;
        let sealed: Sealed<SessionData> = serde_json::from_str(cookie.value()).ok()?;
        if sealed.exp <= now {
            tracing::debug!(expired_at = sealed.exp, "session cookie expired");
            return None;
        }
        Some(sealed.data)
    }

    /// Find and open this codec's cookie in request headers.
    #[must_use]
    pub fn read(&self, headers: &HeaderMap) -> Option<SessionData> {
        headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(Cookie::split_parse)
            .filter_map(Result::ok)
            .find(|cookie| cookie.name() == self.inner.name)
            .and_then(|cookie| self.open(cookie.value()))
    }

    /// `Set-Cookie` carrying sealed data.
    fn session_cookie(&self, value: String) -> Cookie<'static> {
        Cookie::build((self.inner.name.clone(), value))
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.inner.secure)
            .path("/")
            .max_age(cookie::time::Duration::seconds(self.inner.max_age_seconds))
            .build()
    }

    /// `Set-Cookie` that deletes the session cookie.
    fn removal_cookie(&self) -> Cookie<'static> {
        Cookie::build((self.inner.name.clone(), ""))
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.inner.secure)
            .path("/")
            .max_age(cookie::time::Duration::ZERO)
            .build()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Change {
    Set,
    Clear,
}

/// The current request's session.
///
/// Extraction never fails: a missing or unreadable cookie is an empty
/// session. Return the `Session` as part of the response to persist changes.
///
/// ```rust,ignore
/// async fn handler(mut session: Session) -> (Session, Redirect) {
///     session.clear();
///     (session, Redirect::to("/portal"))
/// }
/// ```
#[derive(Clone)]
pub struct Session {
    codec: SessionCodec,
    data: SessionData,
    change: Option<Change>,
}

impl Session {
    /// Current session contents.
    #[must_use]
    pub const fn data(&self) -> &SessionData {
        &self.data
    }

    /// Replace all session fields.
    pub fn set(&mut self, data: SessionData) {
        self.data = data;
        self.change = Some(Change::Set);
    }

    /// Forget everything and delete the cookie.
    pub fn clear(&mut self) {
        self.data = SessionData::default();
        self.change = Some(Change::Clear);
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.data.is_authenticated()
    }

    /// The signed-in customer.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Unauthenticated` if the customer id or token is missing.
    pub fn require_auth(&self) -> Result<AuthenticatedCustomer, AppError> {
        self.data.authenticated().ok_or(AppError::Unauthenticated)
    }

    fn pending_cookie(&self) -> Option<Cookie<'static>> {
        match self.change? {
            Change::Clear => Some(self.codec.removal_cookie()),
            Change::Set => match self.codec.seal(&self.data) {
                Ok(value) => Some(self.codec.session_cookie(value)),
                Err(e) => {
                    tracing::error!(error = %e, "Failed to seal session");
                    None
                }
            },
        }
    }
}

impl<S> FromRequestParts<S> for Session
where
    SessionCodec: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let codec = SessionCodec::from_ref(state);
        let data = codec.read(&parts.headers).unwrap_or_default();

        Ok(Self {
            codec,
            data,
            change: None,
        })
    }
}

impl IntoResponseParts for Session {
    type Error = Infallible;

    fn into_response_parts(self, mut res: ResponseParts) -> Result<ResponseParts, Self::Error> {
        if let Some(cookie) = self.pending_cookie()
            && let Ok(value) = HeaderValue::from_str(&cookie.to_string())
        {
            res.headers_mut().append(SET_COOKIE, value);
        }
        Ok(res)
    }
}
