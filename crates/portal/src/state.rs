//! Application state shared across handlers.

use std::sync::Arc;

use axum::extract::FromRef;

use crate::config::PortalConfig;
use crate::middleware::session::{SessionCodec, SessionKeyError};
use crate::sonnys::{BackOfficeClient, EcomClient, SonnysError};

/// Error creating application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("session: {0}")]
    Session(#[from] SessionKeyError),
    #[error("vendor client: {0}")]
    Client(#[from] SonnysError),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// the vendor clients, the session codec and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: PortalConfig,
    backoffice: BackOfficeClient,
    ecom: EcomClient,
    sessions: SessionCodec,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if the session secret is too short or a vendor
    /// client cannot be built from its credentials.
    pub fn new(config: PortalConfig) -> Result<Self, StateError> {
        let backoffice = BackOfficeClient::new(&config.backoffice, config.backoffice_revalidate)?;
        let ecom = EcomClient::new(&config.ecom)?;
        let sessions = SessionCodec::new(&config.session)?;

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                backoffice,
                ecom,
                sessions,
            }),
        })
    }

    /// Get a reference to the portal configuration.
    #[must_use]
    pub fn config(&self) -> &PortalConfig {
        &self.inner.config
    }

    /// Get a reference to the BackOffice API client.
    #[must_use]
    pub fn backoffice(&self) -> &BackOfficeClient {
        &self.inner.backoffice
    }

    /// Get a reference to the eCommerce API client.
    #[must_use]
    pub fn ecom(&self) -> &EcomClient {
        &self.inner.ecom
    }

    /// Get a reference to the session cookie codec.
    #[must_use]
    pub fn sessions(&self) -> &SessionCodec {
        &self.inner.sessions
    }
}

impl FromRef<AppState> for SessionCodec {
    fn from_ref(state: &AppState) -> Self {
        state.sessions().clone()
    }
}
