//! Session state and the manager that keeps it in sync with the API.
//!
//! `SessionState` is the whole of what the client knows about the login:
//! the user payload returned by the API and an authenticated flag. The
//! `SessionManager` mutates it only through its operations and writes a
//! snapshot to the key-value store after each mutation.
//!
//! Failure handling differs per operation:
//! - `login` and `fetch_user` collapse failures into the anonymous state
//!   (`login` leaves state alone when the server is unreachable)
//! - `logout` returns network failures to the caller and treats a
//!   non-success response as a no-op
//! - `acquire_csrf_token` only logs

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};

use anyhow::{Context, Result};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::api::ApiClient;
use crate::config::SessionConfig;
use crate::navigation::{Destination, Navigator};
use crate::storage::KeyValueStore;

use super::credentials::{CookieJarCredentials, CredentialProvider, CSRF_COOKIE_NAME};

/// Store key holding the serialized session state
pub const SESSION_STATE_KEY: &str = "authState";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(default, rename_all = "camelCase")]
pub struct SessionState {
    /// Current-user payload exactly as the API returned it
    pub user: Option<Value>,
    pub is_authenticated: bool,
}

impl SessionState {
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Parse a snapshot previously written under `SESSION_STATE_KEY`.
    pub fn from_snapshot(snapshot: &str) -> Result<Self> {
        serde_json::from_str(snapshot).context("Failed to parse stored session state")
    }

    fn authenticated_as(user: Value) -> Self {
        Self {
            user: Some(user).filter(|u| !u.is_null()),
            is_authenticated: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    Authenticated,
    /// The server answered but did not mark the login successful
    Rejected { message: Option<String> },
    /// No response; state was left untouched
    Unreachable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoutOutcome {
    LoggedOut,
    /// The server answered with a non-success status; state was left untouched
    Refused(StatusCode),
}

pub struct SessionManager {
    api: ApiClient,
    store: Arc<dyn KeyValueStore>,
    credentials: Arc<dyn CredentialProvider>,
    state: RwLock<SessionState>,
}

impl SessionManager {
    /// Build a manager whose CSRF token is read from the API client's own
    /// cookie jar.
    pub fn new(config: &SessionConfig, store: Arc<dyn KeyValueStore>) -> Result<Self> {
        let api = ApiClient::new(config)?;
        let credentials = Arc::new(CookieJarCredentials::for_client(&api));
        Self::with_parts(api, store, credentials)
    }

    /// Build a manager from explicit collaborators, rehydrating state from
    /// `store`.
    pub fn with_parts(
        api: ApiClient,
        store: Arc<dyn KeyValueStore>,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Result<Self> {
        let state = match store.get(SESSION_STATE_KEY)? {
            Some(snapshot) => SessionState::from_snapshot(&snapshot)?,
            None => SessionState::anonymous(),
        };
        debug!(authenticated = state.is_authenticated, "Session state loaded");

        Ok(Self {
            api,
            store,
            credentials,
            state: RwLock::new(state),
        })
    }

    pub fn state(&self) -> SessionState {
        self.read().clone()
    }

    pub fn user(&self) -> Option<Value> {
        self.read().user.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.read().is_authenticated
    }

    fn read(&self) -> RwLockReadGuard<'_, SessionState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply `change` to the in-memory state, then persist the result.
    /// The lock is released before the store is touched.
    fn update<F>(&self, change: F) -> Result<SessionState>
    where
        F: FnOnce(&mut SessionState),
    {
        let snapshot = {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            change(&mut state);
            state.clone()
        };
        self.persist(&snapshot)?;
        Ok(snapshot)
    }

    fn persist(&self, state: &SessionState) -> Result<()> {
        let snapshot = serde_json::to_string(state)?;
        self.store
            .set(SESSION_STATE_KEY, &snapshot)
            .context("Failed to persist session state")
    }

    fn csrf_token(&self) -> Option<String> {
        let token = self.credentials.cookie(CSRF_COOKIE_NAME);
        if token.is_none() {
            debug!("No CSRF cookie; request will be sent without a token");
        }
        token
    }

    async fn navigate(navigator: Option<&dyn Navigator>, destination: Destination) {
        if let Some(navigator) = navigator {
            if let Err(e) = navigator.push(destination).await {
                warn!(error = %e, %destination, "Navigation failed");
            }
        }
    }

    /// Ask the server to issue the CSRF cookie. Call once at startup before
    /// any other request.
    pub async fn acquire_csrf_token(&self) {
        match self.api.set_csrf_token().await {
            Ok(()) => debug!("CSRF token acquired"),
            Err(e) => warn!(error = %e, "Failed to acquire CSRF token"),
        }
    }

    /// Log in with an email and password.
    ///
    /// On success only the authenticated flag is set; call `fetch_user` to
    /// load the user payload.
    pub async fn login(
        &self,
        identifier: &str,
        secret: &str,
        navigator: Option<&dyn Navigator>,
    ) -> Result<LoginOutcome> {
        let csrf_token = self.csrf_token();
        let response = match self.api.login(identifier, secret, csrf_token.as_deref()).await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Login request failed");
                return Ok(LoginOutcome::Unreachable);
            }
        };

        if response.success {
            self.update(|state| state.is_authenticated = true)?;
            info!("Logged in");
            Self::navigate(navigator, Destination::Home).await;
            Ok(LoginOutcome::Authenticated)
        } else {
            self.update(|state| *state = SessionState::anonymous())?;
            info!(message = ?response.message, "Login rejected");
            Ok(LoginOutcome::Rejected {
                message: response.message,
            })
        }
    }

    /// Log out. A network failure is returned as an error and leaves the
    /// state untouched.
    pub async fn logout(&self, navigator: Option<&dyn Navigator>) -> Result<LogoutOutcome> {
        let csrf_token = self.csrf_token();
        let status = match self.api.logout(csrf_token.as_deref()).await {
            Ok(status) => status,
            Err(e) => {
                error!(error = %e, "Logout failed");
                return Err(anyhow::Error::new(e).context("Logout request failed"));
            }
        };

        if !status.is_success() {
            warn!(%status, "Logout refused by server");
            return Ok(LogoutOutcome::Refused(status));
        }

        self.update(|state| *state = SessionState::anonymous())?;
        info!("Logged out");
        Self::navigate(navigator, Destination::Login).await;
        Ok(LogoutOutcome::LoggedOut)
    }

    /// Reload the current user. Persists exactly once whatever the outcome
    /// and returns whether the session is authenticated.
    pub async fn fetch_user(&self) -> Result<bool> {
        let csrf_token = self.csrf_token();
        let next = match self.api.fetch_user(csrf_token.as_deref()).await {
            Ok(user) => SessionState::authenticated_as(user),
            Err(e) if e.is_network() => {
                warn!(error = %e, "Failed to fetch user");
                SessionState::anonymous()
            }
            Err(e) => {
                debug!(error = %e, "Current user not available");
                SessionState::anonymous()
            }
        };

        let state = self.update(|state| *state = next)?;
        Ok(state.is_authenticated)
    }

    /// Create an account. Does not log in.
    pub async fn register(&self, identifier: &str, secret: &str) -> Result<()> {
        let csrf_token = self.csrf_token();
        self.api
            .register(identifier, secret, csrf_token.as_deref())
            .await
            .context("Registration failed")?;
        info!("Account registered");
        Ok(())
    }
}
