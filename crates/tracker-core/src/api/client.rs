//! API client for the tracker backend's authentication endpoints.
//!
//! All requests share one cookie jar, so the session cookie and the CSRF
//! cookie issued by the server are sent back automatically. Callers pass the
//! CSRF token explicitly; it is echoed in the `X-CSRFToken` header.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::cookie::Jar;
use reqwest::{header, Client, RequestBuilder, Response, StatusCode, Url};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::auth::credentials::CSRF_HEADER_NAME;
use crate::config::SessionConfig;

use super::ApiError;

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Serialize)]
struct CredentialsBody<'a> {
    email: &'a str,
    password: &'a str,
}

/// Body of a `login` response. The server answers with this shape for both
/// accepted and rejected credentials.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoginResponse {
    pub success: bool,
    pub message: Option<String>,
}

impl LoginResponse {
    /// Only `success: true` counts as a login; any other field may have any
    /// shape without affecting that.
    fn from_body(body: &Value) -> Self {
        Self {
            success: body.get("success").and_then(Value::as_bool).unwrap_or(false),
            message: body
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string),
        }
    }
}

/// API client for the tracker backend.
/// Clone is cheap - the reqwest client and the cookie jar are both shared.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Url,
    jar: Arc<Jar>,
}

impl ApiClient {
    pub fn new(config: &SessionConfig) -> Result<Self> {
        let base_url = Url::parse(config.api_base_url.trim_end_matches('/'))
            .with_context(|| format!("Invalid API base URL: {}", config.api_base_url))?;

        let jar = Arc::new(Jar::default());
        let client = Client::builder()
            .cookie_provider(Arc::clone(&jar))
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url,
            jar,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The cookie jar backing every request made by this client
    pub fn cookie_jar(&self) -> Arc<Jar> {
        Arc::clone(&self.jar)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.as_str().trim_end_matches('/'), path)
    }

    fn with_csrf(request: RequestBuilder, csrf_token: Option<&str>) -> RequestBuilder {
        match csrf_token {
            Some(token) => request.header(CSRF_HEADER_NAME, token),
            None => request,
        }
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: Response) -> Result<Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    /// Ask the server to set the CSRF cookie.
    pub async fn set_csrf_token(&self) -> Result<(), ApiError> {
        let url = self.endpoint("set-csrf-token");
        let response = self.client.get(&url).send().await?;
        Self::check_response(response).await?;
        debug!(url = %url, "CSRF cookie requested");
        Ok(())
    }

    /// Post credentials. Only a failure to reach the server is an `Err`;
    /// rejected credentials come back as `success: false`.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        csrf_token: Option<&str>,
    ) -> Result<LoginResponse, ApiError> {
        let url = self.endpoint("login");
        let request = self
            .client
            .post(&url)
            .json(&CredentialsBody { email, password });

        let response = Self::with_csrf(request, csrf_token).send().await?;
        let status = response.status();
        let body = response.text().await?;

        // A non-JSON body (e.g. an HTML CSRF failure page) counts as a rejection
        let parsed = match serde_json::from_str::<Value>(&body) {
            Ok(value) => LoginResponse::from_body(&value),
            Err(e) => {
                debug!(%status, error = %e, "Login response body is not JSON");
                LoginResponse::default()
            }
        };
        debug!(%status, success = parsed.success, "Login response received");
        Ok(parsed)
    }

    /// End the server session. Returns the response status; only a failure
    /// to reach the server is an `Err`.
    pub async fn logout(&self, csrf_token: Option<&str>) -> Result<StatusCode, ApiError> {
        let url = self.endpoint("logout");
        let request = self.client.post(&url);
        let response = Self::with_csrf(request, csrf_token).send().await?;
        debug!(status = %response.status(), "Logout response received");
        Ok(response.status())
    }

    /// Fetch the current user as an opaque JSON payload.
    pub async fn fetch_user(&self, csrf_token: Option<&str>) -> Result<Value, ApiError> {
        let url = self.endpoint("user");
        let request = self
            .client
            .get(&url)
            .header(header::CONTENT_TYPE, "application/json");

        let response = Self::with_csrf(request, csrf_token).send().await?;
        let response = Self::check_response(response).await?;
        let body = response.text().await?;

        serde_json::from_str(&body)
            .map_err(|e| ApiError::InvalidResponse(format!("user payload is not JSON: {}", e)))
    }

    /// Create an account. The server answers 400 with its validation
    /// messages when the form is rejected.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        csrf_token: Option<&str>,
    ) -> Result<(), ApiError> {
        let url = self.endpoint("register");
        let request = self
            .client
            .post(&url)
            .json(&CredentialsBody { email, password });

        let response = Self::with_csrf(request, csrf_token).send().await?;
        Self::check_response(response).await?;
        debug!("Registration accepted");
        Ok(())
    }
}
