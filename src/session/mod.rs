//! Authenticated HTTP session
//!
//! A [`Session`] caches at most one [`Credential`] for the lifetime of a run
//! and attaches it to requests that ask for authentication. Every request
//! goes through the retrier with a per-attempt timeout.

mod transport;

pub use transport::{HttpRequest, HttpResponse, HttpTransport, Method, ReqwestTransport};

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

use crate::common::config::{AuthScheme, Config};
use crate::common::{Error, Result};
use crate::retry::{timed_out, with_retry, RetryPolicy};

/// Path of the token endpoint
const AUTH_PATH: &str = "/auth";

/// Username/password pair sent to the token endpoint
#[derive(Debug, Clone, Serialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

/// An acquired token. Valid until the session re-authenticates.
#[derive(Debug, Clone)]
pub struct Credential {
    token: String,
    created_at: SystemTime,
}

impl Credential {
    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }

    /// Time since the token was acquired
    pub fn age(&self) -> Duration {
        self.created_at.elapsed().unwrap_or_default()
    }
}

#[derive(Deserialize)]
struct AuthResponse {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    reason: Option<String>,
}

/// HTTP session against one remote system
pub struct Session {
    transport: Arc<dyn HttpTransport>,
    retry: RetryPolicy,
    timeout: Duration,
    auth_scheme: AuthScheme,
    credential: Option<Credential>,
}

impl Session {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            transport,
            retry: RetryPolicy::default(),
            timeout: Duration::from_secs(5),
            auth_scheme: AuthScheme::default(),
            credential: None,
        }
    }

    /// Build a network session from configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let transport = ReqwestTransport::new(config.api.base_url.clone(), config.http.timeout())?;
        Ok(Self::new(Arc::new(transport)).configured(config))
    }

    /// Apply the retry, timeout and auth settings of `config`
    pub fn configured(self, config: &Config) -> Self {
        self.with_retry_policy(config.http.retry_policy())
            .with_timeout(config.http.timeout())
            .with_auth_scheme(config.api.auth_scheme)
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_auth_scheme(mut self, scheme: AuthScheme) -> Self {
        self.auth_scheme = scheme;
        self
    }

    pub fn base_url(&self) -> &str {
        self.transport.base_url()
    }

    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.credential.is_some()
    }

    /// Forget the cached credential
    pub fn reset(&mut self) {
        self.credential = None;
    }

    /// Acquire a token and cache it, replacing any previous one
    ///
    /// The target API answers bad credentials with HTTP 200 and no token,
    /// so an empty or missing token is an [`Error::Auth`] just like a
    /// non-success status. Transport faults stay transport faults. A failed
    /// attempt leaves the previous credential in place.
    pub async fn authenticate(&mut self, credentials: &Credentials) -> Result<&Credential> {
        let body = serde_json::to_value(credentials)?;
        let response = self
            .request(Method::Post, AUTH_PATH, Some(&body), false)
            .await?;

        if !response.is_success() {
            return Err(Error::Auth(format!(
                "POST {} answered with status {}",
                AUTH_PATH, response.status
            )));
        }

        let parsed: AuthResponse = response
            .json()
            .map_err(|_| Error::Auth(format!("unreadable token response: {}", response.body)))?;

        let token = match parsed.token {
            Some(token) if !token.is_empty() => token,
            _ => {
                let reason = parsed.reason.unwrap_or_else(|| "empty token".to_string());
                return Err(Error::Auth(format!(
                    "credentials for '{}' were rejected ({})",
                    credentials.username, reason
                )));
            }
        };

        if let Some(previous) = &self.credential {
            tracing::debug!(age_ms = previous.age().as_millis() as u64, "Replacing credential");
        }
        tracing::info!(user = %credentials.username, "Authenticated");
        Ok(&*self.credential.insert(Credential {
            token,
            created_at: SystemTime::now(),
        }))
    }

    /// Send a request, attaching the credential when `use_auth` is set
    ///
    /// Returns the response whatever its status; only transport faults
    /// (after retries) and a missing credential are errors.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
        use_auth: bool,
    ) -> Result<HttpResponse> {
        let mut request = HttpRequest::new(method, path);
        if use_auth {
            let credential = self.credential.as_ref().ok_or(Error::NotAuthenticated)?;
            request = match self.auth_scheme {
                AuthScheme::Cookie => {
                    request.with_header("Cookie", format!("token={}", credential.token))
                }
                AuthScheme::Bearer => request
                    .with_header("Authorization", format!("Bearer {}", credential.token)),
            };
        }
        if let Some(body) = body {
            request = request.with_body(body.clone());
        }

        let transport = self.transport.as_ref();
        let timeout = self.timeout;
        let request = &request;

        let response = with_retry(&self.retry, move || async move {
            tracing::debug!("{}", request.describe());
            tokio::time::timeout(timeout, transport.send(request))
                .await
                .map_err(|_| timed_out(&request.describe(), timeout))?
        })
        .await?;

        tracing::debug!(status = response.status, "{} answered", request.describe());
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::booking::SimulatedBookingApi;
    use crate::common::FaultKind;

    fn fast_session(api: Arc<SimulatedBookingApi>) -> Session {
        Session::new(api).with_retry_policy(RetryPolicy::new(3, Duration::from_millis(1)))
    }

    #[tokio::test]
    async fn test_valid_credentials_yield_token() {
        let mut session = fast_session(Arc::new(SimulatedBookingApi::new()));
        let credential = session
            .authenticate(&Credentials::new("admin", "password123"))
            .await
            .unwrap();
        assert!(!credential.token().is_empty());
        assert!(session.is_authenticated());
    }

    #[tokio::test]
    async fn test_invalid_credentials_with_status_200_are_auth_error() {
        let api = Arc::new(SimulatedBookingApi::new());
        let mut session = fast_session(api.clone());

        let err = session
            .authenticate(&Credentials::new("admin", "wrong"))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Auth(_)), "got {err:?}");
        assert_eq!(api.last_status(), Some(200));
        assert!(!session.is_authenticated());
    }

    #[tokio::test]
    async fn test_auth_transport_fault_is_not_auth_error() {
        let api = Arc::new(SimulatedBookingApi::new());
        api.inject_faults(FaultKind::Connection, 5);
        let mut session = fast_session(api);

        let err = session
            .authenticate(&Credentials::new("admin", "password123"))
            .await
            .unwrap_err();
        assert_eq!(err.fault_kind(), Some(FaultKind::Connection));
    }

    #[tokio::test]
    async fn test_authenticated_request_before_auth_fails_without_sending() {
        let api = Arc::new(SimulatedBookingApi::new());
        let session = fast_session(api.clone());

        let err = session
            .request(Method::Delete, "/booking/1", None, true)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::NotAuthenticated));
        assert_eq!(api.request_count(), 0);
    }

    #[tokio::test]
    async fn test_reauthentication_replaces_token() {
        let mut session = fast_session(Arc::new(SimulatedBookingApi::new()));
        let creds = Credentials::new("admin", "password123");

        let first = session.authenticate(&creds).await.unwrap().token().to_string();
        let second = session.authenticate(&creds).await.unwrap().token().to_string();

        assert_ne!(first, second);
        assert_eq!(session.credential().unwrap().token(), second);
    }

    #[tokio::test]
    async fn test_credential_records_acquisition_time() {
        let mut session = fast_session(Arc::new(SimulatedBookingApi::new()));
        let before = SystemTime::now();

        let credential = session
            .authenticate(&Credentials::new("admin", "password123"))
            .await
            .unwrap();

        assert!(credential.created_at() >= before);
        assert!(credential.age() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_cookie_scheme_attaches_token_cookie() {
        let api = Arc::new(SimulatedBookingApi::new());
        let mut session = fast_session(api.clone());
        let token = session
            .authenticate(&Credentials::new("admin", "password123"))
            .await
            .unwrap()
            .token()
            .to_string();

        session
            .request(Method::Delete, "/booking/1", None, true)
            .await
            .unwrap();

        let sent = api.last_request().unwrap();
        assert_eq!(sent.header("cookie"), Some(format!("token={}", token).as_str()));
        assert_eq!(sent.header("authorization"), None);
    }

    #[tokio::test]
    async fn test_bearer_scheme_attaches_authorization_header() {
        let api = Arc::new(SimulatedBookingApi::new());
        let mut session = fast_session(api.clone()).with_auth_scheme(AuthScheme::Bearer);
        session
            .authenticate(&Credentials::new("admin", "password123"))
            .await
            .unwrap();

        session
            .request(Method::Get, "/booking", None, true)
            .await
            .unwrap();

        let sent = api.last_request().unwrap();
        assert!(sent.header("authorization").unwrap().starts_with("Bearer "));
    }

    #[tokio::test]
    async fn test_http_error_status_is_not_retried() {
        let api = Arc::new(SimulatedBookingApi::new());
        let session = fast_session(api.clone());

        let response = session
            .request(Method::Get, "/booking/999999", None, false)
            .await
            .unwrap();

        assert_eq!(response.status, 404);
        assert_eq!(api.request_count(), 1);
    }
}
