//! Error types for the scenario harness
//!
//! Errors fall into two groups: transport faults, which the retrier may
//! retry, and everything else, which the scenario runner turns into a step
//! outcome instead of aborting the run.

use std::fmt;
use std::io;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Kind of transport-level fault
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// The call did not complete within the per-call timeout
    Timeout,
    /// The connection could not be established or was dropped
    Connection,
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FaultKind::Timeout => write!(f, "timed out"),
            FaultKind::Connection => write!(f, "connection error"),
        }
    }
}

/// Main error type for the harness
#[derive(Error, Debug)]
pub enum Error {
    // === Transport Errors ===
    #[error("Transport fault ({kind}): {message}")]
    Transport { kind: FaultKind, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected HTTP status {status} for {request}: {body}")]
    UnexpectedStatus {
        request: String,
        status: u16,
        body: String,
    },

    // === Session Errors ===
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Not authenticated. An authentication step must succeed before sending authenticated requests")]
    NotAuthenticated,

    // === Scenario Errors ===
    #[error("Assertion failed: {0}")]
    Assertion(String),

    #[error("Dependency error: {0}")]
    Dependency(String),

    #[error("Context key '{0}' was never written")]
    MissingContextKey(String),

    #[error("Step timed out after {0} ms")]
    StepTimeout(u64),

    // === UI Driver Errors ===
    #[error("No UI driver configured. Start a WebDriver server and run the 'ui' suite")]
    UiDriverUnavailable,

    #[error("WebDriver error: {0}")]
    WebDriver(String),

    #[error("No element matches {0}")]
    ElementNotFound(String),

    #[error("Timed out after {millis} ms waiting for {condition}")]
    WaitTimeout { condition: String, millis: u64 },

    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    // === IO / Serialization Errors ===
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// Create a transport fault
    pub fn transport(kind: FaultKind, message: impl Into<String>) -> Self {
        Self::Transport {
            kind,
            message: message.into(),
        }
    }

    /// Create an unexpected status error
    pub fn unexpected_status(request: &str, status: u16, body: &str) -> Self {
        Self::UnexpectedStatus {
            request: request.to_string(),
            status,
            body: body.to_string(),
        }
    }

    /// Whether the retrier should try the failed operation again
    ///
    /// Only transport faults qualify. Application-level answers (any HTTP
    /// status) are deterministic and never retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Transport { .. })
    }

    /// Whether this error is an expected-vs-actual mismatch
    ///
    /// An unexpected status counts: the remote answered, just not with
    /// what the step expected.
    pub fn is_assertion(&self) -> bool {
        matches!(self, Error::Assertion(_) | Error::UnexpectedStatus { .. })
    }

    /// The transport fault kind, if this is a transport fault
    pub fn fault_kind(&self) -> Option<FaultKind> {
        match self {
            Error::Transport { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

/// Classify a reqwest failure
///
/// Timeouts and connection failures become transport faults so the retrier
/// sees them. Everything else (bad URL, undecodable body) stays a plain
/// HTTP error.
pub(crate) fn classify_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::transport(FaultKind::Timeout, e.to_string())
    } else if e.is_connect() || e.is_request() {
        Error::transport(FaultKind::Connection, e.to_string())
    } else {
        Error::Http(e)
    }
}
