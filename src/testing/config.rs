//! Scenario file format
//!
//! Defines the data structures for deserializing YAML scenario files.

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;

use crate::session::Method;

/// A complete scenario loaded from a YAML file
#[derive(Deserialize, Debug)]
pub struct ScenarioFile {
    /// Name of the scenario
    pub name: String,
    /// Optional description of what the scenario verifies
    pub description: Option<String>,
    /// Steps, in declaration order
    pub steps: Vec<StepSpec>,
}

/// A single step of a scenario file
///
/// Exactly one of `authenticate` and `request` must be given.
#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
pub struct StepSpec {
    pub id: String,
    /// Context keys that must exist before the step runs
    #[serde(default)]
    pub requires: Vec<String>,
    /// Context keys the step writes, in addition to `save` targets
    #[serde(default)]
    pub produces: Vec<String>,
    /// Acquire a token and store it under `token`
    pub authenticate: Option<AuthSpec>,
    /// Send an HTTP request
    pub request: Option<RequestSpec>,
    /// Checks on the response of `request`
    #[serde(default)]
    pub expect: Expectation,
    /// Context key -> JSON pointer into the response body (`""` for the
    /// whole body)
    #[serde(default)]
    pub save: IndexMap<String, String>,
}

/// Credentials for an authentication step; missing fields fall back to
/// the configured ones
#[derive(Deserialize, Debug, Default)]
pub struct AuthSpec {
    pub username: Option<String>,
    pub password: Option<String>,
}

/// HTTP request of a step
///
/// `path` and string values inside `body` may reference context keys as
/// `{key}`. A body string that is exactly one placeholder takes the
/// context value as is, keeping its JSON type.
#[derive(Deserialize, Debug)]
pub struct RequestSpec {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
    /// Attach the session token
    #[serde(default)]
    pub auth: bool,
}

/// Response checks
#[derive(Deserialize, Debug, Default)]
pub struct Expectation {
    /// Exact status; any 2xx status passes when absent
    pub status: Option<u16>,
    /// JSON pointer -> expected value
    #[serde(default)]
    pub json: IndexMap<String, Value>,
    /// Substring of the raw body
    pub body_contains: Option<String>,
}
