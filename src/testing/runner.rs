//! Turns scenario files into runnable scenarios
//!
//! Each [`StepSpec`] becomes a [`Step`] whose action sends one HTTP request
//! through the run's session, checks the answer and captures values into
//! the context.

use std::path::Path;

use async_trait::async_trait;
use serde_json::Value;

use super::config::{Expectation, ScenarioFile, StepSpec};
use crate::booking::suite::TOKEN;
use crate::common::config::ApiConfig;
use crate::common::{Error, Result};
use crate::scenario::assert::{contains, ensure, equal};
use crate::scenario::{Scenario, Step, StepAction, StepEnv, TestContext};
use crate::session::{Credentials, Method};

/// Read and parse a scenario file
pub fn load_scenario(path: &Path) -> Result<ScenarioFile> {
    let content = std::fs::read_to_string(path).map_err(|e| Error::FileRead {
        path: path.display().to_string(),
        error: e.to_string(),
    })?;

    serde_yaml::from_str(&content).map_err(|e| {
        Error::Config(format!(
            "Failed to parse scenario '{}': {}",
            path.display(),
            e
        ))
    })
}

/// Build a runnable scenario from a parsed file
///
/// Placeholders must name a key the step requires, so the dependency graph
/// covers every value the step reads.
pub fn build_scenario(file: ScenarioFile, config: &ApiConfig) -> Result<Scenario> {
    let mut scenario = Scenario::new(file.name);
    for spec in file.steps {
        scenario = scenario.step(build_step(spec, config)?);
    }
    Ok(scenario)
}

/// Load and build in one go
pub fn scenario_from_path(path: &Path, config: &ApiConfig) -> Result<Scenario> {
    build_scenario(load_scenario(path)?, config)
}

fn build_step(spec: StepSpec, config: &ApiConfig) -> Result<Step> {
    let StepSpec {
        id,
        mut requires,
        mut produces,
        authenticate,
        request,
        expect,
        save,
    } = spec;

    let action: Box<dyn StepAction> = match (authenticate, request) {
        (Some(auth), None) => {
            if !save.is_empty() {
                return Err(Error::Config(format!(
                    "step '{}': an authentication step cannot save response values",
                    id
                )));
            }
            if !produces.iter().any(|key| key == TOKEN) {
                produces.push(TOKEN.to_string());
            }
            Box::new(AuthStep {
                credentials: Credentials::new(
                    auth.username.unwrap_or_else(|| config.username.clone()),
                    auth.password.unwrap_or_else(|| config.password.clone()),
                ),
            })
        }
        (None, Some(request)) => {
            let mut used = placeholders(&request.path);
            if let Some(body) = &request.body {
                collect_value_placeholders(body, &mut used);
            }
            if let Some(key) = used.iter().find(|key| !requires.iter().any(|r| r == *key)) {
                return Err(Error::Dependency(format!(
                    "step '{}' uses '{{{}}}' but does not require '{}'",
                    id, key, key
                )));
            }
            for key in save.keys() {
                if !produces.contains(key) {
                    produces.push(key.clone());
                }
            }
            // An authenticated request reads the token the auth step stores
            if request.auth && !requires.iter().any(|key| key == TOKEN) {
                requires.push(TOKEN.to_string());
            }
            Box::new(HttpStep {
                method: request.method,
                path: request.path,
                body: request.body,
                auth: request.auth,
                expect,
                save: save.into_iter().collect(),
            })
        }
        (Some(_), Some(_)) => {
            return Err(Error::Config(format!(
                "step '{}' has both 'authenticate' and 'request'",
                id
            )))
        }
        (None, None) => {
            return Err(Error::Config(format!(
                "step '{}' needs either 'authenticate' or 'request'",
                id
            )))
        }
    };

    Ok(Step::from_boxed(id, action)
        .requires(requires)
        .produces(produces))
}

struct AuthStep {
    credentials: Credentials,
}

#[async_trait]
impl StepAction for AuthStep {
    async fn run(&self, env: &mut StepEnv<'_>) -> Result<()> {
        let token = env
            .session
            .authenticate(&self.credentials)
            .await?
            .token()
            .to_string();
        env.context.put(TOKEN, token);
        Ok(())
    }
}

struct HttpStep {
    method: Method,
    path: String,
    body: Option<Value>,
    auth: bool,
    expect: Expectation,
    save: Vec<(String, String)>,
}

#[async_trait]
impl StepAction for HttpStep {
    async fn run(&self, env: &mut StepEnv<'_>) -> Result<()> {
        let path = interpolate(&self.path, env.context)?;
        let body = match &self.body {
            Some(body) => Some(interpolate_value(body, env.context)?),
            None => None,
        };

        let response = env
            .session
            .request(self.method, &path, body.as_ref(), self.auth)
            .await?;
        let request = format!("{} {}", self.method, path);

        match self.expect.status {
            Some(status) => equal(&format!("{} status", request), &status, &response.status)?,
            None => ensure(response.is_success(), || {
                format!("{} answered with status {}", request, response.status)
            })?,
        }
        if let Some(needle) = &self.expect.body_contains {
            contains(&format!("{} body", request), &response.body, needle)?;
        }
        if self.expect.json.is_empty() && self.save.is_empty() {
            return Ok(());
        }

        let json: Value = response.json().map_err(|_| {
            Error::Assertion(format!("{} did not answer with JSON: {}", request, response.body))
        })?;
        for (pointer, expected) in &self.expect.json {
            let actual = json.pointer(pointer).ok_or_else(|| {
                Error::Assertion(format!("{} answer has no value at '{}'", request, pointer))
            })?;
            equal(&format!("{} at '{}'", request, pointer), expected, actual)?;
        }
        for (key, pointer) in &self.save {
            let value = json.pointer(pointer).ok_or_else(|| {
                Error::Assertion(format!("{} answer has no value at '{}'", request, pointer))
            })?;
            env.context.put(key.clone(), value.clone());
        }
        Ok(())
    }
}

/// Keys referenced as `{key}` in `template`
fn placeholders(template: &str) -> Vec<String> {
    let mut keys = Vec::new();
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        let after = &rest[start + 1..];
        match after.find('}') {
            Some(end) if is_key(&after[..end]) => {
                keys.push(after[..end].to_string());
                rest = &after[end + 1..];
            }
            _ => rest = after,
        }
    }
    keys
}

fn is_key(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn collect_value_placeholders(value: &Value, keys: &mut Vec<String>) {
    match value {
        Value::String(s) => keys.extend(placeholders(s)),
        Value::Array(items) => items
            .iter()
            .for_each(|item| collect_value_placeholders(item, keys)),
        Value::Object(map) => map
            .values()
            .for_each(|item| collect_value_placeholders(item, keys)),
        _ => {}
    }
}

/// Substitute `{key}` placeholders with context values
///
/// Substituted values are not scanned again.
fn interpolate(template: &str, context: &TestContext) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        match after.find('}') {
            Some(end) if is_key(&after[..end]) => {
                match context.get(&after[..end])? {
                    Value::String(s) => out.push_str(s),
                    other => out.push_str(&other.to_string()),
                }
                rest = &after[end + 1..];
            }
            _ => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    Ok(out)
}

fn interpolate_value(value: &Value, context: &TestContext) -> Result<Value> {
    Ok(match value {
        Value::String(s) => match placeholders(s).as_slice() {
            [key] if s.len() == key.len() + 2 => context.get(key)?.clone(),
            [] => value.clone(),
            _ => Value::String(interpolate(s, context)?),
        },
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| interpolate_value(item, context))
                .collect::<Result<_>>()?,
        ),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| interpolate_value(v, context).map(|v| (k.clone(), v)))
                .collect::<Result<_>>()?,
        ),
        other => other.clone(),
    })
}
