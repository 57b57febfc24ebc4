//! Run-scoped shared state between steps

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::common::{Error, Result};

/// Insertion-ordered key/value store written by producer steps and read by
/// the steps that declare a dependency on those keys
///
/// The context only grows during a run. Reading a key nobody wrote is a
/// loud [`Error::MissingContextKey`], never a default.
#[derive(Debug, Default, Clone, Serialize)]
pub struct TestContext {
    values: IndexMap<String, Value>,
}

impl TestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        tracing::debug!(key = %key, "Context write");
        self.values.insert(key, value.into());
    }

    /// Store any serializable value
    pub fn put_as<T: Serialize>(&mut self, key: impl Into<String>, value: &T) -> Result<()> {
        let value = serde_json::to_value(value)?;
        self.put(key, value);
        Ok(())
    }

    pub fn get(&self, key: &str) -> Result<&Value> {
        self.values
            .get(key)
            .ok_or_else(|| Error::MissingContextKey(key.to_string()))
    }

    /// Read a value and decode it into `T`
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let value = self.get(key)?;
        serde_json::from_value(value.clone()).map_err(|e| {
            Error::Assertion(format!("context value '{}' has an unexpected shape: {}", key, e))
        })
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Keys in the order they were first written
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
