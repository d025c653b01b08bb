//! Environment variable abstraction for testability.
//!
//! Production code uses [`Env::real()`] which delegates to [`std::env::var`].
//! Tests use [`Env::mock()`] backed by a `HashMap`, so config layering can be
//! exercised without touching the process environment.

use std::collections::HashMap;
use std::str::FromStr;

/// Environment variable reader.
#[derive(Clone, Debug)]
pub struct Env {
    overrides: Option<HashMap<String, String>>,
}

impl Env {
    /// Create an `Env` that reads from the real process environment.
    pub fn real() -> Self {
        Self { overrides: None }
    }

    /// Create an `Env` backed by explicit key-value pairs.
    pub fn mock(vars: impl IntoIterator<Item = (impl Into<String>, impl Into<String>)>) -> Self {
        Self {
            overrides: Some(
                vars.into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }

    /// Look up a variable. Blank values count as unset.
    pub fn var(&self, name: &str) -> Option<String> {
        let value = match &self.overrides {
            Some(map) => map.get(name).cloned(),
            None => std::env::var(name).ok(),
        }?;
        if value.trim().is_empty() {
            None
        } else {
            Some(value)
        }
    }

    /// Look up and parse a variable.
    ///
    /// Unparseable values are logged and treated as unset so a typo in the
    /// environment falls back to the configured value instead of aborting.
    pub fn parsed<T: FromStr>(&self, name: &str) -> Option<T> {
        let raw = self.var(name)?;
        match raw.trim().parse::<T>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(variable = name, value = %raw, "ignoring unparseable environment value");
                None
            }
        }
    }

    /// Returns `true` if the variable is present and non-blank.
    pub fn is_set(&self, name: &str) -> bool {
        self.var(name).is_some()
    }
}

impl Default for Env {
    fn default() -> Self {
        Self::real()
    }
}
