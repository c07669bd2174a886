// SPDX-License-Identifier: MIT OR Apache-2.0
//! Configuration collaborator interface consumed by the Platon pipeline.
//!
//! The pipeline engine treats configuration as a black-box, dotted-path
//! key-value reader (see the component spec's "External Interfaces"
//! section). File parsing (TOML/YAML), format auto-detection from a file
//! extension, and file-watch reload belong to an upstream configuration
//! loader and are intentionally not implemented here; [`MapConfigReader`]
//! is a minimal in-memory reader with an environment-variable overlay,
//! sufficient to wire defaults into the service without pulling in a file
//! format parser this crate does not need.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use std::collections::HashMap;
use std::env;
use std::sync::RwLock;
use std::time::Duration;

use platon_error::{ErrorCode, PlatonError};
use serde_json::Value;

/// A change-notification callback, invoked with the dotted path that changed.
pub type ChangeCallback = Box<dyn Fn(&str) + Send + Sync>;

/// Dotted-path, typed configuration reader.
///
/// Implementations are expected to be cheap to query repeatedly (callers may
/// read the same path on every request) and safe to share across threads.
pub trait ConfigurationReader: Send + Sync {
    /// Read a string value at `path`, or `default` if absent.
    fn get_string(&self, path: &str, default: &str) -> String;

    /// Read an integer value at `path`, or `default` if absent or unparsable.
    fn get_int(&self, path: &str, default: i64) -> i64;

    /// Read a boolean value at `path`, or `default` if absent or unparsable.
    fn get_bool(&self, path: &str, default: bool) -> bool;

    /// Read a duration value at `path` (seconds), or `default` if absent.
    fn get_duration(&self, path: &str, default: Duration) -> Duration;

    /// Read a list of strings at `path`, or `default` if absent.
    fn get_string_slice(&self, path: &str, default: &[String]) -> Vec<String>;

    /// Returns `true` if a value is present at `path` (overlay or base).
    fn has(&self, path: &str) -> bool;

    /// Set a value at `path`, overriding any base or overlay value.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorCode::ConfigInvalid`] if `value` cannot be stored.
    fn set(&self, path: &str, value: Value) -> Result<(), PlatonError>;

    /// Register a callback invoked whenever a value changes via [`set`](Self::set).
    ///
    /// The default implementation is a no-op; readers that support live
    /// reload should override it.
    fn on_change(&self, _callback: ChangeCallback) {}
}

// ---------------------------------------------------------------------------
// MapConfigReader
// ---------------------------------------------------------------------------

/// In-memory [`ConfigurationReader`] with an environment-variable overlay.
///
/// Lookup order for a dotted path `a.b.c`:
/// 1. The environment variable `{PREFIX_}A_B_C` (uppercased, dots → `_`,
///    optionally prefixed), if set.
/// 2. The in-memory map, as last set via [`ConfigurationReader::set`] or
///    [`MapConfigReader::with_defaults`].
/// 3. The caller-supplied default.
pub struct MapConfigReader {
    prefix: Option<String>,
    values: RwLock<HashMap<String, Value>>,
    callbacks: RwLock<Vec<ChangeCallback>>,
}

impl MapConfigReader {
    /// Create an empty reader with no environment-variable prefix.
    #[must_use]
    pub fn new() -> Self {
        Self {
            prefix: None,
            values: RwLock::new(HashMap::new()),
            callbacks: RwLock::new(Vec::new()),
        }
    }

    /// Create a reader whose environment overlay looks for
    /// `{PREFIX}_{PATH}` instead of bare `{PATH}`.
    #[must_use]
    pub fn with_env_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
            values: RwLock::new(HashMap::new()),
            callbacks: RwLock::new(Vec::new()),
        }
    }

    /// Seed the reader with an initial set of dotted-path values.
    #[must_use]
    pub fn with_defaults(self, defaults: impl IntoIterator<Item = (String, Value)>) -> Self {
        {
            let mut guard = self.values.write().expect("config map lock poisoned");
            guard.extend(defaults);
        }
        self
    }

    fn env_key(&self, path: &str) -> String {
        let base = path.to_uppercase().replace('.', "_");
        match &self.prefix {
            Some(p) => format!("{p}_{base}"),
            None => base,
        }
    }

    fn env_value(&self, path: &str) -> Option<String> {
        env::var(self.env_key(path)).ok()
    }

    fn raw_value(&self, path: &str) -> Option<Value> {
        if let Some(raw) = self.env_value(path) {
            return Some(Value::String(raw));
        }
        self.values
            .read()
            .expect("config map lock poisoned")
            .get(path)
            .cloned()
    }
}

impl Default for MapConfigReader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigurationReader for MapConfigReader {
    fn get_string(&self, path: &str, default: &str) -> String {
        match self.raw_value(path) {
            Some(Value::String(s)) => s,
            Some(other) => other.to_string(),
            None => default.to_string(),
        }
    }

    fn get_int(&self, path: &str, default: i64) -> i64 {
        match self.raw_value(path) {
            Some(Value::Number(n)) => n.as_i64().unwrap_or(default),
            Some(Value::String(s)) => s.parse().unwrap_or(default),
            _ => default,
        }
    }

    fn get_bool(&self, path: &str, default: bool) -> bool {
        match self.raw_value(path) {
            Some(Value::Bool(b)) => b,
            Some(Value::String(s)) => s.parse().unwrap_or(default),
            _ => default,
        }
    }

    fn get_duration(&self, path: &str, default: Duration) -> Duration {
        match self.raw_value(path) {
            Some(Value::Number(n)) => n
                .as_f64()
                .map(Duration::from_secs_f64)
                .unwrap_or(default),
            Some(Value::String(s)) => s
                .parse::<f64>()
                .map(Duration::from_secs_f64)
                .unwrap_or(default),
            _ => default,
        }
    }

    fn get_string_slice(&self, path: &str, default: &[String]) -> Vec<String> {
        match self.raw_value(path) {
            Some(Value::Array(items)) => items
                .into_iter()
                .map(|v| match v {
                    Value::String(s) => s,
                    other => other.to_string(),
                })
                .collect(),
            Some(Value::String(s)) => s.split(',').map(|p| p.trim().to_string()).collect(),
            _ => default.to_vec(),
        }
    }

    fn has(&self, path: &str) -> bool {
        self.env_value(path).is_some()
            || self
                .values
                .read()
                .expect("config map lock poisoned")
                .contains_key(path)
    }

    fn set(&self, path: &str, value: Value) -> Result<(), PlatonError> {
        if path.trim().is_empty() {
            return Err(PlatonError::new(ErrorCode::ConfigInvalid, "config path must not be empty"));
        }
        {
            let mut guard = self.values.write().expect("config map lock poisoned");
            guard.insert(path.to_string(), value);
        }
        for cb in self.callbacks.read().expect("callback lock poisoned").iter() {
            cb(path);
        }
        Ok(())
    }

    fn on_change(&self, callback: ChangeCallback) {
        self.callbacks
            .write()
            .expect("callback lock poisoned")
            .push(callback);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn default_used_when_absent() {
        let reader = MapConfigReader::new();
        assert_eq!(reader.get_string("pipeline.default", "default"), "default");
        assert_eq!(reader.get_int("service.max_handlers", 100), 100);
        assert!(!reader.get_bool("policy.llm_check.enabled", false));
    }

    #[test]
    fn set_then_get_roundtrips() {
        let reader = MapConfigReader::new();
        reader.set("service.max_handlers", Value::from(42)).unwrap();
        assert_eq!(reader.get_int("service.max_handlers", 100), 42);
        assert!(reader.has("service.max_handlers"));
    }

    #[test]
    fn empty_path_rejected() {
        let reader = MapConfigReader::new();
        let err = reader.set("", Value::from(1)).unwrap_err();
        assert_eq!(err.code, ErrorCode::ConfigInvalid);
    }

    #[test]
    fn string_slice_splits_comma_separated_env_style_value() {
        let reader = MapConfigReader::new();
        reader
            .set("service.allowed_backends", Value::String("a, b ,c".into()))
            .unwrap();
        assert_eq!(
            reader.get_string_slice("service.allowed_backends", &[]),
            vec!["a".to_string(), "b".to_string(), "c".to_string()]
        );
    }

    #[test]
    fn on_change_callback_fires() {
        let reader = MapConfigReader::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count2 = count.clone();
        reader.on_change(Box::new(move |_path| {
            count2.fetch_add(1, Ordering::SeqCst);
        }));
        reader.set("a.b", Value::from(1)).unwrap();
        reader.set("a.c", Value::from(2)).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn with_defaults_seeds_values() {
        let reader = MapConfigReader::new().with_defaults([
            ("service.default_pipeline".to_string(), Value::String("default".into())),
        ]);
        assert_eq!(reader.get_string("service.default_pipeline", ""), "default");
    }
}
