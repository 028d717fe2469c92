//! Path-keyed configuration store
//!
//! Values live in a single `serde_json::Value` tree addressed by
//! dot-separated paths (`coverage.include`). Readers share an `Arc` snapshot;
//! writes clone the tree only when a snapshot is still held elsewhere.
//! Listeners registered on a path prefix are told about every change below it.

use crate::result::{FirmoError, FirmoResult};
use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Callback invoked with `(changed_path, new_value)`
pub type ChangeListener = Arc<dyn Fn(&str, &Value) + Send + Sync>;

/// Hierarchical key/value configuration with change notification
pub struct ConfigStore {
    root: RwLock<Arc<Value>>,
    listeners: Mutex<Vec<(String, ChangeListener)>>,
}

impl fmt::Debug for ConfigStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigStore")
            .field("root", &*self.root.read())
            .field("listeners", &self.listeners.lock().len())
            .finish()
    }
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::from_value(Value::Object(Map::new()))
    }
}

impl ConfigStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store from an existing tree
    #[must_use]
    pub fn from_value(value: Value) -> Self {
        Self {
            root: RwLock::new(Arc::new(value)),
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// Load a JSON (`.json`) or YAML (`.yml`/`.yaml`) file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed
    pub fn load_file(path: &Path) -> FirmoResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let value: Value = match path.extension().and_then(|e| e.to_str()) {
            Some("yml" | "yaml") => serde_yaml_ng::from_str(&content)?,
            _ => serde_json::from_str(&content)?,
        };
        debug!(path = %path.display(), "loaded configuration file");
        Ok(Self::from_value(value))
    }

    /// Current snapshot of the whole tree
    #[must_use]
    pub fn snapshot(&self) -> Arc<Value> {
        Arc::clone(&self.root.read())
    }

    /// Raw value at `path`
    #[must_use]
    pub fn get_value(&self, path: &str) -> Option<Value> {
        let root = self.snapshot();
        lookup(&root, path).cloned()
    }

    /// Typed value at `path`; `Ok(None)` when absent
    ///
    /// # Errors
    ///
    /// Returns error if the value exists but has the wrong shape
    pub fn get<T: DeserializeOwned>(&self, path: &str) -> FirmoResult<Option<T>> {
        let root = self.snapshot();
        match lookup(&root, path) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => T::deserialize(value).map(Some).map_err(|e| FirmoError::Config {
                path: path.to_string(),
                message: e.to_string(),
            }),
        }
    }

    /// Typed value at `path`, or `default` when absent or malformed
    #[must_use]
    pub fn get_or<T: DeserializeOwned>(&self, path: &str, default: T) -> T {
        self.get(path).ok().flatten().unwrap_or(default)
    }

    /// Set the value at `path`, creating intermediate tables as needed
    ///
    /// # Errors
    ///
    /// Returns error if `path` is empty, crosses a non-table value, or the
    /// value cannot be serialized
    pub fn set<T: Serialize>(&self, path: &str, value: T) -> FirmoResult<()> {
        let value = serde_json::to_value(value)?;
        if path.is_empty() {
            return Err(FirmoError::invalid_argument("configuration path is empty"));
        }
        {
            let mut guard = self.root.write();
            let root = Arc::make_mut(&mut *guard);
            let keys: Vec<&str> = path.split('.').collect();
            insert(root, &keys, path, value.clone())?;
        }
        self.notify(path, &value);
        Ok(())
    }

    /// Register a listener for changes at or below `path_prefix`
    ///
    /// Listeners run after the store's locks are released, so they may read,
    /// write, or register further listeners.
    pub fn on_change<F>(&self, path_prefix: &str, listener: F)
    where
        F: Fn(&str, &Value) + Send + Sync + 'static,
    {
        self.listeners
            .lock()
            .push((path_prefix.to_string(), Arc::new(listener)));
    }

    fn notify(&self, path: &str, value: &Value) {
        let matching: Vec<ChangeListener> = self
            .listeners
            .lock()
            .iter()
            .filter(|(prefix, _)| is_under(path, prefix) || is_under(prefix, path))
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in matching {
            listener(path, value);
        }
    }
}

fn is_under(path: &str, prefix: &str) -> bool {
    prefix.is_empty()
        || path == prefix
        || path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('.'))
}

fn lookup<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(root);
    }
    path.split('.')
        .try_fold(root, |node, key| node.as_object()?.get(key))
}

fn insert(node: &mut Value, keys: &[&str], path: &str, value: Value) -> FirmoResult<()> {
    let Value::Object(table) = node else {
        return Err(FirmoError::Config {
            path: path.to_string(),
            message: format!("'{}' is nested under a non-table value", keys.join(".")),
        });
    };
    match keys {
        [] => Ok(()),
        [last] => {
            table.insert((*last).to_string(), value);
            Ok(())
        }
        [first, rest @ ..] => {
            let child = table
                .entry((*first).to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            insert(child, rest, path, value)
        }
    }
}
