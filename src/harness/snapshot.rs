use bon::Builder;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::status::{Lifecycle, ResultCode};
use crate::constants::{ERROR_OK, keys};

/// Which optional fields [`super::ExecHarness::poll_details`] should include.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Builder)]
pub struct DetailFlags {
    /// Include the submitted source under `source`.
    #[builder(default)]
    pub with_source:  bool,
    /// Include the stdin payload under `input`.
    #[builder(default)]
    pub with_input:   bool,
    /// Include captured stdout under `output`.
    #[builder(default)]
    pub with_output:  bool,
    /// Include captured stderr under `stderr`.
    #[builder(default)]
    pub with_stderr:  bool,
    /// Include compiler diagnostics under `cmpinfo`.
    #[builder(default)]
    pub with_cmpinfo: bool,
}

impl DetailFlags {
    /// Every optional field.
    pub fn all() -> Self {
        Self {
            with_source:  true,
            with_input:   true,
            with_output:  true,
            with_stderr:  true,
            with_cmpinfo: true,
        }
    }
}

/// An immutable key/value view of a submission.
///
/// The shape varies with the [`DetailFlags`] used to request it, so this is a
/// map rather than a struct. Typed accessors cover the keys that are always
/// present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot(Map<String, Value>);

impl Snapshot {
    /// Empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces `key`.
    pub fn insert(&mut self, key: &str, value: impl Into<Value>) -> &mut Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    /// Raw value for `key`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// String value for `key`, if present and a string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Integer value for `key`, if present and an integer.
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.0.get(key).and_then(Value::as_i64)
    }

    /// Whether `key` is present.
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Keys in this snapshot.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// The `error` marker; `"OK"` when absent.
    pub fn error(&self) -> &str {
        self.get_str(keys::ERROR).unwrap_or(ERROR_OK)
    }

    /// Whether the `error` marker is `"OK"`.
    pub fn is_ok(&self) -> bool {
        self.error() == ERROR_OK
    }

    /// The lifecycle lane under `status`.
    pub fn lifecycle(&self) -> Option<Lifecycle> {
        self.get_i64(keys::STATUS).and_then(Lifecycle::from_code)
    }

    /// The outcome under `result`.
    pub fn result(&self) -> Option<ResultCode> {
        self.get_i64(keys::RESULT).and_then(ResultCode::from_code)
    }

    /// Whether a terminal result has been reached.
    pub fn is_done(&self) -> bool {
        self.lifecycle() == Some(Lifecycle::Done)
    }

    /// Execution time in seconds under `time`.
    pub fn time(&self) -> Option<f64> {
        self.get(keys::TIME).and_then(Value::as_f64)
    }

    /// Captured stdout under `output`.
    pub fn output(&self) -> Option<&str> {
        self.get_str(keys::OUTPUT)
    }

    /// Captured stderr under `stderr`.
    pub fn stderr(&self) -> Option<&str> {
        self.get_str(keys::STDERR)
    }

    /// Compiler diagnostics under `cmpinfo`.
    pub fn cmpinfo(&self) -> Option<&str> {
        self.get_str(keys::CMPINFO)
    }

    /// Borrow the underlying map.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Consume into the underlying map.
    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}
