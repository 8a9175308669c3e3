//! Structural field access that records defects instead of failing.
//!
//! Every accessor returns `None` when the field is missing or mistyped and
//! appends one message describing the defect, so callers can keep going and
//! surface every problem in a single pass.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

pub type Object = Map<String, Value>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Findings {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl Findings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn extend(&mut self, other: Findings) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }

    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn as_object<'v>(&mut self, value: &'v Value, path: &str) -> Option<&'v Object> {
        match value {
            Value::Object(map) => Some(map),
            Value::Null => {
                self.error(format!("{} is missing", display_path(path)));
                None
            }
            _ => {
                self.error(format!("{} must be an object", display_path(path)));
                None
            }
        }
    }

    pub fn object<'v>(&mut self, obj: &'v Object, parent: &str, key: &str) -> Option<&'v Object> {
        let path = field_path(parent, key);
        match obj.get(key) {
            Some(Value::Object(map)) => Some(map),
            Some(_) => {
                self.error(format!("{} must be an object", path));
                None
            }
            None => {
                self.error(format!("{} is missing", path));
                None
            }
        }
    }

    pub fn array<'v>(&mut self, obj: &'v Object, parent: &str, key: &str) -> Option<&'v [Value]> {
        let path = field_path(parent, key);
        match obj.get(key) {
            Some(Value::Array(items)) => Some(items.as_slice()),
            Some(_) => {
                self.error(format!("{} must be an array", path));
                None
            }
            None => {
                self.error(format!("{} is missing", path));
                None
            }
        }
    }

    pub fn non_empty_array<'v>(
        &mut self,
        obj: &'v Object,
        parent: &str,
        key: &str,
    ) -> Option<&'v [Value]> {
        let items = self.array(obj, parent, key)?;
        if items.is_empty() {
            self.error(format!("{} must not be empty", field_path(parent, key)));
            return None;
        }
        Some(items)
    }

    /// Required, non-empty string.
    pub fn string<'v>(&mut self, obj: &'v Object, parent: &str, key: &str) -> Option<&'v str> {
        let path = field_path(parent, key);
        match obj.get(key) {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.as_str()),
            Some(Value::String(_)) => {
                self.error(format!("{} must not be empty", path));
                None
            }
            Some(_) => {
                self.error(format!("{} must be a string", path));
                None
            }
            None => {
                self.error(format!("{} is missing", path));
                None
            }
        }
    }

    /// Optional string: absent and `null` are accepted, any other type is not.
    /// Outer `None` means the field was present with the wrong type.
    pub fn optional_string<'v>(
        &mut self,
        obj: &'v Object,
        parent: &str,
        key: &str,
    ) -> Option<Option<&'v str>> {
        match obj.get(key) {
            None | Some(Value::Null) => Some(None),
            Some(Value::String(s)) => Some(Some(s.as_str())),
            Some(_) => {
                self.error(format!("{} must be a string or null", field_path(parent, key)));
                None
            }
        }
    }

    pub fn count(&mut self, obj: &Object, parent: &str, key: &str) -> Option<u64> {
        let path = field_path(parent, key);
        match obj.get(key) {
            Some(value) => match value.as_u64() {
                Some(n) => Some(n),
                None => {
                    self.error(format!("{} must be a non-negative integer", path));
                    None
                }
            },
            None => {
                self.error(format!("{} is missing", path));
                None
            }
        }
    }

    pub fn integer(&mut self, obj: &Object, parent: &str, key: &str) -> Option<i64> {
        let path = field_path(parent, key);
        match obj.get(key) {
            Some(value) => match value.as_i64() {
                Some(n) => Some(n),
                None => {
                    self.error(format!("{} must be an integer", path));
                    None
                }
            },
            None => {
                self.error(format!("{} is missing", path));
                None
            }
        }
    }

    pub fn number(&mut self, obj: &Object, parent: &str, key: &str) -> Option<f64> {
        let path = field_path(parent, key);
        match obj.get(key) {
            Some(value) => match value.as_f64() {
                Some(n) if n.is_finite() => Some(n),
                _ => {
                    self.error(format!("{} must be a number", path));
                    None
                }
            },
            None => {
                self.error(format!("{} is missing", path));
                None
            }
        }
    }

    pub fn non_negative_number(&mut self, obj: &Object, parent: &str, key: &str) -> Option<f64> {
        let n = self.number(obj, parent, key)?;
        if n < 0.0 {
            self.error(format!("{} must be non-negative", field_path(parent, key)));
            return None;
        }
        Some(n)
    }

    pub fn boolean(&mut self, obj: &Object, parent: &str, key: &str) -> Option<bool> {
        let path = field_path(parent, key);
        match obj.get(key) {
            Some(Value::Bool(b)) => Some(*b),
            Some(_) => {
                self.error(format!("{} must be a boolean", path));
                None
            }
            None => {
                self.error(format!("{} is missing", path));
                None
            }
        }
    }

    pub fn string_list(&mut self, obj: &Object, parent: &str, key: &str) -> Option<Vec<String>> {
        let items = self.array(obj, parent, key)?;
        let path = field_path(parent, key);
        let mut out = Vec::with_capacity(items.len());
        let mut valid = true;
        for (idx, item) in items.iter().enumerate() {
            match item.as_str() {
                Some(s) => out.push(s.to_string()),
                None => {
                    self.error(format!("{}[{}] must be a string", path, idx));
                    valid = false;
                }
            }
        }
        valid.then_some(out)
    }

    pub fn timestamp(&mut self, obj: &Object, parent: &str, key: &str) -> Option<DateTime<Utc>> {
        let raw = self.string(obj, parent, key)?;
        match DateTime::parse_from_rfc3339(raw) {
            Ok(ts) => Some(ts.with_timezone(&Utc)),
            Err(_) => {
                self.error(format!(
                    "{} must be an RFC 3339 timestamp, got '{}'",
                    field_path(parent, key),
                    raw
                ));
                None
            }
        }
    }

    /// Parse a string field into one of a closed set of values.
    pub fn enumerated<T: std::str::FromStr>(
        &mut self,
        obj: &Object,
        parent: &str,
        key: &str,
        allowed: &str,
    ) -> Option<T> {
        let raw = self.string(obj, parent, key)?;
        match raw.parse::<T>() {
            Ok(value) => Some(value),
            Err(_) => {
                self.error(format!(
                    "{} must be one of {}, got '{}'",
                    field_path(parent, key),
                    allowed,
                    raw
                ));
                None
            }
        }
    }

    pub fn schema_version(&mut self, obj: &Object, expected: &str) -> Option<String> {
        let actual = self.string(obj, "", "schemaVersion")?;
        if actual != expected {
            self.error(format!(
                "schemaVersion mismatch: expected {}, actual {}",
                expected, actual
            ));
        }
        Some(actual.to_string())
    }
}

pub fn field_path(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", parent, key)
    }
}

fn display_path(path: &str) -> &str {
    if path.is_empty() {
        "report"
    } else {
        path
    }
}
