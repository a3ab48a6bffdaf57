//! Typed configuration values.

use serde::{Deserialize, Serialize};

/// A value stored under a configuration key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ConfigValue {
    /// UTF-8 string.
    String(String),
    /// Signed integer.
    Int(i64),
    /// Boolean flag.
    Bool(bool),
    /// List of strings.
    List(Vec<String>),
}

impl ConfigValue {
    /// Name of the value type, used in error messages.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::String(_) => "string",
            Self::Int(_) => "int",
            Self::Bool(_) => "bool",
            Self::List(_) => "list",
        }
    }
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for ConfigValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<bool> for ConfigValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<Vec<String>> for ConfigValue {
    fn from(value: Vec<String>) -> Self {
        Self::List(value)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn serialized_form() {
        let json = serde_json::to_string(&ConfigValue::Int(42)).unwrap();
        assert_eq!(json, r#"{"type":"int","value":42}"#);
        let back: ConfigValue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ConfigValue::Int(42));
    }

    #[test]
    fn type_names() {
        assert_eq!(ConfigValue::from("x").type_name(), "string");
        assert_eq!(ConfigValue::from(true).type_name(), "bool");
        assert_eq!(ConfigValue::from(vec![]).type_name(), "list");
    }
}
