//! Definition of the scalar [Value] exchanged between callers, procedures and records.

use std::fmt;

/// Represents a single typed scalar, as passed in a procedure call or stored in a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, strum_macros::AsRefStr)]
#[serde(untagged)]
#[strum(serialize_all = "lowercase")]
pub enum Value {
    Integer(i64),
    Double(f64),
    Varchar(String),
    Boolean(bool),
}

impl Value {
    /// Returns the name of the type of self.
    pub fn kind(&self) -> &str {
        self.as_ref()
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the value as a double, widening integers if needed.
    pub fn as_double(&self) -> Option<f64> {
        match self {
            Value::Double(value) => Some(*value),
            Value::Integer(value) => Some(*value as f64),
            _ => None,
        }
    }

    pub fn as_varchar(&self) -> Option<&str> {
        match self {
            Value::Varchar(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            Value::Boolean(value) => Some(*value),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(value) => write!(f, "{value}"),
            Value::Double(value) => write!(f, "{value}"),
            Value::Varchar(value) => write!(f, "'{value}'"),
            Value::Boolean(value) => write!(f, "{value}"),
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Double(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Varchar(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Varchar(value)
    }
}
