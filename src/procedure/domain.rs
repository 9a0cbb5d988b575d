use crate::value::Value;
use std::collections::BTreeMap;

/// Represents the outcome recorded for a procedure invocation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, strum_macros::Display,
)]
#[strum(serialize_all = "lowercase")]
pub enum Outcome {
    /// The terminal action has not been decided yet.
    #[default]
    Unknown,
    Committed,
    RolledBack,
}

impl From<bool> for Outcome {
    fn from(committed: bool) -> Self {
        if committed {
            Outcome::Committed
        } else {
            Outcome::RolledBack
        }
    }
}

impl Outcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, Outcome::Committed)
    }

    pub fn is_decided(&self) -> bool {
        !matches!(self, Outcome::Unknown)
    }
}

/// The caller-facing summary of a procedure invocation, whatever its outcome was.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpResultSet {
    committed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    abort_reason: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    fields: BTreeMap<String, Value>,
}

impl SpResultSet {
    pub fn new(committed: bool) -> Self {
        Self {
            committed,
            ..Default::default()
        }
    }

    pub fn with_abort_reason(mut self, reason: impl Into<String>) -> Self {
        self.abort_reason = Some(reason.into());
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn is_committed(&self) -> bool {
        self.committed
    }

    /// Returns the reason why the invocation did not commit, if known.
    pub fn abort_reason(&self) -> Option<&str> {
        self.abort_reason.as_deref()
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn fields(&self) -> &BTreeMap<String, Value> {
        &self.fields
    }
}
