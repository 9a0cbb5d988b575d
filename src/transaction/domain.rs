use std::fmt;

/// Represents the isolation level a transaction is bound to.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

/// Represents the unique identifier of a transaction within its manager.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TxID(pub(crate) u64);

impl fmt::Display for TxID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tx-{}", self.0)
    }
}

/// Represents the lifecycle stage of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum TxState {
    Active,
    Committed,
    RolledBack,
}

impl TxState {
    /// Returns true if, and only if, no further terminal action may be applied.
    pub fn is_terminated(&self) -> bool {
        !matches!(self, TxState::Active)
    }
}

/// Represents the access a lock grants over a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum LockMode {
    Shared,
    Exclusive,
}

#[cfg(test)]
mod tests {
    use super::{IsolationLevel, TxID, TxState};
    use std::str::FromStr;

    #[test]
    fn isolation_level_as_string() {
        assert_eq!(IsolationLevel::Serializable.to_string(), "SERIALIZABLE");
        assert_eq!(
            IsolationLevel::from_str("READ_COMMITTED").unwrap(),
            IsolationLevel::ReadCommitted
        );
    }

    #[test]
    fn tx_id_display() {
        assert_eq!(TxID(42).to_string(), "tx-42");
    }

    #[test]
    fn only_active_is_not_terminated() {
        assert!(!TxState::Active.is_terminated());
        assert!(TxState::Committed.is_terminated());
        assert!(TxState::RolledBack.is_terminated());
    }
}
