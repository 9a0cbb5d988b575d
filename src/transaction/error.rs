//! Result type and errors related to transaction stuff.

use super::domain::{IsolationLevel, TxID, TxState};

pub type Result<T> = std::result::Result<T, Error>;

impl<T> From<Error> for Result<T> {
    fn from(value: Error) -> Self {
        Self::Err(value)
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// The concurrency manager aborted the transaction to break a conflict.
    #[error("lock abort: {0}")]
    LockAbort(String),
    #[error("{0} is read-only")]
    ReadOnly(TxID),
    #[error("{id} has already been {state}")]
    Terminated { id: TxID, state: TxState },
    #[error("isolation level {0} is not supported")]
    UnsupportedIsolation(IsolationLevel),
    #[error("too many active transactions ({0})")]
    Exhausted(usize),
    #[error("{0}")]
    Unknown(String),
    #[cfg(test)]
    #[error("unexpected error")]
    Debug,
}

impl Error {
    pub fn is_lock_abort(&self) -> bool {
        matches!(self, Error::LockAbort(_))
    }
}
