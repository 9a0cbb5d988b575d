//! Result type and errors related to stored procedures stuff.

use crate::transaction::error::Error as TxError;

pub type Result<T> = std::result::Result<T, Error>;

impl<T> From<Error> for Result<T> {
    fn from(value: Error) -> Self {
        Self::Err(value)
    }
}

/// Errors a caller may get before any transaction exists.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("{0}")]
    Parameter(#[from] ParameterError),
    #[error("allocating transaction: {0}")]
    TransactionAllocation(#[from] TxError),
    #[error("procedure {0} not found")]
    NotFound(String),
}

impl Error {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ParameterError {
    #[error("expected {want} arguments, got {got}")]
    Arity { want: usize, got: usize },
    #[error("argument {index} must be {want}, got {got}")]
    Type {
        index: usize,
        want: &'static str,
        got: String,
    },
    #[error("{0}")]
    Invalid(String),
}

/// Failure of a procedure body, or of the commit that follows it, classified by kind.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum BodyError {
    /// The concurrency manager aborted the transaction; retrying on a fresh instance may succeed.
    #[error("retryable conflict: {0}")]
    RetryableConflict(String),
    #[error("{0}")]
    Fatal(String),
}

impl BodyError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, BodyError::RetryableConflict(_))
    }

    pub fn message(&self) -> &str {
        match self {
            BodyError::RetryableConflict(msg) | BodyError::Fatal(msg) => msg,
        }
    }
}

impl From<TxError> for BodyError {
    fn from(error: TxError) -> Self {
        match error {
            TxError::LockAbort(msg) => BodyError::RetryableConflict(msg),
            other => BodyError::Fatal(other.to_string()),
        }
    }
}

impl From<ParameterError> for BodyError {
    fn from(error: ParameterError) -> Self {
        BodyError::Fatal(error.to_string())
    }
}
