use super::domain::{Outcome, SpResultSet};
use super::error::ParameterError;
use crate::value::Value;

/// Decodes the arguments of a procedure call and records its outcome.
///
/// An instance belongs to a single procedure invocation: parameters are prepared once, the outcome is set once after
/// the transaction has been terminated, and only then the result set gets built.
pub trait ParamHelper: Send {
    type ResultSet: Send;

    fn prepare_parameters(&mut self, args: &[Value]) -> Result<(), ParameterError>;

    /// Tells whether the procedure only reads; must not change once parameters are prepared.
    fn is_read_only(&self) -> bool;

    /// Records why the invocation did not commit. Called, if at all, right before `set_committed(false)`.
    fn set_abort_reason(&mut self, _reason: &str) {}

    fn set_committed(&mut self, committed: bool);

    fn create_result_set(&self) -> Self::ResultSet;
}

/// Bookkeeping shared by most [ParamHelper] implementations.
#[derive(Debug, Default, Clone)]
pub struct ParamState {
    pub read_only: bool,
    outcome: Outcome,
    abort_reason: Option<String>,
}

impl ParamState {
    pub fn new(read_only: bool) -> Self {
        Self {
            read_only,
            ..Default::default()
        }
    }

    pub fn outcome(&self) -> Outcome {
        self.outcome
    }

    pub fn set_committed(&mut self, committed: bool) {
        self.outcome = committed.into();
        if committed {
            self.abort_reason = None;
        }
    }

    pub fn set_abort_reason(&mut self, reason: &str) {
        self.abort_reason = Some(reason.to_string());
    }

    /// Returns a result set carrying the recorded outcome and no fields.
    pub fn result_set(&self) -> SpResultSet {
        let result_set = SpResultSet::new(self.outcome.is_committed());
        match &self.abort_reason {
            Some(reason) if !self.outcome.is_committed() => result_set.with_abort_reason(reason),
            _ => result_set,
        }
    }
}

/// Positional decoder over the raw arguments of a procedure call.
pub struct Arguments<'a> {
    args: &'a [Value],
    cursor: usize,
}

impl<'a> Arguments<'a> {
    /// Fails with [ParameterError::Arity] unless exactly `want` arguments were given.
    pub fn with_arity(args: &'a [Value], want: usize) -> Result<Self, ParameterError> {
        if args.len() != want {
            return Err(ParameterError::Arity {
                want,
                got: args.len(),
            });
        }

        Ok(Self { args, cursor: 0 })
    }

    /// Fails with [ParameterError::Arity] unless at least `want` arguments were given.
    pub fn with_min_arity(args: &'a [Value], want: usize) -> Result<Self, ParameterError> {
        if args.len() < want {
            return Err(ParameterError::Arity {
                want,
                got: args.len(),
            });
        }

        Ok(Self { args, cursor: 0 })
    }

    pub fn remaining(&self) -> usize {
        self.args.len() - self.cursor
    }

    pub fn integer(&mut self) -> Result<i64, ParameterError> {
        self.next("integer", Value::as_integer)
    }

    pub fn double(&mut self) -> Result<f64, ParameterError> {
        self.next("double", Value::as_double)
    }

    pub fn varchar(&mut self) -> Result<String, ParameterError> {
        self.next("varchar", |value| value.as_varchar().map(ToString::to_string))
    }

    pub fn boolean(&mut self) -> Result<bool, ParameterError> {
        self.next("boolean", Value::as_boolean)
    }

    fn next<T, F>(&mut self, want: &'static str, decode: F) -> Result<T, ParameterError>
    where
        F: FnOnce(&Value) -> Option<T>,
    {
        let Some(value) = self.args.get(self.cursor) else {
            return Err(ParameterError::Arity {
                want: self.cursor + 1,
                got: self.args.len(),
            });
        };

        let decoded = decode(value).ok_or_else(|| ParameterError::Type {
            index: self.cursor,
            want,
            got: value.kind().to_string(),
        })?;

        self.cursor += 1;
        Ok(decoded)
    }
}
