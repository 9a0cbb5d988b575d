use super::error::{BodyError, Error, Result};
use super::params::ParamHelper;
use crate::macros::on_error;
use crate::transaction::domain::{IsolationLevel, TxState};
use crate::transaction::error::Error as TxError;
use crate::transaction::service::{Transaction, TransactionManager};
use crate::value::Value;
use async_trait::async_trait;
use futures::FutureExt;
use std::any::Any;
use std::mem;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// The business logic of a concrete stored procedure, run inside the transaction handed over by
/// [StoredProcedure::execute].
#[async_trait]
pub trait ProcedureBody<T, H>: Send + Sync
where
    T: Transaction,
    H: ParamHelper,
{
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    async fn run(&self, tx: &mut T, params: &mut H) -> std::result::Result<(), BodyError>;
}

enum State<T> {
    Created,
    Prepared(T),
    Executed(T),
    Discarded,
}

/// Drives a single invocation of a procedure body through its transaction lifecycle.
///
/// An instance goes from created to prepared and then to executed, never backwards; a fresh instance is required for
/// every invocation, retries included.
pub struct StoredProcedure<M, H, B>
where
    M: TransactionManager,
{
    tx_mgr: Arc<M>,
    param_helper: H,
    body: B,
    state: State<M::Tx>,
}

impl<M, H, B> StoredProcedure<M, H, B>
where
    M: TransactionManager,
    H: ParamHelper,
    B: ProcedureBody<M::Tx, H>,
{
    pub fn new(tx_mgr: Arc<M>, param_helper: H, body: B) -> Self {
        Self {
            tx_mgr,
            param_helper,
            body,
            state: State::Created,
        }
    }

    pub fn param_helper(&self) -> &H {
        &self.param_helper
    }

    /// Returns the transaction of this invocation, if already allocated.
    pub fn transaction(&self) -> Option<&M::Tx> {
        match &self.state {
            State::Prepared(tx) | State::Executed(tx) => Some(tx),
            State::Created | State::Discarded => None,
        }
    }

    /// Binds the given arguments and opens the serializable transaction the procedure will run in.
    ///
    /// # Panics
    ///
    /// If the procedure has already been prepared, even unsuccessfully.
    #[instrument(skip(self, args), fields(procedure = self.body.name()))]
    pub async fn prepare(&mut self, args: &[Value]) -> Result<()> {
        assert!(
            matches!(self.state, State::Created),
            "stored procedure {} must be prepared once, and only once",
            self.body.name()
        );

        self.state = State::Discarded;
        self.param_helper.prepare_parameters(args)?;

        let read_only = self.param_helper.is_read_only();
        let tx = self
            .tx_mgr
            .new_transaction(IsolationLevel::Serializable, read_only)
            .await
            .map_err(on_error!(TxError as Error, "allocating procedure transaction"))?;

        debug!(tx = tx.id().to_string(), read_only, "stored procedure prepared");
        self.state = State::Prepared(tx);
        Ok(())
    }

    /// Runs the procedure body and terminates its transaction accordingly, returning the result set describing the
    /// outcome. No error escapes from here: lock aborts and unexpected failures end up rolled back and reported through
    /// the result set.
    ///
    /// Executing an already executed procedure issues no further terminal action and just rebuilds its result set.
    ///
    /// # Panics
    ///
    /// If the procedure has not been prepared successfully.
    #[instrument(skip(self), fields(procedure = self.body.name()))]
    pub async fn execute(&mut self) -> H::ResultSet {
        let mut tx = match mem::replace(&mut self.state, State::Discarded) {
            State::Prepared(tx) => tx,
            State::Executed(tx) => {
                warn!(
                    tx = tx.id().to_string(),
                    "stored procedure has already been executed"
                );

                self.state = State::Executed(tx);
                return self.param_helper.create_result_set();
            }
            State::Created | State::Discarded => panic!(
                "stored procedure {} executed without being prepared",
                self.body.name()
            ),
        };

        let failure = self.run(&mut tx).await.err();
        match &failure {
            None => {}
            Some(failure) if tx.state() == TxState::Committed => warn!(
                tx = tx.id().to_string(),
                error = failure.message(),
                "stored procedure failed after its transaction committed"
            ),
            Some(failure) => {
                match failure {
                    BodyError::RetryableConflict(reason) => warn!(
                        tx = tx.id().to_string(),
                        reason = reason.as_str(),
                        "stored procedure aborted by concurrency control"
                    ),
                    BodyError::Fatal(reason) => error!(
                        tx = tx.id().to_string(),
                        error = reason.as_str(),
                        "stored procedure failed unexpectedly"
                    ),
                }

                if !tx.state().is_terminated() {
                    if let Err(error) = tx.rollback().await {
                        error!(
                            tx = tx.id().to_string(),
                            error = error.to_string(),
                            "rolling back procedure transaction"
                        );
                    }
                }
            }
        }

        // the outcome must match whatever terminal action actually took place
        let committed = tx.state() == TxState::Committed;
        debug!(tx = tx.id().to_string(), committed, "stored procedure executed");

        if let (false, Some(failure)) = (committed, &failure) {
            self.param_helper.set_abort_reason(failure.message());
        }

        self.param_helper.set_committed(committed);
        self.state = State::Executed(tx);
        self.param_helper.create_result_set()
    }

    /// Runs the body and commits, classifying whatever goes wrong in between. Panics raised by either step end up as
    /// [BodyError::Fatal].
    async fn run(&mut self, tx: &mut M::Tx) -> std::result::Result<(), BodyError> {
        let body = &self.body;
        let param_helper = &mut self.param_helper;

        AssertUnwindSafe(async move {
            body.run(tx, param_helper).await?;
            tx.commit().await.map_err(BodyError::from)
        })
        .catch_unwind()
        .await
        .map_err(|panic| BodyError::Fatal(panic_message(panic)))?
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    panic
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "procedure body panicked".to_string())
}
