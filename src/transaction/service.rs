use super::domain::{IsolationLevel, TxID, TxState};
use super::error::Result;
use async_trait::async_trait;

/// Represents a handle over a single transaction, exclusively owned by whoever requested it.
///
/// Calling [`Transaction::rollback`] on a handle that has not committed yet must always be safe, while calling any
/// terminal action on an already terminated handle must fail with
/// [`Terminated`](super::error::Error::Terminated) instead of touching the storage.
#[async_trait]
pub trait Transaction: Send {
    fn id(&self) -> TxID;
    fn isolation_level(&self) -> IsolationLevel;
    fn is_read_only(&self) -> bool;
    fn state(&self) -> TxState;
    async fn commit(&mut self) -> Result<()>;
    async fn rollback(&mut self) -> Result<()>;
}

/// Represents the process-wide authority creating transactions.
#[async_trait]
pub trait TransactionManager: Send + Sync {
    type Tx: Transaction;

    async fn new_transaction(&self, isolation: IsolationLevel, read_only: bool)
        -> Result<Self::Tx>;
}

#[cfg(test)]
pub mod tests {
    use super::super::domain::{IsolationLevel, TxID, TxState};
    use super::super::error::{Error, Result};
    use super::{Transaction, TransactionManager};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::{Arc, Mutex};

    /// Every interaction the mocks get through, in order.
    #[derive(Debug, Clone, PartialEq)]
    pub enum Call {
        Begin(IsolationLevel, bool),
        Commit(TxID),
        Rollback(TxID),
    }

    pub type Journal = Arc<Mutex<Vec<Call>>>;

    type NewTransactionFn = fn(isolation: IsolationLevel, read_only: bool) -> Result<()>;
    type CommitFn = fn(id: TxID) -> Result<()>;
    type RollbackFn = fn(id: TxID) -> Result<()>;

    #[derive(Default)]
    pub struct TransactionManagerMock {
        pub new_transaction_fn: Option<NewTransactionFn>,
        pub commit_fn: Option<CommitFn>,
        pub rollback_fn: Option<RollbackFn>,
        pub journal: Journal,
        pub next_id: AtomicU64,
    }

    impl TransactionManagerMock {
        pub fn calls(&self) -> Vec<Call> {
            self.journal.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TransactionManager for TransactionManagerMock {
        type Tx = TransactionMock;

        async fn new_transaction(
            &self,
            isolation: IsolationLevel,
            read_only: bool,
        ) -> Result<Self::Tx> {
            if let Some(new_transaction_fn) = self.new_transaction_fn {
                new_transaction_fn(isolation, read_only)?;
            }

            self.journal
                .lock()
                .unwrap()
                .push(Call::Begin(isolation, read_only));

            Ok(TransactionMock {
                id: TxID(self.next_id.fetch_add(1, Ordering::SeqCst)),
                isolation,
                read_only,
                state: TxState::Active,
                commit_fn: self.commit_fn,
                rollback_fn: self.rollback_fn,
                journal: self.journal.clone(),
            })
        }
    }

    pub struct TransactionMock {
        pub id: TxID,
        pub isolation: IsolationLevel,
        pub read_only: bool,
        pub state: TxState,
        pub commit_fn: Option<CommitFn>,
        pub rollback_fn: Option<RollbackFn>,
        pub journal: Journal,
    }

    #[async_trait]
    impl Transaction for TransactionMock {
        fn id(&self) -> TxID {
            self.id
        }

        fn isolation_level(&self) -> IsolationLevel {
            self.isolation
        }

        fn is_read_only(&self) -> bool {
            self.read_only
        }

        fn state(&self) -> TxState {
            self.state
        }

        async fn commit(&mut self) -> Result<()> {
            if self.state.is_terminated() {
                return Error::Terminated {
                    id: self.id,
                    state: self.state,
                }
                .into();
            }

            self.journal.lock().unwrap().push(Call::Commit(self.id));
            if let Some(commit_fn) = self.commit_fn {
                commit_fn(self.id)?;
            }

            self.state = TxState::Committed;
            Ok(())
        }

        async fn rollback(&mut self) -> Result<()> {
            if self.state.is_terminated() {
                return Error::Terminated {
                    id: self.id,
                    state: self.state,
                }
                .into();
            }

            self.journal.lock().unwrap().push(Call::Rollback(self.id));
            self.state = TxState::RolledBack;
            if let Some(rollback_fn) = self.rollback_fn {
                return rollback_fn(self.id);
            }

            Ok(())
        }
    }
}
