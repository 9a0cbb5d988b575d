//! In-memory implementation of the [TransactionManager] trait.

use super::domain::{IsolationLevel, LockMode, TxID, TxState};
use super::error::{Error, Result};
use super::lock::LockTable;
use super::service::{Transaction, TransactionManager};
use crate::config;
use crate::value::Value;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

type Records = Arc<RwLock<HashMap<String, Value>>>;

/// Keeps committed records in memory and serializes transactions through a shared [LockTable].
pub struct InMemoryTransactionManager {
    records: Records,
    locks: Arc<LockTable>,
    next_id: AtomicU64,
    active: Arc<AtomicUsize>,
    max_active: usize,
}

impl Default for InMemoryTransactionManager {
    fn default() -> Self {
        Self::new(*config::LOCK_TIMEOUT, *config::MAX_ACTIVE_TRANSACTIONS)
    }
}

impl InMemoryTransactionManager {
    pub fn new(lock_timeout: Duration, max_active: usize) -> Self {
        Self {
            records: Default::default(),
            locks: Arc::new(LockTable::new(lock_timeout)),
            next_id: AtomicU64::new(1),
            active: Default::default(),
            max_active,
        }
    }

    /// Stores the given records straight away, bypassing transactions and locks.
    pub fn load<I>(&self, records: I)
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        self.records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(records);
    }

    /// Returns a copy of every committed record.
    pub fn snapshot(&self) -> HashMap<String, Value> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn active_transactions(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TransactionManager for InMemoryTransactionManager {
    type Tx = InMemoryTransaction;

    #[instrument(skip(self))]
    async fn new_transaction(
        &self,
        isolation: IsolationLevel,
        read_only: bool,
    ) -> Result<Self::Tx> {
        if isolation != IsolationLevel::Serializable {
            return Error::UnsupportedIsolation(isolation).into();
        }

        self.active
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |active| {
                (active < self.max_active).then_some(active + 1)
            })
            .map_err(|_| Error::Exhausted(self.max_active))?;

        let id = TxID(self.next_id.fetch_add(1, Ordering::SeqCst));
        debug!(tx = id.to_string(), "transaction started");

        Ok(InMemoryTransaction {
            id,
            read_only,
            state: TxState::Active,
            records: self.records.clone(),
            locks: self.locks.clone(),
            active: self.active.clone(),
            locked: HashSet::new(),
            writes: HashMap::new(),
        })
    }
}

/// Transaction over the records of an [InMemoryTransactionManager].
///
/// Writes are buffered until commit, so rolling back only has to forget them and release the locks.
pub struct InMemoryTransaction {
    id: TxID,
    read_only: bool,
    state: TxState,
    records: Records,
    locks: Arc<LockTable>,
    active: Arc<AtomicUsize>,
    locked: HashSet<String>,
    writes: HashMap<String, Option<Value>>,
}

impl InMemoryTransaction {
    /// Returns the value of the given record as seen by this transaction, if any.
    pub async fn read(&mut self, key: &str) -> Result<Option<Value>> {
        self.ensure_active()?;
        if let Some(value) = self.writes.get(key) {
            return Ok(value.clone());
        }

        self.lock(key, LockMode::Shared).await?;
        let value = self
            .records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned();

        Ok(value)
    }

    pub async fn write(&mut self, key: &str, value: Value) -> Result<()> {
        self.modify(key, Some(value)).await
    }

    pub async fn delete(&mut self, key: &str) -> Result<()> {
        self.modify(key, None).await
    }

    async fn modify(&mut self, key: &str, value: Option<Value>) -> Result<()> {
        self.ensure_active()?;
        if self.read_only {
            return Error::ReadOnly(self.id).into();
        }

        self.lock(key, LockMode::Exclusive).await?;
        self.writes.insert(key.to_string(), value);
        Ok(())
    }

    async fn lock(&mut self, key: &str, mode: LockMode) -> Result<()> {
        self.locks.acquire(self.id, key, mode).await?;
        self.locked.insert(key.to_string());
        Ok(())
    }

    fn ensure_active(&self) -> Result<()> {
        if self.state.is_terminated() {
            return Error::Terminated {
                id: self.id,
                state: self.state,
            }
            .into();
        }

        Ok(())
    }

    fn terminate(&mut self, state: TxState) {
        self.state = state;
        self.writes.clear();
        self.locks.release_all(self.id, &self.locked);
        self.locked.clear();
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Transaction for InMemoryTransaction {
    fn id(&self) -> TxID {
        self.id
    }

    fn isolation_level(&self) -> IsolationLevel {
        IsolationLevel::Serializable
    }

    fn is_read_only(&self) -> bool {
        self.read_only
    }

    fn state(&self) -> TxState {
        self.state
    }

    #[instrument(skip(self), fields(tx = self.id.to_string()))]
    async fn commit(&mut self) -> Result<()> {
        self.ensure_active()?;

        {
            let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
            for (key, value) in self.writes.drain() {
                match value {
                    Some(value) => records.insert(key, value),
                    None => records.remove(&key),
                };
            }
        }

        self.terminate(TxState::Committed);
        debug!("transaction committed");
        Ok(())
    }

    #[instrument(skip(self), fields(tx = self.id.to_string()))]
    async fn rollback(&mut self) -> Result<()> {
        self.ensure_active()?;
        self.terminate(TxState::RolledBack);
        debug!("transaction rolled back");
        Ok(())
    }
}

impl Drop for InMemoryTransaction {
    fn drop(&mut self) {
        if !self.state.is_terminated() {
            warn!(tx = self.id.to_string(), "rolling back dropped transaction");
            self.terminate(TxState::RolledBack);
        }
    }
}
