//! Record level lock table used to serialize conflicting transactions.
//!
//! Locks follow the strict two phase protocol: a transaction acquires [`LockMode::Shared`] locks to read and
//! [`LockMode::Exclusive`] locks to write, and releases all of them at once when it terminates. A request that cannot
//! be granted before the table's timeout expires aborts the requester, which is how both plain conflicts and
//! deadlocks get broken.

use super::domain::{LockMode, TxID};
use super::error::{Error, Result};
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::{self, Instant};

#[derive(Debug, Default)]
struct LockEntry {
    sharers: HashSet<TxID>,
    owner: Option<TxID>,
}

impl LockEntry {
    /// Grants the lock to the given transaction if compatible with the current holders.
    fn grant(&mut self, tx: TxID, mode: LockMode) -> bool {
        match mode {
            LockMode::Shared => {
                if self.owner.is_some_and(|owner| owner != tx) {
                    return false;
                }

                if self.owner != Some(tx) {
                    self.sharers.insert(tx);
                }

                true
            }
            LockMode::Exclusive => {
                if self.owner == Some(tx) {
                    return true;
                }

                // an upgrade is only possible for the sole sharer
                if self.owner.is_some() || self.sharers.iter().any(|sharer| *sharer != tx) {
                    return false;
                }

                self.sharers.remove(&tx);
                self.owner = Some(tx);
                true
            }
        }
    }

    fn release(&mut self, tx: TxID) {
        self.sharers.remove(&tx);
        if self.owner == Some(tx) {
            self.owner = None;
        }
    }

    fn is_free(&self) -> bool {
        self.owner.is_none() && self.sharers.is_empty()
    }
}

pub struct LockTable {
    entries: Mutex<HashMap<String, LockEntry>>,
    released: Notify,
    timeout: Duration,
}

impl LockTable {
    pub fn new(timeout: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            released: Notify::new(),
            timeout,
        }
    }

    /// Blocks until the given transaction holds the requested lock on key, or fails with
    /// [`Error::LockAbort`] if that does not happen before the timeout.
    #[instrument(skip(self))]
    pub async fn acquire(&self, tx: TxID, key: &str, mode: LockMode) -> Result<()> {
        let deadline = Instant::now() + self.timeout;

        loop {
            let released = self.released.notified();
            tokio::pin!(released);
            released.as_mut().enable();

            let granted = self
                .entries()
                .entry(key.to_string())
                .or_default()
                .grant(tx, mode);

            if granted {
                return Ok(());
            }

            if time::timeout_at(deadline, released).await.is_err() {
                debug!(
                    timeout_ms = self.timeout.as_millis() as u64,
                    "lock wait timed out"
                );

                return Error::LockAbort(format!(
                    "{tx} timed out waiting for {mode} lock on {key}"
                ))
                .into();
            }
        }
    }

    /// Releases every lock the given transaction holds over the given keys and wakes up any waiter.
    pub fn release_all<'a, I>(&self, tx: TxID, keys: I)
    where
        I: IntoIterator<Item = &'a String>,
    {
        let mut entries = self.entries();
        for key in keys {
            if let Some(entry) = entries.get_mut(key) {
                entry.release(tx);
                if entry.is_free() {
                    entries.remove(key);
                }
            }
        }

        drop(entries);
        self.released.notify_waiters();
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, LockEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
