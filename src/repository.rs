//! Record access paths combining a lock request with a store operation,
//! the way row-locking `SELECT ... FOR SHARE / FOR UPDATE` queries do.

use crate::error::RowLockError;
use crate::options::LockOptions;
use crate::record_store::Record;
use crate::transactions::lock::{LockManager, LockOutcome, PointLockManager, RowLockType};
use crate::transactions::pessimistic_transaction_db::PessimisticTransactionDB;
use crate::transactions::transaction::Transaction;
use crate::Result;
use std::sync::Arc;
use std::time::Duration;

pub struct Repository<LM: LockManager + 'static = PointLockManager> {
    db: Arc<PessimisticTransactionDB<LM>>,
}

impl<LM: LockManager + 'static> Repository<LM> {
    pub fn new(db: Arc<PessimisticTransactionDB<LM>>) -> Self {
        Repository { db }
    }

    /// Reads under a shared lock, waiting for writers to finish.
    pub fn find_for_share(&self, txn: &impl Transaction, key: &str) -> Result<Option<Record>> {
        self.find_locked(txn, key, RowLockType::Shared, &LockOptions::default())
    }

    /// Reads under an exclusive lock, failing with `LockConflict` if the row
    /// is locked.
    pub fn find_for_update_nowait(
        &self,
        txn: &impl Transaction,
        key: &str,
    ) -> Result<Option<Record>> {
        self.find_locked(txn, key, RowLockType::Exclusive, &LockOptions::nowait())
    }

    /// Reads under an exclusive lock; a locked row reads as absent.
    pub fn find_for_update_skip_locked(
        &self,
        txn: &impl Transaction,
        key: &str,
    ) -> Result<Option<Record>> {
        self.find_locked(
            txn,
            key,
            RowLockType::Exclusive,
            &LockOptions::skip_locked(),
        )
    }

    pub fn find_for_update(
        &self,
        txn: &impl Transaction,
        key: &str,
        options: &LockOptions,
    ) -> Result<Option<Record>> {
        self.find_locked(txn, key, RowLockType::Exclusive, options)
    }

    /// Plain read; sees whatever is stored, locked or not.
    pub fn find_without_lock(&self, key: &str) -> Option<Record> {
        self.db.store().get(key)
    }

    /// Locks the row exclusively, waiting at most `statement_timeout`, then
    /// sets `field`. Returns the number of rows updated.
    pub fn set_field(
        &self,
        txn: &impl Transaction,
        key: &str,
        field: &str,
        value: i64,
        statement_timeout: Option<Duration>,
    ) -> Result<usize> {
        let options = match statement_timeout {
            Some(timeout) => LockOptions::with_timeout(timeout),
            None => LockOptions::default(),
        };
        txn.lock(key, RowLockType::Exclusive, &options)?;
        self.set_field_without_lock(key, field, value)
    }

    /// Updates without taking a lock; races with any lock holder.
    pub fn set_field_without_lock(&self, key: &str, field: &str, value: i64) -> Result<usize> {
        match self.db.store().set_field(key, field, value) {
            Ok(()) => Ok(1),
            Err(RowLockError::KeyNotFound) => Ok(0),
            Err(e) => Err(e),
        }
    }

    fn find_locked(
        &self,
        txn: &impl Transaction,
        key: &str,
        lock_type: RowLockType,
        options: &LockOptions,
    ) -> Result<Option<Record>> {
        match txn.lock(key, lock_type, options)? {
            LockOutcome::Granted => Ok(self.db.store().get(key)),
            LockOutcome::Skipped => {
                trace!("txn {} skipped {:?}", txn.txn_id(), key);
                Ok(None)
            }
        }
    }
}
