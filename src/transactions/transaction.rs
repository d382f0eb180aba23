use crate::error::RowLockError;
use crate::options::LockOptions;
use crate::transactions::lock::{LockManager, LockOutcome, PointLockManager, RowLockType};
use crate::transactions::pessimistic_transaction_db::PessimisticTransactionDB;
use crate::transactions::{RecordKey, TransactionID, TransactionState};
use crate::Result;
use std::sync::Arc;

pub trait Transaction {
    fn txn_id(&self) -> TransactionID;
    fn lock(&self, key: &str, lock_type: RowLockType, options: &LockOptions)
        -> Result<LockOutcome>;
    fn state(&self) -> Result<TransactionState>;
}

/// Handle of a transaction started by [`PessimisticTransactionDB::begin`].
///
/// The handle may be shared between threads, each issuing its own lock
/// requests. Dropping a handle that is still active rolls it back.
pub struct PessimisticTransaction<LM: LockManager + 'static = PointLockManager> {
    txn_id: TransactionID,
    txn_db: Arc<PessimisticTransactionDB<LM>>,
}

impl<LM: LockManager + 'static> Transaction for PessimisticTransaction<LM> {
    #[inline]
    fn txn_id(&self) -> TransactionID {
        self.txn_id
    }

    fn lock(
        &self,
        key: &str,
        lock_type: RowLockType,
        options: &LockOptions,
    ) -> Result<LockOutcome> {
        self.txn_db.lock(self.txn_id, key, lock_type, options)
    }

    fn state(&self) -> Result<TransactionState> {
        self.txn_db.state(self.txn_id)
    }
}

impl<LM: LockManager + 'static> PessimisticTransaction<LM> {
    pub(crate) fn new(txn_id: TransactionID, txn_db: Arc<PessimisticTransactionDB<LM>>) -> Self {
        PessimisticTransaction { txn_id, txn_db }
    }

    pub fn held_keys(&self) -> Vec<RecordKey> {
        self.txn_db.lock_manager().keys_held_by(self.txn_id)
    }

    pub fn commit(self) -> Result<()> {
        self.txn_db.commit(self.txn_id)
    }

    pub fn rollback(self) -> Result<()> {
        self.txn_db.rollback(self.txn_id)
    }
}

impl<LM: LockManager + 'static> Drop for PessimisticTransaction<LM> {
    fn drop(&mut self) {
        if let Ok(TransactionState::Active) = self.state() {
            match self.txn_db.rollback(self.txn_id) {
                Ok(()) => debug!("txn {} rolled back on drop", self.txn_id),
                Err(RowLockError::TransactionAlreadyTerminated { .. }) => {}
                Err(e) => warn!("{}", e),
            }
        }
        self.txn_db.forget(self.txn_id);
    }
}
