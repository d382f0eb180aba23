use crate::clock::{self, Deadline};
use crate::error::RowLockError;
use crate::options::{LockOptions, TransactionOptions, DEFAULT_TXN_CAPACITY};
use crate::record_store::RecordStore;
use crate::transactions::lock::{
    LockManager, LockOutcome, LockRequest, PointLockManager, RowLockType,
};
use crate::transactions::transaction::PessimisticTransaction;
use crate::transactions::{TransactionID, TransactionState};
use crate::Result;
use crossbeam_channel::{bounded, select, Sender};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

/// Bookkeeping of one transaction, shared with its timeout timer.
pub(crate) struct TransactionSlot {
    state: Mutex<TransactionState>,
    deadline: Option<Deadline>,
    /// Dropping the sender stops the timeout timer.
    timer: Mutex<Option<Sender<()>>>,
}

impl TransactionSlot {
    fn new(deadline: Option<Deadline>) -> TransactionSlot {
        TransactionSlot {
            state: Mutex::new(TransactionState::Active),
            deadline,
            timer: Mutex::new(None),
        }
    }

    #[inline]
    fn state(&self) -> TransactionState {
        *self.state.lock().unwrap()
    }

    /// Moves an active transaction into the terminal `state`. Only the first
    /// terminal transition succeeds.
    fn finish(&self, state: TransactionState) -> bool {
        {
            let mut current = self.state.lock().unwrap();
            if current.is_terminal() {
                return false;
            }
            *current = state;
        }
        self.timer.lock().unwrap().take();
        true
    }
}

/// Runs pessimistic transactions over a [`RecordStore`].
///
/// Each transaction is registered with the lock manager on `begin` and
/// releases everything it holds, in one step, on commit, rollback or
/// timeout. A transaction started with a timeout gets a timer thread that
/// aborts it when the deadline passes, failing any of its requests still
/// blocked in the lock manager.
pub struct PessimisticTransactionDB<LM: LockManager + 'static = PointLockManager> {
    lock_manager: LM,
    store: RecordStore,
    transactions: DashMap<TransactionID, Arc<TransactionSlot>>,
    next_txn_id: AtomicU64,
}

impl PessimisticTransactionDB<PointLockManager> {
    pub fn open() -> Self {
        Self::with_store(RecordStore::default())
    }
}

impl<LM: LockManager + 'static> PessimisticTransactionDB<LM> {
    pub fn with_store(store: RecordStore) -> Self {
        PessimisticTransactionDB {
            lock_manager: LM::new(),
            store,
            transactions: DashMap::with_capacity(DEFAULT_TXN_CAPACITY),
            next_txn_id: AtomicU64::new(1),
        }
    }

    pub fn begin(db: &Arc<Self>, options: TransactionOptions) -> Result<PessimisticTransaction<LM>> {
        let txn_id = db.next_txn_id.fetch_add(1, Ordering::Relaxed);
        let deadline = options.timeout.and_then(Deadline::after);
        let slot = Arc::new(TransactionSlot::new(deadline));
        db.transactions.insert(txn_id, slot.clone());
        db.lock_manager.register(txn_id);

        if let Some(deadline) = deadline {
            if let Err(e) = Self::start_timeout_timer(db, txn_id, deadline, &slot) {
                db.transactions.remove(&txn_id);
                db.lock_manager.release(txn_id);
                return Err(e);
            }
        }
        debug!("txn {} begins, timeout {:?}", txn_id, options.timeout);
        Ok(PessimisticTransaction::new(txn_id, db.clone()))
    }

    fn start_timeout_timer(
        db: &Arc<Self>,
        txn_id: TransactionID,
        deadline: Deadline,
        slot: &TransactionSlot,
    ) -> Result<()> {
        let (cancel, cancelled) = bounded::<()>(0);
        let db = Arc::downgrade(db);
        thread::Builder::new()
            .name(format!("txn-{}-timeout", txn_id))
            .spawn(move || {
                let expired = clock::timer(Some(deadline));
                select! {
                    recv(cancelled) -> _ => {},
                    recv(expired) -> _ => {
                        if let Some(db) = db.upgrade() {
                            db.expire(txn_id);
                        }
                    },
                }
            })?;
        *slot.timer.lock().unwrap() = Some(cancel);
        Ok(())
    }

    /// Requests `lock_type` on `key` for an active transaction.
    pub fn lock(
        &self,
        txn_id: TransactionID,
        key: &str,
        lock_type: RowLockType,
        options: &LockOptions,
    ) -> Result<LockOutcome> {
        let slot = self.slot(txn_id)?;
        self.check_active(txn_id, &slot)?;

        let request = LockRequest::new(txn_id, key, lock_type)
            .with_policy(options.policy)
            .with_deadline(options.lock_timeout.and_then(Deadline::after))
            .with_txn_deadline(slot.deadline);
        match request.submit(&self.lock_manager) {
            Err(RowLockError::TransactionTimeout(_)) => {
                self.expire(txn_id);
                Err(RowLockError::TransactionTimeout(txn_id))
            }
            // the registration went away while the request was in flight
            Err(RowLockError::UnknownTransaction(_)) => match slot.state() {
                TransactionState::TimedOut => Err(RowLockError::TransactionTimeout(txn_id)),
                TransactionState::Active => Err(RowLockError::UnknownTransaction(txn_id)),
                state => Err(RowLockError::TransactionAlreadyTerminated { txn_id, state }),
            },
            result => result,
        }
    }

    pub fn commit(&self, txn_id: TransactionID) -> Result<()> {
        self.finish(txn_id, TransactionState::Committed)
    }

    pub fn rollback(&self, txn_id: TransactionID) -> Result<()> {
        self.finish(txn_id, TransactionState::RolledBack)
    }

    pub fn state(&self, txn_id: TransactionID) -> Result<TransactionState> {
        Ok(self.slot(txn_id)?.state())
    }

    #[inline]
    pub fn lock_manager(&self) -> &LM {
        &self.lock_manager
    }

    #[inline]
    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    /// Aborts an active transaction whose deadline passed and releases its
    /// locks. Returns false if it had already ended.
    pub(crate) fn expire(&self, txn_id: TransactionID) -> bool {
        let slot = match self.slot(txn_id) {
            Ok(slot) => slot,
            Err(_) => return false,
        };
        if !slot.finish(TransactionState::TimedOut) {
            return false;
        }
        let released = self.lock_manager.release(txn_id);
        info!(
            "txn {} timeout expired, released {} locks",
            txn_id, released
        );
        true
    }

    /// Drops the bookkeeping of a finished transaction.
    pub(crate) fn forget(&self, txn_id: TransactionID) {
        if let Some((_, slot)) = self.transactions.remove(&txn_id) {
            debug_assert!(slot.state().is_terminal());
        }
    }

    fn finish(&self, txn_id: TransactionID, state: TransactionState) -> Result<()> {
        let slot = self.slot(txn_id)?;
        self.check_active(txn_id, &slot)?;
        if !slot.finish(state) {
            return Err(RowLockError::TransactionAlreadyTerminated {
                txn_id,
                state: slot.state(),
            });
        }
        let released = self.lock_manager.release(txn_id);
        debug!("txn {} {}, released {} locks", txn_id, state, released);
        Ok(())
    }

    fn check_active(&self, txn_id: TransactionID, slot: &TransactionSlot) -> Result<()> {
        if slot.deadline.map_or(false, |d| d.is_elapsed()) {
            self.expire(txn_id);
        }
        match slot.state() {
            TransactionState::Active => Ok(()),
            state => Err(RowLockError::TransactionAlreadyTerminated { txn_id, state }),
        }
    }

    fn slot(&self, txn_id: TransactionID) -> Result<Arc<TransactionSlot>> {
        self.transactions
            .get(&txn_id)
            .map(|slot| slot.value().clone())
            .ok_or(RowLockError::UnknownTransaction(txn_id))
    }
}

impl<LM: LockManager + 'static> Drop for PessimisticTransactionDB<LM> {
    fn drop(&mut self) {
        // stop the timeout timers still running
        for slot in self.transactions.iter() {
            slot.timer.lock().unwrap().take();
        }
    }
}
