use crate::clock;
use crate::error::RowLockError;
use crate::options::DEFAULT_TXN_CAPACITY;
use crate::transactions::lock::lock_request::LockRequest;
use crate::transactions::lock::row_lock::{RowLock, Waiter};
use crate::transactions::lock::{LockManager, LockOutcome, RowLockType, WaitPolicy};
use crate::transactions::{RecordKey, TransactionID};
use crate::Result;
use crossbeam_channel::{bounded, select, Receiver};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Lock table keyed by record. All bookkeeping happens under one mutex, so
/// a release across many keys is a single step to every other transaction.
/// Blocked callers wait on their own channel and are woken individually.
pub struct PointLockManager {
    table: Mutex<LockTable>,
    next_ticket: AtomicU64,
}

#[derive(Default)]
struct LockTable {
    rows: BTreeMap<RecordKey, RowLock>,
    /// Registered transactions and the keys each of them holds.
    owners: HashMap<TransactionID, BTreeSet<RecordKey>>,
}

impl LockTable {
    fn wake(&mut self, key: &RecordKey) {
        if let Some(row) = self.rows.get_mut(key) {
            for txn_id in row.wake(key) {
                if let Some(keys) = self.owners.get_mut(&txn_id) {
                    keys.insert(key.clone());
                }
            }
            if row.is_idle() {
                self.rows.remove(key);
            }
        }
    }
}

impl LockManager for PointLockManager {
    fn new() -> Self {
        let table = LockTable {
            rows: BTreeMap::new(),
            owners: HashMap::with_capacity(DEFAULT_TXN_CAPACITY),
        };
        PointLockManager {
            table: Mutex::new(table),
            next_ticket: AtomicU64::new(1),
        }
    }

    fn register(&self, txn_id: TransactionID) {
        let mut table = self.table.lock().unwrap();
        table.owners.entry(txn_id).or_default();
    }

    fn acquire(&self, request: LockRequest) -> Result<LockOutcome> {
        let (ticket, receiver) = {
            let mut guard = self.table.lock().unwrap();
            let table = &mut *guard;
            let held_keys = match table.owners.get_mut(&request.txn_id) {
                Some(keys) => keys,
                None => return Err(RowLockError::UnknownTransaction(request.txn_id)),
            };
            if request.txn_deadline.map_or(false, |d| d.is_elapsed()) {
                return Err(RowLockError::TransactionTimeout(request.txn_id));
            }

            let row = table.rows.entry(request.key.clone()).or_default();
            if let Some(held) = row.held_mode(request.txn_id) {
                if held.covers(request.lock_type) {
                    trace!(
                        "txn {} already holds {:?} on {:?}",
                        request.txn_id,
                        held,
                        request.key
                    );
                    return Ok(LockOutcome::Granted);
                }
            }
            if row.is_compatible(request.txn_id, request.lock_type) {
                row.grant(request.txn_id, request.lock_type);
                held_keys.insert(request.key.clone());
                debug!(
                    "txn {} granted {:?} lock on {:?}",
                    request.txn_id, request.lock_type, request.key
                );
                return Ok(LockOutcome::Granted);
            }

            match request.policy {
                WaitPolicy::NoWait => {
                    debug!(
                        "txn {} could not obtain {:?} lock on {:?}",
                        request.txn_id, request.lock_type, request.key
                    );
                    return Err(RowLockError::LockConflict(request.key));
                }
                WaitPolicy::SkipLocked => {
                    trace!("txn {} skipped locked {:?}", request.txn_id, request.key);
                    return Ok(LockOutcome::Skipped);
                }
                WaitPolicy::Block => {}
            }
            if request.effective_deadline().map_or(false, |d| d.is_elapsed()) {
                return Err(request
                    .elapsed_reason()
                    .unwrap_or_else(|| RowLockError::LockTimeout(request.key.clone())));
            }

            let (waker, receiver) = bounded(1);
            let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
            row.enqueue(Waiter {
                ticket,
                txn_id: request.txn_id,
                lock_type: request.lock_type,
                deadline: request.deadline,
                txn_deadline: request.txn_deadline,
                waker,
            });
            debug!(
                "txn {} waits for {:?} lock on {:?} ({} queued)",
                request.txn_id,
                request.lock_type,
                request.key,
                row.num_waiting()
            );
            (ticket, receiver)
        };
        self.wait(&request, ticket, receiver)
    }

    fn release(&self, txn_id: TransactionID) -> usize {
        let mut guard = self.table.lock().unwrap();
        let table = &mut *guard;
        let held_keys = match table.owners.remove(&txn_id) {
            Some(keys) => keys,
            None => return 0,
        };

        let mut affected = held_keys.clone();
        for (key, row) in table.rows.iter_mut() {
            if row.cancel_waiters(key, txn_id) {
                affected.insert(key.clone());
            }
        }
        for key in &held_keys {
            if let Some(row) = table.rows.get_mut(key) {
                row.unlock(txn_id);
            }
        }
        for key in &affected {
            table.wake(key);
        }
        debug!("txn {} released {} locks", txn_id, held_keys.len());
        held_keys.len()
    }

    fn is_held(&self, key: &str, lock_type: RowLockType) -> bool {
        let table = self.table.lock().unwrap();
        table
            .rows
            .get(key)
            .map_or(false, |row| row.holders().any(|(_, held)| held == lock_type))
    }

    fn held_by(&self, key: &str, txn_id: TransactionID) -> Option<RowLockType> {
        let table = self.table.lock().unwrap();
        table.rows.get(key).and_then(|row| row.held_mode(txn_id))
    }

    fn holders(&self, key: &str) -> Vec<(TransactionID, RowLockType)> {
        let table = self.table.lock().unwrap();
        match table.rows.get(key) {
            Some(row) => row.holders().collect(),
            None => vec![],
        }
    }

    fn waiting(&self, key: &str) -> usize {
        let table = self.table.lock().unwrap();
        table.rows.get(key).map_or(0, RowLock::num_waiting)
    }

    fn keys_held_by(&self, txn_id: TransactionID) -> Vec<RecordKey> {
        let table = self.table.lock().unwrap();
        table
            .owners
            .get(&txn_id)
            .map(|keys| keys.iter().cloned().collect())
            .unwrap_or_default()
    }
}

impl PointLockManager {
    /// Parks the caller until its request is resolved by a release, or until
    /// the lock or transaction deadline fires, whichever happens first.
    fn wait(
        &self,
        request: &LockRequest,
        ticket: u64,
        receiver: Receiver<Result<LockOutcome>>,
    ) -> Result<LockOutcome> {
        let lock_timer = clock::timer(request.deadline);
        let txn_timer = clock::timer(request.txn_deadline);
        select! {
            recv(receiver) -> resolution => {
                return resolution.unwrap_or_else(|_| Err(abandoned(request)));
            },
            recv(lock_timer) -> _ => {},
            recv(txn_timer) -> _ => {},
        }

        let mut guard = self.table.lock().unwrap();
        let table = &mut *guard;
        let dequeued = table
            .rows
            .get_mut(&request.key)
            .and_then(|row| row.remove_waiter(ticket))
            .is_some();
        if dequeued {
            // waiters queued behind this one may be grantable now
            table.wake(&request.key);
            let reason = request
                .elapsed_reason()
                .unwrap_or_else(|| RowLockError::LockTimeout(request.key.clone()));
            debug!(
                "txn {} stopped waiting for {:?}: {}",
                request.txn_id, request.key, reason
            );
            return Err(reason);
        }
        drop(guard);

        // resolved while the timer fired; the resolution that got there first wins
        receiver.try_recv().unwrap_or_else(|_| Err(abandoned(request)))
    }
}

fn abandoned(request: &LockRequest) -> RowLockError {
    RowLockError::Custom(format!(
        "lock request of txn {} on {:?} was abandoned",
        request.txn_id, request.key
    ))
}
