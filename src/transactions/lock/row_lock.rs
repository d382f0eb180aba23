use crate::clock::Deadline;
use crate::error::RowLockError;
use crate::transactions::lock::lock_request::elapsed_reason;
use crate::transactions::lock::{LockOutcome, RowLockType};
use crate::transactions::{RecordKey, TransactionID};
use crate::Result;
use crossbeam_channel::Sender;
use std::collections::{BTreeMap, VecDeque};

/// A blocked request parked in a row's queue. The waiting thread owns the
/// receiving end of `waker`; exactly one resolution is ever sent.
pub(crate) struct Waiter {
    pub ticket: u64,
    pub txn_id: TransactionID,
    pub lock_type: RowLockType,
    pub deadline: Option<Deadline>,
    pub txn_deadline: Option<Deadline>,
    pub waker: Sender<Result<LockOutcome>>,
}

impl Waiter {
    fn resolve(self, key: &RecordKey, resolution: Result<LockOutcome>) {
        if self.waker.send(resolution).is_err() {
            warn!(
                "txn {} stopped waiting for {:?} before it was resolved",
                self.txn_id, key
            );
        }
    }
}

/// Lock state of a single record: who holds it and who waits for it.
#[derive(Default)]
pub(crate) struct RowLock {
    holders: BTreeMap<TransactionID, RowLockType>,
    waiters: VecDeque<Waiter>,
}

impl RowLock {
    #[inline]
    pub fn held_mode(&self, txn_id: TransactionID) -> Option<RowLockType> {
        self.holders.get(&txn_id).copied()
    }

    /// Whether `lock_type` can be granted to `txn_id` next to every other
    /// holder. The transaction's own hold never conflicts, so an upgrade
    /// only has to wait for the others.
    pub fn is_compatible(&self, txn_id: TransactionID, lock_type: RowLockType) -> bool {
        self.holders
            .iter()
            .all(|(&holder, &held)| holder == txn_id || lock_type.is_compatible_with(held))
    }

    /// Records the hold, keeping the stronger mode on upgrade.
    pub fn grant(&mut self, txn_id: TransactionID, lock_type: RowLockType) {
        let held = self.holders.entry(txn_id).or_insert(lock_type);
        if lock_type > *held {
            *held = lock_type;
        }
    }

    pub fn unlock(&mut self, txn_id: TransactionID) -> bool {
        self.holders.remove(&txn_id).is_some()
    }

    pub fn enqueue(&mut self, waiter: Waiter) {
        self.waiters.push_back(waiter);
    }

    pub fn remove_waiter(&mut self, ticket: u64) -> Option<Waiter> {
        let pos = self.waiters.iter().position(|w| w.ticket == ticket)?;
        self.waiters.remove(pos)
    }

    /// Fails every queued request of `txn_id`; the transaction no longer
    /// owns a registration to be granted under.
    pub fn cancel_waiters(&mut self, key: &RecordKey, txn_id: TransactionID) -> bool {
        if self.waiters.iter().all(|w| w.txn_id != txn_id) {
            return false;
        }
        let (cancelled, kept): (VecDeque<_>, VecDeque<_>) =
            self.waiters.drain(..).partition(|w| w.txn_id == txn_id);
        self.waiters = kept;
        for waiter in cancelled {
            waiter.resolve(key, Err(RowLockError::UnknownTransaction(txn_id)));
        }
        true
    }

    /// Grants the longest FIFO prefix of waiters that is compatible with the
    /// holders, failing any waiter whose deadline passed on the way.
    /// Returns the transactions that were granted.
    pub fn wake(&mut self, key: &RecordKey) -> Vec<TransactionID> {
        let mut granted = vec![];
        while let Some(head) = self.waiters.front() {
            if let Some(reason) = elapsed_reason(key, head.txn_id, head.deadline, head.txn_deadline)
            {
                if let Some(expired) = self.waiters.pop_front() {
                    trace!("txn {} expired in queue of {:?}", expired.txn_id, key);
                    expired.resolve(key, Err(reason));
                }
                continue;
            }
            if !self.is_compatible(head.txn_id, head.lock_type) {
                break;
            }
            if let Some(waiter) = self.waiters.pop_front() {
                self.grant(waiter.txn_id, waiter.lock_type);
                debug!(
                    "txn {} woken with {:?} lock on {:?}",
                    waiter.txn_id, waiter.lock_type, key
                );
                granted.push(waiter.txn_id);
                waiter.resolve(key, Ok(LockOutcome::Granted));
            }
        }
        granted
    }

    pub fn holders(&self) -> impl Iterator<Item = (TransactionID, RowLockType)> + '_ {
        self.holders.iter().map(|(&t, &m)| (t, m))
    }

    #[inline]
    pub fn num_waiting(&self) -> usize {
        self.waiters.len()
    }

    #[inline]
    pub fn is_idle(&self) -> bool {
        self.holders.is_empty() && self.waiters.is_empty()
    }
}
