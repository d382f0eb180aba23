pub(crate) mod lock_request;
pub(crate) mod point_lock_manager;
pub(crate) mod row_lock;

pub use lock_request::LockRequest;
pub use point_lock_manager::PointLockManager;

use crate::transactions::{RecordKey, TransactionID};

/// Lock modes, ordered by strength.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RowLockType {
    Shared = 0,
    Exclusive = 1,
}

impl Default for RowLockType {
    fn default() -> Self {
        RowLockType::Exclusive
    }
}

impl RowLockType {
    /// Only two shared locks may coexist.
    #[inline]
    pub fn is_compatible_with(self, other: RowLockType) -> bool {
        matches!((self, other), (RowLockType::Shared, RowLockType::Shared))
    }

    /// Whether holding `self` already satisfies a request for `requested`.
    #[inline]
    pub fn covers(self, requested: RowLockType) -> bool {
        self >= requested
    }
}

/// What a request does when it meets an incompatible lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitPolicy {
    Block,
    NoWait,
    SkipLocked,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        WaitPolicy::Block
    }
}

/// Successful resolution of a lock request. A skipped row is not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockOutcome {
    Granted,
    Skipped,
}

pub trait LockManager: Send + Sync {
    fn new() -> Self
    where
        Self: Sized;

    /// Makes `txn_id` eligible to acquire locks.
    fn register(&self, txn_id: TransactionID);

    /// Grants, skips, fails or blocks according to the request's policy.
    fn acquire(&self, request: LockRequest) -> crate::Result<LockOutcome>;

    /// Drops every lock held by `txn_id` in one step, fails its queued
    /// requests and wakes compatible waiters. Returns the number of keys
    /// that were unlocked.
    fn release(&self, txn_id: TransactionID) -> usize;

    /// Whether any transaction holds `key` in exactly `lock_type`.
    fn is_held(&self, key: &str, lock_type: RowLockType) -> bool;

    fn held_by(&self, key: &str, txn_id: TransactionID) -> Option<RowLockType>;

    fn holders(&self, key: &str) -> Vec<(TransactionID, RowLockType)>;

    /// Number of requests queued on `key`.
    fn waiting(&self, key: &str) -> usize;

    fn keys_held_by(&self, txn_id: TransactionID) -> Vec<RecordKey>;
}
