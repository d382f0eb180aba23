use crate::clock::Deadline;
use crate::error::RowLockError;
use crate::transactions::lock::{LockManager, LockOutcome, RowLockType, WaitPolicy};
use crate::transactions::{RecordKey, TransactionID, TRANSACTION_NULL};
use crate::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockRequest {
    pub txn_id: TransactionID,
    pub key: RecordKey,
    pub lock_type: RowLockType,
    pub policy: WaitPolicy,
    /// Bound on this request alone.
    pub deadline: Option<Deadline>,
    /// Deadline of the owning transaction.
    pub txn_deadline: Option<Deadline>,
}

impl LockRequest {
    pub fn new(txn_id: TransactionID, key: impl Into<RecordKey>, lock_type: RowLockType) -> Self {
        LockRequest {
            txn_id,
            key: key.into(),
            lock_type,
            policy: WaitPolicy::Block,
            deadline: None,
            txn_deadline: None,
        }
    }

    pub fn with_policy(mut self, policy: WaitPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_deadline(mut self, deadline: Option<Deadline>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_txn_deadline(mut self, txn_deadline: Option<Deadline>) -> Self {
        self.txn_deadline = txn_deadline;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.txn_id == TRANSACTION_NULL {
            return Err(RowLockError::InvalidRequest(
                "null transaction id".to_string(),
            ));
        }
        // a reader never skips rows, only writers do
        if self.policy == WaitPolicy::SkipLocked && self.lock_type == RowLockType::Shared {
            return Err(RowLockError::InvalidRequest(format!(
                "SKIP LOCKED requires an exclusive lock on {:?}",
                self.key
            )));
        }
        Ok(())
    }

    #[inline]
    pub fn effective_deadline(&self) -> Option<Deadline> {
        Deadline::earliest(self.deadline, self.txn_deadline)
    }

    /// Validates the request and hands it to `lock_manager`.
    pub fn submit<LM: LockManager + ?Sized>(self, lock_manager: &LM) -> Result<LockOutcome> {
        self.validate()?;
        lock_manager.acquire(self)
    }

    #[inline]
    pub(crate) fn elapsed_reason(&self) -> Option<RowLockError> {
        elapsed_reason(&self.key, self.txn_id, self.deadline, self.txn_deadline)
    }
}

/// The failure a waiter resolves to once one of its deadlines has passed,
/// attributed to whichever deadline came first. A tie goes to the
/// transaction, which is over either way.
pub(crate) fn elapsed_reason(
    key: &RecordKey,
    txn_id: TransactionID,
    deadline: Option<Deadline>,
    txn_deadline: Option<Deadline>,
) -> Option<RowLockError> {
    let lock_elapsed = deadline.filter(Deadline::is_elapsed);
    let txn_elapsed = txn_deadline.filter(Deadline::is_elapsed);
    match (lock_elapsed, txn_elapsed) {
        (Some(lock), Some(txn)) if lock < txn => Some(RowLockError::LockTimeout(key.clone())),
        (Some(_), None) => Some(RowLockError::LockTimeout(key.clone())),
        (_, Some(_)) => Some(RowLockError::TransactionTimeout(txn_id)),
        (None, None) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    #[test]
    fn test_validate() {
        let request = LockRequest::new(1, "k", RowLockType::Exclusive)
            .with_policy(WaitPolicy::SkipLocked);
        assert!(request.validate().is_ok());

        let request =
            LockRequest::new(1, "k", RowLockType::Shared).with_policy(WaitPolicy::SkipLocked);
        assert!(matches!(
            request.validate(),
            Err(RowLockError::InvalidRequest(_))
        ));

        let request = LockRequest::new(TRANSACTION_NULL, "k", RowLockType::Shared);
        assert!(request.validate().is_err());

        let request =
            LockRequest::new(1, "k", RowLockType::Shared).with_policy(WaitPolicy::NoWait);
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_effective_deadline() {
        let near = Deadline::after(Duration::from_millis(5)).unwrap();
        let far = Deadline::after(Duration::from_secs(5)).unwrap();
        let request = LockRequest::new(1, "k", RowLockType::Exclusive)
            .with_deadline(Some(far))
            .with_txn_deadline(Some(near));
        assert_eq!(request.effective_deadline(), Some(near));

        let request = LockRequest::new(1, "k", RowLockType::Exclusive);
        assert_eq!(request.effective_deadline(), None);
    }

    #[test]
    fn test_elapsed_reason() {
        let key = RecordKey::from("k");
        let earlier = Deadline::at(Instant::now() - Duration::from_millis(20));
        let later = Deadline::at(Instant::now() - Duration::from_millis(10));
        let future = Deadline::after(Duration::from_secs(60)).unwrap();

        assert_eq!(elapsed_reason(&key, 7, None, None), None);
        assert_eq!(elapsed_reason(&key, 7, Some(future), Some(future)), None);
        assert_eq!(
            elapsed_reason(&key, 7, Some(earlier), Some(future)),
            Some(RowLockError::LockTimeout(key.clone()))
        );
        assert_eq!(
            elapsed_reason(&key, 7, Some(future), Some(earlier)),
            Some(RowLockError::TransactionTimeout(7))
        );
        assert_eq!(
            elapsed_reason(&key, 7, Some(earlier), Some(later)),
            Some(RowLockError::LockTimeout(key.clone()))
        );
        assert_eq!(
            elapsed_reason(&key, 7, Some(later), Some(earlier)),
            Some(RowLockError::TransactionTimeout(7))
        );
    }
}
