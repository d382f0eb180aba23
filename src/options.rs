use crate::transactions::lock::WaitPolicy;
use std::time::Duration;

pub(crate) const DEFAULT_STORE_CAPACITY: usize = 16;
pub(crate) const DEFAULT_TXN_CAPACITY: usize = 16;

/// Lock timeout hint meaning "fail immediately" (`NOWAIT`).
pub const LOCK_TIMEOUT_NO_WAIT: i64 = 0;
/// Lock timeout hint meaning "wait forever".
pub const LOCK_TIMEOUT_WAIT_FOREVER: i64 = -1;
/// Lock timeout hint meaning "skip contended rows" (`SKIP LOCKED`).
pub const LOCK_TIMEOUT_SKIP_LOCKED: i64 = -2;

/// How a single lock request behaves under contention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockOptions {
    pub policy: WaitPolicy,
    /// Only meaningful with [`WaitPolicy::Block`].
    pub lock_timeout: Option<Duration>,
}

impl Default for LockOptions {
    fn default() -> Self {
        LockOptions {
            policy: WaitPolicy::Block,
            lock_timeout: None,
        }
    }
}

impl LockOptions {
    pub fn nowait() -> Self {
        LockOptions {
            policy: WaitPolicy::NoWait,
            lock_timeout: None,
        }
    }

    pub fn skip_locked() -> Self {
        LockOptions {
            policy: WaitPolicy::SkipLocked,
            lock_timeout: None,
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        LockOptions {
            policy: WaitPolicy::Block,
            lock_timeout: Some(timeout),
        }
    }

    /// Interprets a lock timeout hint in milliseconds: `0` is `NOWAIT`,
    /// `-2` is `SKIP LOCKED`, any other negative value waits forever and a
    /// positive value waits at most that long.
    pub fn from_timeout_hint(millis: i64) -> Self {
        match millis {
            LOCK_TIMEOUT_NO_WAIT => Self::nowait(),
            LOCK_TIMEOUT_SKIP_LOCKED => Self::skip_locked(),
            m if m < 0 => Self::default(),
            m => Self::with_timeout(Duration::from_millis(m as u64)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransactionOptions {
    /// Measured from `begin`; `None` never times out.
    pub timeout: Option<Duration>,
}

impl TransactionOptions {
    pub fn with_timeout(timeout: Duration) -> Self {
        TransactionOptions {
            timeout: Some(timeout),
        }
    }
}
