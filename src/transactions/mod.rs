use std::fmt;

pub mod lock;
pub mod pessimistic_transaction_db;
pub mod transaction;

pub type TransactionID = u64;
pub const TRANSACTION_NULL: TransactionID = 0;

/// Unique, stable identifier of a lockable record, e.g. an ISBN.
pub type RecordKey = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Active,
    Committed,
    RolledBack,
    TimedOut,
}

impl TransactionState {
    #[inline]
    pub fn is_terminal(self) -> bool {
        self != TransactionState::Active
    }
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransactionState::Active => "active",
            TransactionState::Committed => "committed",
            TransactionState::RolledBack => "rolled back",
            TransactionState::TimedOut => "timed out",
        };
        f.write_str(s)
    }
}
