use crate::transactions::{RecordKey, TransactionID, TransactionState};
use std::io;

#[derive(thiserror::Error, Debug)]
pub enum RowLockError {
    #[error("{0}")]
    IOError(#[from] io::Error),

    /// A `NOWAIT` request found an incompatible lock.
    #[error("could not obtain lock on record {0:?}")]
    LockConflict(RecordKey),

    /// The request's own lock timeout elapsed before it was granted.
    #[error("lock timeout expired on record {0:?}")]
    LockTimeout(RecordKey),

    #[error("transaction {0} timeout expired")]
    TransactionTimeout(TransactionID),

    #[error("transaction {txn_id} is already {state}")]
    TransactionAlreadyTerminated {
        txn_id: TransactionID,
        state: TransactionState,
    },

    /// The lock manager has no live registration for the transaction.
    #[error("unknown transaction {0}")]
    UnknownTransaction(TransactionID),

    #[error("invalid lock request: {0}")]
    InvalidRequest(String),

    #[error("key not found")]
    KeyNotFound,

    #[error("{0}")]
    Custom(String),
}

impl PartialEq for RowLockError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::IOError(_), Self::IOError(_)) | (Self::KeyNotFound, Self::KeyNotFound) => true,
            (Self::LockConflict(k1), Self::LockConflict(k2))
            | (Self::LockTimeout(k1), Self::LockTimeout(k2)) => k1.eq(k2),
            (Self::TransactionTimeout(t1), Self::TransactionTimeout(t2))
            | (Self::UnknownTransaction(t1), Self::UnknownTransaction(t2)) => t1 == t2,
            (
                Self::TransactionAlreadyTerminated {
                    txn_id: t1,
                    state: s1,
                },
                Self::TransactionAlreadyTerminated {
                    txn_id: t2,
                    state: s2,
                },
            ) => t1 == t2 && s1 == s2,
            (Self::InvalidRequest(s1), Self::InvalidRequest(s2))
            | (Self::Custom(s1), Self::Custom(s2)) => s1.eq(s2),
            _ => false,
        }
    }
}
