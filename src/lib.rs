//! Row-level pessimistic locking for in-process transactions.
//!
//! A [`PessimisticTransactionDB`] hands out transactions that take shared or
//! exclusive locks on record keys before touching the [`RecordStore`].
//! Requests either block (optionally bounded by a lock timeout), fail fast
//! (`NOWAIT`) or skip contended rows (`SKIP LOCKED`). A transaction that
//! outlives its deadline is aborted and every lock it holds is released.

#[macro_use]
extern crate log;

pub use record_store::{Record, RecordStore};
pub use repository::Repository;
pub use transactions::pessimistic_transaction_db::PessimisticTransactionDB;
pub use transactions::transaction::{PessimisticTransaction, Transaction};

pub mod clock;
pub mod error;
pub mod options;
pub mod record_store;
pub mod repository;
pub mod transactions;

pub type Result<T> = std::result::Result<T, error::RowLockError>;
