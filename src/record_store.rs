//! Key/value records guarded by the lock table.
//!
//! The store does no locking of its own beyond keeping each map operation
//! atomic. Callers are expected to hold an exclusive lock on a key before
//! mutating it; an update issued without one is not rejected and simply
//! races with whoever holds the lock.

use crate::error::RowLockError;
use crate::options::DEFAULT_STORE_CAPACITY;
use crate::transactions::RecordKey;
use crate::Result;
use dashmap::DashMap;
use std::collections::BTreeMap;

pub type Value = Vec<u8>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    pub payload: Value,
    /// Named integer attributes, e.g. a rating.
    pub fields: BTreeMap<String, i64>,
    /// Bumped on every mutation.
    pub version: u64,
}

impl Record {
    pub fn new(payload: impl Into<Value>) -> Record {
        Record {
            payload: payload.into(),
            ..Record::default()
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: i64) -> Record {
        self.fields.insert(name.into(), value);
        self
    }

    #[inline]
    pub fn field(&self, name: &str) -> Option<i64> {
        self.fields.get(name).copied()
    }
}

pub struct RecordStore {
    records: DashMap<RecordKey, Record>,
}

impl Default for RecordStore {
    fn default() -> Self {
        RecordStore {
            records: DashMap::with_capacity(DEFAULT_STORE_CAPACITY),
        }
    }
}

impl RecordStore {
    pub fn get(&self, key: &str) -> Option<Record> {
        self.records.get(key).map(|r| r.value().clone())
    }

    /// Stores `record` as is, replacing any previous one.
    pub fn insert(&self, key: impl Into<RecordKey>, record: Record) {
        self.records.insert(key.into(), record);
    }

    /// Replaces the payload, keeping the fields of an existing record.
    pub fn put(&self, key: impl Into<RecordKey>, payload: impl Into<Value>) {
        let mut record = self.records.entry(key.into()).or_insert_with(Record::default);
        record.payload = payload.into();
        record.version += 1;
    }

    pub fn delete(&self, key: &str) -> Result<()> {
        match self.records.remove(key) {
            Some(_) => Ok(()),
            None => Err(RowLockError::KeyNotFound),
        }
    }

    pub fn set_field(&self, key: &str, field: &str, value: i64) -> Result<()> {
        match self.records.get_mut(key) {
            Some(mut record) => {
                record.fields.insert(field.to_string(), value);
                record.version += 1;
                Ok(())
            }
            None => Err(RowLockError::KeyNotFound),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.records.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_get_delete() -> Result<()> {
        let store = RecordStore::default();
        assert!(store.is_empty());
        store.put("9780321751041", "Fundamental Algorithms");
        store.put("9780201896848", "Seminumerical Algorithms");
        assert_eq!(store.len(), 2);

        let record = store.get("9780321751041").unwrap();
        assert_eq!(record.payload, b"Fundamental Algorithms".to_vec());
        assert_eq!(record.version, 1);

        store.delete("9780321751041")?;
        assert!(store.get("9780321751041").is_none());
        assert_eq!(store.delete("9780321751041"), Err(RowLockError::KeyNotFound));
        Ok(())
    }

    #[test]
    fn test_set_field() -> Result<()> {
        let store = RecordStore::default();
        store.insert("k", Record::new("book").with_field("rating", 5));
        store.set_field("k", "rating", 10)?;

        let record = store.get("k").unwrap();
        assert_eq!(record.field("rating"), Some(10));
        assert_eq!(record.version, 1);

        store.put("k", "renamed book");
        let record = store.get("k").unwrap();
        assert_eq!(record.field("rating"), Some(10));
        assert_eq!(record.version, 2);

        assert_eq!(
            store.set_field("missing", "rating", 1),
            Err(RowLockError::KeyNotFound)
        );
        store.clear();
        assert!(store.is_empty());
        Ok(())
    }
}
