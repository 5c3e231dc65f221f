// Copyright (c) 2024 The Botho Foundation

//! Record storage behind a repository interface.
//!
//! Stores expose only atomic primitives (insert-if-absent and
//! compare-and-set on status). The state machine in [`crate::htlc`] is built
//! on top of them so that two concurrent terminal transitions on the same key
//! can never both succeed. Records are never deleted.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::error::StoreError;
use crate::record::{TxKind, TxRecord, TxStatus};
use crate::types::{Timestamp, UniqueId, XHash};

/// Persistent tables backing the HTLC namespaces and the Rapidity guard.
pub trait TxStore: Send + Sync {
    /// Load the record for `x_hash` in namespace `kind`.
    fn get(&self, kind: TxKind, x_hash: &XHash) -> Result<Option<TxRecord>, StoreError>;

    /// Insert `record` unless its key is already taken.
    ///
    /// Returns `false` without writing if a record exists.
    fn insert(&self, record: &TxRecord) -> Result<bool, StoreError>;

    /// Move a record from `current` to `next` if it is still in `current`.
    fn compare_and_set_status(
        &self,
        kind: TxKind,
        x_hash: &XHash,
        current: TxStatus,
        next: TxStatus,
    ) -> Result<bool, StoreError>;

    /// All records currently in `status`, across namespaces.
    fn records_with_status(&self, status: TxStatus) -> Result<Vec<TxRecord>, StoreError>;

    /// Status of a Rapidity settlement (`None` if unused).
    fn rapidity_status(&self, unique_id: &UniqueId) -> Result<TxStatus, StoreError>;

    /// Mark `unique_id` consumed unless it already is.
    fn insert_rapidity(&self, unique_id: &UniqueId, at: Timestamp) -> Result<bool, StoreError>;
}

impl<T: TxStore + ?Sized> TxStore for Arc<T> {
    fn get(&self, kind: TxKind, x_hash: &XHash) -> Result<Option<TxRecord>, StoreError> {
        (**self).get(kind, x_hash)
    }

    fn insert(&self, record: &TxRecord) -> Result<bool, StoreError> {
        (**self).insert(record)
    }

    fn compare_and_set_status(
        &self,
        kind: TxKind,
        x_hash: &XHash,
        current: TxStatus,
        next: TxStatus,
    ) -> Result<bool, StoreError> {
        (**self).compare_and_set_status(kind, x_hash, current, next)
    }

    fn records_with_status(&self, status: TxStatus) -> Result<Vec<TxRecord>, StoreError> {
        (**self).records_with_status(status)
    }

    fn rapidity_status(&self, unique_id: &UniqueId) -> Result<TxStatus, StoreError> {
        (**self).rapidity_status(unique_id)
    }

    fn insert_rapidity(&self, unique_id: &UniqueId, at: Timestamp) -> Result<bool, StoreError> {
        (**self).insert_rapidity(unique_id, at)
    }
}

/// In-memory store.
#[derive(Debug, Default)]
pub struct MemoryTxStore {
    records: RwLock<HashMap<(TxKind, XHash), TxRecord>>,
    rapidity: RwLock<HashMap<UniqueId, Timestamp>>,
}

impl MemoryTxStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TxStore for MemoryTxStore {
    fn get(&self, kind: TxKind, x_hash: &XHash) -> Result<Option<TxRecord>, StoreError> {
        let records = self.records.read().map_err(|_| StoreError::Poisoned)?;
        Ok(records.get(&(kind, *x_hash)).copied())
    }

    fn insert(&self, record: &TxRecord) -> Result<bool, StoreError> {
        let mut records = self.records.write().map_err(|_| StoreError::Poisoned)?;
        let key = (record.kind(), record.x_hash);
        if records.contains_key(&key) {
            return Ok(false);
        }
        records.insert(key, *record);
        Ok(true)
    }

    fn compare_and_set_status(
        &self,
        kind: TxKind,
        x_hash: &XHash,
        current: TxStatus,
        next: TxStatus,
    ) -> Result<bool, StoreError> {
        let mut records = self.records.write().map_err(|_| StoreError::Poisoned)?;
        match records.get_mut(&(kind, *x_hash)) {
            Some(record) if record.base.status == current => {
                record.base.status = next;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn records_with_status(&self, status: TxStatus) -> Result<Vec<TxRecord>, StoreError> {
        let records = self.records.read().map_err(|_| StoreError::Poisoned)?;
        let mut matching: Vec<TxRecord> = records
            .values()
            .filter(|r| r.base.status == status)
            .copied()
            .collect();
        matching.sort_by_key(|r| (r.base.begin_locked_time, r.kind(), r.x_hash));
        Ok(matching)
    }

    fn rapidity_status(&self, unique_id: &UniqueId) -> Result<TxStatus, StoreError> {
        let rapidity = self.rapidity.read().map_err(|_| StoreError::Poisoned)?;
        Ok(if rapidity.contains_key(unique_id) {
            TxStatus::Redeemed
        } else {
            TxStatus::None
        })
    }

    fn insert_rapidity(&self, unique_id: &UniqueId, at: Timestamp) -> Result<bool, StoreError> {
        let mut rapidity = self.rapidity.write().map_err(|_| StoreError::Poisoned)?;
        if rapidity.contains_key(unique_id) {
            return Ok(false);
        }
        rapidity.insert(*unique_id, at);
        Ok(true)
    }
}
