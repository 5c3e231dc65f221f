// Copyright (c) 2024 The Botho Foundation

//! Replay guard for the Rapidity fast path.
//!
//! A settlement id is consumed exactly once. There is no pending phase, no
//! window and no revoke: an id goes straight from `None` to `Redeemed`.

use tracing::debug;

use crate::error::{BridgeError, BridgeResult};
use crate::record::TxStatus;
use crate::store::TxStore;
use crate::types::{Timestamp, UniqueId};

#[derive(Debug, Clone)]
pub struct RapidityGuard<S> {
    store: S,
}

impl<S: TxStore> RapidityGuard<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Consume `unique_id`, failing with `DuplicateRecord` if already used.
    pub fn add_rapidity_tx(&self, unique_id: &UniqueId, now: Timestamp) -> BridgeResult<()> {
        if !self.store.insert_rapidity(unique_id, now)? {
            return Err(duplicate(unique_id));
        }
        debug!("Consumed rapidity id {}", unique_id);
        Ok(())
    }

    /// Fail with `DuplicateRecord` if `unique_id` was already consumed.
    pub fn ensure_unused(&self, unique_id: &UniqueId) -> BridgeResult<()> {
        match self.status(unique_id)? {
            TxStatus::None => Ok(()),
            _ => Err(duplicate(unique_id)),
        }
    }

    pub fn status(&self, unique_id: &UniqueId) -> BridgeResult<TxStatus> {
        Ok(self.store.rapidity_status(unique_id)?)
    }
}

fn duplicate(unique_id: &UniqueId) -> BridgeError {
    BridgeError::DuplicateRecord(format!("rapidity {}", unique_id))
}
