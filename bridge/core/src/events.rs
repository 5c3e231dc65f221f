// Copyright (c) 2024 The Botho Foundation

//! Settlement events observed by off-chain relayers.

use std::sync::Mutex;

use serde::Serialize;

use crate::record::TxStatus;
use crate::types::{hex_bytes, Address, Amount, CustodianId, Secret, TokenPairId, UniqueId, XHash};

/// An event emitted after a bridge action commits.
///
/// Redeem events carry the revealed preimage so the counterpart record on the
/// other chain can be redeemed with the same secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BridgeEvent {
    UserLock {
        custodian_id: CustodianId,
        token_pair_id: TokenPairId,
        token_account: Address,
        value: Amount,
        contract_fee: Amount,
        #[serde(with = "hex_bytes")]
        dest_user_account: Vec<u8>,
    },
    UserBurn {
        custodian_id: CustodianId,
        token_pair_id: TokenPairId,
        token_account: Address,
        value: Amount,
        contract_fee: Amount,
        fee: Amount,
        #[serde(with = "hex_bytes")]
        dest_user_account: Vec<u8>,
    },
    SmgMint {
        unique_id: UniqueId,
        custodian_id: CustodianId,
        token_pair_id: TokenPairId,
        value: Amount,
        token_account: Address,
        dest_user_account: Address,
    },
    SmgRelease {
        unique_id: UniqueId,
        custodian_id: CustodianId,
        token_pair_id: TokenPairId,
        value: Amount,
        token_account: Address,
        dest_user_account: Address,
    },
    UserHtlcLock {
        x_hash: XHash,
        custodian_id: CustodianId,
        token_pair_id: TokenPairId,
        token_account: Address,
        value: Amount,
        contract_fee: Amount,
        #[serde(with = "hex_bytes")]
        dest_user_account: Vec<u8>,
    },
    SmgHtlcRedeem {
        x_hash: XHash,
        x: Secret,
        custodian_id: CustodianId,
        token_pair_id: TokenPairId,
        token_account: Address,
        value: Amount,
    },
    UserHtlcRevoke {
        x_hash: XHash,
        custodian_id: CustodianId,
        token_pair_id: TokenPairId,
        token_account: Address,
        value: Amount,
        user_account: Address,
    },
    SmgHtlcLock {
        x_hash: XHash,
        custodian_id: CustodianId,
        token_pair_id: TokenPairId,
        token_account: Address,
        value: Amount,
        user_account: Address,
    },
    UserHtlcRedeem {
        x_hash: XHash,
        x: Secret,
        custodian_id: CustodianId,
        token_pair_id: TokenPairId,
        token_account: Address,
        value: Amount,
        user_account: Address,
    },
    SmgHtlcRevoke {
        x_hash: XHash,
        custodian_id: CustodianId,
        token_pair_id: TokenPairId,
    },
    DebtLock {
        x_hash: XHash,
        src_custodian_id: CustodianId,
        dest_custodian_id: CustodianId,
        status: TxStatus,
    },
    DebtRedeem {
        x_hash: XHash,
        x: Secret,
        src_custodian_id: CustodianId,
        dest_custodian_id: CustodianId,
    },
    DebtRevoke {
        x_hash: XHash,
        src_custodian_id: CustodianId,
        dest_custodian_id: CustodianId,
    },
}

impl BridgeEvent {
    /// Short event name as relayers index it.
    pub fn name(&self) -> &'static str {
        match self {
            BridgeEvent::UserLock { .. } => "UserLock",
            BridgeEvent::UserBurn { .. } => "UserBurn",
            BridgeEvent::SmgMint { .. } => "SmgMint",
            BridgeEvent::SmgRelease { .. } => "SmgRelease",
            BridgeEvent::UserHtlcLock { .. } => "UserHtlcLock",
            BridgeEvent::SmgHtlcRedeem { .. } => "SmgHtlcRedeem",
            BridgeEvent::UserHtlcRevoke { .. } => "UserHtlcRevoke",
            BridgeEvent::SmgHtlcLock { .. } => "SmgHtlcLock",
            BridgeEvent::UserHtlcRedeem { .. } => "UserHtlcRedeem",
            BridgeEvent::SmgHtlcRevoke { .. } => "SmgHtlcRevoke",
            BridgeEvent::DebtLock { .. } => "DebtLock",
            BridgeEvent::DebtRedeem { .. } => "DebtRedeem",
            BridgeEvent::DebtRevoke { .. } => "DebtRevoke",
        }
    }
}

/// Destination for committed events.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &BridgeEvent);
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: &BridgeEvent) {}
}

/// Keeps every event in memory, in emission order.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<BridgeEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<BridgeEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: &BridgeEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event.clone()),
            Err(poisoned) => poisoned.into_inner().push(event.clone()),
        }
    }
}
