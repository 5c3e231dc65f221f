// Copyright (c) 2024 The Botho Foundation

//! Core types and logic for the HTLC / Rapidity cross-chain bridge.
//!
//! This crate provides the state machines that coordinate asset custody
//! between a user chain and a storeman custodian chain, including:
//!
//! - Timelocked transaction records (user, storeman and debt namespaces)
//! - The one-shot Rapidity replay guard
//! - Token-pair resolution and balance-verified token movements
//! - The settlement orchestrator and the events relayers observe
//! - Configuration structures

pub mod config;
pub mod custody;
pub mod error;
pub mod events;
pub mod htlc;
pub mod ledger;
pub mod orchestrator;
pub mod rapidity;
pub mod record;
pub mod registry;
pub mod store;
pub mod types;

pub use config::{
    BridgeConfig, ChainConfig, ConfigError, HtlcSettings, ServiceSettings, TokenPairConfig,
};
pub use custody::VerifiedLedger;
pub use error::{BridgeError, BridgeResult, StoreError};
pub use events::{BridgeEvent, EventSink, NullSink, RecordingSink};
pub use htlc::{AddDebtTx, AddSmgTx, AddUserTx, HtlcLedger};
pub use ledger::{LedgerError, MemoryLedger, TokenBehavior, TokenLedger};
pub use orchestrator::{
    Bridge, CallContext, SmgLockHtlcParams, SmgMintParams, SmgReleaseParams, UserBurnParams,
    UserLockHtlcParams, UserLockParams,
};
pub use rapidity::RapidityGuard;
pub use record::{
    BaseTx, DebtTx, DebtTxInfo, SmgTx, SmgTxInfo, TxKind, TxPayload, TxRecord, TxStatus, UserTx,
    UserTxInfo,
};
pub use registry::{
    MemoryTokenPairRegistry, PairSide, TokenCrossType, TokenPairInfo, TokenPairRegistry,
};
pub use store::{MemoryTxStore, TxStore};
pub use types::{
    Address, Amount, ChainId, CustodianId, ParseBytesError, Secret, Timestamp, TokenPairId,
    UniqueId, XHash,
};
