// Copyright (c) 2024 The Botho Foundation

//! Error types for the bridge core.

use displaydoc::Display;
use thiserror::Error;

use crate::ledger::LedgerError;
use crate::record::TxStatus;
use crate::registry::TokenCrossType;
use crate::types::{Address, Amount, ChainId, TokenPairId, XHash};

/// Errors raised by a record store backend.
#[derive(Clone, Debug, Display, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Store backend error: {0}
    Backend(String),

    /// Corrupt record in store: {0}
    Corrupt(String),

    /// Store lock poisoned
    Poisoned,
}

/// Errors that abort a bridge action.
///
/// Every failure leaves the record tables and the token ledger exactly as
/// they were before the call.
#[derive(Clone, Debug, Display, Error, PartialEq, Eq)]
pub enum BridgeError {
    /// Record {0} already exists
    DuplicateRecord(String),

    /// Record is not in the expected lock state (found {found})
    StatusNotLocked { found: TxStatus },

    /// Redeem window opens at {begin}
    RedeemNotOpen { begin: u64 },

    /// Redeem window closed at {deadline}
    RedeemTimeout { deadline: u64 },

    /// Revoke not permitted before {deadline}
    RevokeNotPermitted { deadline: u64 },

    /// No record exists for hash {0}
    InvalidHash(XHash),

    /// Status {0} is not a lock state
    InvalidStatusTag(TxStatus),

    /// Token pair {token_pair_id} does not serve chain {chain_id}
    InvalidTokenPair {
        token_pair_id: TokenPairId,
        chain_id: ChainId,
    },

    /// Token account {token} does not belong to token pair {token_pair_id}
    TokenAccountMismatch {
        token_pair_id: TokenPairId,
        token: Address,
    },

    /// Token pair {0} not found
    TokenPairNotFound(TokenPairId),

    /// Token cross type {0} is not supported
    UnsupportedTokenType(TokenCrossType),

    /// Custody transfer of token {token} failed: expected {expected}, moved {actual}
    CustodyTransferFailed {
        token: Address,
        expected: Amount,
        actual: Amount,
    },

    /// Attached value {attached} is below the required {required}
    InsufficientValue { required: Amount, attached: Amount },

    /// Amount overflow
    AmountOverflow,

    /// Invalid account bytes: expected 20 bytes, got {0}
    InvalidAddress(usize),

    /// Ledger error: {0}
    Ledger(#[from] LedgerError),

    /// Store error: {0}
    Store(#[from] StoreError),

    /// Ledger lock poisoned
    Poisoned,
}

/// Result type for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;
