// Copyright (c) 2024 The Botho Foundation

//! Timelocked transaction records and their state machine.

use serde::{Deserialize, Serialize};

use crate::types::{Address, Amount, CustodianId, Timestamp, TokenPairId, XHash};

/// The status of a transaction record.
///
/// `None` is never stored; it is what an absent key reads as.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxStatus {
    /// No record
    #[default]
    None,

    /// Funds locked, waiting for redeem or timeout
    Locked,

    /// Preimage revealed inside the window
    Redeemed,

    /// Reclaimed after the window closed
    Revoked,

    /// Asset handover between storeman groups
    AssetLocked,

    /// Debt handover between storeman groups
    DebtLocked,
}

impl TxStatus {
    /// Check if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TxStatus::Redeemed | TxStatus::Revoked)
    }

    /// Check if this is one of the initial lock states.
    pub fn is_lock(&self) -> bool {
        matches!(
            self,
            TxStatus::Locked | TxStatus::AssetLocked | TxStatus::DebtLocked
        )
    }
}

impl std::fmt::Display for TxStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TxStatus::None => write!(f, "none"),
            TxStatus::Locked => write!(f, "locked"),
            TxStatus::Redeemed => write!(f, "redeemed"),
            TxStatus::Revoked => write!(f, "revoked"),
            TxStatus::AssetLocked => write!(f, "asset_locked"),
            TxStatus::DebtLocked => write!(f, "debt_locked"),
        }
    }
}

impl std::str::FromStr for TxStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(TxStatus::None),
            "locked" => Ok(TxStatus::Locked),
            "redeemed" => Ok(TxStatus::Redeemed),
            "revoked" => Ok(TxStatus::Revoked),
            "asset_locked" => Ok(TxStatus::AssetLocked),
            "debt_locked" => Ok(TxStatus::DebtLocked),
            _ => Err(format!("Unknown tx status: {}", s)),
        }
    }
}

/// The namespace a record lives in.
///
/// Each namespace is keyed independently by `xHash`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxKind {
    /// User locked funds, redeemable by the storeman
    User,
    /// Storeman locked funds, redeemable by the user
    Smg,
    /// Handover between two storeman groups
    Debt,
}

impl TxKind {
    /// Probe order used when only the hash is known.
    pub const ALL: [TxKind; 3] = [TxKind::User, TxKind::Smg, TxKind::Debt];
}

impl std::fmt::Display for TxKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TxKind::User => write!(f, "user"),
            TxKind::Smg => write!(f, "smg"),
            TxKind::Debt => write!(f, "debt"),
        }
    }
}

impl std::str::FromStr for TxKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(TxKind::User),
            "smg" | "storeman" => Ok(TxKind::Smg),
            "debt" => Ok(TxKind::Debt),
            _ => Err(format!("Unknown tx kind: {}", s)),
        }
    }
}

/// Fields shared by every record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseTx {
    /// Storeman group (destination group for debt records)
    pub custodian_id: CustodianId,

    /// Length of the redeem window in seconds
    pub locked_time: u64,

    /// Creation time, set once
    pub begin_locked_time: Timestamp,

    pub status: TxStatus,
}

impl BaseTx {
    /// First instant at which redeem is refused and revoke is allowed.
    pub fn deadline(&self) -> Timestamp {
        self.begin_locked_time.saturating_add(self.locked_time)
    }

    /// Check if `now` falls inside `[begin_locked_time, deadline)`.
    pub fn in_redeem_window(&self, now: Timestamp) -> bool {
        self.begin_locked_time <= now && now < self.deadline()
    }

    /// Check if the window has closed and revoke is allowed.
    pub fn is_expired(&self, now: Timestamp) -> bool {
        now >= self.deadline()
    }

    /// Seconds left before the window closes, zero once it has.
    pub fn left_locked_time(&self, now: Timestamp) -> u64 {
        self.deadline().saturating_sub(now)
    }
}

/// Funds a user locked on the origin chain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserTx {
    pub token_pair_id: TokenPairId,
    pub value: Amount,
    pub fee: Amount,
    /// Account that created the lock
    pub user_account: Address,
}

/// Funds a storeman locked on behalf of a user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmgTx {
    pub token_pair_id: TokenPairId,
    pub value: Amount,
    /// Account the funds are released or minted to
    pub user_account: Address,
}

/// A handover between two storeman groups.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebtTx {
    pub src_custodian_id: CustodianId,
}

/// Kind-specific record payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxPayload {
    User(UserTx),
    Smg(SmgTx),
    Debt(DebtTx),
}

impl TxPayload {
    pub fn kind(&self) -> TxKind {
        match self {
            TxPayload::User(_) => TxKind::User,
            TxPayload::Smg(_) => TxKind::Smg,
            TxPayload::Debt(_) => TxKind::Debt,
        }
    }
}

/// A timelocked transaction record keyed by its hash lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxRecord {
    pub x_hash: XHash,
    pub base: BaseTx,
    pub payload: TxPayload,
}

impl TxRecord {
    /// Create a record in lock state `status`, beginning at `now`.
    pub fn new(
        x_hash: XHash,
        custodian_id: CustodianId,
        locked_time: u64,
        status: TxStatus,
        now: Timestamp,
        payload: TxPayload,
    ) -> Self {
        Self {
            x_hash,
            base: BaseTx {
                custodian_id,
                locked_time,
                begin_locked_time: now,
                status,
            },
            payload,
        }
    }

    pub fn kind(&self) -> TxKind {
        self.payload.kind()
    }

    pub fn status(&self) -> TxStatus {
        self.base.status
    }

    pub fn as_user(&self) -> Option<&UserTx> {
        match &self.payload {
            TxPayload::User(tx) => Some(tx),
            _ => None,
        }
    }

    pub fn as_smg(&self) -> Option<&SmgTx> {
        match &self.payload {
            TxPayload::Smg(tx) => Some(tx),
            _ => None,
        }
    }

    pub fn as_debt(&self) -> Option<&DebtTx> {
        match &self.payload {
            TxPayload::Debt(tx) => Some(tx),
            _ => None,
        }
    }
}

/// Read view of a user record; all zero when the record is absent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UserTxInfo {
    pub custodian_id: CustodianId,
    pub token_pair_id: TokenPairId,
    pub value: Amount,
    pub fee: Amount,
    pub user_account: Address,
}

/// Read view of a storeman record; all zero when the record is absent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SmgTxInfo {
    pub custodian_id: CustodianId,
    pub token_pair_id: TokenPairId,
    pub value: Amount,
    pub user_account: Address,
}

/// Read view of a debt record; all zero when the record is absent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DebtTxInfo {
    pub src_custodian_id: CustodianId,
    pub dest_custodian_id: CustodianId,
}
