// Copyright (c) 2024 The Botho Foundation

//! Hashed-timelock transaction tables.
//!
//! Three namespaces (user, storeman, debt) share one state machine:
//!
//! ```text
//!            add              redeem(x), now <  deadline
//!   None ──────────▶ Locked ─────────────────────────────▶ Redeemed
//!                      │
//!                      │     revoke,    now >= deadline
//!                      └──────────────────────────────────▶ Revoked
//! ```
//!
//! Redeem and revoke partition time at `deadline = beginLockedTime +
//! lockedTime`, so no instant admits both. Debt records use the same machine
//! with `AssetLocked`/`DebtLocked` in place of `Locked`.

use tracing::debug;

use crate::error::{BridgeError, BridgeResult};
use crate::record::{
    DebtTx, DebtTxInfo, SmgTx, SmgTxInfo, TxKind, TxPayload, TxRecord, TxStatus, UserTx,
    UserTxInfo,
};
use crate::store::TxStore;
use crate::types::{Address, Amount, CustodianId, Secret, Timestamp, TokenPairId, XHash};

/// Parameters for a user lock record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddUserTx {
    pub x_hash: XHash,
    pub custodian_id: CustodianId,
    pub token_pair_id: TokenPairId,
    pub value: Amount,
    pub fee: Amount,
    pub locked_time: u64,
}

/// Parameters for a storeman lock record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddSmgTx {
    pub x_hash: XHash,
    pub custodian_id: CustodianId,
    pub token_pair_id: TokenPairId,
    pub value: Amount,
    pub user_account: Address,
    pub locked_time: u64,
}

/// Parameters for a debt handover record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddDebtTx {
    pub x_hash: XHash,
    pub src_custodian_id: CustodianId,
    pub dest_custodian_id: CustodianId,
    pub locked_time: u64,
    /// Lock tag every later call on this record must repeat
    pub status: TxStatus,
}

/// The user, storeman and debt transaction tables.
#[derive(Debug, Clone)]
pub struct HtlcLedger<S> {
    store: S,
    unique_x_hash: bool,
}

impl<S: TxStore> HtlcLedger<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            unique_x_hash: false,
        }
    }

    /// Refuse a hash already used in any namespace, not just the target one.
    pub fn with_unique_x_hash(mut self, enabled: bool) -> Self {
        self.unique_x_hash = enabled;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Create a user record. `caller` becomes the record's user account.
    pub fn add_user_tx(
        &self,
        params: &AddUserTx,
        caller: Address,
        now: Timestamp,
    ) -> BridgeResult<()> {
        self.add(TxRecord::new(
            params.x_hash,
            params.custodian_id,
            params.locked_time,
            TxStatus::Locked,
            now,
            TxPayload::User(UserTx {
                token_pair_id: params.token_pair_id,
                value: params.value,
                fee: params.fee,
                user_account: caller,
            }),
        ))
    }

    /// Redeem a user record by revealing its preimage.
    pub fn redeem_user_tx(&self, x: &Secret, now: Timestamp) -> BridgeResult<XHash> {
        self.redeem(TxKind::User, x, TxStatus::Locked, now)
    }

    /// Revoke a user record once its window has closed.
    pub fn revoke_user_tx(&self, x_hash: &XHash, now: Timestamp) -> BridgeResult<()> {
        self.revoke(TxKind::User, x_hash, TxStatus::Locked, now)
    }

    pub fn get_user_tx(&self, x_hash: &XHash) -> BridgeResult<UserTxInfo> {
        Ok(match self.store.get(TxKind::User, x_hash)? {
            Some(record) => {
                let tx = record.as_user().copied().unwrap_or_default();
                UserTxInfo {
                    custodian_id: record.base.custodian_id,
                    token_pair_id: tx.token_pair_id,
                    value: tx.value,
                    fee: tx.fee,
                    user_account: tx.user_account,
                }
            }
            None => UserTxInfo::default(),
        })
    }

    /// Create a storeman record.
    pub fn add_smg_tx(&self, params: &AddSmgTx, now: Timestamp) -> BridgeResult<()> {
        self.add(TxRecord::new(
            params.x_hash,
            params.custodian_id,
            params.locked_time,
            TxStatus::Locked,
            now,
            TxPayload::Smg(SmgTx {
                token_pair_id: params.token_pair_id,
                value: params.value,
                user_account: params.user_account,
            }),
        ))
    }

    pub fn redeem_smg_tx(&self, x: &Secret, now: Timestamp) -> BridgeResult<XHash> {
        self.redeem(TxKind::Smg, x, TxStatus::Locked, now)
    }

    pub fn revoke_smg_tx(&self, x_hash: &XHash, now: Timestamp) -> BridgeResult<()> {
        self.revoke(TxKind::Smg, x_hash, TxStatus::Locked, now)
    }

    pub fn get_smg_tx(&self, x_hash: &XHash) -> BridgeResult<SmgTxInfo> {
        Ok(match self.store.get(TxKind::Smg, x_hash)? {
            Some(record) => {
                let tx = record.as_smg().copied().unwrap_or_default();
                SmgTxInfo {
                    custodian_id: record.base.custodian_id,
                    token_pair_id: tx.token_pair_id,
                    value: tx.value,
                    user_account: tx.user_account,
                }
            }
            None => SmgTxInfo::default(),
        })
    }

    /// Create a debt record tagged with `params.status`.
    pub fn add_debt_tx(&self, params: &AddDebtTx, now: Timestamp) -> BridgeResult<()> {
        if !params.status.is_lock() {
            return Err(BridgeError::InvalidStatusTag(params.status));
        }
        self.add(TxRecord::new(
            params.x_hash,
            params.dest_custodian_id,
            params.locked_time,
            params.status,
            now,
            TxPayload::Debt(DebtTx {
                src_custodian_id: params.src_custodian_id,
            }),
        ))
    }

    pub fn redeem_debt_tx(
        &self,
        x: &Secret,
        status: TxStatus,
        now: Timestamp,
    ) -> BridgeResult<XHash> {
        self.redeem(TxKind::Debt, x, status, now)
    }

    pub fn revoke_debt_tx(
        &self,
        x_hash: &XHash,
        status: TxStatus,
        now: Timestamp,
    ) -> BridgeResult<()> {
        self.revoke(TxKind::Debt, x_hash, status, now)
    }

    pub fn get_debt_tx(&self, x_hash: &XHash) -> BridgeResult<DebtTxInfo> {
        Ok(match self.store.get(TxKind::Debt, x_hash)? {
            Some(record) => DebtTxInfo {
                src_custodian_id: record.as_debt().map(|d| d.src_custodian_id).unwrap_or_default(),
                dest_custodian_id: record.base.custodian_id,
            },
            None => DebtTxInfo::default(),
        })
    }

    /// Seconds left in the window of the first record found for `x_hash`.
    ///
    /// Namespaces are searched in [`TxKind::ALL`] order.
    pub fn get_left_locked_time(&self, x_hash: &XHash, now: Timestamp) -> BridgeResult<u64> {
        for kind in TxKind::ALL {
            if let Some(record) = self.store.get(kind, x_hash)? {
                return Ok(record.base.left_locked_time(now));
            }
        }
        Err(BridgeError::InvalidHash(*x_hash))
    }

    /// Full record for `x_hash` in namespace `kind`.
    pub fn record(&self, kind: TxKind, x_hash: &XHash) -> BridgeResult<Option<TxRecord>> {
        Ok(self.store.get(kind, x_hash)?)
    }

    pub fn status_of(&self, kind: TxKind, x_hash: &XHash) -> BridgeResult<TxStatus> {
        Ok(self
            .store
            .get(kind, x_hash)?
            .map(|r| r.base.status)
            .unwrap_or_default())
    }

    /// Fail with `DuplicateRecord` if `add` would be refused for this key.
    pub fn ensure_absent(&self, kind: TxKind, x_hash: &XHash) -> BridgeResult<()> {
        let kinds: &[TxKind] = if self.unique_x_hash {
            &TxKind::ALL
        } else {
            std::slice::from_ref(&kind)
        };
        for kind in kinds {
            if self.store.get(*kind, x_hash)?.is_some() {
                return Err(duplicate(*kind, x_hash));
            }
        }
        Ok(())
    }

    /// Check redeem preconditions without changing state.
    pub fn check_redeem(
        &self,
        kind: TxKind,
        x: &Secret,
        expected: TxStatus,
        now: Timestamp,
    ) -> BridgeResult<TxRecord> {
        let record = self.locked_record(kind, &x.x_hash(), expected)?;
        if now < record.base.begin_locked_time {
            return Err(BridgeError::RedeemNotOpen {
                begin: record.base.begin_locked_time,
            });
        }
        if !record.base.in_redeem_window(now) {
            return Err(BridgeError::RedeemTimeout {
                deadline: record.base.deadline(),
            });
        }
        Ok(record)
    }

    /// Check revoke preconditions without changing state.
    pub fn check_revoke(
        &self,
        kind: TxKind,
        x_hash: &XHash,
        expected: TxStatus,
        now: Timestamp,
    ) -> BridgeResult<TxRecord> {
        let record = self.locked_record(kind, x_hash, expected)?;
        if !record.base.is_expired(now) {
            return Err(BridgeError::RevokeNotPermitted {
                deadline: record.base.deadline(),
            });
        }
        Ok(record)
    }

    fn add(&self, record: TxRecord) -> BridgeResult<()> {
        self.ensure_absent(record.kind(), &record.x_hash)?;
        if !self.store.insert(&record)? {
            return Err(duplicate(record.kind(), &record.x_hash));
        }
        debug!(
            "Added {} record {} ({}, window {}s)",
            record.kind(),
            record.x_hash,
            record.base.status,
            record.base.locked_time
        );
        Ok(())
    }

    fn redeem(
        &self,
        kind: TxKind,
        x: &Secret,
        expected: TxStatus,
        now: Timestamp,
    ) -> BridgeResult<XHash> {
        let record = self.check_redeem(kind, x, expected, now)?;
        self.commit(kind, &record.x_hash, expected, TxStatus::Redeemed)?;
        Ok(record.x_hash)
    }

    fn revoke(
        &self,
        kind: TxKind,
        x_hash: &XHash,
        expected: TxStatus,
        now: Timestamp,
    ) -> BridgeResult<()> {
        self.check_revoke(kind, x_hash, expected, now)?;
        self.commit(kind, x_hash, expected, TxStatus::Revoked)
    }

    fn locked_record(
        &self,
        kind: TxKind,
        x_hash: &XHash,
        expected: TxStatus,
    ) -> BridgeResult<TxRecord> {
        match self.store.get(kind, x_hash)? {
            Some(record) if expected.is_lock() && record.base.status == expected => Ok(record),
            Some(record) => Err(BridgeError::StatusNotLocked {
                found: record.base.status,
            }),
            None => Err(BridgeError::StatusNotLocked {
                found: TxStatus::None,
            }),
        }
    }

    fn commit(
        &self,
        kind: TxKind,
        x_hash: &XHash,
        from: TxStatus,
        to: TxStatus,
    ) -> BridgeResult<()> {
        if !self.store.compare_and_set_status(kind, x_hash, from, to)? {
            // Lost a race with another terminal transition on this key
            let found = self.status_of(kind, x_hash)?;
            return Err(BridgeError::StatusNotLocked { found });
        }
        debug!("{} record {} {} -> {}", kind, x_hash, from, to);
        Ok(())
    }
}

fn duplicate(kind: TxKind, x_hash: &XHash) -> BridgeError {
    BridgeError::DuplicateRecord(format!("{} {}", kind, x_hash))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryTxStore;
    use assert_matches::assert_matches;

    const SMG: CustodianId = CustodianId::new([0x11; 32]);
    const USER: Address = Address::new([0xaa; 20]);

    fn ledger() -> HtlcLedger<MemoryTxStore> {
        HtlcLedger::new(MemoryTxStore::new())
    }

    fn secret(seed: u8) -> Secret {
        Secret::new([seed; 32])
    }

    fn user_params(x: &Secret, locked_time: u64) -> AddUserTx {
        AddUserTx {
            x_hash: x.x_hash(),
            custodian_id: SMG,
            token_pair_id: 7,
            value: 1_000,
            fee: 5,
            locked_time,
        }
    }

    #[test]
    fn test_lock_then_redeem_within_window() {
        let htlc = ledger();
        let x = secret(1);
        htlc.add_user_tx(&user_params(&x, 3600), USER, 0).unwrap();

        assert_eq!(htlc.redeem_user_tx(&x, 1800).unwrap(), x.x_hash());
        assert_eq!(htlc.status_of(TxKind::User, &x.x_hash()).unwrap(), TxStatus::Redeemed);
    }

    #[test]
    fn test_redeem_after_window() {
        let htlc = ledger();
        let x = secret(1);
        htlc.add_user_tx(&user_params(&x, 3600), USER, 0).unwrap();

        assert_matches!(
            htlc.redeem_user_tx(&x, 3601),
            Err(BridgeError::RedeemTimeout { deadline: 3600 })
        );
        // The boundary instant already belongs to revoke
        assert_matches!(
            htlc.redeem_user_tx(&x, 3600),
            Err(BridgeError::RedeemTimeout { .. })
        );
        assert_eq!(htlc.status_of(TxKind::User, &x.x_hash()).unwrap(), TxStatus::Locked);
    }

    #[test]
    fn test_redeem_before_creation_refused() {
        let htlc = ledger();
        let x = secret(1);
        htlc.add_user_tx(&user_params(&x, 3600), USER, 10_000).unwrap();

        assert_matches!(
            htlc.redeem_user_tx(&x, 5_000),
            Err(BridgeError::RedeemNotOpen { begin: 10_000 })
        );
        assert_matches!(
            htlc.revoke_user_tx(&x.x_hash(), 5_000),
            Err(BridgeError::RevokeNotPermitted { deadline: 13_600 })
        );
        assert_eq!(htlc.status_of(TxKind::User, &x.x_hash()).unwrap(), TxStatus::Locked);

        assert_eq!(htlc.redeem_user_tx(&x, 10_000).unwrap(), x.x_hash());
    }

    #[test]
    fn test_revoke_too_early_then_on_time() {
        let htlc = ledger();
        let x = secret(2);
        htlc.add_user_tx(&user_params(&x, 3600), USER, 0).unwrap();

        assert_matches!(
            htlc.revoke_user_tx(&x.x_hash(), 3599),
            Err(BridgeError::RevokeNotPermitted { deadline: 3600 })
        );
        htlc.revoke_user_tx(&x.x_hash(), 3600).unwrap();
        assert_eq!(htlc.status_of(TxKind::User, &x.x_hash()).unwrap(), TxStatus::Revoked);
    }

    #[test]
    fn test_double_creation() {
        let htlc = ledger();
        let x = secret(3);
        htlc.add_user_tx(&user_params(&x, 3600), USER, 0).unwrap();

        assert_matches!(
            htlc.add_user_tx(&user_params(&x, 10), USER, 5),
            Err(BridgeError::DuplicateRecord(_))
        );

        // Still refused once the record is terminal
        htlc.redeem_user_tx(&x, 1).unwrap();
        assert_matches!(
            htlc.add_user_tx(&user_params(&x, 3600), USER, 2),
            Err(BridgeError::DuplicateRecord(_))
        );
    }

    #[test]
    fn test_terminal_finality() {
        let htlc = ledger();
        let x = secret(4);
        htlc.add_user_tx(&user_params(&x, 100), USER, 0).unwrap();
        htlc.redeem_user_tx(&x, 50).unwrap();

        assert_matches!(
            htlc.redeem_user_tx(&x, 60),
            Err(BridgeError::StatusNotLocked {
                found: TxStatus::Redeemed
            })
        );
        assert_matches!(
            htlc.revoke_user_tx(&x.x_hash(), 500),
            Err(BridgeError::StatusNotLocked {
                found: TxStatus::Redeemed
            })
        );
    }

    #[test]
    fn test_wrong_preimage_does_not_touch_record() {
        let htlc = ledger();
        let x = secret(5);
        htlc.add_user_tx(&user_params(&x, 100), USER, 0).unwrap();

        assert_matches!(
            htlc.redeem_user_tx(&secret(6), 10),
            Err(BridgeError::StatusNotLocked {
                found: TxStatus::None
            })
        );
        assert_eq!(htlc.status_of(TxKind::User, &x.x_hash()).unwrap(), TxStatus::Locked);
    }

    #[test]
    fn test_get_user_tx() {
        let htlc = ledger();
        let x = secret(7);
        htlc.add_user_tx(&user_params(&x, 100), USER, 0).unwrap();

        let info = htlc.get_user_tx(&x.x_hash()).unwrap();
        assert_eq!(info.custodian_id, SMG);
        assert_eq!(info.token_pair_id, 7);
        assert_eq!(info.value, 1_000);
        assert_eq!(info.fee, 5);
        assert_eq!(info.user_account, USER);

        assert_eq!(
            htlc.get_user_tx(&secret(8).x_hash()).unwrap(),
            UserTxInfo::default()
        );
    }

    #[test]
    fn test_smg_namespace() {
        let htlc = ledger();
        let x = secret(9);
        let params = AddSmgTx {
            x_hash: x.x_hash(),
            custodian_id: SMG,
            token_pair_id: 3,
            value: 500,
            user_account: USER,
            locked_time: 60,
        };
        htlc.add_smg_tx(&params, 100).unwrap();

        // Same hash in the user namespace is a different record
        htlc.add_user_tx(&user_params(&x, 60), USER, 100).unwrap();

        let info = htlc.get_smg_tx(&x.x_hash()).unwrap();
        assert_eq!(info.value, 500);
        assert_eq!(info.user_account, USER);

        htlc.revoke_smg_tx(&x.x_hash(), 160).unwrap();
        assert_eq!(htlc.status_of(TxKind::Smg, &x.x_hash()).unwrap(), TxStatus::Revoked);
        assert_eq!(htlc.status_of(TxKind::User, &x.x_hash()).unwrap(), TxStatus::Locked);
    }

    #[test]
    fn test_unique_x_hash_across_namespaces() {
        let htlc = ledger().with_unique_x_hash(true);
        let x = secret(10);
        htlc.add_user_tx(&user_params(&x, 60), USER, 0).unwrap();

        let smg = AddSmgTx {
            x_hash: x.x_hash(),
            custodian_id: SMG,
            token_pair_id: 3,
            value: 1,
            user_account: USER,
            locked_time: 60,
        };
        assert_matches!(htlc.add_smg_tx(&smg, 0), Err(BridgeError::DuplicateRecord(_)));
    }

    #[test]
    fn test_debt_tags_must_match() {
        let htlc = ledger();
        let x = secret(11);
        let src = CustodianId::new([0x22; 32]);
        let params = AddDebtTx {
            x_hash: x.x_hash(),
            src_custodian_id: src,
            dest_custodian_id: SMG,
            locked_time: 100,
            status: TxStatus::DebtLocked,
        };
        htlc.add_debt_tx(&params, 0).unwrap();

        let info = htlc.get_debt_tx(&x.x_hash()).unwrap();
        assert_eq!(info.src_custodian_id, src);
        assert_eq!(info.dest_custodian_id, SMG);

        assert_matches!(
            htlc.redeem_debt_tx(&x, TxStatus::Locked, 10),
            Err(BridgeError::StatusNotLocked {
                found: TxStatus::DebtLocked
            })
        );
        htlc.redeem_debt_tx(&x, TxStatus::DebtLocked, 10).unwrap();
        assert_eq!(htlc.status_of(TxKind::Debt, &x.x_hash()).unwrap(), TxStatus::Redeemed);
    }

    #[test]
    fn test_debt_rejects_non_lock_tag() {
        let htlc = ledger();
        let params = AddDebtTx {
            x_hash: secret(12).x_hash(),
            src_custodian_id: SMG,
            dest_custodian_id: SMG,
            locked_time: 100,
            status: TxStatus::Redeemed,
        };
        assert_matches!(
            htlc.add_debt_tx(&params, 0),
            Err(BridgeError::InvalidStatusTag(TxStatus::Redeemed))
        );
    }

    #[test]
    fn test_asset_locked_revoke() {
        let htlc = ledger();
        let x = secret(13);
        let params = AddDebtTx {
            x_hash: x.x_hash(),
            src_custodian_id: SMG,
            dest_custodian_id: CustodianId::new([0x33; 32]),
            locked_time: 100,
            status: TxStatus::AssetLocked,
        };
        htlc.add_debt_tx(&params, 0).unwrap();

        assert_matches!(
            htlc.revoke_debt_tx(&x.x_hash(), TxStatus::AssetLocked, 99),
            Err(BridgeError::RevokeNotPermitted { .. })
        );
        htlc.revoke_debt_tx(&x.x_hash(), TxStatus::AssetLocked, 100).unwrap();
    }

    #[test]
    fn test_left_locked_time() {
        let htlc = ledger();
        let x = secret(14);
        htlc.add_user_tx(&user_params(&x, 3600), USER, 1_000).unwrap();

        assert_eq!(htlc.get_left_locked_time(&x.x_hash(), 1_600).unwrap(), 3_000);
        assert_eq!(htlc.get_left_locked_time(&x.x_hash(), 10_000).unwrap(), 0);
        assert_matches!(
            htlc.get_left_locked_time(&secret(15).x_hash(), 0),
            Err(BridgeError::InvalidHash(_))
        );
    }

    #[test]
    fn test_left_locked_time_prefers_user() {
        let htlc = ledger();
        let x = secret(16);
        let smg = AddSmgTx {
            x_hash: x.x_hash(),
            custodian_id: SMG,
            token_pair_id: 1,
            value: 1,
            user_account: USER,
            locked_time: 10,
        };
        htlc.add_smg_tx(&smg, 0).unwrap();
        assert_eq!(htlc.get_left_locked_time(&x.x_hash(), 0).unwrap(), 10);

        htlc.add_user_tx(&user_params(&x, 500), USER, 0).unwrap();
        assert_eq!(htlc.get_left_locked_time(&x.x_hash(), 0).unwrap(), 500);
    }
}
