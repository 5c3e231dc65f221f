// Copyright (c) 2024 The Botho Foundation

//! Hashed-timelock path.
//!
//! Inbound (user to storeman): the user locks funds into custody under an
//! xHash; the storeman redeems with the preimage inside the window, or the
//! lock is refunded to the user once it closes.
//!
//! Outbound (storeman to user): the storeman commits to pay a user under an
//! xHash; the user redeems with the preimage inside the window and receives
//! released (origin side) or minted (destination side) tokens.
//!
//! Debt handover between two storeman groups uses the same machine with no
//! funds attached.

use tracing::info;

use super::{Bridge, CallContext};
use crate::custody::VerifiedLedger;
use crate::error::BridgeResult;
use crate::events::BridgeEvent;
use crate::htlc::{AddDebtTx, AddSmgTx, AddUserTx};
use crate::ledger::TokenLedger;
use crate::record::{TxKind, TxStatus};
use crate::registry::{PairSide, TokenPairRegistry};
use crate::store::TxStore;
use crate::types::{Address, Amount, CustodianId, Secret, TokenPairId, XHash};

/// Lock user funds under a hash lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserLockHtlcParams {
    pub x_hash: XHash,
    pub custodian_id: CustodianId,
    pub token_pair_id: TokenPairId,
    pub value: Amount,
    /// Paid in native coin to `fee_recipient`, not refunded on revoke
    pub contract_fee: Amount,
    pub locked_time: u64,
    pub dest_user_account: Vec<u8>,
    pub fee_recipient: Address,
}

/// Commit storeman funds to a user under a hash lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SmgLockHtlcParams {
    pub x_hash: XHash,
    pub custodian_id: CustodianId,
    pub token_pair_id: TokenPairId,
    pub value: Amount,
    pub user_account: Address,
    pub locked_time: u64,
}

impl<S, R, L> Bridge<S, R, L>
where
    S: TxStore + Clone,
    R: TokenPairRegistry,
    L: TokenLedger,
{
    /// Take user funds into custody and open a user record.
    pub fn user_lock_htlc(
        &self,
        params: &UserLockHtlcParams,
        ctx: &CallContext,
    ) -> BridgeResult<()> {
        let pair = self.resolve_pair(params.token_pair_id, ctx.chain_id)?;

        self.atomically(|ledger| {
            self.htlc.ensure_absent(TxKind::User, &params.x_hash)?;
            self.take_custody(
                ledger,
                ctx,
                &pair.token,
                params.value,
                params.contract_fee,
                &params.fee_recipient,
            )?;
            self.htlc.add_user_tx(
                &AddUserTx {
                    x_hash: params.x_hash,
                    custodian_id: params.custodian_id,
                    token_pair_id: params.token_pair_id,
                    value: params.value,
                    fee: params.contract_fee,
                    locked_time: params.locked_time,
                },
                ctx.caller,
                ctx.now,
            )
        })?;

        info!(
            "User {} locked {} of token {} under {} for {}s",
            ctx.caller, params.value, pair.token, params.x_hash, params.locked_time
        );
        self.emit(BridgeEvent::UserHtlcLock {
            x_hash: params.x_hash,
            custodian_id: params.custodian_id,
            token_pair_id: params.token_pair_id,
            token_account: pair.token,
            value: params.value,
            contract_fee: params.contract_fee,
            dest_user_account: params.dest_user_account.clone(),
        });
        Ok(())
    }

    /// Storeman redeems a user lock by revealing `x`.
    ///
    /// On the origin side the funds stay in custody, backing what is minted
    /// on the other chain. On the destination side the locked shadow tokens
    /// are burned.
    pub fn smg_redeem_user_lock(&self, x: &Secret, ctx: &CallContext) -> BridgeResult<XHash> {
        let (record, pair) = self.atomically(|ledger| {
            let record = self.htlc.check_redeem(TxKind::User, x, TxStatus::Locked, ctx.now)?;
            let tx = record.as_user().copied().unwrap_or_default();
            let pair = self.resolve_pair(tx.token_pair_id, ctx.chain_id)?;
            if pair.side == PairSide::Destination {
                ledger.verified_burn(&pair.token, &self.custody, tx.value)?;
            }
            self.htlc.redeem_user_tx(x, ctx.now)?;
            Ok((record, pair))
        })?;
        let tx = record.as_user().copied().unwrap_or_default();

        info!("Storeman redeemed user lock {}", record.x_hash);
        self.emit(BridgeEvent::SmgHtlcRedeem {
            x_hash: record.x_hash,
            x: *x,
            custodian_id: record.base.custodian_id,
            token_pair_id: tx.token_pair_id,
            token_account: pair.token,
            value: tx.value,
        });
        Ok(record.x_hash)
    }

    /// Refund an expired user lock to the account that created it.
    pub fn user_revoke_lock(&self, x_hash: &XHash, ctx: &CallContext) -> BridgeResult<()> {
        let (record, pair) = self.atomically(|ledger| {
            let record = self.htlc.check_revoke(TxKind::User, x_hash, TxStatus::Locked, ctx.now)?;
            let tx = record.as_user().copied().unwrap_or_default();
            let pair = self.resolve_pair(tx.token_pair_id, ctx.chain_id)?;
            ledger.verified_transfer(&pair.token, &self.custody, &tx.user_account, tx.value)?;
            self.htlc.revoke_user_tx(x_hash, ctx.now)?;
            Ok((record, pair))
        })?;
        let tx = record.as_user().copied().unwrap_or_default();

        info!("Refunded {} to {} for user lock {}", tx.value, tx.user_account, x_hash);
        self.emit(BridgeEvent::UserHtlcRevoke {
            x_hash: *x_hash,
            custodian_id: record.base.custodian_id,
            token_pair_id: tx.token_pair_id,
            token_account: pair.token,
            value: tx.value,
            user_account: tx.user_account,
        });
        Ok(())
    }

    /// Open a storeman record promising `value` to a user.
    pub fn smg_lock_htlc(&self, params: &SmgLockHtlcParams, ctx: &CallContext) -> BridgeResult<()> {
        let pair = self.resolve_pair(params.token_pair_id, ctx.chain_id)?;

        self.atomically(|_| {
            self.htlc.add_smg_tx(
                &AddSmgTx {
                    x_hash: params.x_hash,
                    custodian_id: params.custodian_id,
                    token_pair_id: params.token_pair_id,
                    value: params.value,
                    user_account: params.user_account,
                    locked_time: params.locked_time,
                },
                ctx.now,
            )
        })?;

        info!(
            "Storeman locked {} of token {} for {} under {}",
            params.value, pair.token, params.user_account, params.x_hash
        );
        self.emit(BridgeEvent::SmgHtlcLock {
            x_hash: params.x_hash,
            custodian_id: params.custodian_id,
            token_pair_id: params.token_pair_id,
            token_account: pair.token,
            value: params.value,
            user_account: params.user_account,
        });
        Ok(())
    }

    /// User redeems a storeman lock by revealing `x`.
    pub fn user_redeem_smg_lock(&self, x: &Secret, ctx: &CallContext) -> BridgeResult<XHash> {
        let (record, pair) = self.atomically(|ledger| {
            let record = self.htlc.check_redeem(TxKind::Smg, x, TxStatus::Locked, ctx.now)?;
            let tx = record.as_smg().copied().unwrap_or_default();
            let pair = self.resolve_pair(tx.token_pair_id, ctx.chain_id)?;
            match pair.side {
                PairSide::Origin => {
                    ledger.verified_transfer(
                        &pair.token,
                        &self.custody,
                        &tx.user_account,
                        tx.value,
                    )?;
                }
                PairSide::Destination => {
                    ledger.verified_mint(&pair.token, &tx.user_account, tx.value)?;
                }
            }
            self.htlc.redeem_smg_tx(x, ctx.now)?;
            Ok((record, pair))
        })?;
        let tx = record.as_smg().copied().unwrap_or_default();

        info!("User {} redeemed storeman lock {}", tx.user_account, record.x_hash);
        self.emit(BridgeEvent::UserHtlcRedeem {
            x_hash: record.x_hash,
            x: *x,
            custodian_id: record.base.custodian_id,
            token_pair_id: tx.token_pair_id,
            token_account: pair.token,
            value: tx.value,
            user_account: tx.user_account,
        });
        Ok(record.x_hash)
    }

    /// Close an expired storeman record. No funds move.
    pub fn smg_revoke_smg_lock(&self, x_hash: &XHash, ctx: &CallContext) -> BridgeResult<()> {
        let record = self.atomically(|_| {
            let record = self.htlc.check_revoke(TxKind::Smg, x_hash, TxStatus::Locked, ctx.now)?;
            self.htlc.revoke_smg_tx(x_hash, ctx.now)?;
            Ok(record)
        })?;
        let tx = record.as_smg().copied().unwrap_or_default();

        info!("Storeman revoked lock {}", x_hash);
        self.emit(BridgeEvent::SmgHtlcRevoke {
            x_hash: *x_hash,
            custodian_id: record.base.custodian_id,
            token_pair_id: tx.token_pair_id,
        });
        Ok(())
    }

    /// Source group opens a debt handover to the destination group.
    pub fn src_debt_lock(&self, params: &AddDebtTx, ctx: &CallContext) -> BridgeResult<()> {
        self.atomically(|_| self.htlc.add_debt_tx(params, ctx.now))?;

        info!(
            "Debt {} locked from {} to {} ({})",
            params.x_hash, params.src_custodian_id, params.dest_custodian_id, params.status
        );
        self.emit(BridgeEvent::DebtLock {
            x_hash: params.x_hash,
            src_custodian_id: params.src_custodian_id,
            dest_custodian_id: params.dest_custodian_id,
            status: params.status,
        });
        Ok(())
    }

    /// Destination group takes over the debt by revealing `x`.
    pub fn dest_debt_redeem(
        &self,
        x: &Secret,
        status: TxStatus,
        ctx: &CallContext,
    ) -> BridgeResult<XHash> {
        let x_hash = self.atomically(|_| self.htlc.redeem_debt_tx(x, status, ctx.now))?;
        let debt = self.htlc.get_debt_tx(&x_hash)?;

        info!("Debt {} redeemed by {}", x_hash, debt.dest_custodian_id);
        self.emit(BridgeEvent::DebtRedeem {
            x_hash,
            x: *x,
            src_custodian_id: debt.src_custodian_id,
            dest_custodian_id: debt.dest_custodian_id,
        });
        Ok(x_hash)
    }

    /// Source group withdraws an expired debt handover.
    pub fn src_debt_revoke(
        &self,
        x_hash: &XHash,
        status: TxStatus,
        ctx: &CallContext,
    ) -> BridgeResult<()> {
        self.atomically(|_| self.htlc.revoke_debt_tx(x_hash, status, ctx.now))?;
        let debt = self.htlc.get_debt_tx(x_hash)?;

        info!("Debt {} revoked by {}", x_hash, debt.src_custodian_id);
        self.emit(BridgeEvent::DebtRevoke {
            x_hash: *x_hash,
            src_custodian_id: debt.src_custodian_id,
            dest_custodian_id: debt.dest_custodian_id,
        });
        Ok(())
    }
}
