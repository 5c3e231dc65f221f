// Copyright (c) 2024 The Botho Foundation

//! Rapidity path: settlement without a timelock.
//!
//! Users lock or burn on one chain and a storeman group settles the mirror
//! on the other chain in a single call, authorized off-chain and guarded
//! against replay by its `unique_id`.

use tracing::info;

use super::{Bridge, CallContext};
use crate::custody::VerifiedLedger;
use crate::error::BridgeResult;
use crate::events::BridgeEvent;
use crate::ledger::{LedgerError, TokenLedger};
use crate::registry::TokenPairRegistry;
use crate::store::TxStore;
use crate::types::{Address, Amount, CustodianId, TokenPairId, UniqueId};

/// Lock an origin token (or native coin) into custody.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserLockParams {
    pub custodian_id: CustodianId,
    pub token_pair_id: TokenPairId,
    pub value: Amount,
    /// Paid in native coin to `fee_recipient`
    pub contract_fee: Amount,
    /// Recipient on the other chain, in that chain's encoding
    pub dest_user_account: Vec<u8>,
    pub fee_recipient: Address,
}

/// Burn a shadow token to release its origin on the other chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserBurnParams {
    pub custodian_id: CustodianId,
    pub token_pair_id: TokenPairId,
    pub value: Amount,
    /// Paid in native coin to `fee_recipient`
    pub contract_fee: Amount,
    /// Storeman fee, reported to relayers only
    pub fee: Amount,
    /// Must be the pair's token on the calling chain
    pub token_account: Address,
    pub dest_user_account: Vec<u8>,
    pub fee_recipient: Address,
}

/// Mint a shadow token for a lock observed on the other chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SmgMintParams {
    pub unique_id: UniqueId,
    pub custodian_id: CustodianId,
    pub token_pair_id: TokenPairId,
    pub value: Amount,
    /// Minted to `fee_recipient` on top of `value`
    pub fee: Amount,
    pub dest_token_account: Address,
    pub dest_user_account: Address,
    pub fee_recipient: Address,
}

/// Release custodied funds for a burn observed on the other chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SmgReleaseParams {
    pub unique_id: UniqueId,
    pub custodian_id: CustodianId,
    pub token_pair_id: TokenPairId,
    pub value: Amount,
    /// Paid out of custody to `fee_recipient` on top of `value`
    pub fee: Amount,
    pub dest_token_account: Address,
    pub dest_user_account: Address,
    pub fee_recipient: Address,
}

impl<S, R, L> Bridge<S, R, L>
where
    S: TxStore + Clone,
    R: TokenPairRegistry,
    L: TokenLedger,
{
    /// Take `value` into custody for minting on the other chain.
    pub fn user_lock(&self, params: &UserLockParams, ctx: &CallContext) -> BridgeResult<()> {
        let pair = self.resolve_pair(params.token_pair_id, ctx.chain_id)?;

        self.atomically(|ledger| {
            self.take_custody(
                ledger,
                ctx,
                &pair.token,
                params.value,
                params.contract_fee,
                &params.fee_recipient,
            )
        })?;

        info!(
            "User {} locked {} of token {} (pair {})",
            ctx.caller, params.value, pair.token, params.token_pair_id
        );
        self.emit(BridgeEvent::UserLock {
            custodian_id: params.custodian_id,
            token_pair_id: params.token_pair_id,
            token_account: pair.token,
            value: params.value,
            contract_fee: params.contract_fee,
            dest_user_account: params.dest_user_account.clone(),
        });
        Ok(())
    }

    /// Burn the caller's shadow tokens for release on the other chain.
    pub fn user_burn(&self, params: &UserBurnParams, ctx: &CallContext) -> BridgeResult<()> {
        let pair =
            self.resolve_pair_for_token(params.token_pair_id, ctx.chain_id, &params.token_account)?;
        if pair.token.is_zero() {
            return Err(LedgerError::NativeCoin("burned").into());
        }

        self.atomically(|ledger| {
            self.collect_native(
                ledger,
                ctx,
                params.contract_fee,
                params.contract_fee,
                &params.fee_recipient,
            )?;
            ledger.verified_burn(&pair.token, &ctx.caller, params.value)
        })?;

        info!(
            "User {} burned {} of token {} (pair {})",
            ctx.caller, params.value, pair.token, params.token_pair_id
        );
        self.emit(BridgeEvent::UserBurn {
            custodian_id: params.custodian_id,
            token_pair_id: params.token_pair_id,
            token_account: pair.token,
            value: params.value,
            contract_fee: params.contract_fee,
            fee: params.fee,
            dest_user_account: params.dest_user_account.clone(),
        });
        Ok(())
    }

    /// Mint `value` to the user and `fee` to the fee recipient, once per id.
    pub fn smg_mint(&self, params: &SmgMintParams, ctx: &CallContext) -> BridgeResult<()> {
        self.rapidity.ensure_unused(&params.unique_id)?;
        let pair = self.resolve_pair_for_token(
            params.token_pair_id,
            ctx.chain_id,
            &params.dest_token_account,
        )?;

        self.atomically(|ledger| {
            ledger.verified_mint(&pair.token, &params.fee_recipient, params.fee)?;
            ledger.verified_mint(&pair.token, &params.dest_user_account, params.value)?;
            self.rapidity.add_rapidity_tx(&params.unique_id, ctx.now)
        })?;

        info!(
            "Minted {} of token {} to {} (rapidity {})",
            params.value, pair.token, params.dest_user_account, params.unique_id
        );
        self.emit(BridgeEvent::SmgMint {
            unique_id: params.unique_id,
            custodian_id: params.custodian_id,
            token_pair_id: params.token_pair_id,
            value: params.value,
            token_account: pair.token,
            dest_user_account: params.dest_user_account,
        });
        Ok(())
    }

    /// Release `value` and `fee` out of custody, once per id.
    pub fn smg_release(&self, params: &SmgReleaseParams, ctx: &CallContext) -> BridgeResult<()> {
        self.rapidity.ensure_unused(&params.unique_id)?;
        let pair = self.resolve_pair_for_token(
            params.token_pair_id,
            ctx.chain_id,
            &params.dest_token_account,
        )?;

        self.atomically(|ledger| {
            ledger.verified_transfer(
                &pair.token,
                &self.custody,
                &params.fee_recipient,
                params.fee,
            )?;
            ledger.verified_transfer(
                &pair.token,
                &self.custody,
                &params.dest_user_account,
                params.value,
            )?;
            self.rapidity.add_rapidity_tx(&params.unique_id, ctx.now)
        })?;

        info!(
            "Released {} of token {} to {} (rapidity {})",
            params.value, pair.token, params.dest_user_account, params.unique_id
        );
        self.emit(BridgeEvent::SmgRelease {
            unique_id: params.unique_id,
            custodian_id: params.custodian_id,
            token_pair_id: params.token_pair_id,
            value: params.value,
            token_account: pair.token,
            dest_user_account: params.dest_user_account,
        });
        Ok(())
    }
}
