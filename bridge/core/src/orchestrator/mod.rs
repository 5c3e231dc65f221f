// Copyright (c) 2024 The Botho Foundation

//! Settlement orchestrator.
//!
//! Composes the record tables, the replay guard, the token-pair registry and
//! the token ledger into whole bridge actions. Each action runs as one unit:
//! the ledger lock is held throughout, a ledger checkpoint is taken up front
//! and restored on any error, and the record-table write is always the last
//! fallible step. An action therefore either commits fully or leaves every
//! ledger and table as it found them.
//!
//! - [`rapidity`]: the one-shot fast path (`user_lock`, `user_burn`,
//!   `smg_mint`, `smg_release`)
//! - [`htlc`]: the hashed-timelock path, including debt handover

mod htlc;
mod rapidity;

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::info;

pub use htlc::{SmgLockHtlcParams, UserLockHtlcParams};
pub use rapidity::{SmgMintParams, SmgReleaseParams, UserBurnParams, UserLockParams};

use crate::custody::{bytes_to_address, VerifiedLedger};
use crate::error::{BridgeError, BridgeResult};
use crate::events::{BridgeEvent, EventSink, NullSink};
use crate::htlc::HtlcLedger;
use crate::ledger::TokenLedger;
use crate::rapidity::RapidityGuard;
use crate::registry::{PairSide, TokenCrossType, TokenPairRegistry};
use crate::store::TxStore;
use crate::types::{Address, Amount, ChainId, Timestamp, TokenPairId};

/// Who is calling, with what attached, on which chain, and when.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallContext {
    pub caller: Address,
    /// Native coin sent along with the call
    pub attached_value: Amount,
    /// Chain the call executes on
    pub chain_id: ChainId,
    pub now: Timestamp,
}

impl CallContext {
    pub fn new(caller: Address, chain_id: ChainId, now: Timestamp) -> Self {
        Self {
            caller,
            attached_value: 0,
            chain_id,
            now,
        }
    }

    pub fn with_value(mut self, attached_value: Amount) -> Self {
        self.attached_value = attached_value;
        self
    }
}

/// A token pair resolved against the calling chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ResolvedPair {
    side: PairSide,
    token: Address,
}

/// The bridge: record tables plus custody of funds on one chain.
pub struct Bridge<S, R, L> {
    htlc: HtlcLedger<S>,
    rapidity: RapidityGuard<S>,
    registry: R,
    ledger: Mutex<L>,
    events: Arc<dyn EventSink>,
    custody: Address,
}

impl<S, R, L> Bridge<S, R, L>
where
    S: TxStore + Clone,
    R: TokenPairRegistry,
    L: TokenLedger,
{
    /// Create a bridge holding custodied funds in `custody`.
    pub fn new(store: S, registry: R, ledger: L, custody: Address) -> Self {
        Self {
            htlc: HtlcLedger::new(store.clone()),
            rapidity: RapidityGuard::new(store),
            registry,
            ledger: Mutex::new(ledger),
            events: Arc::new(NullSink),
            custody,
        }
    }

    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// See [`HtlcLedger::with_unique_x_hash`].
    pub fn with_unique_x_hash(mut self, enabled: bool) -> Self {
        self.htlc = self.htlc.with_unique_x_hash(enabled);
        self
    }

    pub fn custody(&self) -> Address {
        self.custody
    }

    pub fn htlc(&self) -> &HtlcLedger<S> {
        &self.htlc
    }

    pub fn rapidity(&self) -> &RapidityGuard<S> {
        &self.rapidity
    }

    /// Lock the token ledger for inspection.
    pub fn ledger(&self) -> BridgeResult<MutexGuard<'_, L>> {
        self.ledger.lock().map_err(|_| BridgeError::Poisoned)
    }

    /// Run `f` against the ledger, restoring the ledger if it fails.
    fn atomically<T>(&self, f: impl FnOnce(&mut L) -> BridgeResult<T>) -> BridgeResult<T> {
        let mut ledger = self.ledger()?;
        let checkpoint = ledger.checkpoint();
        match f(&mut *ledger) {
            Ok(value) => Ok(value),
            Err(e) => {
                ledger.rollback(checkpoint);
                Err(e)
            }
        }
    }

    fn emit(&self, event: BridgeEvent) {
        info!("Emitting {} event", event.name());
        self.events.emit(&event);
    }

    /// Resolve `token_pair_id` for `chain_id` and pick the local token.
    fn resolve_pair(
        &self,
        token_pair_id: TokenPairId,
        chain_id: ChainId,
    ) -> BridgeResult<ResolvedPair> {
        let info = self
            .registry
            .token_pair_info(token_pair_id)
            .ok_or(BridgeError::TokenPairNotFound(token_pair_id))?;
        let cross_type = self
            .registry
            .token_cross_type(token_pair_id)
            .unwrap_or_default();
        if cross_type != TokenCrossType::Fungible {
            return Err(BridgeError::UnsupportedTokenType(cross_type));
        }
        let side = info.side_of(chain_id).ok_or(BridgeError::InvalidTokenPair {
            token_pair_id,
            chain_id,
        })?;
        let token = bytes_to_address(info.account_on(side))?;
        Ok(ResolvedPair { side, token })
    }

    /// Like [`Self::resolve_pair`], and require the local token to be `token`.
    fn resolve_pair_for_token(
        &self,
        token_pair_id: TokenPairId,
        chain_id: ChainId,
        token: &Address,
    ) -> BridgeResult<ResolvedPair> {
        let pair = self.resolve_pair(token_pair_id, chain_id)?;
        if pair.token != *token {
            return Err(BridgeError::TokenAccountMismatch {
                token_pair_id,
                token: *token,
            });
        }
        Ok(pair)
    }

    /// Take attached native value into custody, pay `contract_fee` from it
    /// and refund whatever exceeds `required`.
    fn collect_native(
        &self,
        ledger: &mut L,
        ctx: &CallContext,
        required: Amount,
        contract_fee: Amount,
        fee_recipient: &Address,
    ) -> BridgeResult<()> {
        if ctx.attached_value < required {
            return Err(BridgeError::InsufficientValue {
                required,
                attached: ctx.attached_value,
            });
        }
        let native = Address::ZERO;
        ledger.verified_transfer(&native, &ctx.caller, &self.custody, ctx.attached_value)?;
        ledger.verified_transfer(&native, &self.custody, fee_recipient, contract_fee)?;
        ledger.verified_transfer(
            &native,
            &self.custody,
            &ctx.caller,
            ctx.attached_value - required,
        )?;
        Ok(())
    }

    /// Move `value` of `token` from the caller into custody.
    ///
    /// The contract fee is always paid in native coin. For a native token the
    /// attached value must cover `value + contract_fee`, for any other token
    /// only the fee, and the token itself is pulled with the custody
    /// account's allowance.
    fn take_custody(
        &self,
        ledger: &mut L,
        ctx: &CallContext,
        token: &Address,
        value: Amount,
        contract_fee: Amount,
        fee_recipient: &Address,
    ) -> BridgeResult<()> {
        let required = if token.is_zero() {
            value
                .checked_add(contract_fee)
                .ok_or(BridgeError::AmountOverflow)?
        } else {
            contract_fee
        };
        self.collect_native(ledger, ctx, required, contract_fee, fee_recipient)?;
        if !token.is_zero() {
            ledger.verified_transfer_from(token, &self.custody, &ctx.caller, &self.custody, value)?;
        }
        Ok(())
    }
}
