// Copyright (c) 2024 The Botho Foundation

//! Token ledger capability consumed by the orchestrator.
//!
//! The native coin is addressed as token [`Address::ZERO`]; it can be
//! transferred but never minted or burned.

use std::collections::HashMap;

use displaydoc::Display;
use thiserror::Error;

use crate::types::{Address, Amount};

/// Errors raised by a token ledger.
#[derive(Clone, Debug, Display, Error, PartialEq, Eq)]
pub enum LedgerError {
    /// Account {account} holds {available} of token {token}, needs {needed}
    InsufficientBalance {
        token: Address,
        account: Address,
        needed: Amount,
        available: Amount,
    },

    /// Spender {spender} may move {available} of token {token} from {owner}, needs {needed}
    InsufficientAllowance {
        token: Address,
        owner: Address,
        spender: Address,
        needed: Amount,
        available: Amount,
    },

    /// Native coin cannot be {0}
    NativeCoin(&'static str),

    /// Ledger unavailable: {0}
    Unavailable(String),
}

/// Balances, transfers, and shadow-token supply on one chain.
///
/// `transfer` mirrors ERC-20 semantics: the boolean it returns is the
/// token's own claim of success and is not trusted by callers, which check
/// balance deltas instead (see [`crate::custody::VerifiedLedger`]).
pub trait TokenLedger {
    /// Snapshot restored when a call aborts.
    type Checkpoint;

    fn balance_of(&self, token: &Address, account: &Address) -> Result<Amount, LedgerError>;

    fn transfer(
        &mut self,
        token: &Address,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> Result<bool, LedgerError>;

    /// Move `amount` from `owner` to `to` against `spender`'s allowance.
    fn transfer_from(
        &mut self,
        token: &Address,
        spender: &Address,
        owner: &Address,
        to: &Address,
        amount: Amount,
    ) -> Result<bool, LedgerError>;

    fn mint(&mut self, token: &Address, to: &Address, amount: Amount) -> Result<(), LedgerError>;

    fn burn(&mut self, token: &Address, from: &Address, amount: Amount) -> Result<(), LedgerError>;

    fn checkpoint(&self) -> Self::Checkpoint;

    fn rollback(&mut self, checkpoint: Self::Checkpoint);
}

/// How a token in [`MemoryLedger`] reacts to transfers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TokenBehavior {
    /// Moves exactly what was asked
    #[default]
    Standard,
    /// Withholds `fee_bps` basis points of every transfer
    FeeOnTransfer { fee_bps: u32 },
    /// Reports success and moves nothing
    NoOp,
}

/// Balances and allowances of a [`MemoryLedger`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerState {
    balances: HashMap<(Address, Address), Amount>,
    allowances: HashMap<(Address, Address, Address), Amount>,
}

/// In-memory ledger for tests and simulation.
#[derive(Debug, Clone, Default)]
pub struct MemoryLedger {
    state: LedgerState,
    behaviors: HashMap<Address, TokenBehavior>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_behavior(&mut self, token: Address, behavior: TokenBehavior) {
        self.behaviors.insert(token, behavior);
    }

    /// Add funds out of thin air (native coin included).
    pub fn credit(&mut self, token: Address, account: Address, amount: Amount) {
        let balance = self.state.balances.entry((token, account)).or_default();
        *balance = balance.saturating_add(amount);
    }

    pub fn approve(&mut self, token: Address, owner: Address, spender: Address, amount: Amount) {
        self.state.allowances.insert((token, owner, spender), amount);
    }

    pub fn allowance(&self, token: &Address, owner: &Address, spender: &Address) -> Amount {
        self.state
            .allowances
            .get(&(*token, *owner, *spender))
            .copied()
            .unwrap_or_default()
    }

    /// Balance lookup that cannot fail.
    pub fn balance(&self, token: &Address, account: &Address) -> Amount {
        self.state
            .balances
            .get(&(*token, *account))
            .copied()
            .unwrap_or_default()
    }

    fn debit(
        &mut self,
        token: &Address,
        account: &Address,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        let available = self.balance(token, account);
        if available < amount {
            return Err(LedgerError::InsufficientBalance {
                token: *token,
                account: *account,
                needed: amount,
                available,
            });
        }
        self.state.balances.insert((*token, *account), available - amount);
        Ok(())
    }

    fn apply_transfer(
        &mut self,
        token: &Address,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> Result<bool, LedgerError> {
        let received = match self.behaviors.get(token).copied().unwrap_or_default() {
            TokenBehavior::Standard => amount,
            TokenBehavior::FeeOnTransfer { fee_bps } => {
                let bps = Amount::from(fee_bps.min(10_000));
                amount - (amount / 10_000 * bps + amount % 10_000 * bps / 10_000)
            }
            TokenBehavior::NoOp => return Ok(true),
        };
        self.debit(token, from, amount)?;
        self.credit(*token, *to, received);
        Ok(true)
    }
}

impl TokenLedger for MemoryLedger {
    type Checkpoint = LedgerState;

    fn balance_of(&self, token: &Address, account: &Address) -> Result<Amount, LedgerError> {
        Ok(self.balance(token, account))
    }

    fn transfer(
        &mut self,
        token: &Address,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> Result<bool, LedgerError> {
        self.apply_transfer(token, from, to, amount)
    }

    fn transfer_from(
        &mut self,
        token: &Address,
        spender: &Address,
        owner: &Address,
        to: &Address,
        amount: Amount,
    ) -> Result<bool, LedgerError> {
        let available = self.allowance(token, owner, spender);
        if available < amount {
            return Err(LedgerError::InsufficientAllowance {
                token: *token,
                owner: *owner,
                spender: *spender,
                needed: amount,
                available,
            });
        }
        self.state
            .allowances
            .insert((*token, *owner, *spender), available - amount);
        self.apply_transfer(token, owner, to, amount)
    }

    fn mint(&mut self, token: &Address, to: &Address, amount: Amount) -> Result<(), LedgerError> {
        if token.is_zero() {
            return Err(LedgerError::NativeCoin("minted"));
        }
        if self.behaviors.get(token) != Some(&TokenBehavior::NoOp) {
            self.credit(*token, *to, amount);
        }
        Ok(())
    }

    fn burn(&mut self, token: &Address, from: &Address, amount: Amount) -> Result<(), LedgerError> {
        if token.is_zero() {
            return Err(LedgerError::NativeCoin("burned"));
        }
        if self.behaviors.get(token) == Some(&TokenBehavior::NoOp) {
            return Ok(());
        }
        self.debit(token, from, amount)
    }

    fn checkpoint(&self) -> Self::Checkpoint {
        self.state.clone()
    }

    fn rollback(&mut self, checkpoint: Self::Checkpoint) {
        self.state = checkpoint;
    }
}
