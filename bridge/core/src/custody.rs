// Copyright (c) 2024 The Botho Foundation

//! Account conversion and balance-verified token movements.
//!
//! Every movement made on behalf of the orchestrator is checked against the
//! balance the ledger reports before and after the call. A token that
//! silently fails, skims a fee, or lies about success is caught here, so a
//! record never claims more value moved than actually did.

use tracing::warn;

use crate::error::{BridgeError, BridgeResult};
use crate::ledger::TokenLedger;
use crate::types::{Address, Amount};

/// Interpret registry account bytes as a local address.
pub fn bytes_to_address(bytes: &[u8]) -> BridgeResult<Address> {
    Address::from_slice(bytes).ok_or(BridgeError::InvalidAddress(bytes.len()))
}

pub fn address_to_bytes(address: &Address) -> Vec<u8> {
    address.as_bytes().to_vec()
}

/// Token movements that return the amount actually moved, verified.
///
/// Implemented for every [`TokenLedger`].
pub trait VerifiedLedger: TokenLedger {
    /// Transfer and check that `to` gained exactly `amount`.
    fn verified_transfer(
        &mut self,
        token: &Address,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> BridgeResult<Amount> {
        if amount == 0 || from == to {
            return Ok(amount);
        }
        let before = self.balance_of(token, to)?;
        let accepted = self.transfer(token, from, to, amount)?;
        let after = self.balance_of(token, to)?;
        check_delta(token, accepted, after.saturating_sub(before), amount)
    }

    /// Pull funds with an allowance and check that `to` gained exactly `amount`.
    fn verified_transfer_from(
        &mut self,
        token: &Address,
        spender: &Address,
        owner: &Address,
        to: &Address,
        amount: Amount,
    ) -> BridgeResult<Amount> {
        if amount == 0 || owner == to {
            return Ok(amount);
        }
        let before = self.balance_of(token, to)?;
        let accepted = self.transfer_from(token, spender, owner, to, amount)?;
        let after = self.balance_of(token, to)?;
        check_delta(token, accepted, after.saturating_sub(before), amount)
    }

    /// Mint and check that `to` gained exactly `amount`.
    fn verified_mint(
        &mut self,
        token: &Address,
        to: &Address,
        amount: Amount,
    ) -> BridgeResult<Amount> {
        if amount == 0 {
            return Ok(0);
        }
        let before = self.balance_of(token, to)?;
        self.mint(token, to, amount)?;
        let after = self.balance_of(token, to)?;
        check_delta(token, true, after.saturating_sub(before), amount)
    }

    /// Burn and check that `from` lost exactly `amount`.
    fn verified_burn(
        &mut self,
        token: &Address,
        from: &Address,
        amount: Amount,
    ) -> BridgeResult<Amount> {
        if amount == 0 {
            return Ok(0);
        }
        let before = self.balance_of(token, from)?;
        self.burn(token, from, amount)?;
        let after = self.balance_of(token, from)?;
        check_delta(token, true, before.saturating_sub(after), amount)
    }
}

impl<L: TokenLedger + ?Sized> VerifiedLedger for L {}

fn check_delta(
    token: &Address,
    accepted: bool,
    actual: Amount,
    expected: Amount,
) -> BridgeResult<Amount> {
    if !accepted || actual != expected {
        warn!(
            "Custody check failed for token {}: expected {}, moved {}",
            token, expected, actual
        );
        return Err(BridgeError::CustodyTransferFailed {
            token: *token,
            expected,
            actual,
        });
    }
    Ok(actual)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{MemoryLedger, TokenBehavior};
    use assert_matches::assert_matches;

    const TOKEN: Address = Address::new([0x70; 20]);
    const ALICE: Address = Address::new([0xa1; 20]);
    const VAULT: Address = Address::new([0xcc; 20]);

    #[test]
    fn test_bytes_to_address() {
        assert_eq!(bytes_to_address(&[0xa1; 20]).unwrap(), ALICE);
        assert_eq!(address_to_bytes(&ALICE), vec![0xa1; 20]);
        assert_matches!(bytes_to_address(&[0u8; 32]), Err(BridgeError::InvalidAddress(32)));
        assert_matches!(bytes_to_address(&[]), Err(BridgeError::InvalidAddress(0)));
    }

    #[test]
    fn test_standard_token_passes() {
        let mut ledger = MemoryLedger::new();
        ledger.credit(TOKEN, ALICE, 100);
        ledger.approve(TOKEN, ALICE, VAULT, 100);

        assert_eq!(ledger.verified_transfer_from(&TOKEN, &VAULT, &ALICE, &VAULT, 60).unwrap(), 60);
        assert_eq!(ledger.verified_transfer(&TOKEN, &VAULT, &ALICE, 10).unwrap(), 10);
        assert_eq!(ledger.verified_mint(&TOKEN, &ALICE, 5).unwrap(), 5);
        assert_eq!(ledger.verified_burn(&TOKEN, &ALICE, 55).unwrap(), 55);
        assert_eq!(ledger.balance(&TOKEN, &ALICE), 0);
    }

    #[test]
    fn test_fee_on_transfer_detected() {
        let mut ledger = MemoryLedger::new();
        ledger.credit(TOKEN, ALICE, 1_000);
        ledger.set_behavior(TOKEN, TokenBehavior::FeeOnTransfer { fee_bps: 50 });

        assert_matches!(
            ledger.verified_transfer(&TOKEN, &ALICE, &VAULT, 1_000),
            Err(BridgeError::CustodyTransferFailed {
                expected: 1_000,
                actual: 995,
                ..
            })
        );
    }

    #[test]
    fn test_silent_failure_detected() {
        let mut ledger = MemoryLedger::new();
        ledger.credit(TOKEN, ALICE, 1_000);
        ledger.set_behavior(TOKEN, TokenBehavior::NoOp);

        assert_matches!(
            ledger.verified_transfer(&TOKEN, &ALICE, &VAULT, 10),
            Err(BridgeError::CustodyTransferFailed { actual: 0, .. })
        );
        assert_matches!(
            ledger.verified_mint(&TOKEN, &ALICE, 10),
            Err(BridgeError::CustodyTransferFailed { actual: 0, .. })
        );
        assert_matches!(
            ledger.verified_burn(&TOKEN, &ALICE, 10),
            Err(BridgeError::CustodyTransferFailed { actual: 0, .. })
        );
    }

    #[test]
    fn test_ledger_errors_propagate() {
        let mut ledger = MemoryLedger::new();
        assert_matches!(
            ledger.verified_transfer(&TOKEN, &ALICE, &VAULT, 1),
            Err(BridgeError::Ledger(_))
        );
    }
}
