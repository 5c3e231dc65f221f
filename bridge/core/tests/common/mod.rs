// Copyright (c) 2024 The Botho Foundation
//
//! Shared fixture for orchestrator integration tests.
//!
//! The bridge runs on chain [`CHAIN`] with four registered pairs:
//!
//! - [`NATIVE_PAIR`]: native coin originating here
//! - [`TOKEN_PAIR`]: token [`TOKEN`] originating here
//! - [`SHADOW_PAIR`]: [`SHADOW`] here is the shadow of a token on [`OTHER_CHAIN`]
//! - [`MULTI_PAIR`]: a multi-token pair, never accepted
//!
//! [`FOREIGN_PAIR`] links two other chains.

#![allow(dead_code)]

use std::sync::Arc;

use htlc_bridge_core::{
    Address, Amount, Bridge, CallContext, ChainId, CustodianId, MemoryLedger,
    MemoryTokenPairRegistry, MemoryTxStore, RecordingSink, TokenBehavior, TokenCrossType,
    TokenPairId, TokenPairInfo,
};

pub type TestBridge = Bridge<Arc<MemoryTxStore>, MemoryTokenPairRegistry, MemoryLedger>;

pub const CHAIN: ChainId = 1;
pub const OTHER_CHAIN: ChainId = 2;

pub const NATIVE: Address = Address::ZERO;
pub const TOKEN: Address = Address::new([0x70; 20]);
pub const SHADOW: Address = Address::new([0x5a; 20]);
pub const MULTI: Address = Address::new([0x3e; 20]);

pub const CUSTODY: Address = Address::new([0xcc; 20]);
pub const FEE_RECIPIENT: Address = Address::new([0xfe; 20]);
pub const ALICE: Address = Address::new([0xa1; 20]);
pub const BOB: Address = Address::new([0xb0; 20]);

pub const SMG: CustodianId = CustodianId::new([0x11; 32]);
pub const SMG2: CustodianId = CustodianId::new([0x22; 32]);

pub const NATIVE_PAIR: TokenPairId = 1;
pub const TOKEN_PAIR: TokenPairId = 2;
pub const SHADOW_PAIR: TokenPairId = 3;
pub const MULTI_PAIR: TokenPairId = 4;
pub const FOREIGN_PAIR: TokenPairId = 5;

/// Starting balances.
pub const ALICE_FUNDS: Amount = 1_000_000;
pub const CUSTODY_FUNDS: Amount = 500_000;

pub struct Fixture {
    pub bridge: TestBridge,
    pub events: Arc<RecordingSink>,
}

fn pair(from_chain_id: ChainId, from: Address, to_chain_id: ChainId, to: Address) -> TokenPairInfo {
    TokenPairInfo {
        from_chain_id,
        from_account: from.as_bytes().to_vec(),
        to_chain_id,
        to_account: to.as_bytes().to_vec(),
    }
}

pub fn registry() -> MemoryTokenPairRegistry {
    let remote = Address::new([0x99; 20]);
    let mut registry = MemoryTokenPairRegistry::new();
    registry.insert(NATIVE_PAIR, pair(CHAIN, NATIVE, OTHER_CHAIN, remote), TokenCrossType::Fungible);
    registry.insert(TOKEN_PAIR, pair(CHAIN, TOKEN, OTHER_CHAIN, remote), TokenCrossType::Fungible);
    registry.insert(SHADOW_PAIR, pair(OTHER_CHAIN, remote, CHAIN, SHADOW), TokenCrossType::Fungible);
    registry.insert(MULTI_PAIR, pair(CHAIN, MULTI, OTHER_CHAIN, remote), TokenCrossType::MultiToken);
    registry.insert(FOREIGN_PAIR, pair(3, remote, 4, remote), TokenCrossType::Fungible);
    registry
}

pub fn ledger() -> MemoryLedger {
    let mut ledger = MemoryLedger::new();
    for token in [NATIVE, TOKEN, SHADOW, MULTI] {
        ledger.credit(token, ALICE, ALICE_FUNDS);
        ledger.approve(token, ALICE, CUSTODY, ALICE_FUNDS);
    }
    ledger.credit(NATIVE, CUSTODY, CUSTODY_FUNDS);
    ledger.credit(TOKEN, CUSTODY, CUSTODY_FUNDS);
    ledger
}

pub fn fixture() -> Fixture {
    let events = Arc::new(RecordingSink::new());
    let bridge = Bridge::new(Arc::new(MemoryTxStore::new()), registry(), ledger(), CUSTODY)
        .with_event_sink(events.clone());
    Fixture { bridge, events }
}

pub fn ctx(caller: Address, now: u64) -> CallContext {
    CallContext::new(caller, CHAIN, now)
}

pub fn balance(bridge: &TestBridge, token: Address, account: Address) -> Amount {
    bridge.ledger().unwrap().balance(&token, &account)
}

pub fn set_behavior(bridge: &TestBridge, token: Address, behavior: TokenBehavior) {
    bridge.ledger().unwrap().set_behavior(token, behavior);
}

/// Every balance the fixture touches, for before/after comparison.
pub fn snapshot(bridge: &TestBridge) -> Vec<Amount> {
    let mut out = Vec::new();
    for token in [NATIVE, TOKEN, SHADOW, MULTI] {
        for account in [ALICE, BOB, CUSTODY, FEE_RECIPIENT] {
            out.push(balance(bridge, token, account));
        }
    }
    out
}
