// Copyright (c) 2024 The Botho Foundation

//! Token-pair registry interface.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::{hex_bytes, ChainId, TokenPairId};

/// How a token pair moves across chains.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenCrossType {
    /// Simple fungible token
    #[default]
    Fungible,
    /// Non-fungible token
    Nft,
    /// Multi-token (fungible and non-fungible ids under one account)
    MultiToken,
}

impl std::fmt::Display for TokenCrossType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenCrossType::Fungible => write!(f, "fungible"),
            TokenCrossType::Nft => write!(f, "nft"),
            TokenCrossType::MultiToken => write!(f, "multi_token"),
        }
    }
}

/// Which end of a pair the current chain is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairSide {
    /// Chain holding the original token in custody
    Origin,
    /// Chain holding the minted shadow token
    Destination,
}

/// Association of an origin token with its shadow on another chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPairInfo {
    pub from_chain_id: ChainId,

    /// Token account on the origin chain
    #[serde(with = "hex_bytes")]
    pub from_account: Vec<u8>,

    pub to_chain_id: ChainId,

    /// Token account on the destination chain
    #[serde(with = "hex_bytes")]
    pub to_account: Vec<u8>,
}

impl TokenPairInfo {
    /// Resolve the side served by `chain_id`; the origin wins a tie.
    pub fn side_of(&self, chain_id: ChainId) -> Option<PairSide> {
        if chain_id == self.from_chain_id {
            Some(PairSide::Origin)
        } else if chain_id == self.to_chain_id {
            Some(PairSide::Destination)
        } else {
            None
        }
    }

    pub fn account_on(&self, side: PairSide) -> &[u8] {
        match side {
            PairSide::Origin => &self.from_account,
            PairSide::Destination => &self.to_account,
        }
    }
}

/// Source of token-pair configuration.
pub trait TokenPairRegistry: Send + Sync {
    fn token_pair_info(&self, id: TokenPairId) -> Option<TokenPairInfo>;

    fn token_cross_type(&self, id: TokenPairId) -> Option<TokenCrossType>;
}

/// Registry held in memory, usually seeded from configuration.
#[derive(Debug, Clone, Default)]
pub struct MemoryTokenPairRegistry {
    pairs: HashMap<TokenPairId, (TokenPairInfo, TokenCrossType)>,
}

impl MemoryTokenPairRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace a pair.
    pub fn insert(&mut self, id: TokenPairId, info: TokenPairInfo, cross_type: TokenCrossType) {
        self.pairs.insert(id, (info, cross_type));
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

impl TokenPairRegistry for MemoryTokenPairRegistry {
    fn token_pair_info(&self, id: TokenPairId) -> Option<TokenPairInfo> {
        self.pairs.get(&id).map(|(info, _)| info.clone())
    }

    fn token_cross_type(&self, id: TokenPairId) -> Option<TokenCrossType> {
        self.pairs.get(&id).map(|(_, cross_type)| *cross_type)
    }
}
