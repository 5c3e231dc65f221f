// Copyright (c) 2024 The Botho Foundation

//! Bridge configuration types.

use std::collections::HashSet;

use displaydoc::Display;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::registry::{MemoryTokenPairRegistry, TokenCrossType, TokenPairInfo};
use crate::types::{hex_bytes, Address, ChainId, TokenPairId};

/// Errors raised while loading configuration.
#[derive(Clone, Debug, Display, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Failed to read config: {0}
    Read(String),

    /// Failed to parse config: {0}
    Parse(String),

    /// Token pair {0} is defined more than once
    DuplicateTokenPair(TokenPairId),

    /// Custody account must not be the zero address
    ZeroCustodyAccount,
}

/// Main bridge configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Local chain settings
    pub chain: ChainConfig,

    /// Hashed-timelock settings
    #[serde(default)]
    pub htlc: HtlcSettings,

    /// Operator process settings
    #[serde(default)]
    pub service: ServiceSettings,

    /// Token pairs served by this bridge
    #[serde(default)]
    pub token_pairs: Vec<TokenPairConfig>,
}

/// The chain this bridge instance runs on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    pub chain_id: ChainId,

    /// Account holding custodied funds
    pub custody_account: Address,

    /// Default recipient of contract fees
    pub fee_recipient: Address,
}

/// Hashed-timelock settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HtlcSettings {
    /// Refuse an xHash already present in any namespace
    #[serde(default)]
    pub unique_x_hash: bool,
}

/// Operator process settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceSettings {
    /// Path to SQLite database
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Seconds between timeout scans
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Warn when a lock has fewer than this many seconds left
    #[serde(default = "default_expiry_warning")]
    pub expiry_warning_secs: u64,
}

fn default_db_path() -> String {
    "htlc_bridge.db".to_string()
}

fn default_poll_interval() -> u64 {
    10
}

fn default_expiry_warning() -> u64 {
    300 // 5 minutes
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            poll_interval_secs: default_poll_interval(),
            expiry_warning_secs: default_expiry_warning(),
        }
    }
}

/// A token pair as written in the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPairConfig {
    pub id: TokenPairId,
    pub from_chain_id: ChainId,
    #[serde(with = "hex_bytes")]
    pub from_account: Vec<u8>,
    pub to_chain_id: ChainId,
    #[serde(with = "hex_bytes")]
    pub to_account: Vec<u8>,
    #[serde(default)]
    pub cross_type: TokenCrossType,
}

impl TokenPairConfig {
    pub fn info(&self) -> TokenPairInfo {
        TokenPairInfo {
            from_chain_id: self.from_chain_id,
            from_account: self.from_account.clone(),
            to_chain_id: self.to_chain_id,
            to_account: self.to_account.clone(),
        }
    }
}

impl BridgeConfig {
    /// Load and validate configuration from a TOML file.
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read(e.to_string()))?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chain.custody_account.is_zero() {
            return Err(ConfigError::ZeroCustodyAccount);
        }
        let mut seen = HashSet::new();
        for pair in &self.token_pairs {
            if !seen.insert(pair.id) {
                return Err(ConfigError::DuplicateTokenPair(pair.id));
            }
        }
        Ok(())
    }

    /// Build an in-memory registry holding every configured pair.
    pub fn registry(&self) -> MemoryTokenPairRegistry {
        let mut registry = MemoryTokenPairRegistry::new();
        for pair in &self.token_pairs {
            registry.insert(pair.id, pair.info(), pair.cross_type);
        }
        registry
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            chain: ChainConfig {
                chain_id: 1,
                custody_account: Address::new([0xcc; 20]),
                fee_recipient: Address::new([0xfe; 20]),
            },
            htlc: HtlcSettings::default(),
            service: ServiceSettings::default(),
            token_pairs: Vec::new(),
        }
    }
}
