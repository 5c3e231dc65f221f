// Copyright (c) 2024 The Botho Foundation

//! Primitive identifiers shared by every bridge component.

use displaydoc::Display;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Token amount in the token's base unit.
pub type Amount = u128;

/// Unix timestamp in seconds.
pub type Timestamp = u64;

/// Registry key of a token pair.
pub type TokenPairId = u64;

/// Chain identifier as used by the token-pair registry.
pub type ChainId = u64;

/// Error parsing a fixed-width hex identifier.
#[derive(Clone, Debug, Display, Error, PartialEq, Eq)]
pub enum ParseBytesError {
    /// Invalid hex: {0}
    InvalidHex(String),

    /// Expected {expected} bytes, got {actual}
    WrongLength { expected: usize, actual: usize },
}

macro_rules! fixed_bytes {
    // Everything except the formatting impls
    (@base $(#[$meta:meta])* $name:ident, $len:expr) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub [u8; $len]);

        impl $name {
            /// Width in bytes.
            pub const LEN: usize = $len;

            pub const fn new(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }

            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }

            pub fn is_zero(&self) -> bool {
                self.0.iter().all(|b| *b == 0)
            }

            /// Build from a slice of exactly `LEN` bytes.
            pub fn from_slice(bytes: &[u8]) -> Option<Self> {
                <[u8; $len]>::try_from(bytes).ok().map(Self)
            }

            pub fn to_hex(&self) -> String {
                format!("0x{}", hex::encode(self.0))
            }
        }

        impl From<[u8; $len]> for $name {
            fn from(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }
        }

        impl std::str::FromStr for $name {
            type Err = ParseBytesError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let digits = s.strip_prefix("0x").unwrap_or(s);
                let bytes =
                    hex::decode(digits).map_err(|e| ParseBytesError::InvalidHex(e.to_string()))?;
                Self::from_slice(&bytes).ok_or(ParseBytesError::WrongLength {
                    expected: $len,
                    actual: bytes.len(),
                })
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_hex())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };

    ($(#[$meta:meta])* $name:ident, $len:expr) => {
        fixed_bytes!(@base $(#[$meta])* $name, $len);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.to_hex())
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}({})", stringify!($name), self.to_hex())
            }
        }
    };
}

fixed_bytes!(
    /// Hash lock: `sha256(x)` of the secret preimage.
    XHash,
    32
);

fixed_bytes!(
    /// Storeman group identifier.
    CustodianId,
    32
);

fixed_bytes!(
    /// Caller-supplied nonce guarding a Rapidity settlement against replay.
    UniqueId,
    32
);

fixed_bytes!(
    /// Account or token contract on the local chain.
    Address,
    20
);

fixed_bytes!(
    @base
    /// Secret preimage `x` revealed at redeem time.
    ///
    /// Formatting never prints the bytes; use [`Secret::to_hex`] to reveal them.
    Secret,
    32
);

impl Address {
    /// Token account standing for the chain's native coin.
    pub const ZERO: Address = Address([0u8; 20]);
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Secret(..)")
    }
}

impl std::fmt::Display for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("<secret>")
    }
}

impl Secret {
    /// Compute the hash lock this preimage opens.
    pub fn x_hash(&self) -> XHash {
        let digest = Sha256::digest(self.0);
        let mut out = [0u8; 32];
        out.copy_from_slice(&digest);
        XHash(out)
    }
}

/// Serde helper for variable-length byte strings stored as hex.
pub(crate) mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        hex::decode(s.strip_prefix("0x").unwrap_or(&s)).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_hash() {
        // sha256 of 32 zero bytes
        let x = Secret::new([0u8; 32]);
        assert_eq!(
            x.x_hash().to_hex(),
            "0x66687aadf862bd776c8fc18b8e9f8e20089714856ee233b3902a591d0d5f2925"
        );
        assert_ne!(Secret::new([1u8; 32]).x_hash(), x.x_hash());
    }

    #[test]
    fn test_secret_formatting_is_redacted() {
        let x: Secret = "0xabababababababababababababababababababababababababababababababab"
            .parse()
            .unwrap();
        assert_eq!(format!("{:?}", x), "Secret(..)");
        assert_eq!(x.to_string(), "<secret>");
        assert!(!format!("{:?}", Some(x)).contains("abab"));
        assert_eq!(&x.to_hex()[..6], "0xabab");

        // Hash locks are public
        assert!(format!("{:?}", x.x_hash()).starts_with("XHash(0x"));
    }

    #[test]
    fn test_hex_parsing() {
        let addr: Address = "0x1234567890abcdef1234567890abcdef12345678".parse().unwrap();
        assert_eq!(addr.0[0], 0x12);
        assert_eq!(addr.to_string(), "0x1234567890abcdef1234567890abcdef12345678");

        let no_prefix: Address = "1234567890abcdef1234567890abcdef12345678".parse().unwrap();
        assert_eq!(addr, no_prefix);

        assert_eq!(
            "0x1234".parse::<Address>(),
            Err(ParseBytesError::WrongLength {
                expected: 20,
                actual: 2
            })
        );
        assert!(matches!(
            "0xzz".parse::<XHash>(),
            Err(ParseBytesError::InvalidHex(_))
        ));
    }

    #[test]
    fn test_zero_address() {
        assert!(Address::ZERO.is_zero());
        assert!(Address::default().is_zero());
        assert!(!Address::new([1u8; 20]).is_zero());
    }

    #[test]
    fn test_serde_as_hex() {
        let id = CustodianId::new([0xab; 32]);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"0x{}\"", "ab".repeat(32)));
        let back: CustodianId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
