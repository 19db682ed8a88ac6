// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Blockchain identifiers
//!
//! This module provides the type-safe identifier every provider declares in its
//! static options, together with the native-asset facts (symbol, decimals) the
//! parsers need to scale raw upstream units.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Blockchains served by at least one provider adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Blockchain {
    /// Bitcoin mainnet
    Bitcoin,
    /// Bitcoin Cash mainnet
    BitcoinCash,
    /// Ethereum mainnet
    Ethereum,
    /// Polygon PoS
    Polygon,
    /// Base
    Base,
    /// Arbitrum One
    Arbitrum,
    /// Solana mainnet-beta
    Solana,
}

impl Blockchain {
    /// Returns the lowercase identifier used in configuration and upstream query parameters
    pub const fn identifier(self) -> &'static str {
        match self {
            Self::Bitcoin => "bitcoin",
            Self::BitcoinCash => "bitcoin-cash",
            Self::Ethereum => "ethereum",
            Self::Polygon => "polygon",
            Self::Base => "base",
            Self::Arbitrum => "arbitrum",
            Self::Solana => "solana",
        }
    }

    /// Returns the human-readable name of the chain
    pub const fn name(self) -> &'static str {
        match self {
            Self::Bitcoin => "Bitcoin",
            Self::BitcoinCash => "Bitcoin Cash",
            Self::Ethereum => "Ethereum",
            Self::Polygon => "Polygon",
            Self::Base => "Base",
            Self::Arbitrum => "Arbitrum",
            Self::Solana => "Solana",
        }
    }

    /// Returns the ticker of the native asset
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Bitcoin => "BTC",
            Self::BitcoinCash => "BCH",
            Self::Ethereum | Self::Base | Self::Arbitrum => "ETH",
            Self::Polygon => "POL",
            Self::Solana => "SOL",
        }
    }

    /// Returns the number of decimals between the native asset's raw unit and one whole coin
    pub const fn decimals(self) -> u32 {
        match self {
            Self::Bitcoin | Self::BitcoinCash => 8,
            Self::Ethereum | Self::Polygon | Self::Base | Self::Arbitrum => 18,
            Self::Solana => 9,
        }
    }

    /// Returns whether addresses on this chain are EVM-style 20-byte hex addresses
    pub const fn is_evm(self) -> bool {
        matches!(
            self,
            Self::Ethereum | Self::Polygon | Self::Base | Self::Arbitrum
        )
    }

    /// Returns all known blockchains
    pub const fn all() -> &'static [Self] {
        &[
            Self::Bitcoin,
            Self::BitcoinCash,
            Self::Ethereum,
            Self::Polygon,
            Self::Base,
            Self::Arbitrum,
            Self::Solana,
        ]
    }
}

impl fmt::Display for Blockchain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Error returned when a string does not name a known blockchain
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown blockchain: {0}")]
pub struct BlockchainParseError(pub String);

impl FromStr for Blockchain {
    type Err = BlockchainParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "bitcoin" | "btc" => Ok(Self::Bitcoin),
            "bitcoin-cash" | "bitcoincash" | "bch" => Ok(Self::BitcoinCash),
            "ethereum" | "eth" => Ok(Self::Ethereum),
            "polygon" | "matic" | "pol" => Ok(Self::Polygon),
            "base" => Ok(Self::Base),
            "arbitrum" | "arb" => Ok(Self::Arbitrum),
            "solana" | "sol" => Ok(Self::Solana),
            _ => Err(BlockchainParseError(s.to_string())),
        }
    }
}

impl Serialize for Blockchain {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.identifier())
    }
}

impl<'de> Deserialize<'de> for Blockchain {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
