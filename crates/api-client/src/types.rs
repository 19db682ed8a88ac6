// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Uniform domain model produced by every provider parser

use std::str::FromStr;

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ApiError;

/// Scale an integer amount expressed in raw units (satoshi, wei, lamports) into whole units
///
/// `raw` must be a base-10 integer string, optionally signed.
pub fn scale_raw_units(raw: &str, decimals: u32) -> Result<BigDecimal, ApiError> {
    let raw = raw.trim();
    let digits = raw.strip_prefix('-').unwrap_or(raw);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ApiError::invalid_response(format!(
            "amount `{raw}` is not an integer"
        )));
    }
    BigDecimal::from_str(&format!("{raw}e-{decimals}"))
        .map(|amount| amount.normalized())
        .map_err(|e| ApiError::invalid_response(format!("amount `{raw}`: {e}")))
}

/// Balance of one asset held by an address
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    /// Asset ticker
    pub symbol: String,
    /// Amount in whole units
    pub amount: BigDecimal,
    /// Token contract for non-native assets
    pub contract: Option<String>,
}

impl Balance {
    /// Create a balance of a native asset
    pub fn native(symbol: impl Into<String>, amount: BigDecimal) -> Self {
        Self {
            symbol: symbol.into(),
            amount,
            contract: None,
        }
    }

    /// Create a native balance from an integer amount of raw units
    pub fn from_raw_units(
        symbol: impl Into<String>,
        raw: &str,
        decimals: u32,
    ) -> Result<Self, ApiError> {
        Ok(Self::native(symbol, scale_raw_units(raw, decimals)?))
    }

    /// Attach the token contract this balance belongs to
    #[must_use]
    pub fn with_contract(mut self, contract: impl Into<String>) -> Self {
        self.contract = Some(contract.into());
        self
    }
}

/// One input or output of a transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferLeg {
    /// Address credited or debited, when the upstream can decode it
    pub address: Option<String>,
    /// Amount in whole units
    pub amount: BigDecimal,
}

/// A transaction touching an address
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Transaction hash
    pub hash: String,
    /// Height of the including block, `None` while unconfirmed
    pub block_height: Option<u64>,
    /// Block time, or first-seen time for unconfirmed transactions
    pub timestamp: Option<DateTime<Utc>>,
    /// Fee paid in whole units
    pub fee: Option<BigDecimal>,
    /// Whether the transaction is included in a block
    pub confirmed: bool,
    /// Inputs
    pub inputs: Vec<TransferLeg>,
    /// Outputs
    pub outputs: Vec<TransferLeg>,
}

/// A liquidity or staking position reported by a portfolio provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pool {
    /// Protocol operating the pool
    pub protocol: String,
    /// Pool name
    pub name: String,
    /// Assets held in the position
    pub assets: Vec<Balance>,
}

/// A non-fungible token owned by an address
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Nft {
    /// Contract or mint address
    pub contract: String,
    /// Token identifier within the contract
    pub token_id: String,
    /// Token name
    pub name: Option<String>,
    /// Collection identifier
    pub collection_id: Option<String>,
    /// Collection name
    pub collection_name: Option<String>,
    /// Preview image
    pub image_url: Option<String>,
    /// Number of editions held
    pub quantity: u64,
    /// Owning address
    pub owner: Option<String>,
}

/// A bid made on an NFT or a collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    /// NFT the bid targets, `None` for collection-wide offers
    pub nft_id: Option<String>,
    /// Collection the bid targets
    pub collection_id: Option<String>,
    /// Price in whole units of `currency`
    pub price: BigDecimal,
    /// Payment token ticker
    pub currency: String,
    /// Address making the bid
    pub bidder: Option<String>,
    /// Expiry of the bid
    pub expires_at: Option<DateTime<Utc>>,
}

/// An NFT put up for sale
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    /// Listed NFT
    pub nft_id: String,
    /// Marketplace carrying the listing
    pub marketplace: Option<String>,
    /// Asking price in whole units of `currency`
    pub price: BigDecimal,
    /// Payment token ticker
    pub currency: String,
    /// Address selling
    pub seller: Option<String>,
    /// When the listing was created
    pub listed_at: Option<DateTime<Utc>>,
}

/// Aggregate statistics of an NFT collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    /// Collection identifier
    pub id: String,
    /// Collection name
    pub name: Option<String>,
    /// Lowest asking price in whole units of `floor_currency`
    pub floor_price: Option<BigDecimal>,
    /// Ticker of the floor price
    pub floor_currency: Option<String>,
    /// Number of distinct owners
    pub owners: Option<u64>,
    /// Number of tokens in the collection
    pub total_supply: Option<u64>,
}
