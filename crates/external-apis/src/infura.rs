// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Infura integration for Ethereum
//!
//! Balances are read over JSON-RPC: `eth_getBalance` for ether and `eth_call`
//! against `balanceOf` for each tracked ERC-20 contract. JSON-RPC reports
//! failures inside HTTP 200 bodies, so the provider hook turns an `error` member
//! into [`ApiError::Application`].

use std::{
    str::FromStr,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use alloy_primitives::{Address, U256, hex};
use api_client::{
    ApiError, ApiOptions, ApiProvider, Balance, BalanceProvider, BlockchainApi, CallOptions,
    Endpoint, PipelineConfig, RateLimiter, Sleeper, TtlCache, scale_raw_units,
};
use serde_json::{Value, json};
use shared_types::Blockchain;
use tracing::{debug, warn};

use crate::ProviderSettings;

const CHAIN: Blockchain = Blockchain::Ethereum;
const TOKEN_CACHE_ENTRIES: usize = 1024;

const BALANCE_OF_SELECTOR: &str = "70a08231";
const DECIMALS_SELECTOR: &str = "313ce567";
const SYMBOL_SELECTOR: &str = "95d89b41";

/// Infura provider description
#[derive(Debug)]
pub struct Infura;

impl ApiProvider for Infura {
    const NAME: &'static str = "infura";
    const OPTIONS: ApiOptions = ApiOptions {
        blockchain: CHAIN,
        base_url: "https://mainnet.infura.io/",
        rate_limit: Duration::from_millis(100),
    };
    type Request = InfuraRequest;

    fn check_application_error(body: &Value) -> Result<(), ApiError> {
        let Some(error) = body.get("error").filter(|error| !error.is_null()) else {
            return Ok(());
        };
        Err(ApiError::Application {
            code: error.get("code").and_then(Value::as_i64),
            message: error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("JSON-RPC error")
                .to_string(),
        })
    }
}

/// Requests supported by Infura
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfuraRequest {
    /// JSON-RPC endpoint of the project
    Rpc,
}

impl Endpoint for InfuraRequest {
    fn name(&self) -> &'static str {
        "rpc"
    }

    fn template(&self) -> &'static str {
        "v3/{api_key}"
    }

    fn args(&self) -> Vec<(&'static str, String)> {
        Vec::new()
    }
}

/// Symbol and precision of an ERC-20 contract
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenMetadata {
    /// Token ticker
    pub symbol: String,
    /// Decimal places of the raw amount
    pub decimals: u32,
}

/// Infura client
#[derive(Debug)]
pub struct InfuraClient {
    api: BlockchainApi<Infura>,
    rate_limit: Option<Duration>,
    tokens: Vec<Address>,
    token_metadata: TtlCache<Address, TokenMetadata>,
    next_id: AtomicU64,
}

impl InfuraClient {
    /// Create a client from provider settings
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Configuration`] if the settings are unusable or carry no API key
    pub fn new(settings: &ProviderSettings, pipeline: &PipelineConfig) -> Result<Self, ApiError> {
        let api: BlockchainApi<Infura> = settings.build_api(pipeline)?;
        if api.api_key().is_none() {
            return Err(ApiError::configuration("infura requires an API key"));
        }
        Ok(Self {
            api,
            rate_limit: settings.rate_limit()?,
            tokens: Vec::new(),
            token_metadata: TtlCache::new(None, TOKEN_CACHE_ENTRIES),
            next_id: AtomicU64::new(1),
        })
    }

    /// Also report balances of these ERC-20 contracts
    #[must_use]
    pub fn with_tokens(mut self, tokens: impl IntoIterator<Item = Address>) -> Self {
        self.tokens.extend(tokens);
        self
    }

    /// Back off rate-limited calls through `sleeper`
    #[must_use]
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.api = self.api.with_sleeper(sleeper);
        self
    }

    /// Throttle calls through a shared limiter
    #[must_use]
    pub fn with_rate_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.api = self.api.with_rate_limiter(Arc::clone(&limiter));
        if let Some(rate) = self.rate_limit {
            limiter.set_rate(self.api.base_url().as_str(), rate);
        }
        self
    }

    /// Underlying pipeline
    pub fn api(&self) -> &BlockchainApi<Infura> {
        &self.api
    }

    /// Token metadata cache
    pub fn token_metadata_cache(&self) -> &TtlCache<Address, TokenMetadata> {
        &self.token_metadata
    }

    /// Issue one JSON-RPC call and return its `result`
    ///
    /// # Errors
    ///
    /// Returns the pipeline's fail-fast errors, [`ApiError::Application`] for
    /// JSON-RPC errors and [`ApiError::InvalidResponse`] when `result` is missing
    pub async fn rpc(&self, method: &str, params: Value) -> Result<Value, ApiError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        debug!(method, id, "sending json-rpc request");

        let mut response = self
            .api
            .post(&InfuraRequest::Rpc, &body, &CallOptions::new())
            .await?;
        match response.get_mut("result").map(Value::take) {
            Some(Value::Null) | None => Err(ApiError::invalid_response(format!(
                "`{method}` response has no result"
            ))),
            Some(result) => Ok(result),
        }
    }

    /// Native ether balance of `address`
    ///
    /// # Errors
    ///
    /// As [`Self::rpc`]
    pub async fn ether_balance(&self, address: Address) -> Result<Balance, ApiError> {
        let result = self
            .rpc("eth_getBalance", json!([address.to_string(), "latest"]))
            .await?;
        let wei = parse_quantity(&result)?;
        Ok(Balance::native(
            CHAIN.symbol(),
            scale_raw_units(&wei.to_string(), CHAIN.decimals())?,
        ))
    }

    /// Balance of `owner` in the ERC-20 `token`
    ///
    /// # Errors
    ///
    /// As [`Self::rpc`], plus [`ApiError::InvalidResponse`] for undecodable contract data
    pub async fn token_balance(&self, owner: Address, token: Address) -> Result<Balance, ApiError> {
        let metadata = self
            .token_metadata
            .get_or_try_insert_with(token, || self.fetch_token_metadata(token))
            .await?;

        let mut call_data = String::with_capacity(2 + 8 + 64);
        call_data.push_str("0x");
        call_data.push_str(BALANCE_OF_SELECTOR);
        call_data.push_str(&hex::encode(owner.into_word()));
        let raw = self.call(token, &call_data).await?;
        let amount = word(&raw, 0)?;

        Ok(Balance::native(
            metadata.symbol,
            scale_raw_units(&amount.to_string(), metadata.decimals)?,
        )
        .with_contract(token.to_checksum(None)))
    }

    async fn fetch_token_metadata(&self, token: Address) -> Result<TokenMetadata, ApiError> {
        debug!(%token, "fetching token metadata");
        let decimals = word(&self.call(token, &format!("0x{DECIMALS_SELECTOR}")).await?, 0)?;
        let decimals = small(decimals, "decimals")?;
        let symbol = decode_symbol(&self.call(token, &format!("0x{SYMBOL_SELECTOR}")).await?)?;
        Ok(TokenMetadata { symbol, decimals })
    }

    async fn call(&self, to: Address, data: &str) -> Result<Vec<u8>, ApiError> {
        let result = self
            .rpc(
                "eth_call",
                json!([{"to": to.to_string(), "data": data}, "latest"]),
            )
            .await?;
        let encoded = result
            .as_str()
            .ok_or_else(|| ApiError::invalid_response("eth_call result is not a string"))?;
        hex::decode(encoded)
            .map_err(|e| ApiError::invalid_response(format!("eth_call result is not hex: {e}")))
    }
}

impl BalanceProvider for InfuraClient {
    async fn get_balance(&self, address: &str) -> Result<Vec<Balance>, ApiError> {
        let owner = Address::from_str(address.trim()).map_err(|e| {
            ApiError::invalid_input(format!("`{address}` is not an Ethereum address: {e}"))
        })?;

        let mut balances = vec![self.ether_balance(owner).await?];
        for &token in &self.tokens {
            match self.token_balance(owner, token).await {
                Ok(balance) => balances.push(balance),
                Err(error) => {
                    warn!(%token, %error, "failed to read token balance");
                    return Err(error);
                }
            }
        }
        Ok(balances)
    }
}

/// Parse a JSON-RPC hex quantity
fn parse_quantity(value: &Value) -> Result<U256, ApiError> {
    let quantity = value
        .as_str()
        .ok_or_else(|| ApiError::invalid_response("quantity is not a string"))?;
    let digits = quantity
        .strip_prefix("0x")
        .ok_or_else(|| ApiError::invalid_response(format!("quantity `{quantity}` lacks 0x")))?;
    U256::from_str_radix(digits, 16)
        .map_err(|e| ApiError::invalid_response(format!("quantity `{quantity}`: {e}")))
}

/// The `index`-th 32-byte ABI word as an integer
fn word(data: &[u8], index: usize) -> Result<U256, ApiError> {
    let start = index * 32;
    data.get(start..start + 32)
        .map(U256::from_be_slice)
        .ok_or_else(|| ApiError::invalid_response("contract returned too little data"))
}

/// An ABI word that must fit in 32 bits
fn small(value: U256, what: &str) -> Result<u32, ApiError> {
    if value > U256::from(u32::MAX) {
        return Err(ApiError::invalid_response(format!("{what} {value} is out of range")));
    }
    u32::try_from(value.as_limbs()[0])
        .map_err(|_| ApiError::invalid_response(format!("{what} {value} is out of range")))
}

/// Decode an ABI `string` return value, or a `bytes32` one for older tokens
fn decode_symbol(data: &[u8]) -> Result<String, ApiError> {
    let decoded = if data.len() == 32 {
        data.iter()
            .copied()
            .take_while(|&byte| byte != 0)
            .collect::<Vec<_>>()
    } else {
        let offset = small(word(data, 0)?, "symbol offset")? as usize;
        let length_word = data
            .get(offset..offset + 32)
            .map(U256::from_be_slice)
            .ok_or_else(|| ApiError::invalid_response("symbol length is missing"))?;
        let length = small(length_word, "symbol length")? as usize;
        data.get(offset + 32..offset + 32 + length)
            .ok_or_else(|| ApiError::invalid_response("symbol is truncated"))?
            .to_vec()
    };
    String::from_utf8(decoded)
        .map_err(|e| ApiError::invalid_response(format!("symbol is not UTF-8: {e}")))
}
