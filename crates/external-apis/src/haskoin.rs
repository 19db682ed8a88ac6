// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Haskoin store integration for Bitcoin
//!
//! Balances go through the fetch/parse pair and the fail-fast composition;
//! transaction history uses the fail-fast JSON path. Extended public keys are
//! routed to the xpub endpoints with the derivation matching their prefix.

use std::{sync::Arc, time::Duration};

use api_client::{
    ApiError, ApiOptions, ApiProvider, Balance, BalanceFetcher, BalanceParser, BalanceProvider,
    BlockchainApi, CallOptions, Endpoint, FetchResult, ParseResult, PipelineConfig, RateLimiter,
    Sleeper, Transaction, TransactionsProvider, TransferLeg, fetch_and_parse_balance,
    scale_raw_units,
};
use chrono::DateTime;
use serde::Deserialize;
use serde_json::Value;
use shared_types::Blockchain;
use tracing::debug;

use crate::ProviderSettings;

const CHAIN: Blockchain = Blockchain::Bitcoin;

/// Haskoin provider description
#[derive(Debug)]
pub struct Haskoin;

impl ApiProvider for Haskoin {
    const NAME: &'static str = "haskoin";
    const OPTIONS: ApiOptions = ApiOptions {
        blockchain: CHAIN,
        base_url: "https://api.haskoin.com/btc/",
        rate_limit: Duration::from_millis(200),
    };
    type Request = HaskoinRequest;
}

/// Requests supported by Haskoin
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum HaskoinRequest {
    AddressBalance { address: String },
    XpubBalance { xpub: String },
    AddressTransactions { address: String },
    XpubTransactions { xpub: String },
}

impl Endpoint for HaskoinRequest {
    fn name(&self) -> &'static str {
        match self {
            Self::AddressBalance { .. } => "address_balance",
            Self::XpubBalance { .. } => "xpub_balance",
            Self::AddressTransactions { .. } => "address_transactions",
            Self::XpubTransactions { .. } => "xpub_transactions",
        }
    }

    fn template(&self) -> &'static str {
        match self {
            Self::AddressBalance { .. } => "address/{address}/balance",
            Self::XpubBalance { .. } => "xpub/{xpub}",
            Self::AddressTransactions { .. } => "address/{address}/transactions/full",
            Self::XpubTransactions { .. } => "xpub/{xpub}/transactions/full",
        }
    }

    fn args(&self) -> Vec<(&'static str, String)> {
        match self {
            Self::AddressBalance { address } | Self::AddressTransactions { address } => {
                vec![("address", address.clone())]
            }
            Self::XpubBalance { xpub } | Self::XpubTransactions { xpub } => {
                vec![("xpub", xpub.clone())]
            }
        }
    }
}

/// Address derivation scheme of an extended public key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Derivation {
    /// BIP44 legacy addresses (`xpub`, `tpub`)
    Standard,
    /// BIP49 P2SH-wrapped segwit (`ypub`, `upub`)
    Compat,
    /// BIP84 native segwit (`zpub`, `vpub`)
    Segwit,
}

impl Derivation {
    /// Scheme implied by the key prefix, `None` for plain addresses
    pub fn detect(key: &str) -> Option<Self> {
        match key.get(..4)? {
            "xpub" | "tpub" => Some(Self::Standard),
            "ypub" | "upub" => Some(Self::Compat),
            "zpub" | "vpub" => Some(Self::Segwit),
            _ => None,
        }
    }

    /// Value of the `derive` query parameter
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Compat => "compat",
            Self::Segwit => "segwit",
        }
    }
}

#[derive(Debug, Deserialize)]
struct HaskoinTransaction {
    txid: String,
    #[serde(default)]
    fee: Option<u64>,
    #[serde(default)]
    time: Option<i64>,
    block: HaskoinBlock,
    #[serde(default)]
    inputs: Vec<HaskoinLeg>,
    #[serde(default)]
    outputs: Vec<HaskoinLeg>,
}

#[derive(Debug, Deserialize)]
struct HaskoinBlock {
    height: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct HaskoinLeg {
    address: Option<String>,
    #[serde(default)]
    value: u64,
}

impl HaskoinTransaction {
    fn into_transaction(self) -> Result<Transaction, ApiError> {
        let decimals = CHAIN.decimals();
        let legs = |legs: Vec<HaskoinLeg>| {
            legs.into_iter()
                .map(|leg| {
                    Ok(TransferLeg {
                        address: leg.address,
                        amount: scale_raw_units(&leg.value.to_string(), decimals)?,
                    })
                })
                .collect::<Result<Vec<_>, ApiError>>()
        };

        Ok(Transaction {
            hash: self.txid,
            block_height: self.block.height,
            timestamp: self
                .time
                .and_then(|seconds| DateTime::from_timestamp(seconds, 0)),
            fee: self
                .fee
                .map(|fee| scale_raw_units(&fee.to_string(), decimals))
                .transpose()?,
            confirmed: self.block.height.is_some(),
            inputs: legs(self.inputs)?,
            outputs: legs(self.outputs)?,
        })
    }
}

/// Haskoin client
#[derive(Debug)]
pub struct HaskoinClient {
    api: BlockchainApi<Haskoin>,
    rate_limit: Option<Duration>,
}

impl HaskoinClient {
    /// Create a client from provider settings
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Configuration`] if the settings are unusable
    pub fn new(settings: &ProviderSettings, pipeline: &PipelineConfig) -> Result<Self, ApiError> {
        Ok(Self {
            api: settings.build_api(pipeline)?,
            rate_limit: settings.rate_limit()?,
        })
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
    pub fn api(&self) -> &BlockchainApi<Haskoin> {
        &self.api
    }

    fn route(address: &str, for_transactions: bool) -> (HaskoinRequest, CallOptions) {
        let options = CallOptions::new().extra("address", address);
        match Derivation::detect(address) {
            Some(derivation) => {
                let xpub = address.to_string();
                let request = if for_transactions {
                    HaskoinRequest::XpubTransactions { xpub }
                } else {
                    HaskoinRequest::XpubBalance { xpub }
                };
                (request, options.param("derive", derivation.as_str()))
            }
            None => {
                let address = address.to_string();
                let request = if for_transactions {
                    HaskoinRequest::AddressTransactions { address }
                } else {
                    HaskoinRequest::AddressBalance { address }
                };
                (request, options)
            }
        }
    }
}

impl BalanceFetcher for HaskoinClient {
    async fn fetch_balances(&self, address: &str) -> FetchResult {
        let (request, options) = Self::route(address, false);
        debug!(request = request.name(), "fetching haskoin balance");
        self.api.get_data(&request, &options).await
    }
}

impl BalanceParser for HaskoinClient {
    /// Confirmed balance only; unconfirmed amounts are ignored
    fn parse_balances(&self, fetched: &FetchResult) -> ParseResult<Balance> {
        if fetched.is_err() {
            return ParseResult::from_fetch_errors(fetched);
        }

        // xpub summaries nest the amounts under `balance`
        let summary = fetched.data.get("balance").unwrap_or(&fetched.data);
        let raw = match summary.get("confirmed") {
            Some(Value::Number(amount)) => amount.to_string(),
            Some(Value::String(amount)) => amount.clone(),
            _ => {
                return ParseResult::failed(vec![
                    "InvalidResponse: balance response has no confirmed amount".to_string(),
                ]);
            }
        };

        match Balance::from_raw_units(CHAIN.symbol(), &raw, CHAIN.decimals()) {
            Ok(balance) => ParseResult::ok(vec![balance]),
            Err(error) => ParseResult::failed(vec![error.to_normalized_string()]),
        }
    }
}

impl BalanceProvider for HaskoinClient {
    async fn get_balance(&self, address: &str) -> Result<Vec<Balance>, ApiError> {
        fetch_and_parse_balance(self, address).await
    }
}

impl TransactionsProvider for HaskoinClient {
    async fn get_transactions(
        &self,
        address: &str,
        offset: u32,
        limit: u32,
        unconfirmed: bool,
    ) -> Result<Vec<Transaction>, ApiError> {
        let (request, options) = Self::route(address, true);
        let options = options
            .param("offset", offset.to_string())
            .param("limit", limit.to_string());

        let transactions: Vec<HaskoinTransaction> = self.api.get_json(&request, &options).await?;
        debug!(count = transactions.len(), "received haskoin transactions");

        transactions
            .into_iter()
            .filter(|tx| unconfirmed || tx.block.height.is_some())
            .map(HaskoinTransaction::into_transaction)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use bigdecimal::BigDecimal;
    use serde_json::json;

    use super::*;

    fn dec(amount: &str) -> BigDecimal {
        amount.parse().unwrap()
    }

    fn client() -> HaskoinClient {
        HaskoinClient::new(&ProviderSettings::default(), &PipelineConfig::default()).unwrap()
    }

    #[test]
    fn derivation_follows_key_prefix() {
        assert_eq!(Derivation::detect("xpub6CUGRU"), Some(Derivation::Standard));
        assert_eq!(Derivation::detect("ypub6Ww3ib"), Some(Derivation::Compat));
        assert_eq!(Derivation::detect("zpub6rFR7y"), Some(Derivation::Segwit));
        assert_eq!(Derivation::detect("bc1qar0srrr7"), None);
        assert_eq!(Derivation::detect("1A1"), None);
    }

    #[test]
    fn routes_xpub_to_xpub_endpoint() {
        let (request, options) = HaskoinClient::route("zpub6rFR7y", false);
        assert_eq!(
            request,
            HaskoinRequest::XpubBalance {
                xpub: "zpub6rFR7y".to_string()
            }
        );
        assert_eq!(
            options.params,
            vec![("derive".to_string(), "segwit".to_string())]
        );

        let (request, options) = HaskoinClient::route("bc1qxyz", true);
        assert_eq!(request.template(), "address/{address}/transactions/full");
        assert!(options.params.is_empty());
    }

    #[test]
    fn uses_default_base_url() {
        assert_eq!(
            client().api().base_url().as_str(),
            "https://api.haskoin.com/btc/"
        );
    }

    #[test]
    fn parses_xpub_summary() {
        let fetched = FetchResult::success(
            200,
            json!({"balance": {"confirmed": 12_706_308, "unconfirmed": 5}, "indices": {}}),
        );

        let parsed = client().parse_balances(&fetched);

        let balances = parsed.into_items();
        assert_eq!(balances.len(), 1);
        assert_eq!(balances[0].symbol, "BTC");
        assert_eq!(balances[0].amount, dec("0.12706308"));
    }

    #[test]
    fn parses_address_balance() {
        let fetched = FetchResult::success(
            200,
            json!({"address": "bc1q", "confirmed": 100_000_000, "unconfirmed": 0}),
        );

        let balances = client().parse_balances(&fetched).into_items();

        assert_eq!(balances[0].amount, dec("1"));
    }

    #[test]
    fn parse_carries_fetch_errors() {
        let fetched = FetchResult::failure(400, "Bad Request");

        let parsed = client().parse_balances(&fetched);

        assert!(parsed.data.is_none());
        assert_eq!(parsed.errors, vec!["Bad Request".to_string()]);
    }

    #[test]
    fn parse_rejects_missing_amount() {
        let parsed = client().parse_balances(&FetchResult::success(200, json!({})));
        assert!(parsed.is_err());
        assert!(parsed.data.is_none());
    }

    #[test]
    fn converts_transactions() {
        let raw: HaskoinTransaction = serde_json::from_value(json!({
            "txid": "abcd",
            "fee": 1500,
            "time": 1_600_000_000,
            "block": {"height": 650_000, "position": 3},
            "inputs": [{"address": "bc1qin", "value": 101_500}],
            "outputs": [{"address": "bc1qout", "value": 100_000}, {"address": null, "value": 0}]
        }))
        .unwrap();

        let tx = raw.into_transaction().unwrap();

        assert_eq!(tx.hash, "abcd");
        assert!(tx.confirmed);
        assert_eq!(tx.block_height, Some(650_000));
        assert_eq!(tx.fee, Some(dec("0.000015")));
        assert_eq!(tx.outputs[0].amount, dec("0.001"));
        assert_eq!(tx.outputs[1].address, None);
        assert_eq!(tx.timestamp.unwrap().timestamp(), 1_600_000_000);
    }
}
