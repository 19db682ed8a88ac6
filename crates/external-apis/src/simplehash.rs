// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! SimpleHash integration for NFTs
//!
//! Every wallet endpoint is cursor-paginated: the fetch side lifts
//! `next_cursor` onto [`FetchResult::cursor`] so [`collect_pages`] can follow it,
//! and the parse side carries it into [`ParseResult::cursor`]. Entries that cannot
//! be interpreted are reported as errors next to the ones that could.

use std::{sync::Arc, time::Duration};

use api_client::{
    ApiError, ApiOptions, ApiProvider, BlockchainApi, CallOptions, Collection, Endpoint,
    FetchResult, Listing, Nft, NftParser, NftProvider, Offer, ParseResult, PipelineConfig,
    RateLimiter, Sleeper, collect_pages, scale_raw_units,
};
use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;
use shared_types::Blockchain;
use tracing::debug;

use crate::ProviderSettings;

const PAGE_SIZE: &str = "50";

/// SimpleHash provider description
#[derive(Debug)]
pub struct SimpleHash;

impl ApiProvider for SimpleHash {
    const NAME: &'static str = "simplehash";
    const OPTIONS: ApiOptions = ApiOptions {
        blockchain: Blockchain::Ethereum,
        base_url: "https://api.simplehash.com/",
        rate_limit: Duration::from_millis(200),
    };
    type Request = SimpleHashRequest;
}

/// Requests supported by SimpleHash
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum SimpleHashRequest {
    NftsByOwner,
    BidsByWallet,
    ListingsByWallet,
    CollectionsById,
}

impl Endpoint for SimpleHashRequest {
    fn name(&self) -> &'static str {
        match self {
            Self::NftsByOwner => "nfts_by_owner",
            Self::BidsByWallet => "bids_by_wallet",
            Self::ListingsByWallet => "listings_by_wallet",
            Self::CollectionsById => "collections_by_id",
        }
    }

    fn template(&self) -> &'static str {
        match self {
            Self::NftsByOwner => "api/v0/nfts/owners",
            Self::BidsByWallet => "api/v0/nfts/bids/wallets",
            Self::ListingsByWallet => "api/v0/nfts/listings/wallets",
            Self::CollectionsById => "api/v0/nfts/collections/ids",
        }
    }

    fn args(&self) -> Vec<(&'static str, String)> {
        Vec::new()
    }
}

/// Blockchains SimpleHash indexes
pub fn supports(chain: Blockchain) -> bool {
    chain.is_evm() || chain == Blockchain::Solana
}

/// SimpleHash client bound to one blockchain
#[derive(Debug)]
pub struct SimpleHashClient {
    api: BlockchainApi<SimpleHash>,
    rate_limit: Option<Duration>,
    chain: Blockchain,
}

impl SimpleHashClient {
    /// Create a client for `chain` from provider settings
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Configuration`] if the settings are unusable or carry
    /// no API key, and [`ApiError::InvalidInput`] for chains SimpleHash does not index
    pub fn new(
        settings: &ProviderSettings,
        pipeline: &PipelineConfig,
        chain: Blockchain,
    ) -> Result<Self, ApiError> {
        if !supports(chain) {
            return Err(ApiError::invalid_input(format!(
                "simplehash does not index {chain}"
            )));
        }
        let api: BlockchainApi<SimpleHash> = settings.build_api(pipeline)?;
        if api.api_key().is_none() {
            return Err(ApiError::configuration("simplehash requires an API key"));
        }
        Ok(Self {
            api,
            rate_limit: settings.rate_limit()?,
            chain,
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

    /// Blockchain queried
    pub fn chain(&self) -> Blockchain {
        self.chain
    }

    /// Underlying pipeline
    pub fn api(&self) -> &BlockchainApi<SimpleHash> {
        &self.api
    }

    /// Every NFT owned by `address`, following cursors up to `max_pages` pages
    ///
    /// Returns the items gathered so far together with the errors of the page that failed, if any.
    pub async fn fetch_all_nfts(&self, address: &str, max_pages: Option<usize>) -> ParseResult<Nft> {
        let mut fetched = collect_pages("nfts", max_pages, |cursor: Option<String>| async move {
            self.fetch_nfts(address, cursor.as_deref()).await
        })
        .await;

        // the union of earlier pages is parsed even when the last page failed
        let page_errors = std::mem::take(&mut fetched.errors);
        let mut parsed = self.parse_nfts(&fetched);
        parsed.errors.splice(0..0, page_errors);
        parsed
    }

    fn wallet_options(&self, address: &str, cursor: Option<&str>) -> CallOptions {
        self.authenticated()
            .param("chains", self.chain.identifier())
            .param("wallet_addresses", address)
            .param("limit", PAGE_SIZE)
            .param_opt("cursor", cursor)
            .extra("address", address)
    }

    fn authenticated(&self) -> CallOptions {
        match self.api.api_key() {
            Some(key) => CallOptions::new().header("X-API-KEY", key.expose()),
            None => CallOptions::new(),
        }
    }

    async fn fetch_page(&self, request: SimpleHashRequest, options: &CallOptions) -> FetchResult {
        let fetched = self.api.get_data(&request, options).await;
        let cursor = fetched
            .data
            .get("next_cursor")
            .and_then(Value::as_str)
            .filter(|cursor| !cursor.is_empty())
            .map(str::to_string);
        debug!(
            request = request.name(),
            status = fetched.status_code,
            has_next = cursor.is_some(),
            "fetched simplehash page"
        );
        fetched.with_cursor(cursor)
    }
}

impl NftProvider for SimpleHashClient {
    async fn fetch_nfts(&self, address: &str, cursor: Option<&str>) -> FetchResult {
        let options = self.wallet_options(address, cursor);
        self.fetch_page(SimpleHashRequest::NftsByOwner, &options)
            .await
    }

    async fn fetch_offers(&self, address: &str, cursor: Option<&str>) -> FetchResult {
        let options = self.wallet_options(address, cursor);
        self.fetch_page(SimpleHashRequest::BidsByWallet, &options)
            .await
    }

    async fn fetch_listings(&self, address: &str, cursor: Option<&str>) -> FetchResult {
        let options = self.wallet_options(address, cursor);
        self.fetch_page(SimpleHashRequest::ListingsByWallet, &options)
            .await
    }

    async fn fetch_collection_stats(&self, collection_id: &str) -> FetchResult {
        let options = self
            .authenticated()
            .param("collection_ids", collection_id)
            .extra("collection_id", collection_id);
        self.fetch_page(SimpleHashRequest::CollectionsById, &options)
            .await
    }
}

impl NftParser for SimpleHashClient {
    fn parse_nfts(&self, fetched: &FetchResult) -> ParseResult<Nft> {
        let owner = fetched.extra_str("address");
        parse_items(fetched, "nfts", |item| parse_nft(item, owner))
    }

    fn parse_offers(&self, fetched: &FetchResult) -> ParseResult<Offer> {
        parse_items(fetched, "bids", parse_offer)
    }

    fn parse_listings(&self, fetched: &FetchResult) -> ParseResult<Listing> {
        parse_items(fetched, "listings", parse_listing)
    }

    fn parse_collections(&self, fetched: &FetchResult) -> ParseResult<Collection> {
        parse_items(fetched, "collections", |item| {
            parse_collection(item, self.chain.symbol())
        })
    }
}

/// Apply `parse` to every entry of the `key` array
fn parse_items<T>(
    fetched: &FetchResult,
    key: &str,
    parse: impl Fn(&Value) -> Result<T, String>,
) -> ParseResult<T> {
    if fetched.is_err() {
        return ParseResult::from_fetch_errors(fetched);
    }

    let Some(entries) = fetched.data.get(key).and_then(Value::as_array) else {
        return ParseResult::failed(vec![format!(
            "InvalidResponse: response has no `{key}` array"
        )])
        .with_cursor(fetched.cursor.clone());
    };

    let mut items = Vec::with_capacity(entries.len());
    let mut errors = Vec::new();
    for (index, entry) in entries.iter().enumerate() {
        match parse(entry) {
            Ok(item) => items.push(item),
            Err(reason) => errors.push(format!("InvalidResponse: {key}[{index}] {reason}")),
        }
    }

    let mut parsed = ParseResult::ok(items).with_cursor(fetched.cursor.clone());
    parsed.errors = errors;
    parsed
}

fn parse_nft(item: &Value, owner: Option<&str>) -> Result<Nft, String> {
    let contract = required_str(item, "contract_address")?;
    let token_id = item
        .get("token_id")
        .and_then(Value::as_str)
        .or_else(|| item.get("nft_id").and_then(Value::as_str))
        .ok_or("has no token_id")?;
    let collection = item.get("collection");

    let holding = owner.and_then(|owner| {
        item.get("owners")?
            .as_array()?
            .iter()
            .find(|entry| {
                entry
                    .get("owner_address")
                    .and_then(Value::as_str)
                    .is_some_and(|address| address.eq_ignore_ascii_case(owner))
            })
    });

    Ok(Nft {
        contract: contract.to_string(),
        token_id: token_id.to_string(),
        name: optional_str(item, "name"),
        collection_id: collection.and_then(|c| optional_str(c, "collection_id")),
        collection_name: collection.and_then(|c| optional_str(c, "name")),
        image_url: optional_str(item, "image_url")
            .or_else(|| collection.and_then(|c| optional_str(c, "image_url"))),
        quantity: holding
            .and_then(|entry| entry.get("quantity"))
            .and_then(Value::as_u64)
            .unwrap_or(1),
        owner: holding
            .and_then(|entry| optional_str(entry, "owner_address"))
            .or_else(|| owner.map(str::to_string)),
    })
}

fn parse_offer(item: &Value) -> Result<Offer, String> {
    let (price, currency) = priced(item)?;
    Ok(Offer {
        nft_id: optional_str(item, "nft_id"),
        collection_id: optional_str(item, "collection_id"),
        price,
        currency,
        bidder: optional_str(item, "bidder_address"),
        expires_at: item
            .get("expiration_timestamp")
            .and_then(Value::as_str)
            .and_then(parse_timestamp),
    })
}

fn parse_listing(item: &Value) -> Result<Listing, String> {
    let nft_id = required_str(item, "nft_id")?;
    let (price, currency) = priced(item)?;
    Ok(Listing {
        nft_id: nft_id.to_string(),
        marketplace: optional_str(item, "marketplace_id"),
        price,
        currency,
        seller: optional_str(item, "seller_address"),
        listed_at: item
            .get("listing_timestamp")
            .and_then(Value::as_str)
            .and_then(parse_timestamp),
    })
}

/// The floor is the lowest price in the chain's native currency, else the
/// lowest price in the currency of the first quoted floor
fn parse_collection(item: &Value, native: &str) -> Result<Collection, String> {
    let id = required_str(item, "collection_id")?;

    let floors: Vec<(BigDecimal, String)> = item
        .get("floor_prices")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|floor| priced(floor).ok())
        .collect();
    let currency = floors
        .iter()
        .find(|(_, currency)| currency == native)
        .or_else(|| floors.first())
        .map(|(_, currency)| currency.clone());
    let floor = currency.and_then(|currency| {
        floors
            .into_iter()
            .filter(|(_, quoted)| *quoted == currency)
            .min_by(|(a, _), (b, _)| a.cmp(b))
    });

    let (floor_price, floor_currency) = floor.unzip();
    Ok(Collection {
        id: id.to_string(),
        name: optional_str(item, "name"),
        floor_price,
        floor_currency,
        owners: item.get("distinct_owner_count").and_then(Value::as_u64),
        total_supply: item
            .get("total_quantity")
            .or_else(|| item.get("distinct_nft_count"))
            .and_then(Value::as_u64),
    })
}

/// Raw `price` / `value` scaled by the payment token's decimals, with its symbol
fn priced(item: &Value) -> Result<(BigDecimal, String), String> {
    let token = item.get("payment_token").ok_or("has no payment_token")?;
    let currency = required_str(token, "symbol")?.to_string();
    let decimals = token
        .get("decimals")
        .and_then(Value::as_u64)
        .and_then(|decimals| u32::try_from(decimals).ok())
        .ok_or("payment_token has no decimals")?;

    let raw = match item.get("price").or_else(|| item.get("value")) {
        Some(Value::Number(raw)) => raw.to_string(),
        Some(Value::String(raw)) => raw.clone(),
        _ => return Err("has no price".to_string()),
    };
    let price = scale_raw_units(&raw, decimals).map_err(|e| e.to_string())?;
    Ok((price, currency))
}

fn required_str<'a>(item: &'a Value, key: &str) -> Result<&'a str, String> {
    item.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| format!("has no {key}"))
}

fn optional_str(item: &Value, key: &str) -> Option<String> {
    item.get(key).and_then(Value::as_str).map(str::to_string)
}

/// RFC 3339, or a naive ISO 8601 timestamp read as UTC
fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|date| date.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|naive| naive.and_utc())
        })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn client() -> SimpleHashClient {
        SimpleHashClient::new(
            &ProviderSettings::default().with_api_key("key"),
            &PipelineConfig::default(),
            Blockchain::Ethereum,
        )
        .unwrap()
    }

    fn dec(amount: &str) -> BigDecimal {
        amount.parse().unwrap()
    }

    #[test]
    fn rejects_unindexed_chains() {
        let error = SimpleHashClient::new(
            &ProviderSettings::default().with_api_key("key"),
            &PipelineConfig::default(),
            Blockchain::Bitcoin,
        )
        .unwrap_err();
        assert!(matches!(error, ApiError::InvalidInput { .. }));
        assert!(supports(Blockchain::Solana));
    }

    #[test]
    fn requires_api_key() {
        let error = SimpleHashClient::new(
            &ProviderSettings::default(),
            &PipelineConfig::default(),
            Blockchain::Ethereum,
        )
        .unwrap_err();
        assert!(matches!(error, ApiError::Configuration { .. }));
    }

    #[test]
    fn parses_nfts_with_partial_errors() {
        let fetched = FetchResult::success(
            200,
            json!({
                "next_cursor": "abc",
                "nfts": [
                    {
                        "nft_id": "ethereum.0xbc4c.1",
                        "contract_address": "0xBC4CA0EdA7647A8aB7C2061c2E118A18a936f13D",
                        "token_id": "1",
                        "name": "Ape #1",
                        "image_url": "https://img/1.png",
                        "collection": {"collection_id": "bayc", "name": "BAYC"},
                        "owners": [
                            {"owner_address": "0xOTHER", "quantity": 3},
                            {"owner_address": "0xOwner", "quantity": 2}
                        ]
                    },
                    {"token_id": "2"}
                ]
            }),
        )
        .with_cursor(Some("abc".to_string()))
        .with_extra([("address".to_string(), json!("0xowner"))].into());

        let parsed = client().parse_nfts(&fetched);

        assert_eq!(parsed.cursor.as_deref(), Some("abc"));
        assert_eq!(parsed.errors.len(), 1);
        assert!(parsed.errors[0].contains("nfts[1]"));
        let nfts = parsed.into_items();
        assert_eq!(nfts.len(), 1);
        assert_eq!(nfts[0].token_id, "1");
        assert_eq!(nfts[0].collection_name.as_deref(), Some("BAYC"));
        assert_eq!(nfts[0].quantity, 2);
        assert_eq!(nfts[0].owner.as_deref(), Some("0xOwner"));
    }

    #[test]
    fn parses_offers_and_listings() {
        let offers = FetchResult::success(
            200,
            json!({"bids": [{
                "collection_id": "bayc",
                "price": "1500000000000000000",
                "payment_token": {"symbol": "WETH", "decimals": 18},
                "bidder_address": "0xbidder",
                "expiration_timestamp": "2024-05-01T12:00:00Z"
            }]}),
        );
        let parsed = client().parse_offers(&offers).into_items();
        assert_eq!(parsed[0].price, dec("1.5"));
        assert_eq!(parsed[0].currency, "WETH");
        assert!(parsed[0].nft_id.is_none());
        assert_eq!(
            parsed[0].expires_at.unwrap().to_rfc3339(),
            "2024-05-01T12:00:00+00:00"
        );

        let listings = FetchResult::success(
            200,
            json!({"listings": [{
                "nft_id": "ethereum.0xbc4c.1",
                "marketplace_id": "opensea",
                "price": 2_000_000_000_000_000_000_u64,
                "payment_token": {"symbol": "ETH", "decimals": 18},
                "listing_timestamp": "2024-05-01T12:00:00"
            }]}),
        );
        let parsed = client().parse_listings(&listings).into_items();
        assert_eq!(parsed[0].price, dec("2"));
        assert_eq!(parsed[0].marketplace.as_deref(), Some("opensea"));
        assert!(parsed[0].listed_at.is_some());
    }

    #[test]
    fn collection_uses_lowest_floor() {
        let fetched = FetchResult::success(
            200,
            json!({"collections": [{
                "collection_id": "bayc",
                "name": "BAYC",
                "distinct_owner_count": 5500,
                "total_quantity": 10000,
                "floor_prices": [
                    {"marketplace_id": "opensea", "value": 12_000_000_000_000_000_000_u64, "payment_token": {"symbol": "ETH", "decimals": 18}},
                    {"marketplace_id": "blur", "value": 11_500_000_000_000_000_000_u64, "payment_token": {"symbol": "ETH", "decimals": 18}}
                ]
            }]}),
        );

        let collection = client().parse_collections(&fetched).into_items().remove(0);

        assert_eq!(collection.floor_price, Some(dec("11.5")));
        assert_eq!(collection.floor_currency.as_deref(), Some("ETH"));
        assert_eq!(collection.owners, Some(5500));
        assert_eq!(collection.total_supply, Some(10000));
    }

    #[test]
    fn collection_floor_never_mixes_currencies() {
        let floor = |value: u64, symbol: &str, decimals: u32| {
            json!({"value": value, "payment_token": {"symbol": symbol, "decimals": decimals}})
        };
        let collection = |floors: Vec<Value>| {
            let fetched = FetchResult::success(
                200,
                json!({"collections": [{"collection_id": "c", "floor_prices": floors}]}),
            );
            client().parse_collections(&fetched).into_items().remove(0)
        };

        let native_wins = collection(vec![
            floor(500_000, "USDC", 6),
            floor(1_000_000_000_000_000_000, "ETH", 18),
        ]);
        assert_eq!(native_wins.floor_price, Some(dec("1")));
        assert_eq!(native_wins.floor_currency.as_deref(), Some("ETH"));

        let first_currency_wins = collection(vec![
            floor(2_000_000, "USDC", 6),
            floor(1, "APE", 0),
            floor(1_500_000, "USDC", 6),
        ]);
        assert_eq!(first_currency_wins.floor_price, Some(dec("1.5")));
        assert_eq!(first_currency_wins.floor_currency.as_deref(), Some("USDC"));

        assert!(collection(vec![]).floor_price.is_none());
    }

    #[test]
    fn fetch_errors_pass_through() {
        let fetched = FetchResult::failure(429, "Too Many Requests");
        let parsed = client().parse_listings(&fetched);
        assert!(parsed.data.is_none());
        assert_eq!(parsed.errors, vec!["Too Many Requests".to_string()]);
    }

    #[test]
    fn missing_array_is_an_error() {
        let parsed = client().parse_offers(&FetchResult::success(200, json!({})));
        assert!(parsed.is_err());
        assert!(parsed.data.is_none());
    }
}
