// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Capability traits implemented by provider adapters
//!
//! An adapter implements only the capabilities its upstream supports. The
//! fail-fast capabilities return domain values or an [`ApiError`]; the
//! fetch/parse pairs split raw retrieval ([`FetchResult`]) from interpretation
//! ([`ParseResult`]) so partial failures can be reported alongside data.

use std::future::Future;

use tracing::warn;

use crate::{
    ApiError, Balance, Collection, FetchResult, Listing, Nft, Offer, ParseResult, Pool,
    Transaction,
};

/// Balances held by an address
pub trait BalanceProvider: Send + Sync {
    /// Current balances of `address`
    fn get_balance(
        &self,
        address: &str,
    ) -> impl Future<Output = Result<Vec<Balance>, ApiError>> + Send;
}

/// Transaction history of an address
pub trait TransactionsProvider: Send + Sync {
    /// A window of the history of `address`, newest first
    ///
    /// `unconfirmed` includes mempool transactions when the upstream reports them.
    fn get_transactions(
        &self,
        address: &str,
        offset: u32,
        limit: u32,
        unconfirmed: bool,
    ) -> impl Future<Output = Result<Vec<Transaction>, ApiError>> + Send;
}

/// DeFi positions of an address
pub trait PortfolioProvider: Send + Sync {
    /// Liquidity pools `address` participates in
    fn get_portfolio(
        &self,
        address: &str,
    ) -> impl Future<Output = Result<Vec<Pool>, ApiError>> + Send;
}

/// Raw balance retrieval
pub trait BalanceFetcher: Send + Sync {
    /// Fetch the raw balance payload of `address`
    fn fetch_balances(&self, address: &str) -> impl Future<Output = FetchResult> + Send;
}

/// Balance payload interpretation
pub trait BalanceParser {
    /// Interpret a balance payload
    fn parse_balances(&self, fetched: &FetchResult) -> ParseResult<Balance>;
}

/// Raw NFT retrieval
pub trait NftProvider: Send + Sync {
    /// One page of NFTs owned by `address`
    fn fetch_nfts(
        &self,
        address: &str,
        cursor: Option<&str>,
    ) -> impl Future<Output = FetchResult> + Send;

    /// One page of offers made on NFTs owned by `address`
    fn fetch_offers(
        &self,
        address: &str,
        cursor: Option<&str>,
    ) -> impl Future<Output = FetchResult> + Send;

    /// One page of active listings by `address`
    fn fetch_listings(
        &self,
        address: &str,
        cursor: Option<&str>,
    ) -> impl Future<Output = FetchResult> + Send;

    /// Statistics of one collection
    fn fetch_collection_stats(&self, collection_id: &str)
    -> impl Future<Output = FetchResult> + Send;
}

/// NFT payload interpretation
pub trait NftParser {
    /// Interpret an NFT page
    fn parse_nfts(&self, fetched: &FetchResult) -> ParseResult<Nft>;

    /// Interpret an offers page
    fn parse_offers(&self, fetched: &FetchResult) -> ParseResult<Offer>;

    /// Interpret a listings page
    fn parse_listings(&self, fetched: &FetchResult) -> ParseResult<Listing>;

    /// Interpret a collection statistics payload
    fn parse_collections(&self, fetched: &FetchResult) -> ParseResult<Collection>;
}

/// Fetch and parse balances of `address`, failing on the first fetch error
///
/// Fetch errors are never mixed with partial data: any error reported by
/// [`BalanceFetcher::fetch_balances`] is returned as [`ApiError::Fetch`] carrying
/// the first message. A parse without data yields an empty list.
///
/// # Errors
///
/// Returns [`ApiError::Fetch`] when the fetch reports an error
pub async fn fetch_and_parse_balance<P>(provider: &P, address: &str) -> Result<Vec<Balance>, ApiError>
where
    P: BalanceFetcher + BalanceParser,
{
    let fetched = provider.fetch_balances(address).await;
    if let Some(message) = fetched.first_error() {
        warn!(
            address,
            status = fetched.status_code,
            errors = fetched.errors.len(),
            "balance fetch failed"
        );
        return Err(ApiError::Fetch {
            message: message.to_string(),
        });
    }

    let parsed = provider.parse_balances(&fetched);
    if parsed.is_err() {
        warn!(address, errors = ?parsed.errors, "balance parse reported errors");
    }
    Ok(parsed.data.unwrap_or_default())
}
