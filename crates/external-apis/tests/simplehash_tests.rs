// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Integration tests for `SimpleHashClient`

use std::{str::FromStr, time::Duration};

use api_client::{NftParser, NftProvider};
use bigdecimal::BigDecimal;
use serde_json::json;
use shared_types::Blockchain;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{header, method, path, query_param, query_param_is_missing},
};

use fixtures::*;

const OWNERS_PATH: &str = "/api/v0/nfts/owners";

#[tokio::test]
async fn fetch_all_nfts_follows_cursors() {
    let mock_server = MockServer::start().await;
    let (client, _) = simplehash_client(&mock_server, Blockchain::Ethereum);

    Mock::given(method("GET"))
        .and(path(OWNERS_PATH))
        .and(header("X-API-KEY", TEST_API_KEY))
        .and(query_param("chains", "ethereum"))
        .and(query_param("wallet_addresses", ETH_ADDRESS))
        .and(query_param("cursor", "page-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(SimpleHashFixture::nfts_page(
            vec![SimpleHashFixture::nft("3", ETH_ADDRESS)],
            None,
        )))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path(OWNERS_PATH))
        .and(query_param("limit", "50"))
        .and(query_param_is_missing("cursor"))
        .respond_with(ResponseTemplate::new(200).set_body_json(SimpleHashFixture::nfts_page(
            vec![
                SimpleHashFixture::nft("1", ETH_ADDRESS),
                SimpleHashFixture::nft("2", ETH_ADDRESS),
            ],
            Some("page-2"),
        )))
        .expect(1)
        .mount(&mock_server)
        .await;

    let nfts = client.fetch_all_nfts(ETH_ADDRESS, None).await;

    assert!(!nfts.is_err(), "{:?}", nfts.errors);
    assert!(nfts.cursor.is_none());
    let nfts = nfts.into_items();
    let ids: Vec<_> = nfts.iter().map(|nft| nft.token_id.as_str()).collect();
    assert_eq!(ids, ["1", "2", "3"]);
    assert_eq!(nfts[0].name.as_deref(), Some("Ape #1"));
    assert_eq!(
        nfts[0].collection_name.as_deref(),
        Some("Bored Ape Yacht Club")
    );
    assert_eq!(nfts[0].owner.as_deref(), Some(ETH_ADDRESS));
    assert_eq!(nfts[0].quantity, 1);
}

#[tokio::test]
async fn max_pages_keeps_the_remaining_cursor() {
    let mock_server = MockServer::start().await;
    let (client, _) = simplehash_client(&mock_server, Blockchain::Ethereum);

    Mock::given(method("GET"))
        .and(path(OWNERS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(SimpleHashFixture::nfts_page(
            vec![SimpleHashFixture::nft("1", ETH_ADDRESS)],
            Some("page-2"),
        )))
        .expect(1)
        .mount(&mock_server)
        .await;

    let nfts = client.fetch_all_nfts(ETH_ADDRESS, Some(1)).await;

    assert_eq!(nfts.cursor.as_deref(), Some("page-2"));
    assert_eq!(nfts.into_items().len(), 1);
}

#[tokio::test]
async fn failed_page_keeps_earlier_items() {
    let mock_server = MockServer::start().await;
    let (client, _) = simplehash_client(&mock_server, Blockchain::Ethereum);

    Mock::given(method("GET"))
        .and(path(OWNERS_PATH))
        .and(query_param("cursor", "page-2"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path(OWNERS_PATH))
        .and(query_param_is_missing("cursor"))
        .respond_with(ResponseTemplate::new(200).set_body_json(SimpleHashFixture::nfts_page(
            vec![SimpleHashFixture::nft("1", ETH_ADDRESS)],
            Some("page-2"),
        )))
        .mount(&mock_server)
        .await;

    let nfts = client.fetch_all_nfts(ETH_ADDRESS, None).await;

    assert_eq!(nfts.errors, ["Internal Server Error"]);
    assert_eq!(nfts.into_items().len(), 1);
}

#[tokio::test]
async fn rate_limited_page_is_retried_after_backoff() {
    let mock_server = MockServer::start().await;
    let (client, sleeper) = simplehash_client(&mock_server, Blockchain::Polygon);

    Mock::given(method("GET"))
        .and(path(OWNERS_PATH))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "3"))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path(OWNERS_PATH))
        .and(query_param("chains", "polygon"))
        .respond_with(ResponseTemplate::new(200).set_body_json(SimpleHashFixture::nfts_page(
            vec![SimpleHashFixture::nft("7", ETH_ADDRESS)],
            None,
        )))
        .mount(&mock_server)
        .await;

    let nfts = client.fetch_all_nfts(ETH_ADDRESS, None).await;

    assert!(!nfts.is_err(), "{:?}", nfts.errors);
    assert_eq!(nfts.into_items().len(), 1);
    assert_eq!(sleeper.calls(), [Duration::from_secs(3)]);
    assert_eq!(client.api().remaining_retries(), 5);
}

#[tokio::test]
async fn listings_page_reports_bad_entries() {
    let mock_server = MockServer::start().await;
    let (client, _) = simplehash_client(&mock_server, Blockchain::Ethereum);

    Mock::given(method("GET"))
        .and(path("/api/v0/nfts/listings/wallets"))
        .and(query_param("cursor", "abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "next_cursor": "def",
            "listings": [
                {
                    "nft_id": "ethereum.0xbc4c.1",
                    "marketplace_id": "opensea",
                    "price": 1_500_000_000_000_000_000_u64,
                    "payment_token": {"symbol": "ETH", "decimals": 18},
                    "seller_address": ETH_ADDRESS,
                    "listing_timestamp": "2024-03-01T12:00:00"
                },
                {"marketplace_id": "blur"}
            ]
        })))
        .mount(&mock_server)
        .await;

    let fetched = client.fetch_listings(ETH_ADDRESS, Some("abc")).await;
    assert_eq!(fetched.cursor.as_deref(), Some("def"));

    let listings = client.parse_listings(&fetched);
    assert_eq!(listings.cursor.as_deref(), Some("def"));
    assert_eq!(listings.errors, ["InvalidResponse: listings[1] has no nft_id"]);
    let listings = listings.into_items();
    assert_eq!(listings.len(), 1);
    assert_eq!(listings[0].price, BigDecimal::from_str("1.5").unwrap());
    assert_eq!(listings[0].marketplace.as_deref(), Some("opensea"));
    assert!(listings[0].listed_at.is_some());
}
