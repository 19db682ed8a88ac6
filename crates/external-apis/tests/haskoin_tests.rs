// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Integration tests for `HaskoinClient`

use std::str::FromStr;

use api_client::{ApiError, BalanceProvider, TransactionsProvider};
use bigdecimal::BigDecimal;
use serde_json::json;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path, path_regex, query_param, query_param_is_missing},
};

use fixtures::*;

#[tokio::test]
async fn address_balance_is_confirmed_amount() {
    let mock_server = MockServer::start().await;
    let client = haskoin_client(&mock_server);

    Mock::given(method("GET"))
        .and(path(format!("/address/{BTC_ADDRESS}/balance")))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(HaskoinFixture::address_balance(150_000, 25_000)),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let balances = client.get_balance(BTC_ADDRESS).await.unwrap();

    assert_eq!(balances.len(), 1);
    assert_eq!(balances[0].symbol, "BTC");
    assert_eq!(balances[0].amount, BigDecimal::from_str("0.0015").unwrap());
    assert!(balances[0].contract.is_none());
}

#[tokio::test]
async fn xpub_balance_uses_derivation_parameter() {
    let mock_server = MockServer::start().await;
    let client = haskoin_client(&mock_server);

    Mock::given(method("GET"))
        .and(path(format!("/xpub/{XPUB}")))
        .and(query_param("derive", "standard"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(HaskoinFixture::xpub_balance(12_706_308)),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let balances = client.get_balance(XPUB).await.unwrap();

    assert_eq!(balances.len(), 1);
    assert_eq!(
        balances[0].amount,
        BigDecimal::from_str("0.12706308").unwrap()
    );
}

#[tokio::test]
async fn bad_request_fails_balance() {
    let mock_server = MockServer::start().await;
    let client = haskoin_client(&mock_server);

    Mock::given(method("GET"))
        .and(path("/address/not-an-address/balance"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "bad-request",
            "message": "Could not parse address"
        })))
        .mount(&mock_server)
        .await;

    let error = client.get_balance("not-an-address").await.unwrap_err();

    assert!(matches!(error, ApiError::Fetch { .. }));
    assert!(error.to_string().contains("Bad Request"), "{error}");
}

#[tokio::test]
async fn balance_body_without_amount_yields_nothing() {
    let mock_server = MockServer::start().await;
    let client = haskoin_client(&mock_server);

    Mock::given(method("GET"))
        .and(path(format!("/address/{BTC_ADDRESS}/balance")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"address": BTC_ADDRESS})))
        .mount(&mock_server)
        .await;

    let balances = client.get_balance(BTC_ADDRESS).await.unwrap();
    assert!(balances.is_empty());
}

#[tokio::test]
async fn transactions_forward_window_and_filter_unconfirmed() {
    let mock_server = MockServer::start().await;
    let client = haskoin_client(&mock_server);

    Mock::given(method("GET"))
        .and(path(format!("/address/{BTC_ADDRESS}/transactions/full")))
        .and(query_param("offset", "10"))
        .and(query_param("limit", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            HaskoinFixture::transaction("aa11", None, 1_700_000_500),
            HaskoinFixture::transaction("bb22", Some(820_000), 1_700_000_000),
        ])))
        .expect(2)
        .mount(&mock_server)
        .await;

    let confirmed = client
        .get_transactions(BTC_ADDRESS, 10, 2, false)
        .await
        .unwrap();
    assert_eq!(confirmed.len(), 1);
    let tx = &confirmed[0];
    assert_eq!(tx.hash, "bb22");
    assert_eq!(tx.block_height, Some(820_000));
    assert!(tx.confirmed);
    assert_eq!(tx.timestamp.unwrap().timestamp(), 1_700_000_000);
    assert_eq!(tx.fee, Some(BigDecimal::from_str("0.0000141").unwrap()));
    assert_eq!(tx.inputs.len(), 1);
    assert_eq!(tx.outputs.len(), 2);
    assert_eq!(
        tx.outputs[0].amount,
        BigDecimal::from_str("0.0006").unwrap()
    );

    let all = client
        .get_transactions(BTC_ADDRESS, 10, 2, true)
        .await
        .unwrap();
    assert_eq!(all.len(), 2);
    assert!(!all[0].confirmed);
}

#[tokio::test]
async fn transactions_surface_http_errors() {
    let mock_server = MockServer::start().await;
    let client = haskoin_client(&mock_server);

    Mock::given(method("GET"))
        .and(path(format!("/address/{BTC_ADDRESS}/transactions/full")))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let error = client
        .get_transactions(BTC_ADDRESS, 0, 10, false)
        .await
        .unwrap_err();
    assert_eq!(error.status(), Some(503));
    assert_eq!(error.to_string(), "Service Unavailable");
}

#[tokio::test]
async fn hostile_addresses_stay_in_the_balance_path() {
    let mock_server = MockServer::start().await;
    let client = haskoin_client(&mock_server);

    Mock::given(method("GET"))
        .and(path_regex(r"^/address/[^/]+/balance$"))
        .and(query_param_is_missing("x"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(HaskoinFixture::address_balance(100, 0)),
        )
        .expect(3)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(HaskoinFixture::xpub_balance(1)))
        .expect(0)
        .mount(&mock_server)
        .await;

    for address in ["../../eth/address/x", "abc?x=1", "abc#frag"] {
        let balances = client.get_balance(address).await.unwrap();
        assert_eq!(balances[0].amount, BigDecimal::from_str("0.000001").unwrap());
    }

    let error = client.get_balance("..").await.unwrap_err();
    assert!(matches!(error, ApiError::Fetch { .. }));
    assert!(error.to_string().starts_with("TemplateError: "), "{error}");
}
