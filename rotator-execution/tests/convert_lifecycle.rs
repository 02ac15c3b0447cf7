use chrono::Utc;
use rotator_execution::{
    ApiCredentials,
    balance::Wallet,
    client::binance::{BinanceConvertClient, ConvertClientConfig, OrderLookup},
    error::ClientError,
    executor::{ActionStatus, ConvertExecutor, ExecutorConfig},
    order::{ConvertRoute, RebalanceAction},
};
use rotator_integration::backoff::Backoff;
use rust_decimal_macros::dec;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_client(server: &MockServer, dir: &tempfile::TempDir) -> BinanceConvertClient {
    let mut config = ConvertClientConfig::new(
        ApiCredentials::new("test-key".to_string(), "test-secret".to_string()),
        server.uri(),
    );
    config.qps = 500.0;
    config.burst = 100;
    config.backoff = Backoff::new(Duration::from_millis(1), Duration::from_millis(5), 2);
    config.daily_quota_path = dir.path().join("quote_count.json");
    BinanceConvertClient::new(config).expect("client config is valid")
}

fn executor_for(client: &BinanceConvertClient) -> ConvertExecutor {
    ConvertExecutor::new(
        client.clone(),
        ExecutorConfig {
            wallet: Wallet::Spot,
            poll_interval: Duration::from_millis(5),
            poll_deadline: Duration::from_millis(500),
            reconcile_lookback: Duration::from_secs(3600),
            dry_run: false,
        },
    )
}

fn quote_body(quote_id: &str, valid_timestamp: i64) -> serde_json::Value {
    json!({
        "quoteId": quote_id,
        "ratio": "0.000026",
        "inverseRatio": "38461.5",
        "validTimestamp": valid_timestamp,
        "toAmount": "0.0026",
        "fromAmount": "100"
    })
}

fn pair_body(from: &str, to: &str) -> serde_json::Value {
    json!([{
        "fromAsset": from,
        "toAsset": to,
        "fromAssetMinAmount": "1",
        "fromAssetMaxAmount": "100000",
        "toAssetMinAmount": "0.0001",
        "toAssetMaxAmount": "100"
    }])
}

async fn mount_pair_info(server: &MockServer, from: &str, to: &str) {
    Mock::given(method("GET"))
        .and(path("/sapi/v1/convert/exchangeInfo"))
        .and(query_param("fromAsset", from))
        .and(query_param("toAsset", to))
        .respond_with(ResponseTemplate::new(200).set_body_json(pair_body(from, to)))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_accept_quote_idempotency_shield() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let client = test_client(&server, &dir);

    // exactly one network accept for Q1, enforced by wiremock
    Mock::given(method("POST"))
        .and(path("/sapi/v1/convert/acceptQuote"))
        .and(body_string_contains("quoteId=Q1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "orderId": "933256278426274426",
            "createTime": 1623381330472u64
        })))
        .expect(1)
        .mount(&server)
        .await;

    let first = client.accept_quote("Q1").await.unwrap();
    assert!(!first.duplicate);
    assert_eq!(first.order_id.as_deref(), Some("933256278426274426"));

    let second = client.accept_quote("Q1").await.unwrap();
    assert!(second.duplicate);
    assert_eq!(second.order_id, None);

    // empty quoteId is a configuration error, no network either
    assert!(matches!(
        client.accept_quote("").await,
        Err(ClientError::BadRequest(_))
    ));

    // begin_cycle empties the shield again
    client.begin_cycle();
}

#[tokio::test]
async fn test_clock_skew_resync_and_single_retry() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let client = test_client(&server, &dir);

    let server_time = Utc::now().timestamp_millis() + 7_000;

    // first signed call rejected for clock skew...
    Mock::given(method("GET"))
        .and(path("/sapi/v1/convert/orderStatus"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "code": -1021,
            "msg": "Timestamp for this request is outside of the recvWindow."
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    // ...then accepted after the offset is re-aligned
    Mock::given(method("GET"))
        .and(path("/sapi/v1/convert/orderStatus"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "orderId": 940708407462087195u64,
            "orderStatus": "SUCCESS",
            "fromAsset": "USDT",
            "fromAmount": "100",
            "toAsset": "BNB",
            "toAmount": "0.3",
            "ratio": "0.003",
            "createTime": 1623381330472u64
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v3/time"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "serverTime": server_time })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let order = client
        .order_status(OrderLookup::OrderId("940708407462087195".to_string()))
        .await
        .unwrap();
    assert_eq!(order.order_id, "940708407462087195");

    // offset now equals observed serverTime - localTime (within slop)
    let offset = client.clock().offset_ms();
    assert!((5_000..=9_000).contains(&offset), "offset was {offset}");
}

#[tokio::test]
async fn test_expired_quote_requotes_once_without_accept() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let client = test_client(&server, &dir);

    mount_pair_info(&server, "USDT", "BTC").await;

    // both quotes already expired (1ms in the past)
    let expired = Utc::now().timestamp_millis() - 1;
    Mock::given(method("POST"))
        .and(path("/sapi/v1/convert/getQuote"))
        .respond_with(ResponseTemplate::new(200).set_body_json(quote_body("QX", expired)))
        .expect(2)
        .mount(&server)
        .await;

    // acceptQuote must never fire
    Mock::given(method("POST"))
        .and(path("/sapi/v1/convert/acceptQuote"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"orderId": "1"})))
        .expect(0)
        .mount(&server)
        .await;

    let executor = executor_for(&client);
    let action = RebalanceAction::new(
        "USDT".into(),
        "BTC".into(),
        dec!(100),
        ConvertRoute::direct("USDT", "BTC", dec!(1), dec!(100000)),
    );

    let outcome = executor.execute(&action, None).await;
    assert_eq!(outcome.status, ActionStatus::Skipped);
    assert_eq!(outcome.records.len(), 1);
    let record = &outcome.records[0];
    assert!(!record.accepted);
    assert_eq!(record.error_msg.as_deref(), Some("quote expired"));
}

#[tokio::test]
async fn test_full_lifecycle_success() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let client = test_client(&server, &dir);

    mount_pair_info(&server, "USDT", "BTC").await;

    let valid = Utc::now().timestamp_millis() + 60_000;
    Mock::given(method("POST"))
        .and(path("/sapi/v1/convert/getQuote"))
        .and(body_string_contains("fromAsset=USDT"))
        .and(body_string_contains("walletType=SPOT"))
        .respond_with(ResponseTemplate::new(200).set_body_json(quote_body("Q-OK", valid)))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/sapi/v1/convert/acceptQuote"))
        .and(body_string_contains("quoteId=Q-OK"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "orderId": "555001",
            "createTime": 1623381330472u64
        })))
        .expect(1)
        .mount(&server)
        .await;

    // first poll in flight, second poll settled
    Mock::given(method("GET"))
        .and(path("/sapi/v1/convert/orderStatus"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "orderId": "555001",
            "orderStatus": "PROCESS",
            "fromAsset": "USDT",
            "fromAmount": "100",
            "toAsset": "BTC",
            "toAmount": "0.0026",
            "ratio": "0.000026",
            "createTime": 1623381330472u64
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/sapi/v1/convert/orderStatus"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "orderId": "555001",
            "orderStatus": "SUCCESS",
            "fromAsset": "USDT",
            "fromAmount": "100",
            "toAsset": "BTC",
            "toAmount": "0.0026",
            "ratio": "0.000026",
            "createTime": 1623381330472u64
        })))
        .mount(&server)
        .await;

    let executor = executor_for(&client);
    let action = RebalanceAction::new(
        "USDT".into(),
        "BTC".into(),
        dec!(100),
        ConvertRoute::direct("USDT", "BTC", dec!(1), dec!(100000)),
    );

    let outcome = executor.execute(&action, Some(1.25)).await;
    assert_eq!(outcome.status, ActionStatus::Executed);

    let record = &outcome.records[0];
    assert!(record.accepted);
    assert_eq!(record.quote_id.as_deref(), Some("Q-OK"));
    assert_eq!(record.order_id.as_deref(), Some("555001"));
    assert_eq!(record.to_amount, Some(dec!(0.0026)));
    assert_eq!(record.score, Some(1.25));
}

#[tokio::test]
async fn test_lost_accept_reconciled_via_trade_flow() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let client = test_client(&server, &dir);

    mount_pair_info(&server, "USDT", "BTC").await;

    let valid = Utc::now().timestamp_millis() + 60_000;
    Mock::given(method("POST"))
        .and(path("/sapi/v1/convert/getQuote"))
        .respond_with(ResponseTemplate::new(200).set_body_json(quote_body("Q-LOST", valid)))
        .mount(&server)
        .await;

    // accept response lost: server errors exhaust the retry budget
    Mock::given(method("POST"))
        .and(path("/sapi/v1/convert/acceptQuote"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .mount(&server)
        .await;

    // but tradeFlow shows the order actually settled
    Mock::given(method("GET"))
        .and(path("/sapi/v1/convert/tradeFlow"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "list": [{
                "quoteId": "Q-LOST",
                "orderId": 777001u64,
                "orderStatus": "SUCCESS",
                "fromAsset": "USDT",
                "fromAmount": "100",
                "toAsset": "BTC",
                "toAmount": "0.0026",
                "ratio": "0.000026",
                "inverseRatio": "38461.5",
                "createTime": 1623381330472u64
            }],
            "moreData": false
        })))
        .expect(1)
        .mount(&server)
        .await;

    let executor = executor_for(&client);
    let action = RebalanceAction::new(
        "USDT".into(),
        "BTC".into(),
        dec!(100),
        ConvertRoute::direct("USDT", "BTC", dec!(1), dec!(100000)),
    );

    let outcome = executor.execute(&action, None).await;
    assert_eq!(outcome.status, ActionStatus::Executed);
    assert_eq!(outcome.records[0].order_id.as_deref(), Some("777001"));
}

#[tokio::test]
async fn test_trade_flow_span_rejected_locally() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let client = test_client(&server, &dir);

    let span = 31 * 24 * 60 * 60 * 1000 + 1;
    let result = client.trade_flow(0, span, None).await;
    assert!(matches!(result, Err(ClientError::BadRequest(_))));
    // nothing reached the network
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_dry_run_skips_signed_posts() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let client = test_client(&server, &dir);

    mount_pair_info(&server, "USDT", "BTC").await;

    let valid = Utc::now().timestamp_millis() + 60_000;
    Mock::given(method("POST"))
        .and(path("/sapi/v1/convert/getQuote"))
        .respond_with(ResponseTemplate::new(200).set_body_json(quote_body("Q-DRY", valid)))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/sapi/v1/convert/acceptQuote"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"orderId": "1"})))
        .expect(0)
        .mount(&server)
        .await;

    let executor = ConvertExecutor::new(
        client.clone(),
        ExecutorConfig {
            dry_run: true,
            ..ExecutorConfig::default()
        },
    );
    let action = RebalanceAction::new(
        "USDT".into(),
        "BTC".into(),
        dec!(100),
        ConvertRoute::direct("USDT", "BTC", dec!(1), dec!(100000)),
    );

    let outcome = executor.execute(&action, None).await;
    assert_eq!(outcome.status, ActionStatus::DryRun);
    assert_eq!(outcome.records[0].error_msg.as_deref(), Some("dry-run"));
}
