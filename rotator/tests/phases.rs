use chrono::Utc;
use rotator::{
    app::App,
    config::Config,
    position::{PositionState, PositionStore},
    ranker::{RankerConfig, ScoringWeights},
    scheduler::{Phase, Region, RegionLock, RegionWindows, Window},
};
use rotator_execution::{ApiCredentials, balance::Wallet};
use rotator_integration::backoff::Backoff;
use rust_decimal_macros::dec;
use serde_json::json;
use smol_str::SmolStr;
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_config(server: &MockServer, dir: &tempfile::TempDir) -> Config {
    let always = RegionWindows {
        analyze: Window::parse("00:00-23:59").unwrap(),
        trade: Window::parse("00:00-23:59").unwrap(),
    };

    Config {
        credentials: ApiCredentials::new("test-key".to_string(), "test-secret".to_string()),
        api_base: server.uri(),
        marketdata_base: server.uri(),
        recv_window_ms: 5_000,
        qps: 500.0,
        burst: 100,
        backoff: Backoff::new(Duration::from_millis(1), Duration::from_millis(5), 1),
        exchange_info_ttl: Duration::from_secs(300),
        ranker: RankerConfig {
            min_volume_usdt: dec!(1000),
            max_spread_bps: 50.0,
            top_k: 3,
            shortlist_mult: 2,
        },
        scoring_weights: ScoringWeights::default(),
        asia: always,
        us: always,
        jitter_sec: 0,
        dry_run: false,
        wallet: Wallet::Spot,
        drawdown_threshold: 0.10,
        pause_threshold: 0.25,
        rebalance_threshold: 0.08,
        state_path: dir.path().join("state/position.json"),
        log_root: dir.path().join("logs"),
        lock_dir: dir.path().join("locks"),
        quota_path: dir.path().join("logs/quote_count.json"),
        daily_quote_limit: 950,
        poll_interval: Duration::from_millis(5),
        poll_deadline: Duration::from_millis(200),
    }
}

async fn mount_common(server: &MockServer) {
    // Spot balances: BTC plus cash plus a leveraged token that must be blocked
    Mock::given(method("GET"))
        .and(path("/api/v3/account"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "balances": [
                {"asset": "BTC", "free": "0.5", "locked": "0"},
                {"asset": "USDT", "free": "1000", "locked": "0"},
                {"asset": "ETHUP", "free": "3", "locked": "0"}
            ]
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/sapi/v1/capital/config/getall"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"coin": "EUR", "isLegalMoney": true},
            {"coin": "BTC", "isLegalMoney": false}
        ])))
        .mount(server)
        .await;

    // Full Convert pair table
    Mock::given(method("GET"))
        .and(path("/sapi/v1/convert/exchangeInfo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"fromAsset": "BTC", "toAsset": "USDT", "fromAssetMinAmount": "0.0001", "fromAssetMaxAmount": "100"},
            {"fromAsset": "USDT", "toAsset": "BTC", "fromAssetMinAmount": "10", "fromAssetMaxAmount": "100000"},
            {"fromAsset": "USDT", "toAsset": "SOL", "fromAssetMinAmount": "10", "fromAssetMaxAmount": "100000"}
        ])))
        .mount(server)
        .await;

    // 24h stats for every symbol
    Mock::given(method("GET"))
        .and(path("/api/v3/ticker/24hr"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "symbol": "BTCUSDT",
                "lastPrice": "50000",
                "priceChangePercent": "2.0",
                "quoteVolume": "90000000",
                "bidPrice": "49990",
                "askPrice": "50010"
            },
            {
                "symbol": "SOLUSDT",
                "lastPrice": "100",
                "priceChangePercent": "5.0",
                "quoteVolume": "40000000",
                "bidPrice": "99.99",
                "askPrice": "100.01"
            }
        ])))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_pre_analyze_writes_convertibility_snapshot() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    mount_common(&server).await;

    let app = App::new(test_config(&server, &dir)).unwrap();
    let code = app.run(Region::Asia, &[Phase::PreAnalyze], None).await;
    assert_eq!(code, 0);

    let day = Utc::now().format("%Y-%m-%d").to_string();
    let csv = std::fs::read_to_string(dir.path().join("logs").join(&day).join("balance.pre.csv"))
        .unwrap();
    assert!(csv.contains("BTC,0.5,BTC,yes,"));
    assert!(csv.contains("ETHUP,3,,no,blocked_suffix"));
}

#[tokio::test]
async fn test_analyze_ranks_and_persists_candidates() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    mount_common(&server).await;

    let app = App::new(test_config(&server, &dir)).unwrap();
    let code = app.run(Region::Us, &[Phase::Analyze], None).await;
    assert_eq!(code, 0);

    let day = Utc::now().format("%Y-%m-%d").to_string();
    let json_path = dir
        .path()
        .join("logs")
        .join(&day)
        .join("candidates.us.json");
    let raw = std::fs::read_to_string(json_path).unwrap();
    let candidates: serde_json::Value = serde_json::from_str(&raw).unwrap();

    let list = candidates.as_array().unwrap();
    assert_eq!(list.len(), 2);
    // SOL's stronger momentum and tighter spread outweigh BTC's volume edge
    assert_eq!(list[0]["base"], "SOL");
    assert_eq!(list[0]["rank"], 1);
    assert_eq!(list[1]["base"], "BTC");
}

#[tokio::test]
async fn test_guard_dry_run_liquidates_on_portfolio_drawdown() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    mount_common(&server).await;

    // quotes for the dry-run liquidation legs
    Mock::given(method("POST"))
        .and(path("/sapi/v1/convert/getQuote"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "quoteId": "QG",
            "ratio": "50000",
            "inverseRatio": "0.00002",
            "validTimestamp": Utc::now().timestamp_millis() + 60_000,
            "toAmount": "25000",
            "fromAmount": "0.5"
        })))
        .mount(&server)
        .await;

    let config = test_config(&server, &dir);
    let store = PositionStore::new(config.state_path.clone());

    // peak equity 60k vs current ~26k: portfolio stop must fire
    let mut state = PositionState::default();
    state.assets.insert(SmolStr::new("BTC"), dec!(0.5));
    state.peaks.insert(SmolStr::new("BTC"), dec!(120000));
    state.portfolio_peak = dec!(60000);
    state.ts = Utc::now().timestamp_millis();
    store.save(&state).unwrap();

    let app = App::new(config).unwrap();
    let code = app.run(Region::Asia, &[Phase::Guard], Some(true)).await;
    assert_eq!(code, 0);

    let day = Utc::now().format("%Y-%m-%d").to_string();
    let log_dir = dir.path().join("logs").join(&day);
    let history = std::fs::read_to_string(log_dir.join("convert_history.json")).unwrap();
    assert!(history.contains("\"quoteId\":\"QG\""));
    assert!(history.contains("dry-run"));

    // dry run leaves the persisted peaks untouched
    let reloaded = store.load();
    assert_eq!(reloaded.portfolio_peak, dec!(60000));
}

#[tokio::test]
async fn test_lock_contention_fails_requested_phases() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    mount_common(&server).await;

    let config = test_config(&server, &dir);
    let lock_dir = config.lock_dir.clone();
    std::fs::create_dir_all(&lock_dir).unwrap();
    let _held = RegionLock::acquire(&lock_dir, Region::Asia).unwrap();

    let app = App::new(config).unwrap();
    let code = app
        .run(Region::Asia, &[Phase::PreAnalyze, Phase::Guard], None)
        .await;
    assert_eq!(
        code,
        Phase::PreAnalyze.exit_bit() | Phase::Guard.exit_bit()
    );
}
