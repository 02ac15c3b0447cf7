use crate::{
    ApiCredentials,
    amounts::{amount_str, floor_8dp},
    balance::{AssetBalance, Wallet},
    counters::{CycleCounters, DAILY_QUOTE_LIMIT, DailyQuota},
    error::ClientError,
    order::{Order, Quote},
};
use fnv::FnvHashMap;
use hmac::Mac;
use parking_lot::Mutex;
use rotator_integration::{
    backoff::Backoff,
    clock::Clock,
    protocol::http::rest::client::RestClient,
    rate_limit::RateLimiter,
};
use rust_decimal::Decimal;
use smol_str::SmolStr;
use std::{
    collections::HashSet,
    path::PathBuf,
    sync::Arc,
    time::{Duration, Instant},
};
use tracing::{debug, warn};

pub mod parser;
pub mod requests;
pub mod signer;

use parser::BinanceParser;
use requests::{
    accept_quote::{AcceptQuoteParams, PostAcceptQuote},
    account::{FundingAssetParams, GetAccount, PostFundingAssets},
    asset_info::{AssetPrecision, GetAssetInfo},
    capital::GetCapitalConfig,
    exchange_info::{ConvertPair, ExchangeInfoParams, GetExchangeInfo},
    get_quote::{GetQuoteParams, PostGetQuote},
    order_status::{GetOrderStatus, OrderStatusParams},
    trade_flow::{ConvertTrade, GetTradeFlow, TRADE_FLOW_MAX_SPAN_MS, TradeFlowParams},
};
use signer::{BinanceRequestSigner, BinanceSigner};

const SERVER_TIME_PATH: &str = "/api/v3/time";

/// Configuration for [`BinanceConvertClient`].
#[derive(Debug, Clone)]
pub struct ConvertClientConfig {
    pub credentials: ApiCredentials,
    pub api_base: String,
    pub recv_window_ms: u64,
    pub qps: f64,
    pub burst: u32,
    pub backoff: Backoff,
    pub exchange_info_ttl: Duration,
    pub daily_quota_path: PathBuf,
    pub daily_quote_limit: u32,
}

impl ConvertClientConfig {
    pub fn new(credentials: ApiCredentials, api_base: impl Into<String>) -> Self {
        Self {
            credentials,
            api_base: api_base.into(),
            recv_window_ms: 5_000,
            qps: 5.0,
            burst: 10,
            backoff: Backoff::default(),
            exchange_info_ttl: Duration::from_secs(300),
            daily_quota_path: PathBuf::from("logs/quote_count.json"),
            daily_quote_limit: DAILY_QUOTE_LIMIT,
        }
    }
}

/// Outcome of an `acceptQuote` call, including the synthetic duplicate marker
/// returned by the idempotency shield without touching the network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptedQuote {
    pub order_id: Option<String>,
    pub create_time: Option<i64>,
    pub duplicate: bool,
}

/// Lookup key for `orderStatus`: the venue requires exactly one of the two.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum OrderLookup {
    OrderId(String),
    QuoteId(String),
}

#[derive(Debug, Default)]
struct ExchangeInfoCache {
    pairs: FnvHashMap<(SmolStr, SmolStr), (Instant, Option<ConvertPair>)>,
    all: Option<(Instant, Vec<ConvertPair>)>,
    precisions: Option<Vec<AssetPrecision>>,
}

/// Signed Binance Convert client.
///
/// Owns the cross-cutting state the quote lifecycle depends on: the
/// process-wide accepted-quote shield, the TTL-bounded exchangeInfo cache,
/// per-cycle request/weight counters and the persistent daily quote quota.
/// Cheap to clone; clones share all of it.
#[derive(Debug, Clone)]
pub struct BinanceConvertClient {
    rest_client: RestClient<'static, BinanceRequestSigner, BinanceParser>,
    accepted_quotes: Arc<Mutex<HashSet<String>>>,
    cache: Arc<Mutex<ExchangeInfoCache>>,
    exchange_info_ttl: Duration,
    counters: CycleCounters,
    daily_quota: DailyQuota,
    clock: Clock,
}

impl BinanceConvertClient {
    pub fn new(config: ConvertClientConfig) -> Result<Self, ClientError> {
        let clock = Clock::new();
        let mac = hmac::Hmac::<sha2::Sha256>::new_from_slice(
            config.credentials.secret.as_bytes(),
        )
        .map_err(|_| ClientError::BadRequest("API secret is empty".to_string()))?;

        let strategy = BinanceRequestSigner::new(
            BinanceSigner::new(config.credentials.key, clock.clone(), config.recv_window_ms),
            mac,
            rotator_integration::protocol::http::private::encoder::HexEncoder,
        );

        let rest_client = RestClient::new(config.api_base, strategy, BinanceParser)
            .with_bucket(RateLimiter::new(config.qps, config.burst))
            .with_backoff(config.backoff)
            .with_clock(clock.clone())
            .with_time_path(SERVER_TIME_PATH);

        Ok(Self {
            rest_client,
            accepted_quotes: Arc::new(Mutex::new(HashSet::new())),
            cache: Arc::new(Mutex::new(ExchangeInfoCache::default())),
            exchange_info_ttl: config.exchange_info_ttl,
            counters: CycleCounters::new(),
            daily_quota: DailyQuota::new(config.daily_quota_path, config.daily_quote_limit),
            clock,
        })
    }

    /// Reset per-cycle state: counters back to zero and the accepted-quote
    /// shield emptied. Call exactly once at cycle start.
    pub fn begin_cycle(&self) {
        self.counters.reset();
        self.accepted_quotes.lock().clear();
    }

    pub fn counters(&self) -> &CycleCounters {
        &self.counters
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    /// `exchangeInfo` for a single pair, served from the TTL cache when fresh.
    /// `None` when the venue does not convert this pair.
    pub async fn exchange_info(
        &self,
        from_asset: &str,
        to_asset: &str,
    ) -> Result<Option<ConvertPair>, ClientError> {
        let key = (
            SmolStr::new(from_asset.to_ascii_uppercase()),
            SmolStr::new(to_asset.to_ascii_uppercase()),
        );

        if let Some((stored_at, pair)) = self.cache.lock().pairs.get(&key) {
            if stored_at.elapsed() < self.exchange_info_ttl {
                return Ok(pair.clone());
            }
        }

        self.counters.record("exchangeInfo", 3_000);
        let response = self
            .rest_client
            .execute(GetExchangeInfo::new(ExchangeInfoParams {
                from_asset: Some(key.0.clone()),
                to_asset: Some(key.1.clone()),
            }))
            .await?;

        let pair = response
            .into_pairs()
            .into_iter()
            .find(|pair| pair.from_asset == key.0 && pair.to_asset == key.1);

        self.cache
            .lock()
            .pairs
            .insert(key, (Instant::now(), pair.clone()));
        Ok(pair)
    }

    /// Every supported Convert pair, served from the TTL cache when fresh.
    pub async fn exchange_pairs(&self) -> Result<Vec<ConvertPair>, ClientError> {
        if let Some((stored_at, pairs)) = &self.cache.lock().all {
            if stored_at.elapsed() < self.exchange_info_ttl {
                return Ok(pairs.clone());
            }
        }

        self.counters.record("exchangeInfo", 3_000);
        let pairs = self
            .rest_client
            .execute(GetExchangeInfo::new(ExchangeInfoParams::default()))
            .await?
            .into_pairs();

        self.cache.lock().all = Some((Instant::now(), pairs.clone()));
        Ok(pairs)
    }

    /// Per-asset Convert precision table, fetched once per process.
    pub async fn asset_info(&self) -> Result<Vec<AssetPrecision>, ClientError> {
        if let Some(precisions) = &self.cache.lock().precisions {
            return Ok(precisions.clone());
        }

        self.counters.record("assetInfo", 100);
        let precisions = self
            .rest_client
            .execute(GetAssetInfo)
            .await?
            .into_assets();

        self.cache.lock().precisions = Some(precisions.clone());
        Ok(precisions)
    }

    /// Request a quote for swapping `from_amount` of `from_asset` into
    /// `to_asset`. The amount is floored to 8 fractional digits before
    /// signing; the cycle budget and daily quota gate the request.
    pub async fn get_quote(
        &self,
        from_asset: &str,
        to_asset: &str,
        from_amount: Decimal,
        wallet: Wallet,
    ) -> Result<Quote, ClientError> {
        let from_asset = SmolStr::new(from_asset.to_ascii_uppercase());
        let to_asset = SmolStr::new(to_asset.to_ascii_uppercase());
        if from_asset == to_asset {
            return Err(ClientError::BadRequest(format!(
                "self-conversion {from_asset}->{to_asset}"
            )));
        }

        let floored = floor_8dp(from_amount);
        if floored <= Decimal::ZERO {
            return Err(ClientError::BadRequest(format!(
                "non-positive fromAmount {from_amount}"
            )));
        }

        self.daily_quota.check().map_err(ClientError::Throttled)?;
        self.counters
            .check_budget(200)
            .map_err(ClientError::Throttled)?;

        self.counters.record("getQuote", 200);
        self.daily_quota.increment();

        let response = self
            .rest_client
            .execute(PostGetQuote::new(GetQuoteParams {
                from_asset: from_asset.clone(),
                to_asset: to_asset.clone(),
                from_amount: amount_str(from_amount),
                wallet_type: wallet,
            }))
            .await?;

        Ok(Quote {
            quote_id: response.quote_id,
            from_asset,
            to_asset,
            from_amount: response.from_amount,
            to_amount: response.to_amount,
            ratio: response.ratio,
            inverse_ratio: response.inverse_ratio,
            valid_timestamp: response.valid_timestamp,
            wallet,
        })
    }

    /// Accept a previously returned quote.
    ///
    /// Idempotency shield: each `quote_id` reaches the network at most once
    /// per process lifetime. A repeated call short-circuits with
    /// `duplicate: true` and no IO.
    pub async fn accept_quote(&self, quote_id: &str) -> Result<AcceptedQuote, ClientError> {
        if quote_id.is_empty() {
            return Err(ClientError::BadRequest(
                "acceptQuote requires a non-empty quoteId".to_string(),
            ));
        }

        // Reserve before any IO so an ambiguous network outcome can never
        // lead to a second accept of the same quote.
        if !self.accepted_quotes.lock().insert(quote_id.to_string()) {
            debug!(quote_id, "duplicate acceptQuote suppressed by shield");
            return Ok(AcceptedQuote {
                order_id: None,
                create_time: None,
                duplicate: true,
            });
        }

        self.counters.record("acceptQuote", 500);
        let response = self
            .rest_client
            .execute(PostAcceptQuote::new(AcceptQuoteParams {
                quote_id: quote_id.to_string(),
            }))
            .await?;

        Ok(AcceptedQuote {
            order_id: Some(response.order_id),
            create_time: response.create_time,
            duplicate: false,
        })
    }

    /// Current state of a Convert order.
    pub async fn order_status(&self, lookup: OrderLookup) -> Result<Order, ClientError> {
        let params = match &lookup {
            OrderLookup::OrderId(id) if !id.is_empty() => OrderStatusParams {
                order_id: Some(id.clone()),
                ..OrderStatusParams::default()
            },
            OrderLookup::QuoteId(id) if !id.is_empty() => OrderStatusParams {
                quote_id: Some(id.clone()),
                ..OrderStatusParams::default()
            },
            _ => {
                return Err(ClientError::BadRequest(
                    "orderStatus requires a non-empty orderId or quoteId".to_string(),
                ));
            }
        };

        self.counters.record("orderStatus", 100);
        let response = self
            .rest_client
            .execute(GetOrderStatus::new(params))
            .await?;

        Ok(Order {
            order_id: response.order_id,
            quote_id: response.quote_id,
            status: response.order_status,
            from_asset: response.from_asset,
            from_amount: response.from_amount,
            to_asset: response.to_asset,
            to_amount: response.to_amount,
            ratio: response.ratio,
            create_time: chrono::DateTime::from_timestamp_millis(response.create_time)
                .unwrap_or_default(),
        })
    }

    /// Convert trade history over `[start_ms, end_ms]`, transparently
    /// paginating while the venue reports more data. The span must not
    /// exceed 31 days.
    pub async fn trade_flow(
        &self,
        start_ms: i64,
        end_ms: i64,
        limit: Option<u32>,
    ) -> Result<Vec<ConvertTrade>, ClientError> {
        if end_ms < start_ms {
            return Err(ClientError::BadRequest(format!(
                "tradeFlow endTime {end_ms} precedes startTime {start_ms}"
            )));
        }
        if end_ms - start_ms > TRADE_FLOW_MAX_SPAN_MS {
            return Err(ClientError::BadRequest(format!(
                "tradeFlow span {}ms exceeds the 31 day maximum",
                end_ms - start_ms
            )));
        }

        let mut trades = Vec::new();
        let mut cursor = start_ms;

        // Bounded pagination; each page costs 3000 weight so runaway loops
        // would exhaust the cycle budget long before this cap.
        for _ in 0..16 {
            self.counters.record("tradeFlow", 3_000);
            let page = self
                .rest_client
                .execute(GetTradeFlow::new(TradeFlowParams {
                    start_time: cursor,
                    end_time: end_ms,
                    limit,
                }))
                .await?;

            let more = page.more_data;
            let last_create = page.list.iter().map(|trade| trade.create_time).max();
            trades.extend(page.list);

            match (more, last_create) {
                (true, Some(last)) if last + 1 < end_ms => cursor = last + 1,
                (true, _) => {
                    warn!("tradeFlow reported moreData without advancing cursor");
                    break;
                }
                (false, _) => break,
            }
        }

        Ok(trades)
    }

    /// Spot wallet balances.
    pub async fn spot_balances(&self) -> Result<Vec<AssetBalance>, ClientError> {
        self.counters.record("account", 20);
        let response = self.rest_client.execute(GetAccount).await?;

        Ok(response
            .balances
            .into_iter()
            .map(|row| AssetBalance {
                asset: row.asset,
                wallet: Wallet::Spot,
                free: row.free,
                locked: row.locked,
            })
            .collect())
    }

    /// Funding wallet balances.
    pub async fn funding_balances(&self) -> Result<Vec<AssetBalance>, ClientError> {
        self.counters.record("getUserAsset", 5);
        let response = self
            .rest_client
            .execute(PostFundingAssets::new(FundingAssetParams::default()))
            .await?;

        Ok(response
            .into_rows()
            .into_iter()
            .map(|row| AssetBalance {
                asset: row.asset.clone(),
                wallet: Wallet::Funding,
                free: row.free_amount(),
                locked: row.locked.unwrap_or(Decimal::ZERO),
            })
            .collect())
    }

    /// Legal-money (fiat) assets, never eligible for Convert routing.
    pub async fn fiat_assets(&self) -> Result<HashSet<SmolStr>, ClientError> {
        self.counters.record("capitalConfig", 10);
        let coins = self.rest_client.execute(GetCapitalConfig).await?;

        Ok(coins
            .into_iter()
            .filter(|coin| coin.is_legal_money)
            .map(|coin| coin.coin)
            .collect())
    }

    /// Search recent Convert history for the order spawned by `quote_id`.
    /// Used to reconcile actions whose accept outcome was lost to a network
    /// failure.
    pub async fn reconcile_quote(
        &self,
        quote_id: &str,
        lookback: Duration,
    ) -> Result<Option<ConvertTrade>, ClientError> {
        let end = self.clock.now_ms();
        let start = end - lookback.as_millis() as i64;
        let trades = self.trade_flow(start, end, Some(100)).await?;

        Ok(trades
            .into_iter()
            .find(|trade| trade.quote_id.as_deref() == Some(quote_id)))
    }
}
