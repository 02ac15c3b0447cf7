use crate::{client::binance::parser::BinanceParser, counters::CycleCounters, error::ClientError};
use fnv::FnvHashMap;
use futures::{StreamExt, stream};
use rotator_integration::{
    backoff::Backoff,
    protocol::http::{public::PublicNoHeaders, rest::RestRequest, rest::client::RestClient},
    rate_limit::RateLimiter,
};
use rust_decimal::Decimal;
use smol_str::SmolStr;
use tracing::warn;

/// Typed request/response records for the public Spot market data endpoints.
pub mod requests;

use requests::{
    GetAvgPrice, GetBookTicker, GetKlines, GetTicker24hr, GetTickerPrice, Kline, KlineParams,
    SymbolParams, Ticker24hrStats,
};

/// Bridge assets tried, in order, when a Convert pair has no direct Spot
/// symbol to reference.
pub const HUB_ASSETS: [&str; 4] = ["USDT", "USDC", "BUSD", "BTC"];

/// Public Spot market data gateway.
///
/// Raw wrappers surface typed errors; the derived helpers (`mid_price`,
/// `price_usdt`, ...) swallow transport failures into `None` since a missing
/// price is an expected, per-symbol outcome for the ranking pipeline.
#[derive(Debug, Clone)]
pub struct MarketDataClient {
    rest_client: RestClient<'static, PublicNoHeaders, BinanceParser>,
    counters: CycleCounters,
    /// In-flight cap applied to per-symbol fan-outs, `qps * 2`.
    fanout_limit: usize,
}

impl MarketDataClient {
    pub fn new(
        base_url: impl Into<String>,
        qps: f64,
        burst: u32,
        backoff: Backoff,
        counters: CycleCounters,
    ) -> Self {
        let rest_client = RestClient::new(base_url.into(), PublicNoHeaders, BinanceParser)
            .with_bucket(RateLimiter::new(qps, burst))
            .with_backoff(backoff);

        Self {
            rest_client,
            counters,
            fanout_limit: ((qps * 2.0).ceil() as usize).max(1),
        }
    }

    /// `symbol` for `asset` quoted in USDT, or `None` for self-pairs
    /// (`USDTUSDT` is meaningless and filtered here, not by callers).
    pub fn usdt_symbol(asset: &str) -> Option<SmolStr> {
        let asset = asset.to_ascii_uppercase();
        if asset.is_empty() || asset == "USDT" {
            return None;
        }
        Some(SmolStr::new(format!("{asset}USDT")))
    }

    /// Last trade price for a single symbol.
    pub async fn ticker_price(&self, symbol: &str) -> Result<Option<Decimal>, ClientError> {
        let request = GetTickerPrice(SymbolParams::one(symbol.to_ascii_uppercase()));
        self.counters.record("ticker/price", 2);
        let rows = self.rest_client.execute(request).await?.into_vec();
        Ok(rows.into_iter().next().map(|row| row.price))
    }

    /// Best bid/ask for a single symbol.
    pub async fn book_ticker(
        &self,
        symbol: &str,
    ) -> Result<Option<requests::BookTickerRow>, ClientError> {
        let request = GetBookTicker(SymbolParams::one(symbol.to_ascii_uppercase()));
        self.counters.record("bookTicker", 2);
        let rows = self.rest_client.execute(request).await?.into_vec();
        Ok(rows.into_iter().next())
    }

    /// Rolling average price for a single symbol.
    pub async fn avg_price(&self, symbol: &str) -> Result<Option<Decimal>, ClientError> {
        let request = GetAvgPrice(SymbolParams::one(symbol.to_ascii_uppercase()));
        self.counters.record("avgPrice", 2);
        let response = self.rest_client.execute(request).await?;
        Ok((response.price > Decimal::ZERO).then_some(response.price))
    }

    /// 24h statistics for one symbol.
    pub async fn ticker_24hr(&self, symbol: &str) -> Result<Option<Ticker24hrStats>, ClientError> {
        let request = GetTicker24hr(SymbolParams::one(symbol.to_ascii_uppercase()));
        self.counters.record("ticker/24hr", request.weight());
        let rows = self.rest_client.execute(request).await?.into_vec();
        Ok(rows.into_iter().next())
    }

    /// 24h statistics for an explicit symbol list (weight 40).
    pub async fn ticker_24hr_many<I, S>(
        &self,
        symbols: I,
    ) -> Result<Vec<Ticker24hrStats>, ClientError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let request = GetTicker24hr(SymbolParams::many(symbols));
        self.counters.record("ticker/24hr", request.weight());
        Ok(self.rest_client.execute(request).await?.into_vec())
    }

    /// 24h statistics for every symbol (weight 80).
    pub async fn ticker_24hr_all(&self) -> Result<Vec<Ticker24hrStats>, ClientError> {
        let request = GetTicker24hr(SymbolParams::all());
        self.counters.record("ticker/24hr", request.weight());
        Ok(self.rest_client.execute(request).await?.into_vec())
    }

    /// Parsed candlesticks, malformed rows dropped.
    pub async fn klines(
        &self,
        symbol: &str,
        interval: &str,
        limit: u32,
    ) -> Result<Vec<Kline>, ClientError> {
        let request = GetKlines(KlineParams {
            symbol: SmolStr::new(symbol.to_ascii_uppercase()),
            interval: SmolStr::new(interval),
            limit,
        });
        self.counters.record("klines", 2);
        let rows = self.rest_client.execute(request).await?;
        Ok(rows.iter().filter_map(|row| Kline::from_row(row)).collect())
    }

    /// Mid price for a Spot symbol: book-ticker mid when both sides are
    /// positive, falling back to the average-price endpoint.
    pub async fn mid_price(&self, symbol: &str) -> Option<Decimal> {
        match self.book_ticker(symbol).await {
            Ok(Some(book)) => {
                if let Some(mid) = book.mid() {
                    return Some(mid);
                }
            }
            Ok(None) => {}
            Err(error) => warn!(symbol, %error, "bookTicker failed, falling back to avgPrice"),
        }

        match self.avg_price(symbol).await {
            Ok(price) => price,
            Err(error) => {
                warn!(symbol, %error, "avgPrice failed, no price available");
                None
            }
        }
    }

    /// Mid price for a Convert pair `from -> to`: the direct `FROMTO` symbol
    /// first, then a synthetic cross `(from+hub) / (to+hub)` through the hub
    /// priority list.
    pub async fn mid_price_cross(&self, from_asset: &str, to_asset: &str) -> Option<Decimal> {
        let from_asset = from_asset.to_ascii_uppercase();
        let to_asset = to_asset.to_ascii_uppercase();

        let direct = format!("{from_asset}{to_asset}");
        if let Some(mid) = self.mid_price(&direct).await {
            return Some(mid);
        }

        for hub in HUB_ASSETS {
            if hub == from_asset || hub == to_asset {
                continue;
            }
            let leg_from = self.mid_price(&format!("{from_asset}{hub}")).await;
            let leg_to = self.mid_price(&format!("{to_asset}{hub}")).await;
            if let (Some(leg_from), Some(leg_to)) = (leg_from, leg_to) {
                if leg_to > Decimal::ZERO {
                    return Some(leg_from / leg_to);
                }
            }
        }
        None
    }

    /// USDT valuation of one asset: avgPrice first, 24h last price second.
    pub async fn price_usdt(&self, asset: &str) -> Option<Decimal> {
        if asset.eq_ignore_ascii_case("USDT") {
            return Some(Decimal::ONE);
        }
        let symbol = Self::usdt_symbol(asset)?;

        if let Ok(Some(price)) = self.avg_price(&symbol).await {
            return Some(price);
        }
        match self.ticker_24hr(&symbol).await {
            Ok(Some(stats)) if stats.last_price > Decimal::ZERO => Some(stats.last_price),
            _ => None,
        }
    }

    /// Base-asset -> last price map for every `*USDT` symbol, from the
    /// all-symbols 24h ticker snapshot.
    pub async fn usdt_price_map(&self) -> Result<FnvHashMap<SmolStr, Decimal>, ClientError> {
        let stats = self.ticker_24hr_all().await?;
        let mut prices = FnvHashMap::default();
        for row in stats {
            let symbol = row.symbol.as_str();
            if let Some(base) = symbol.strip_suffix("USDT") {
                if !base.is_empty() && row.last_price > Decimal::ZERO {
                    prices.insert(SmolStr::new(base), row.last_price);
                }
            }
        }
        Ok(prices)
    }

    /// Mid prices for many symbols with a bounded fan-out (`qps * 2`
    /// in-flight requests at most).
    pub async fn mid_prices<I, S>(&self, symbols: I) -> FnvHashMap<SmolStr, Decimal>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let symbols = symbols
            .into_iter()
            .map(|symbol| SmolStr::new(symbol.as_ref().to_ascii_uppercase()))
            .collect::<Vec<_>>();

        stream::iter(symbols)
            .map(|symbol| async move {
                let mid = self.mid_price(&symbol).await;
                (symbol, mid)
            })
            .buffer_unordered(self.fanout_limit)
            .filter_map(|(symbol, mid)| async move { mid.map(|mid| (symbol, mid)) })
            .collect()
            .await
    }

    /// `(high - low) / mid` over the last two 1-minute candles, the
    /// volatility input of the composite scoring model.
    pub async fn recent_volatility(&self, symbol: &str, mid_ref: Decimal) -> Option<Decimal> {
        if mid_ref <= Decimal::ZERO {
            return None;
        }
        let klines = self.klines(symbol, "1m", 2).await.ok()?;
        if klines.is_empty() {
            return None;
        }

        let high = klines.iter().map(|kline| kline.high).max()?;
        let low = klines.iter().map(|kline| kline.low).min()?;
        Some((high - low) / mid_ref)
    }
}
