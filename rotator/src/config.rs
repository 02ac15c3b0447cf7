use crate::{
    error::AppError,
    ranker::{RankerConfig, ScoringWeights},
    scheduler::{Region, RegionWindows, Window},
};
use rotator_execution::{
    ApiCredentials,
    balance::Wallet,
    client::binance::ConvertClientConfig,
    counters::DAILY_QUOTE_LIMIT,
    executor::ExecutorConfig,
};
use rotator_integration::backoff::Backoff;
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

fn var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.is_empty())
}

fn parse_var<T: FromStr>(key: &str, default: T) -> Result<T, AppError>
where
    T::Err: std::fmt::Display,
{
    match var(key) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|error| AppError::Config(format!("{key}={raw:?}: {error}"))),
        None => Ok(default),
    }
}

fn parse_flag(key: &str, default: bool) -> bool {
    match var(key).as_deref() {
        Some("1") | Some("true") | Some("TRUE") | Some("yes") => true,
        Some("0") | Some("false") | Some("FALSE") | Some("no") => false,
        _ => default,
    }
}

fn window_from_env(prefix: &str, default: (&str, &str)) -> Result<Window, AppError> {
    let from = var(&format!("{prefix}_FROM")).unwrap_or_else(|| default.0.to_string());
    let to = var(&format!("{prefix}_TO")).unwrap_or_else(|| default.1.to_string());
    Window::parse(&format!("{from}-{to}"))
}

/// Read-once process configuration, loaded from the environment (and an
/// optional `.env` file) at startup. No component reads the environment after
/// this point.
#[derive(Debug, Clone)]
pub struct Config {
    pub credentials: ApiCredentials,
    pub api_base: String,
    pub marketdata_base: String,

    pub recv_window_ms: u64,
    pub qps: f64,
    pub burst: u32,
    pub backoff: Backoff,
    pub exchange_info_ttl: Duration,

    pub ranker: RankerConfig,
    pub scoring_weights: ScoringWeights,

    pub asia: RegionWindows,
    pub us: RegionWindows,
    pub jitter_sec: u64,

    pub dry_run: bool,
    pub wallet: Wallet,

    /// Soft risk-off: drawdown at which the per-cycle quote cap tightens.
    pub drawdown_threshold: f64,
    /// Severe risk-off: drawdown at which trading pauses for the cycle.
    pub pause_threshold: f64,
    pub rebalance_threshold: f64,

    pub state_path: PathBuf,
    pub log_root: PathBuf,
    pub lock_dir: PathBuf,
    pub quota_path: PathBuf,
    pub daily_quote_limit: u32,

    pub poll_interval: Duration,
    pub poll_deadline: Duration,
}

impl Config {
    /// Load from environment variables, sourcing `.env` first when present.
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let api_key = var("BINANCE_API_KEY")
            .ok_or_else(|| AppError::Config("BINANCE_API_KEY not set".to_string()))?;
        let api_secret = var("BINANCE_API_SECRET")
            .ok_or_else(|| AppError::Config("BINANCE_API_SECRET not set".to_string()))?;

        let recv_window_ms: u64 = parse_var("DEV3_RECV_WINDOW_MS", 5_000)?;
        let recv_window_max_ms: u64 = parse_var("DEV3_RECV_WINDOW_MAX_MS", 60_000)?;

        let backoff = Backoff::new(
            Duration::from_secs_f64(parse_var("BACKOFF_BASE_S", 0.5f64)?),
            Duration::from_secs_f64(parse_var("BACKOFF_MAX_S", 30.0f64)?),
            parse_var("BACKOFF_MAX_RETRIES", 5u32)?,
        );

        let scoring_weights = match var("SCORING_WEIGHTS") {
            Some(raw) => serde_json::from_str(&raw)
                .map_err(|error| AppError::Config(format!("SCORING_WEIGHTS: {error}")))?,
            None => ScoringWeights::default(),
        };

        let ranker = RankerConfig {
            min_volume_usdt: parse_var("MIN_VOLUME_USDT", Decimal::from(5_000_000u64))?,
            max_spread_bps: parse_var("MAX_SPREAD_BPS", 5.0f64)?,
            top_k: parse_var("TOP_K", 5usize)?,
            shortlist_mult: parse_var("SHORTLIST_MULT", 2usize)?,
        };

        Ok(Self {
            credentials: ApiCredentials::new(api_key, api_secret),
            api_base: var("API_BASE").unwrap_or_else(|| "https://api.binance.com".to_string()),
            marketdata_base: var("MARKETDATA_BASE")
                .unwrap_or_else(|| "https://data-api.binance.vision".to_string()),
            recv_window_ms: recv_window_ms.min(recv_window_max_ms),
            qps: parse_var("QPS", 5.0f64)?,
            burst: parse_var("BURST", 10u32)?,
            backoff,
            exchange_info_ttl: Duration::from_secs(parse_var("EXCHANGEINFO_TTL_SEC", 300u64)?),
            ranker,
            scoring_weights,
            asia: RegionWindows {
                analyze: window_from_env("ASIA_ANALYZE", ("00:30", "01:30"))?,
                trade: window_from_env("ASIA_TRADE", ("01:30", "02:30"))?,
            },
            us: RegionWindows {
                analyze: window_from_env("US_ANALYZE", ("13:30", "14:30"))?,
                trade: window_from_env("US_TRADE", ("14:30", "15:30"))?,
            },
            jitter_sec: parse_var("JITTER_SEC", 20u64)?,
            dry_run: parse_flag("DRY_RUN", false),
            wallet: var("DEFAULT_WALLET")
                .as_deref()
                .unwrap_or("SPOT")
                .parse()
                .map_err(AppError::Config)?,
            drawdown_threshold: parse_var("DRAWDOWN_THRESHOLD", 0.10f64)?,
            pause_threshold: parse_var("PAUSE_THRESHOLD", 0.25f64)?,
            rebalance_threshold: parse_var("REBALANCE_THRESHOLD", 0.08f64)?,
            state_path: PathBuf::from(
                var("POSITION_STATE_PATH").unwrap_or_else(|| "state/position.json".to_string()),
            ),
            log_root: PathBuf::from(
                var("CONVERT_LOG_ROOT").unwrap_or_else(|| "logs/convert".to_string()),
            ),
            lock_dir: PathBuf::from(var("LOCK_DIR").unwrap_or_else(|| "/tmp".to_string())),
            quota_path: PathBuf::from(
                var("QUOTE_COUNT_PATH").unwrap_or_else(|| "logs/quote_count.json".to_string()),
            ),
            daily_quote_limit: parse_var("DAILY_QUOTE_LIMIT", DAILY_QUOTE_LIMIT)?,
            poll_interval: Duration::from_secs(parse_var("ORDER_POLL_INTERVAL_S", 2u64)?),
            poll_deadline: Duration::from_secs(parse_var("ORDER_POLL_MAX_S", 60u64)?),
        })
    }

    pub fn windows(&self, region: Region) -> RegionWindows {
        match region {
            Region::Asia => self.asia,
            Region::Us => self.us,
        }
    }

    /// Signed-client configuration derived from this process configuration.
    pub fn client_config(&self) -> ConvertClientConfig {
        let mut client = ConvertClientConfig::new(self.credentials.clone(), self.api_base.clone());
        client.recv_window_ms = self.recv_window_ms;
        client.qps = self.qps;
        client.burst = self.burst;
        client.backoff = self.backoff;
        client.exchange_info_ttl = self.exchange_info_ttl;
        client.daily_quota_path = self.quota_path.clone();
        client.daily_quote_limit = self.daily_quote_limit;
        client
    }

    /// Executor configuration; an explicit CLI override wins over the
    /// `DRY_RUN` environment default.
    pub fn executor_config(&self, dry_run_override: Option<bool>) -> ExecutorConfig {
        ExecutorConfig {
            wallet: self.wallet,
            poll_interval: self.poll_interval,
            poll_deadline: self.poll_deadline,
            reconcile_lookback: Duration::from_secs(3600),
            dry_run: dry_run_override.unwrap_or(self.dry_run),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flag_values() {
        // unset key falls back to the default
        assert!(!parse_flag("ROTATOR_TEST_UNSET_FLAG", false));
        assert!(parse_flag("ROTATOR_TEST_UNSET_FLAG", true));
    }

    #[test]
    fn test_window_default_shapes_parse() {
        let window = window_from_env("ROTATOR_TEST_UNSET_WINDOW", ("01:30", "02:45")).unwrap();
        assert_eq!(window, Window::parse("01:30-02:45").unwrap());
    }
}
