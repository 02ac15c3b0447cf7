use crate::{
    asset,
    config::Config,
    error::AppError,
    guard,
    logging::rolling_log_dir,
    planner,
    position::{PositionState, PositionStore},
    ranker,
    report::{self, BalanceRow},
    route::{PairTable, RouteResolver},
    scheduler::{Phase, Region, RegionLock, sleep_jitter},
};
use fnv::FnvHashMap;
use indexmap::IndexMap;
use rotator_execution::{
    balance::{BalanceReader, Wallet},
    client::binance::BinanceConvertClient,
    counters::RISK_OFF_MAX_PER_CYCLE,
    executor::{ActionOutcome, ConvertExecutor},
    market::MarketDataClient,
    order::RebalanceAction,
};
use rust_decimal::{Decimal, prelude::ToPrimitive};
use smol_str::SmolStr;
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::{error, info, warn};

/// Wires configuration, gateways, strategy and persistence into the
/// per-region phase cycle.
#[derive(Debug, Clone)]
pub struct App {
    config: Config,
    client: BinanceConvertClient,
    market: MarketDataClient,
    balances: BalanceReader,
    store: PositionStore,
}

/// Point-in-time view of holdings assembled once per phase.
#[derive(Debug, Default)]
struct Snapshot {
    /// Normalized asset -> free amount (suffix-blocked and fiat rows dropped).
    holdings: IndexMap<SmolStr, Decimal>,
    /// Base asset -> last USDT price.
    price_map: FnvHashMap<SmolStr, Decimal>,
    /// Normalized asset -> USDT notional, for largest-holder route selection.
    valuations: Vec<(SmolStr, Decimal)>,
    equity: Decimal,
}

impl App {
    pub fn new(config: Config) -> Result<Self, AppError> {
        let client = BinanceConvertClient::new(config.client_config())?;
        let market = MarketDataClient::new(
            config.marketdata_base.clone(),
            config.qps,
            config.burst,
            config.backoff,
            client.counters().clone(),
        );
        let balances = BalanceReader::new(client.clone());
        let store = PositionStore::new(config.state_path.clone());

        Ok(Self {
            config,
            client,
            market,
            balances,
            store,
        })
    }

    pub fn client(&self) -> &BinanceConvertClient {
        &self.client
    }

    pub fn market(&self) -> &MarketDataClient {
        &self.market
    }

    pub fn balances(&self) -> &BalanceReader {
        &self.balances
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run the requested phases for one region under the region lock.
    ///
    /// Returns the bitwise-or of the failed phases' exit bits; a phase
    /// failure never blocks the phases after it.
    pub async fn run(&self, region: Region, phases: &[Phase], dry_run: Option<bool>) -> u8 {
        sleep_jitter(self.config.jitter_sec).await;

        let _lock = match RegionLock::acquire(&self.config.lock_dir, region) {
            Ok(lock) => lock,
            Err(err) => {
                error!(%region, %err, "region lock not acquired");
                return phases.iter().fold(0, |acc, phase| acc | phase.exit_bit());
            }
        };

        self.client.begin_cycle();
        let mut exit_code = 0u8;

        for phase in phases {
            info!(%region, %phase, "phase starting");
            if let Err(err) = self.run_phase(region, *phase, dry_run).await {
                error!(%region, %phase, %err, "phase failed");
                exit_code |= phase.exit_bit();
            }
        }

        self.client.counters().log_summary();
        exit_code
    }

    async fn run_phase(
        &self,
        region: Region,
        phase: Phase,
        dry_run: Option<bool>,
    ) -> Result<(), AppError> {
        match phase {
            Phase::PreAnalyze => self.pre_analyze(region).await,
            Phase::Analyze => self.analyze(region).await,
            Phase::Trade => self.trade(region, dry_run).await,
            Phase::Guard => self.guard(region, dry_run).await,
        }
    }

    fn log_dir(&self) -> Result<PathBuf, AppError> {
        Ok(rolling_log_dir(&self.config.log_root)?)
    }

    async fn resolver(&self) -> Result<RouteResolver, AppError> {
        let pairs = self.client.exchange_pairs().await?;
        Ok(RouteResolver::new(PairTable::from_pairs(pairs)))
    }

    async fn fiat_assets(&self) -> HashSet<SmolStr> {
        match self.client.fiat_assets().await {
            Ok(fiat) => fiat,
            Err(err) => {
                warn!(%err, "fiat asset lookup failed, treating none as fiat");
                HashSet::new()
            }
        }
    }

    async fn snapshot(&self) -> Result<Snapshot, AppError> {
        let price_map = self.market.usdt_price_map().await?;
        let raw = self.balances.read_all(Wallet::Spot).await?;
        let fiat = self.fiat_assets().await;

        let mut holdings: IndexMap<SmolStr, Decimal> = IndexMap::new();
        for (raw_asset, amount) in raw {
            if amount <= Decimal::ZERO {
                continue;
            }
            let Some(normalised) = asset::normalize(&raw_asset) else {
                continue;
            };
            if fiat.contains(&normalised) {
                continue;
            }
            *holdings.entry(normalised).or_insert(Decimal::ZERO) += amount;
        }

        let price_of = |asset: &str| {
            if asset == "USDT" {
                Decimal::ONE
            } else {
                price_map.get(asset).copied().unwrap_or(Decimal::ZERO)
            }
        };

        let valuations = holdings
            .iter()
            .map(|(asset, amount)| (asset.clone(), *amount * price_of(asset)))
            .collect::<Vec<_>>();
        let equity = valuations.iter().map(|(_, notional)| *notional).sum();

        Ok(Snapshot {
            holdings,
            price_map,
            valuations,
            equity,
        })
    }

    /// Snapshot holdings and their Convert reachability into the day's
    /// `balance.pre.csv`.
    async fn pre_analyze(&self, region: Region) -> Result<(), AppError> {
        let dir = self.log_dir()?;
        let raw = self.balances.read_all(Wallet::Spot).await?;
        let fiat = self.fiat_assets().await;
        let resolver = self.resolver().await?;

        let mut rows = Vec::with_capacity(raw.len());
        let mut convertible_count = 0usize;

        for (raw_asset, amount) in raw {
            if amount <= Decimal::ZERO {
                continue;
            }

            let normalised = asset::normalize(&raw_asset);
            let (convertible, reason) = match &normalised {
                None => (false, "blocked_suffix"),
                Some(asset) if fiat.contains(asset) => (false, "legal_money"),
                Some(asset) => {
                    let reachable = resolver.route_exists(asset, "USDT").is_some()
                        || asset::HUB_ASSETS
                            .iter()
                            .any(|hub| resolver.route_exists(asset, hub).is_some());
                    if reachable || asset == "USDT" {
                        (true, "")
                    } else {
                        (false, "no_convert_route")
                    }
                }
            };
            if convertible {
                convertible_count += 1;
            }

            rows.push(BalanceRow {
                asset: raw_asset,
                amount,
                normalised,
                convertible,
                reason: reason.to_string(),
            });
        }

        report::write_balance_pre_csv(&dir, &rows)?;
        info!(
            %region,
            total = rows.len(),
            convertible = convertible_count,
            path = %report::balance_pre_path(&dir).display(),
            "pre-analyze snapshot written"
        );
        Ok(())
    }

    /// Rank candidate targets and write the day's candidate artifacts.
    async fn analyze(&self, region: Region) -> Result<(), AppError> {
        if !self.config.windows(region).in_analyze_window() {
            info!(%region, "outside analyze window, skipping");
            return Ok(());
        }

        let dir = self.log_dir()?;
        let snapshot = self.snapshot().await?;
        let resolver = self.resolver().await?;
        let stats = self.market.ticker_24hr_all().await?;

        let outcome = ranker::select_candidates(
            region.as_str(),
            &stats,
            &snapshot.valuations,
            &resolver,
            &self.config.ranker,
        );

        report::write_candidates(&dir, region.as_str(), &outcome.candidates)?;
        report::append_summary(
            &dir,
            region.as_str(),
            outcome.candidates.len(),
            &outcome.rejections,
        )?;

        info!(
            %region,
            candidates = outcome.candidates.len(),
            shortlisted = outcome.shortlisted,
            rejections = ?outcome.rejections,
            "analyze finished"
        );
        Ok(())
    }

    /// Diff the target allocation against holdings and settle the resulting
    /// actions through Convert.
    async fn trade(&self, region: Region, dry_run: Option<bool>) -> Result<(), AppError> {
        if !self.config.windows(region).in_trade_window() {
            info!(%region, "outside trade window, skipping");
            return Ok(());
        }

        let dir = self.log_dir()?;
        let Some(candidates) = report::read_candidates(&dir, region.as_str())? else {
            warn!(%region, "no candidates artifact for today, nothing to trade");
            return Ok(());
        };
        if candidates.is_empty() {
            info!(%region, "candidate list empty, nothing to trade");
            return Ok(());
        }

        let snapshot = self.snapshot().await?;
        let resolver = self.resolver().await?;

        // Risk-off levels from the tracked portfolio peak.
        let mut state = self.store.load();
        let drawdown = portfolio_drawdown(&state, snapshot.equity);
        if drawdown >= self.config.pause_threshold {
            warn!(%region, drawdown, "severe drawdown, trading paused for this cycle");
            return Ok(());
        }
        if drawdown >= self.config.drawdown_threshold {
            warn!(%region, drawdown, "soft drawdown, tightening per-cycle quote cap");
            self.client
                .counters()
                .set_cycle_limit(RISK_OFF_MAX_PER_CYCLE);
        }

        let targets = planner::build_target_allocation(
            &candidates,
            snapshot.equity,
            &snapshot.valuations,
            &resolver,
        );
        let actions = planner::plan_rebalance(
            &snapshot.holdings,
            &snapshot.price_map,
            &targets,
            &resolver,
            self.config.rebalance_threshold,
        );

        if actions.is_empty() {
            info!(%region, "portfolio within threshold, no actions");
            return Ok(());
        }

        let executor = ConvertExecutor::new(self.client.clone(), self.config.executor_config(dry_run));
        let effective_dry_run = self.config.executor_config(dry_run).dry_run;

        for action in &actions {
            let score = targets
                .iter()
                .find(|target| target.asset == action.to_asset)
                .map(|target| target.candidate.score);
            let outcome = executor.execute(action, score).await;
            self.record_outcome(&dir, region, action, &outcome)?;
        }

        if !effective_dry_run {
            let balances = self.balances.read_all(Wallet::Spot).await?;
            state.sync_from_balances(&balances, &snapshot.price_map);
            self.store.save(&state)?;
        }
        Ok(())
    }

    /// Enforce the drawdown stop against current prices.
    async fn guard(&self, region: Region, dry_run: Option<bool>) -> Result<(), AppError> {
        let state = self.store.load();
        if state.assets.is_empty() {
            info!(%region, "no tracked position, guard idle");
            return Ok(());
        }

        let dir = self.log_dir()?;
        let price_map = self.market.usdt_price_map().await?;
        let resolver = self.resolver().await?;

        let outcome = guard::evaluate(&state, &price_map, &resolver);
        if !outcome.triggered() {
            return Ok(());
        }

        warn!(
            %region,
            portfolio = outcome.portfolio_trigger,
            assets = ?outcome.asset_triggers,
            "drawdown stop triggered, liquidating"
        );

        let executor = ConvertExecutor::new(self.client.clone(), self.config.executor_config(dry_run));
        let effective_dry_run = self.config.executor_config(dry_run).dry_run;

        for action in &outcome.actions {
            let result = executor.execute(action, None).await;
            self.record_outcome(&dir, region, action, &result)?;
        }

        // Peaks reset to the post-liquidation baseline only from real
        // balances, acknowledged by the next successful state write.
        if !effective_dry_run {
            let balances = self.balances.read_all(Wallet::Spot).await?;
            let mut state = state;
            state.sync_from_balances(&balances, &price_map);
            self.store.save(&state)?;
        }
        Ok(())
    }

    fn record_outcome(
        &self,
        dir: &std::path::Path,
        region: Region,
        action: &RebalanceAction,
        outcome: &ActionOutcome,
    ) -> Result<(), AppError> {
        report::append_history(dir, &outcome.records)?;

        let line = format!(
            "{} {} {} amount={} status={:?} quote={} order={} reason={}",
            chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ"),
            region,
            action.route,
            action.amount,
            outcome.status,
            outcome
                .records
                .last()
                .and_then(|record| record.quote_id.as_deref())
                .unwrap_or("-"),
            outcome
                .records
                .last()
                .and_then(|record| record.order_id.as_deref())
                .unwrap_or("-"),
            outcome
                .records
                .last()
                .and_then(|record| record.error_msg.as_deref())
                .unwrap_or("-"),
        );
        report::append_trade_line(dir, region.as_str(), &line)?;
        Ok(())
    }
}

fn portfolio_drawdown(state: &PositionState, equity: Decimal) -> f64 {
    if state.portfolio_peak <= Decimal::ZERO || equity <= Decimal::ZERO {
        return 0.0;
    }
    ((state.portfolio_peak - equity) / state.portfolio_peak)
        .to_f64()
        .unwrap_or(0.0)
        .max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_portfolio_drawdown_levels() {
        let mut state = PositionState::default();
        assert_eq!(portfolio_drawdown(&state, dec!(100)), 0.0);

        state.portfolio_peak = dec!(200);
        assert!((portfolio_drawdown(&state, dec!(180)) - 0.10).abs() < 1e-12);
        assert!((portfolio_drawdown(&state, dec!(150)) - 0.25).abs() < 1e-12);
        // equity above peak clamps to zero
        assert_eq!(portfolio_drawdown(&state, dec!(250)), 0.0);
    }
}
