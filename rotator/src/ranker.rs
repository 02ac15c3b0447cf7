use crate::{asset, route::RouteResolver};
use rotator_execution::{market::requests::Ticker24hrStats, order::ConvertRoute};
use rust_decimal::{Decimal, prelude::ToPrimitive};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::collections::BTreeMap;
use tracing::debug;

/// Spread sentinel for symbols missing one side of the book.
const UNUSABLE_SPREAD_BPS: f64 = 999.0;

/// Ranker tuning; defaults mirror the production loop.
#[derive(Debug, Clone)]
pub struct RankerConfig {
    /// Minimum 24h quote volume in USDT.
    pub min_volume_usdt: Decimal,
    /// Maximum admissible mid-spread in basis points.
    pub max_spread_bps: f64,
    pub top_k: usize,
    pub shortlist_mult: usize,
}

impl Default for RankerConfig {
    fn default() -> Self {
        Self {
            min_volume_usdt: Decimal::from(5_000_000u64),
            max_spread_bps: 5.0,
            top_k: 5,
            shortlist_mult: 2,
        }
    }
}

/// Regional score bias. No calibration behind the numbers; they are carried
/// as configuration.
pub fn region_bias(region: &str) -> f64 {
    match region.to_ascii_lowercase().as_str() {
        "us" => 1.05,
        "asia" => 1.03,
        _ => 1.0,
    }
}

/// Weights of the composite Convert-pair model
/// `S = w_edge*edge + w_liq*liquidity + w_mom*momentum - w_spr*spread - w_vol*volatility`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct ScoringWeights {
    pub edge: f64,
    pub liquidity: f64,
    pub momentum: f64,
    pub spread: f64,
    pub volatility: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            edge: 1.0,
            liquidity: 0.1,
            momentum: 0.1,
            spread: 0.1,
            volatility: 0.1,
        }
    }
}

/// A ranked Convert target.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Candidate {
    pub rank: usize,
    pub symbol: SmolStr,
    pub base: SmolStr,
    pub score: f64,
    #[serde(rename = "qVol")]
    pub quote_volume: Decimal,
    #[serde(rename = "chg")]
    pub change_pct: Decimal,
    pub spread_bps: f64,
    pub last_price: Decimal,
    pub route: ConvertRoute,
    pub route_desc: String,
    pub min_quote: Decimal,
    pub max_quote: Decimal,
}

/// Result of one ranking pass, including the rejection breakdown surfaced in
/// the cycle summary.
#[derive(Debug, Clone, Default)]
pub struct RankOutcome {
    pub candidates: Vec<Candidate>,
    pub rejections: BTreeMap<&'static str, u32>,
    pub shortlisted: usize,
}

/// Mid-spread in basis points: `|ask - bid| / ((ask + bid) / 2) * 10_000`.
/// Unusable books earn the sentinel value, which always fails the filter.
pub fn spread_bps(bid: f64, ask: f64) -> f64 {
    if bid <= 0.0 || ask <= 0.0 {
        return UNUSABLE_SPREAD_BPS;
    }
    let mid = (bid + ask) / 2.0;
    if mid <= 0.0 {
        return UNUSABLE_SPREAD_BPS;
    }
    (ask - bid).abs() / mid * 10_000.0
}

/// Liquidity/momentum/spread score with a regional bias:
/// `log10(qvol + 1) * (1 + clamp(chg, -50, 50) / 100) / (1 + spread / 10) * bias`.
pub fn score_ticker(quote_volume: f64, change_pct: f64, spread_bps: f64, bias: f64) -> f64 {
    let liquidity = (quote_volume.max(0.0) + 1.0).log10();
    let momentum = 1.0 + change_pct.clamp(-50.0, 50.0) / 100.0;
    let spread_penalty = 1.0 + spread_bps / 10.0;
    (liquidity * momentum / spread_penalty).max(0.0) * bias
}

/// Composite Convert-pair model over an observed quote ratio and a Spot mid
/// reference. `edge = (ratio - mid_ref) / mid_ref`.
pub fn composite_score(
    weights: &ScoringWeights,
    ratio: f64,
    mid_ref: f64,
    liquidity: f64,
    momentum: f64,
    spread: f64,
    volatility: f64,
) -> Option<f64> {
    if mid_ref <= 0.0 {
        return None;
    }
    let edge = (ratio - mid_ref) / mid_ref;
    Some(
        weights.edge * edge + weights.liquidity * liquidity + weights.momentum * momentum
            - weights.spread * spread
            - weights.volatility * volatility,
    )
}

/// Rank candidate bases from the 24h statistics of `*USDT` symbols.
///
/// Pipeline: volume filter, spread filter, score, shortlist
/// `top_k * shortlist_mult`, route-filter against the held assets, rank.
pub fn select_candidates(
    region: &str,
    stats: &[Ticker24hrStats],
    holdings_valuation: &[(SmolStr, Decimal)],
    resolver: &RouteResolver,
    config: &RankerConfig,
) -> RankOutcome {
    let bias = region_bias(region);
    let mut rejections: BTreeMap<&'static str, u32> = BTreeMap::new();
    let mut scored = Vec::new();

    for row in stats {
        let Some(base) = asset::base_from_usdt_symbol(&row.symbol) else {
            continue;
        };
        if asset::normalize(&base).is_none() {
            continue;
        }

        if row.quote_volume < config.min_volume_usdt {
            *rejections.entry("low_volume").or_insert(0) += 1;
            continue;
        }

        let bid = row.bid_price.and_then(|price| price.to_f64()).unwrap_or(0.0);
        let ask = row.ask_price.and_then(|price| price.to_f64()).unwrap_or(0.0);
        let spread = spread_bps(bid, ask);
        if spread > config.max_spread_bps {
            *rejections.entry("wide_spread").or_insert(0) += 1;
            continue;
        }

        let score = score_ticker(
            row.quote_volume.to_f64().unwrap_or(0.0),
            row.price_change_percent.to_f64().unwrap_or(0.0),
            spread,
            bias,
        );
        scored.push((base, spread, score, row));
    }

    scored.sort_by(|a, b| b.2.total_cmp(&a.2));
    let shortlist_len = scored
        .len()
        .min(config.top_k.max(1) * config.shortlist_mult.max(1));
    let shortlisted = &scored[..shortlist_len];

    let mut candidates = Vec::with_capacity(config.top_k);
    for (base, spread, score, row) in shortlisted {
        if candidates.len() >= config.top_k {
            break;
        }
        let Some(route) = resolver.preferred_route(holdings_valuation, base) else {
            *rejections.entry("no_route").or_insert(0) += 1;
            debug!(%base, "candidate dropped: no route from held assets");
            continue;
        };

        candidates.push(Candidate {
            rank: 0,
            symbol: row.symbol.clone(),
            base: base.clone(),
            score: *score,
            quote_volume: row.quote_volume,
            change_pct: row.price_change_percent,
            spread_bps: *spread,
            last_price: row.last_price,
            route_desc: route.description(),
            min_quote: route.min_quote,
            max_quote: route.max_quote,
            route,
        });
    }

    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
    for (index, candidate) in candidates.iter_mut().enumerate() {
        candidate.rank = index + 1;
    }

    RankOutcome {
        candidates,
        rejections,
        shortlisted: shortlist_len,
    }
}
