use crate::{ranker::Candidate, route::RouteResolver};
use indexmap::IndexMap;
use rotator_execution::order::{ConvertRoute, RebalanceAction};
use rust_decimal::{Decimal, prelude::FromPrimitive};
use smol_str::SmolStr;
use tracing::debug;

const CASH_ASSET: &str = "USDT";

/// Share of total equity a target may drift by before a rebalance action is
/// emitted.
pub const DEFAULT_REBALANCE_THRESHOLD: f64 = 0.08;

/// One slice of the desired portfolio.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetAllocation {
    pub asset: SmolStr,
    pub weight: f64,
    /// Desired notional in the quote asset.
    pub quote_amount: Decimal,
    pub route: ConvertRoute,
    pub min_quote: Decimal,
    pub max_quote: Decimal,
    pub candidate: Candidate,
}

/// Weight scheme by eligible candidate count: {0.6, 0.3, 0.1} for three,
/// {0.7, 0.3} for two, all-in for one.
fn base_weights(count: usize) -> &'static [f64] {
    match count {
        0 => &[],
        1 => &[1.0],
        2 => &[0.7, 0.3],
        _ => &[0.6, 0.3, 0.1],
    }
}

fn decimal_from_f64(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or(Decimal::ZERO)
}

/// Build the target allocation from the top (at most three) candidates.
///
/// A candidate whose slice lands below its route minimum is dropped and the
/// weights recomputed over the remainder, as long as more than one candidate
/// is left. Slices above the route maximum are capped.
pub fn build_target_allocation(
    candidates: &[Candidate],
    total_equity: Decimal,
    holdings_valuation: &[(SmolStr, Decimal)],
    resolver: &RouteResolver,
) -> Vec<TargetAllocation> {
    if total_equity <= Decimal::ZERO {
        return Vec::new();
    }

    let mut pool = candidates
        .iter()
        .take(3)
        .filter_map(|candidate| {
            let route = resolver.preferred_route(holdings_valuation, &candidate.base)?;
            Some((candidate.clone(), route))
        })
        .collect::<Vec<_>>();

    loop {
        if pool.is_empty() {
            return Vec::new();
        }
        let weights = base_weights(pool.len());
        let mut selected = Vec::with_capacity(pool.len());
        let mut dropped = None;

        for (index, ((candidate, route), weight)) in pool.iter().zip(weights).enumerate() {
            let mut quote_amount = total_equity * decimal_from_f64(*weight);
            let (min_quote, max_quote) = (route.min_quote, route.max_quote);

            if min_quote > Decimal::ZERO && quote_amount < min_quote && pool.len() > 1 {
                debug!(
                    asset = %candidate.base,
                    %quote_amount,
                    %min_quote,
                    "target below route minimum, recomputing weights without it"
                );
                dropped = Some(index);
                break;
            }
            if max_quote > Decimal::ZERO && quote_amount > max_quote {
                quote_amount = max_quote;
            }

            selected.push(TargetAllocation {
                asset: candidate.base.clone(),
                weight: *weight,
                quote_amount,
                route: route.clone(),
                min_quote,
                max_quote,
                candidate: candidate.clone(),
            });
        }

        match dropped {
            Some(index) => {
                pool.remove(index);
            }
            None => return selected,
        }
    }
}

/// Diff desired vs. actual holdings into [`RebalanceAction`]s.
///
/// First a liquidation pass: every held asset outside the target set (and not
/// the cash asset) with a route to cash is sold in full, with the projected
/// proceeds folded into the working holdings. Then the allocation pass skips
/// targets within `threshold` of their desired share, sells the surplus of
/// over-allocated targets and buys into under-allocated ones with whatever
/// cash is free.
pub fn plan_rebalance(
    holdings: &IndexMap<SmolStr, Decimal>,
    price_map: &fnv::FnvHashMap<SmolStr, Decimal>,
    targets: &[TargetAllocation],
    resolver: &RouteResolver,
    threshold: f64,
) -> Vec<RebalanceAction> {
    let price_of = |asset: &str| -> Decimal {
        if asset == CASH_ASSET {
            Decimal::ONE
        } else {
            price_map.get(asset).copied().unwrap_or(Decimal::ZERO)
        }
    };

    let mut working: IndexMap<SmolStr, Decimal> = holdings
        .iter()
        .map(|(asset, amount)| (SmolStr::new(asset.to_ascii_uppercase()), *amount))
        .collect();

    let equity = |holdings: &IndexMap<SmolStr, Decimal>| -> Decimal {
        holdings
            .iter()
            .map(|(asset, amount)| *amount * price_of(asset))
            .sum()
    };

    if equity(&working) <= Decimal::ZERO {
        return Vec::new();
    }

    let mut actions = Vec::new();

    // Liquidation pass
    let held = working.keys().cloned().collect::<Vec<_>>();
    for asset in held {
        if asset == CASH_ASSET || targets.iter().any(|target| target.asset == asset) {
            continue;
        }
        let amount = working.get(&asset).copied().unwrap_or(Decimal::ZERO);
        if amount <= Decimal::ZERO {
            continue;
        }
        let Some(route) = resolver.route_exists(&asset, CASH_ASSET) else {
            continue;
        };

        let proceeds = amount * price_of(&asset);
        actions.push(RebalanceAction::new(
            asset.clone(),
            SmolStr::new(CASH_ASSET),
            amount,
            route,
        ));
        working.insert(asset, Decimal::ZERO);
        *working.entry(SmolStr::new(CASH_ASSET)).or_insert(Decimal::ZERO) += proceeds;
    }

    let total_equity = equity(&working);
    if total_equity <= Decimal::ZERO {
        return actions;
    }
    let threshold = decimal_from_f64(threshold);

    // Allocation pass
    for target in targets {
        let price = price_of(&target.asset);
        if price <= Decimal::ZERO {
            continue;
        }

        let current_units = working.get(&target.asset).copied().unwrap_or(Decimal::ZERO);
        let current_notional = current_units * price;
        let diff = current_notional - target.quote_amount;

        let share_diff = (diff / total_equity).abs();
        if share_diff <= threshold {
            continue;
        }

        if diff > Decimal::ZERO {
            // over-allocated: sell the surplus back to cash
            let amount_units = diff / price;
            if amount_units <= Decimal::ZERO {
                continue;
            }
            let Some(route) = resolver.route_exists(&target.asset, CASH_ASSET) else {
                continue;
            };
            actions.push(RebalanceAction::new(
                target.asset.clone(),
                SmolStr::new(CASH_ASSET),
                amount_units,
                route,
            ));
            working.insert(
                target.asset.clone(),
                (current_units - amount_units).max(Decimal::ZERO),
            );
            *working.entry(SmolStr::new(CASH_ASSET)).or_insert(Decimal::ZERO) += diff;
        } else {
            // under-allocated: buy with free cash, bounded by availability
            let need = -diff;
            let cash_free = working.get(CASH_ASSET).copied().unwrap_or(Decimal::ZERO);
            if cash_free <= Decimal::ZERO {
                continue;
            }
            let spend = cash_free.min(need);
            if spend <= Decimal::ZERO {
                continue;
            }
            let Some(route) = resolver.route_exists(CASH_ASSET, &target.asset) else {
                continue;
            };
            actions.push(RebalanceAction::new(
                SmolStr::new(CASH_ASSET),
                target.asset.clone(),
                spend,
                route,
            ));
            working.insert(SmolStr::new(CASH_ASSET), cash_free - spend);
            *working.entry(target.asset.clone()).or_insert(Decimal::ZERO) += spend / price;
        }
    }

    actions
}
