use crate::{position::PositionState, route::RouteResolver};
use fnv::FnvHashMap;
use rotator_execution::order::RebalanceAction;
use rust_decimal::Decimal;
use smol_str::SmolStr;
use tracing::warn;

const CASH_ASSET: &str = "USDT";

/// Peak-to-trough ratio at which the stop fires (a 15% drawdown).
pub fn stop_ratio() -> Decimal {
    Decimal::new(85, 2)
}

/// Liquidations demanded by the drawdown stop.
#[derive(Debug, Clone, Default)]
pub struct GuardOutcome {
    pub actions: Vec<RebalanceAction>,
    pub asset_triggers: Vec<SmolStr>,
    pub portfolio_trigger: bool,
}

impl GuardOutcome {
    pub fn triggered(&self) -> bool {
        !self.actions.is_empty()
    }
}

fn liquidation(
    asset: &SmolStr,
    amount: Decimal,
    resolver: &RouteResolver,
) -> Option<RebalanceAction> {
    let route = resolver.route_exists(asset, CASH_ASSET)?;
    Some(RebalanceAction::new(
        asset.clone(),
        SmolStr::new(CASH_ASSET),
        amount,
        route,
    ))
}

/// Evaluate both stop triggers against current prices.
///
/// Per-asset: price at or below 85% of the tracked peak sells that holding in
/// full. Portfolio: equity at or below 85% of the portfolio peak supersedes
/// any per-asset triggers and liquidates every non-cash holding with a route.
pub fn evaluate(
    state: &PositionState,
    price_map: &FnvHashMap<SmolStr, Decimal>,
    resolver: &RouteResolver,
) -> GuardOutcome {
    let mut outcome = GuardOutcome::default();

    for (asset, amount) in &state.assets {
        if asset == CASH_ASSET || *amount <= Decimal::ZERO {
            continue;
        }
        let Some(peak) = state.peaks.get(asset).copied() else {
            continue;
        };
        let Some(price) = price_map.get(asset).copied() else {
            continue;
        };
        if peak <= Decimal::ZERO || price <= Decimal::ZERO {
            continue;
        }

        if price <= peak * stop_ratio() {
            match liquidation(asset, *amount, resolver) {
                Some(action) => {
                    outcome.actions.push(action);
                    outcome.asset_triggers.push(asset.clone());
                }
                None => warn!(%asset, "drawdown trigger without a liquidation route"),
            }
        }
    }

    let equity = state.equity(price_map);
    if state.portfolio_peak > Decimal::ZERO && equity <= state.portfolio_peak * stop_ratio() {
        // Portfolio-level stop supersedes per-asset triggers.
        outcome.portfolio_trigger = true;
        outcome.actions.clear();
        outcome.asset_triggers.clear();

        for (asset, amount) in &state.assets {
            if asset == CASH_ASSET || *amount <= Decimal::ZERO {
                continue;
            }
            match liquidation(asset, *amount, resolver) {
                Some(action) => {
                    outcome.actions.push(action);
                    outcome.asset_triggers.push(asset.clone());
                }
                None => warn!(%asset, "portfolio stop: no liquidation route"),
            }
        }
    }

    outcome
}
