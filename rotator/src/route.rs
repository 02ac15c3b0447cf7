use crate::asset::HUB_ASSETS;
use fnv::FnvHashMap;
use parking_lot::Mutex;
use rotator_execution::{
    client::binance::requests::exchange_info::ConvertPair,
    order::ConvertRoute,
};
use rust_decimal::Decimal;
use smol_str::SmolStr;

/// Quote limits of one Convert pair (zero means unrestricted).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PairLimits {
    pub min_quote: Decimal,
    pub max_quote: Decimal,
}

/// Snapshot of the venue's supported Convert pairs for one cycle.
#[derive(Debug, Default, Clone)]
pub struct PairTable {
    pairs: FnvHashMap<(SmolStr, SmolStr), PairLimits>,
}

impl PairTable {
    pub fn from_pairs(pairs: impl IntoIterator<Item = ConvertPair>) -> Self {
        let pairs = pairs
            .into_iter()
            .map(|pair| {
                let limits = PairLimits {
                    min_quote: pair.min_quote(),
                    max_quote: pair.max_quote(),
                };
                ((pair.from_asset, pair.to_asset), limits)
            })
            .collect();
        Self { pairs }
    }

    pub fn contains(&self, from: &str, to: &str) -> bool {
        self.limits(from, to).is_some()
    }

    pub fn limits(&self, from: &str, to: &str) -> Option<PairLimits> {
        self.pairs
            .get(&(SmolStr::new(from), SmolStr::new(to)))
            .copied()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Resolves Convert routes over a [`PairTable`] snapshot.
///
/// Single-source lookups are memoized for the lifetime of the resolver, which
/// matches one scheduler cycle.
#[derive(Debug)]
pub struct RouteResolver {
    table: PairTable,
    memo: Mutex<FnvHashMap<(SmolStr, SmolStr), Option<ConvertRoute>>>,
}

impl RouteResolver {
    pub fn new(table: PairTable) -> Self {
        Self {
            table,
            memo: Mutex::new(FnvHashMap::default()),
        }
    }

    pub fn table(&self) -> &PairTable {
        &self.table
    }

    /// Preferred route from a single source: the direct pair when the venue
    /// supports it, otherwise a two-leg route through the first admissible
    /// hub. Limits are those of the first step.
    pub fn route_exists(&self, from: &str, to: &str) -> Option<ConvertRoute> {
        let from = SmolStr::new(from.to_ascii_uppercase());
        let to = SmolStr::new(to.to_ascii_uppercase());
        if from == to {
            return None;
        }

        let key = (from.clone(), to.clone());
        if let Some(route) = self.memo.lock().get(&key) {
            return route.clone();
        }

        let route = self.resolve_single(&from, &to);
        self.memo.lock().insert(key, route.clone());
        route
    }

    fn resolve_single(&self, from: &SmolStr, to: &SmolStr) -> Option<ConvertRoute> {
        if let Some(limits) = self.table.limits(from, to) {
            return Some(ConvertRoute::direct(
                from.clone(),
                to.clone(),
                limits.min_quote,
                limits.max_quote,
            ));
        }

        for hub in HUB_ASSETS {
            if hub == from.as_str() || hub == to.as_str() {
                continue;
            }
            if let Some(limits) = self.table.limits(from, hub) {
                if self.table.contains(hub, to) {
                    return Some(ConvertRoute::via_hub(
                        from.clone(),
                        hub,
                        to.clone(),
                        limits.min_quote,
                        limits.max_quote,
                    ));
                }
            }
        }
        None
    }

    /// Preferred route from a set of held assets to `target`.
    ///
    /// Direct pairs win; among several direct sources the one with the
    /// largest spot valuation is chosen. Otherwise hubs are tried in priority
    /// order, again preferring the richest admissible source.
    pub fn preferred_route(
        &self,
        holdings: &[(SmolStr, Decimal)],
        target: &str,
    ) -> Option<ConvertRoute> {
        let target = SmolStr::new(target.to_ascii_uppercase());

        let mut by_valuation = holdings
            .iter()
            .filter(|(asset, _)| *asset != target)
            .collect::<Vec<_>>();
        by_valuation.sort_by(|a, b| b.1.cmp(&a.1));

        // 1) direct pair from the richest holder
        for (asset, _) in &by_valuation {
            if let Some(limits) = self.table.limits(asset, &target) {
                return Some(ConvertRoute::direct(
                    asset.clone(),
                    target.clone(),
                    limits.min_quote,
                    limits.max_quote,
                ));
            }
        }

        // 2) two legs through the hub priority list
        for hub in HUB_ASSETS {
            if hub == target.as_str() {
                continue;
            }
            if !self.table.contains(hub, &target) {
                continue;
            }
            for (asset, _) in &by_valuation {
                if asset.as_str() == hub {
                    continue;
                }
                if let Some(limits) = self.table.limits(asset, hub) {
                    return Some(ConvertRoute::via_hub(
                        asset.clone(),
                        hub,
                        target.clone(),
                        limits.min_quote,
                        limits.max_quote,
                    ));
                }
            }
        }
        None
    }
}
