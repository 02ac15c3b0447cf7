use crate::error::ThrottleReason;
use chrono::Utc;
use fnv::FnvHashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Venue weight ceiling a single cycle may consume.
pub const MAX_WEIGHT_PER_CYCLE: u64 = 10_000;

/// Quote requests allowed per cycle in steady state.
pub const DEFAULT_MAX_PER_CYCLE: u32 = 20;

/// Quote requests allowed per cycle while soft risk-off is active.
pub const RISK_OFF_MAX_PER_CYCLE: u32 = 5;

/// Daily quote request quota across all cycles.
pub const DAILY_QUOTE_LIMIT: u32 = 950;

#[derive(Debug, Default)]
struct CycleState {
    requests: u32,
    weight: u64,
    breakdown: FnvHashMap<&'static str, u64>,
    max_per_cycle: u32,
}

/// Per-cycle request count and endpoint weight accounting.
///
/// Reset exactly once at cycle start; all writes serialise through the inner
/// mutex. Cheap to clone, all clones share state.
#[derive(Debug, Clone)]
pub struct CycleCounters {
    state: Arc<Mutex<CycleState>>,
}

impl Default for CycleCounters {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of cycle usage for the end-of-cycle summary line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleUsage {
    pub requests: u32,
    pub weight: u64,
    pub breakdown: Vec<(&'static str, u64)>,
}

impl CycleCounters {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(CycleState {
                max_per_cycle: DEFAULT_MAX_PER_CYCLE,
                ..CycleState::default()
            })),
        }
    }

    /// Reset counters at the start of a cycle.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        *state = CycleState {
            max_per_cycle: DEFAULT_MAX_PER_CYCLE,
            ..CycleState::default()
        };
    }

    /// Lower the per-cycle quote cap (risk control).
    pub fn set_cycle_limit(&self, limit: u32) {
        self.state.lock().max_per_cycle = limit.max(1);
    }

    /// Record one executed request and its venue weight.
    pub fn record(&self, endpoint: &'static str, weight: u32) {
        let mut state = self.state.lock();
        state.requests += 1;
        state.weight += u64::from(weight);
        *state.breakdown.entry(endpoint).or_insert(0) += u64::from(weight);
    }

    /// Check the cycle budget before issuing a quote-class request weighing
    /// `next_weight`.
    pub fn check_budget(&self, next_weight: u32) -> Result<(), ThrottleReason> {
        let state = self.state.lock();
        if state.requests >= state.max_per_cycle {
            return Err(ThrottleReason::CycleRequests {
                count: state.requests,
                max: state.max_per_cycle,
            });
        }
        if state.weight + u64::from(next_weight) > MAX_WEIGHT_PER_CYCLE {
            return Err(ThrottleReason::CycleWeight {
                weight: state.weight,
                max: MAX_WEIGHT_PER_CYCLE,
            });
        }
        Ok(())
    }

    pub fn usage(&self) -> CycleUsage {
        let state = self.state.lock();
        let mut breakdown = state
            .breakdown
            .iter()
            .map(|(endpoint, weight)| (*endpoint, *weight))
            .collect::<Vec<_>>();
        breakdown.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
        CycleUsage {
            requests: state.requests,
            weight: state.weight,
            breakdown,
        }
    }

    /// Emit the per-cycle summary line.
    pub fn log_summary(&self) {
        let usage = self.usage();
        info!(
            requests = usage.requests,
            weight = usage.weight,
            breakdown = ?usage.breakdown,
            "cycle counters"
        );
    }
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct DailyQuotaState {
    date: String,
    count: u32,
}

/// Persistent daily quote counter shared across process invocations.
///
/// Resets when the UTC date rolls over. Load failures degrade to an empty
/// counter rather than blocking the cycle.
#[derive(Debug, Clone)]
pub struct DailyQuota {
    path: PathBuf,
    limit: u32,
}

impl DailyQuota {
    pub fn new(path: impl Into<PathBuf>, limit: u32) -> Self {
        Self {
            path: path.into(),
            limit,
        }
    }

    fn today() -> String {
        Utc::now().format("%Y-%m-%d").to_string()
    }

    fn load(&self) -> DailyQuotaState {
        let state = std::fs::read_to_string(&self.path)
            .ok()
            .and_then(|raw| serde_json::from_str::<DailyQuotaState>(&raw).ok())
            .unwrap_or_default();

        if state.date == Self::today() {
            state
        } else {
            DailyQuotaState {
                date: Self::today(),
                count: 0,
            }
        }
    }

    fn save(&self, state: &DailyQuotaState) {
        if let Some(parent) = self.path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        match serde_json::to_string(state) {
            Ok(raw) => {
                if let Err(error) = std::fs::write(&self.path, raw) {
                    warn!(path = %self.path.display(), %error, "failed to persist daily quota");
                }
            }
            Err(error) => warn!(%error, "failed to serialise daily quota"),
        }
    }

    /// Today's consumed quote count.
    pub fn count(&self) -> u32 {
        self.load().count
    }

    /// Record one quote request, returning the new count.
    pub fn increment(&self) -> u32 {
        let mut state = self.load();
        state.count += 1;
        self.save(&state);
        state.count
    }

    /// Check the daily budget before issuing a quote request.
    pub fn check(&self) -> Result<(), ThrottleReason> {
        let count = self.count();
        if count >= self.limit {
            Err(ThrottleReason::DailyQuota {
                count,
                limit: self.limit,
            })
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_budget_request_cap() {
        let counters = CycleCounters::new();
        counters.set_cycle_limit(2);
        counters.record("getQuote", 200);
        counters.record("getQuote", 200);

        match counters.check_budget(200) {
            Err(ThrottleReason::CycleRequests { count: 2, max: 2 }) => {}
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_cycle_budget_weight_ceiling() {
        let counters = CycleCounters::new();
        counters.record("tradeFlow", 3_000);
        counters.record("exchangeInfo", 3_000);
        counters.record("exchangeInfo", 3_000);
        // 9_000 consumed: another 3_000 would cross the 10_000 ceiling
        assert!(matches!(
            counters.check_budget(3_000),
            Err(ThrottleReason::CycleWeight { .. })
        ));
        // but a light call still fits
        assert!(counters.check_budget(200).is_ok());
    }

    #[test]
    fn test_reset_clears_usage_and_limit() {
        let counters = CycleCounters::new();
        counters.set_cycle_limit(1);
        counters.record("getQuote", 200);
        counters.reset();

        let usage = counters.usage();
        assert_eq!(usage.requests, 0);
        assert_eq!(usage.weight, 0);
        assert!(usage.breakdown.is_empty());
        assert!(counters.check_budget(200).is_ok());
    }

    #[test]
    fn test_daily_quota_rolls_and_limits() {
        let dir = std::env::temp_dir().join(format!("rotator-quota-{}", std::process::id()));
        let path = dir.join("quote_count.json");
        let _ = std::fs::remove_file(&path);

        let quota = DailyQuota::new(&path, 2);
        assert_eq!(quota.count(), 0);
        assert!(quota.check().is_ok());
        quota.increment();
        quota.increment();
        assert!(matches!(
            quota.check(),
            Err(ThrottleReason::DailyQuota { count: 2, limit: 2 })
        ));

        let _ = std::fs::remove_file(&path);
    }
}
