use crate::error::AppError;
use chrono::Utc;
use fnv::FnvHashMap;
use fs2::FileExt;
use indexmap::IndexMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Durable per-region position state: holdings, per-asset price peaks and the
/// portfolio equity peak.
///
/// Mutated only at the end of a trade phase and after guard execution. Peaks
/// ratchet monotonically upward until the state is rebuilt from balances.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct PositionState {
    pub assets: IndexMap<SmolStr, Decimal>,
    pub peaks: IndexMap<SmolStr, Decimal>,
    pub portfolio_peak: Decimal,
    /// Milliseconds since the Unix epoch.
    pub ts: i64,
}

fn price_for(asset: &str, price_map: &FnvHashMap<SmolStr, Decimal>) -> Decimal {
    if asset == "USDT" {
        Decimal::ONE
    } else {
        price_map.get(asset).copied().unwrap_or(Decimal::ZERO)
    }
}

impl PositionState {
    /// Current equity in USDT terms over the provided price map.
    pub fn equity(&self, price_map: &FnvHashMap<SmolStr, Decimal>) -> Decimal {
        self.assets
            .iter()
            .map(|(asset, amount)| *amount * price_for(asset, price_map))
            .sum()
    }

    /// Ratchet per-asset and portfolio peaks upward against current prices.
    pub fn update_peaks(&mut self, price_map: &FnvHashMap<SmolStr, Decimal>) {
        for (asset, amount) in &self.assets {
            if *amount <= Decimal::ZERO {
                continue;
            }
            let price = price_for(asset, price_map);
            if price <= Decimal::ZERO {
                continue;
            }
            let peak = self.peaks.entry(asset.clone()).or_insert(price);
            if price > *peak {
                *peak = price;
            }
        }

        let equity = self.equity(price_map);
        if equity > self.portfolio_peak {
            self.portfolio_peak = equity;
        }
        self.ts = Utc::now().timestamp_millis();
    }

    /// Rebuild holdings from actual balances, keeping (and ratcheting) the
    /// existing peaks.
    pub fn sync_from_balances(
        &mut self,
        balances: &IndexMap<SmolStr, Decimal>,
        price_map: &FnvHashMap<SmolStr, Decimal>,
    ) {
        self.assets = balances
            .iter()
            .filter(|(_, amount)| **amount > Decimal::ZERO)
            .map(|(asset, amount)| (SmolStr::new(asset.to_ascii_uppercase()), *amount))
            .collect();
        self.update_peaks(price_map);
    }
}

/// Legacy on-disk shape: a bare list of `[asset, amount]` pairs from before
/// peaks were tracked.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StoredState {
    Current(PositionState),
    Legacy(Vec<(SmolStr, Decimal)>),
}

fn migrate(stored: StoredState) -> PositionState {
    match stored {
        StoredState::Current(state) => state,
        StoredState::Legacy(pairs) => PositionState {
            assets: pairs
                .into_iter()
                .filter(|(_, amount)| *amount > Decimal::ZERO)
                .collect(),
            peaks: IndexMap::new(),
            portfolio_peak: Decimal::ZERO,
            ts: Utc::now().timestamp_millis(),
        },
    }
}

/// Durable [`PositionState`] storage.
///
/// Writes go to a temporary file in the target directory followed by an
/// atomic rename; a sibling `.lock` file serialises concurrent writers.
#[derive(Debug, Clone)]
pub struct PositionStore {
    path: PathBuf,
}

impl PositionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        let mut lock = self.path.as_os_str().to_owned();
        lock.push(".lock");
        PathBuf::from(lock)
    }

    /// Load the persisted state; a missing or unreadable file degrades to an
    /// empty state rather than blocking the cycle.
    pub fn load(&self) -> PositionState {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(_) => return PositionState::default(),
        };

        match serde_json::from_str::<StoredState>(&raw) {
            Ok(stored) => migrate(stored),
            Err(error) => {
                warn!(path = %self.path.display(), %error, "position state unreadable, starting empty");
                PositionState::default()
            }
        }
    }

    /// Persist atomically under the writer lock.
    pub fn save(&self, state: &PositionState) -> Result<(), AppError> {
        let parent = self
            .path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        fs::create_dir_all(&parent)?;

        let lock_file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.lock_path())?;
        lock_file
            .lock_exclusive()
            .map_err(|error| AppError::State(format!("position lock: {error}")))?;

        let result = self.write_locked(state, &parent);
        let _ = FileExt::unlock(&lock_file);
        result
    }

    fn write_locked(&self, state: &PositionState, parent: &Path) -> Result<(), AppError> {
        let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
        serde_json::to_writer(&mut tmp, state)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path)
            .map_err(|error| AppError::State(format!("atomic rename: {error}")))?;
        Ok(())
    }

    /// Drop the persisted state entirely.
    pub fn clear(&self) -> Result<(), AppError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(error) => Err(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn prices(pairs: &[(&str, Decimal)]) -> FnvHashMap<SmolStr, Decimal> {
        pairs
            .iter()
            .map(|(asset, price)| (SmolStr::new(*asset), *price))
            .collect()
    }

    #[test]
    fn test_peaks_only_ratchet_upward() {
        let mut state = PositionState::default();
        state.assets.insert(SmolStr::new("BTC"), dec!(1));

        state.update_peaks(&prices(&[("BTC", dec!(100))]));
        assert_eq!(state.peaks["BTC"], dec!(100));
        assert_eq!(state.portfolio_peak, dec!(100));

        // lower price leaves both peaks untouched
        state.update_peaks(&prices(&[("BTC", dec!(80))]));
        assert_eq!(state.peaks["BTC"], dec!(100));
        assert_eq!(state.portfolio_peak, dec!(100));

        state.update_peaks(&prices(&[("BTC", dec!(120))]));
        assert_eq!(state.peaks["BTC"], dec!(120));
        assert_eq!(state.portfolio_peak, dec!(120));
    }

    #[test]
    fn test_equity_values_usdt_at_par() {
        let mut state = PositionState::default();
        state.assets.insert(SmolStr::new("BTC"), dec!(2));
        state.assets.insert(SmolStr::new("USDT"), dec!(50));

        let equity = state.equity(&prices(&[("BTC", dec!(100))]));
        assert_eq!(equity, dec!(250));
    }

    #[test]
    fn test_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = PositionStore::new(dir.path().join("position.json"));

        let mut state = PositionState::default();
        state.assets.insert(SmolStr::new("ETH"), dec!(3.5));
        state.peaks.insert(SmolStr::new("ETH"), dec!(2000));
        state.portfolio_peak = dec!(7000);
        state.ts = 1_700_000_000_000;

        store.save(&state).unwrap();
        let loaded = store.load();
        assert_eq!(loaded, state);
    }

    #[test]
    fn test_missing_and_corrupt_files_degrade_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = PositionStore::new(dir.path().join("position.json"));
        assert_eq!(store.load(), PositionState::default());

        fs::write(store.path(), "{not json").unwrap();
        assert_eq!(store.load(), PositionState::default());
    }

    #[test]
    fn test_legacy_pair_list_migrates() {
        let dir = tempfile::tempdir().unwrap();
        let store = PositionStore::new(dir.path().join("position.json"));
        fs::write(store.path(), r#"[["BTC", "0.5"], ["DUST", "0"]]"#).unwrap();

        let state = store.load();
        assert_eq!(state.assets.len(), 1);
        assert_eq!(state.assets["BTC"], dec!(0.5));
        assert_eq!(state.portfolio_peak, Decimal::ZERO);
    }

    #[test]
    fn test_sync_from_balances_keeps_peaks() {
        let mut state = PositionState::default();
        state.assets.insert(SmolStr::new("BTC"), dec!(1));
        state.update_peaks(&prices(&[("BTC", dec!(100))]));

        let balances: IndexMap<SmolStr, Decimal> = [
            (SmolStr::new("BTC"), dec!(0.4)),
            (SmolStr::new("USDT"), dec!(60)),
        ]
        .into_iter()
        .collect();

        state.sync_from_balances(&balances, &prices(&[("BTC", dec!(90))]));
        assert_eq!(state.assets["BTC"], dec!(0.4));
        // old peak survives the resync
        assert_eq!(state.peaks["BTC"], dec!(100));
    }
}
