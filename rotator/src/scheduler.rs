use crate::error::AppError;
use chrono::{NaiveTime, Utc};
use fs2::FileExt;
use rand::Rng;
use std::fmt;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// Named configuration profile mapping to distinct analyze/trade UTC windows
/// and a scoring bias.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, clap::ValueEnum)]
pub enum Region {
    Asia,
    Us,
}

impl Region {
    pub fn as_str(&self) -> &'static str {
        match self {
            Region::Asia => "asia",
            Region::Us => "us",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Region {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "asia" => Ok(Region::Asia),
            "us" => Ok(Region::Us),
            other => Err(format!("unknown region: {other}")),
        }
    }
}

/// Half-open UTC time window `[from, to)`, wrap-around midnight supported.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Window {
    pub from: NaiveTime,
    pub to: NaiveTime,
}

impl Window {
    /// Parse `"HH:MM-HH:MM"`.
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        let (from, to) = raw
            .split_once('-')
            .ok_or_else(|| AppError::Config(format!("window {raw:?} must be HH:MM-HH:MM")))?;
        let parse_time = |time: &str| {
            NaiveTime::parse_from_str(time.trim(), "%H:%M")
                .map_err(|error| AppError::Config(format!("window time {time:?}: {error}")))
        };
        Ok(Self {
            from: parse_time(from)?,
            to: parse_time(to)?,
        })
    }

    pub fn contains(&self, time: NaiveTime) -> bool {
        if self.from <= self.to {
            self.from <= time && time < self.to
        } else {
            // spans midnight
            time >= self.from || time < self.to
        }
    }

    pub fn contains_now(&self) -> bool {
        self.contains(Utc::now().time())
    }
}

/// Analyze and trade windows of one region.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct RegionWindows {
    pub analyze: Window,
    pub trade: Window,
}

impl RegionWindows {
    pub fn in_analyze_window(&self) -> bool {
        self.analyze.contains_now()
    }

    pub fn in_trade_window(&self) -> bool {
        self.trade.contains_now()
    }
}

/// Sleep a uniform random duration in `[0, max_sec]` before the first
/// outbound call, de-synchronising regions that start on the same cron edge.
pub async fn sleep_jitter(max_sec: u64) {
    if max_sec == 0 {
        return;
    }
    let delay = Duration::from_secs_f64(rand::rng().random_range(0.0..=max_sec as f64));
    info!(delay_ms = delay.as_millis() as u64, "startup jitter");
    tokio::time::sleep(delay).await;
}

/// Per-region advisory lock held for the lifetime of a run.
///
/// Acquisition is non-blocking: a second process on the same region exits
/// with "another instance running" instead of queueing behind the first.
#[derive(Debug)]
pub struct RegionLock {
    file: std::fs::File,
    path: PathBuf,
}

impl RegionLock {
    pub fn lock_path(lock_dir: &Path, region: Region) -> PathBuf {
        lock_dir.join(format!("{region}.lock"))
    }

    pub fn acquire(lock_dir: &Path, region: Region) -> Result<Self, AppError> {
        std::fs::create_dir_all(lock_dir)?;
        let path = Self::lock_path(lock_dir, region);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)?;

        file.try_lock_exclusive().map_err(|_| {
            AppError::Lock(format!(
                "another instance running for region {region} ({})",
                path.display()
            ))
        })?;

        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RegionLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

/// Cycle phases in execution order. Each phase owns one exit-code bit; a
/// run's exit code is the bitwise-or of its failed phases.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, clap::ValueEnum)]
pub enum Phase {
    // ValueEnum's kebab-case rename yields the canonical "pre-analyze"
    PreAnalyze,
    Analyze,
    Trade,
    Guard,
}

impl Phase {
    pub fn exit_bit(&self) -> u8 {
        match self {
            Phase::PreAnalyze => 0b0001,
            Phase::Analyze => 0b0010,
            Phase::Trade => 0b0100,
            Phase::Guard => 0b1000,
        }
    }

    pub const SEQUENCE: [Phase; 4] = [Phase::PreAnalyze, Phase::Analyze, Phase::Trade, Phase::Guard];
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::PreAnalyze => "pre-analyze",
            Phase::Analyze => "analyze",
            Phase::Trade => "trade",
            Phase::Guard => "guard",
        };
        write!(f, "{name}")
    }
}

impl FromStr for Phase {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "pre-analyze" | "preanalyze" => Ok(Phase::PreAnalyze),
            "analyze" => Ok(Phase::Analyze),
            "trade" => Ok(Phase::Trade),
            "guard" => Ok(Phase::Guard),
            other => Err(format!("unknown phase: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn time(raw: &str) -> NaiveTime {
        NaiveTime::parse_from_str(raw, "%H:%M").unwrap()
    }

    #[test]
    fn test_window_parse_and_contains() {
        let window = Window::parse("01:30-03:00").unwrap();
        assert!(!window.contains(time("01:29")));
        assert!(window.contains(time("01:30")));
        assert!(window.contains(time("02:59")));
        assert!(!window.contains(time("03:00")));

        assert!(Window::parse("0130-0300").is_err());
        assert!(Window::parse("25:00-03:00").is_err());
    }

    #[test]
    fn test_window_spanning_midnight() {
        let window = Window::parse("23:00-01:00").unwrap();
        assert!(window.contains(time("23:30")));
        assert!(window.contains(time("00:30")));
        assert!(!window.contains(time("12:00")));
    }

    #[test]
    fn test_region_lock_is_exclusive() {
        let dir = tempfile::tempdir().unwrap();
        let first = RegionLock::acquire(dir.path(), Region::Asia).unwrap();

        let second = RegionLock::acquire(dir.path(), Region::Asia);
        assert!(matches!(second, Err(AppError::Lock(_))));

        // a different region locks independently
        let other = RegionLock::acquire(dir.path(), Region::Us);
        assert!(other.is_ok());

        drop(first);
        let reacquired = RegionLock::acquire(dir.path(), Region::Asia);
        assert!(reacquired.is_ok());
    }

    #[test]
    fn test_phase_exit_bits_compose() {
        let combined = Phase::Analyze.exit_bit() | Phase::Guard.exit_bit();
        assert_eq!(combined, 0b1010);
        assert_eq!(
            Phase::SEQUENCE
                .iter()
                .map(Phase::exit_bit)
                .fold(0, |acc, bit| acc | bit),
            0b1111
        );
    }

    #[test]
    fn test_phase_round_trip() {
        for phase in Phase::SEQUENCE {
            assert_eq!(phase.to_string().parse::<Phase>().unwrap(), phase);
        }
    }
}
