use crate::{error::AppError, ranker::Candidate};
use rotator_execution::order::ConvertHistoryRecord;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// One pre-analyze balance audit row: what is held, and whether (and why
/// not) it can be routed through Convert.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BalanceRow {
    pub asset: SmolStr,
    pub amount: Decimal,
    pub normalised: Option<SmolStr>,
    pub convertible: bool,
    pub reason: String,
}

pub fn balance_pre_path(dir: &Path) -> PathBuf {
    dir.join("balance.pre.csv")
}

pub fn candidates_csv_path(dir: &Path, region: &str) -> PathBuf {
    dir.join(format!("candidates.{region}.csv"))
}

pub fn candidates_json_path(dir: &Path, region: &str) -> PathBuf {
    dir.join(format!("candidates.{region}.json"))
}

pub fn trade_log_path(dir: &Path, region: &str) -> PathBuf {
    dir.join(format!("trade.{region}.log"))
}

pub fn history_path(dir: &Path) -> PathBuf {
    dir.join("convert_history.json")
}

pub fn summary_path(dir: &Path) -> PathBuf {
    dir.join("summary.txt")
}

/// Write the pre-analyze convertibility snapshot.
pub fn write_balance_pre_csv(dir: &Path, rows: &[BalanceRow]) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_path(balance_pre_path(dir))?;
    writer.write_record(["asset", "amount", "normalised", "convertible", "reason"])?;
    for row in rows {
        writer.write_record([
            row.asset.to_string(),
            row.amount.to_string(),
            row.normalised.as_deref().unwrap_or("").to_string(),
            if row.convertible { "yes" } else { "no" }.to_string(),
            row.reason.clone(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// Write the ranked candidates as both the per-region CSV audit table and the
/// JSON artifact the trade phase reads back.
pub fn write_candidates(dir: &Path, region: &str, candidates: &[Candidate]) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_path(candidates_csv_path(dir, region))?;
    writer.write_record([
        "rank",
        "symbol",
        "base",
        "score",
        "qVol",
        "chg",
        "spread_bps",
        "last_price",
        "route",
        "min_quote",
        "max_quote",
    ])?;
    for candidate in candidates {
        writer.write_record([
            candidate.rank.to_string(),
            candidate.symbol.to_string(),
            candidate.base.to_string(),
            format!("{:.6}", candidate.score),
            candidate.quote_volume.to_string(),
            candidate.change_pct.to_string(),
            format!("{:.2}", candidate.spread_bps),
            candidate.last_price.to_string(),
            candidate.route_desc.clone(),
            candidate.min_quote.to_string(),
            candidate.max_quote.to_string(),
        ])?;
    }
    writer.flush()?;

    let json = serde_json::to_string_pretty(candidates)?;
    fs::write(candidates_json_path(dir, region), json)?;
    Ok(())
}

/// Read back the candidates the analyze phase produced for `region`.
/// `None` when no analyze artifact exists for the day.
pub fn read_candidates(dir: &Path, region: &str) -> Result<Option<Vec<Candidate>>, AppError> {
    let path = candidates_json_path(dir, region);
    let raw = match fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(error) => return Err(error.into()),
    };
    Ok(Some(serde_json::from_str(&raw)?))
}

/// Append one analyze summary block: selection count plus the rejection
/// breakdown by reason.
pub fn append_summary(
    dir: &Path,
    region: &str,
    selected: usize,
    rejections: &BTreeMap<&'static str, u32>,
) -> Result<(), AppError> {
    let mut text = format!("Region={region} Total={selected}\n");
    if !rejections.is_empty() {
        text.push_str("Rejections:\n");
        for (reason, count) in rejections {
            text.push_str(&format!("  {reason}: {count}\n"));
        }
    }
    append_line_raw(&summary_path(dir), &text)
}

/// Append one human-readable trade log line.
pub fn append_trade_line(dir: &Path, region: &str, line: &str) -> Result<(), AppError> {
    append_line_raw(&trade_log_path(dir, region), &format!("{line}\n"))
}

fn append_line_raw(path: &Path, text: &str) -> Result<(), AppError> {
    use std::io::Write;
    let mut file = fs::OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(text.as_bytes())?;
    Ok(())
}

/// Append execution records to the day's convert history, rewriting the file
/// atomically.
pub fn append_history(dir: &Path, records: &[ConvertHistoryRecord]) -> Result<(), AppError> {
    if records.is_empty() {
        return Ok(());
    }
    let path = history_path(dir);

    let mut history: Vec<ConvertHistoryRecord> = match fs::read_to_string(&path) {
        Ok(raw) => serde_json::from_str(&raw).unwrap_or_default(),
        Err(_) => Vec::new(),
    };
    history.extend_from_slice(records);

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    serde_json::to_writer(&mut tmp, &history)?;
    tmp.persist(&path)
        .map_err(|error| AppError::State(format!("history rename: {error}")))?;
    Ok(())
}

/// Load the day's convert history (empty when absent).
pub fn read_history(dir: &Path) -> Vec<ConvertHistoryRecord> {
    fs::read_to_string(history_path(dir))
        .ok()
        .and_then(|raw| serde_json::from_str(&raw).ok())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rotator_execution::order::ConvertRoute;
    use rust_decimal_macros::dec;

    fn candidate(base: &str, rank: usize) -> Candidate {
        Candidate {
            rank,
            symbol: SmolStr::new(format!("{base}USDT")),
            base: SmolStr::new(base),
            score: 5.4321,
            quote_volume: dec!(10000000),
            change_pct: dec!(2.5),
            spread_bps: 3.0,
            last_price: dec!(10),
            route: ConvertRoute::direct("USDT", base, dec!(10), dec!(0)),
            route_desc: "direct".to_string(),
            min_quote: dec!(10),
            max_quote: dec!(0),
        }
    }

    #[test]
    fn test_candidates_round_trip_through_json() {
        let dir = tempfile::tempdir().unwrap();
        let candidates = vec![candidate("SOL", 1), candidate("BNB", 2)];

        write_candidates(dir.path(), "asia", &candidates).unwrap();
        let loaded = read_candidates(dir.path(), "asia").unwrap().unwrap();
        assert_eq!(loaded, candidates);

        // a different region has no artifact
        assert!(read_candidates(dir.path(), "us").unwrap().is_none());
    }

    #[test]
    fn test_history_appends_across_calls() {
        let dir = tempfile::tempdir().unwrap();
        let record = ConvertHistoryRecord {
            quote_id: Some("q1".to_string()),
            order_id: Some("o1".to_string()),
            from_token: SmolStr::new("USDT"),
            to_token: SmolStr::new("BTC"),
            ratio: Some(dec!(0.00003)),
            inverse_ratio: Some(dec!(33333)),
            from_amount: Some(dec!(100)),
            to_amount: Some(dec!(0.003)),
            score: Some(1.0),
            expected_profit: None,
            prob_up: None,
            accepted: true,
            error_code: None,
            error_msg: None,
            timestamp: 1_700_000_000_000,
        };

        append_history(dir.path(), &[record.clone()]).unwrap();
        append_history(dir.path(), &[record.clone()]).unwrap();

        let history = read_history(dir.path());
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].order_id.as_deref(), Some("o1"));
    }

    #[test]
    fn test_balance_pre_csv_written() {
        let dir = tempfile::tempdir().unwrap();
        let rows = vec![
            BalanceRow {
                asset: SmolStr::new("BTC"),
                amount: dec!(0.5),
                normalised: Some(SmolStr::new("BTC")),
                convertible: true,
                reason: String::new(),
            },
            BalanceRow {
                asset: SmolStr::new("BTCUP"),
                amount: dec!(3),
                normalised: None,
                convertible: false,
                reason: "blocked_suffix".to_string(),
            },
        ];

        write_balance_pre_csv(dir.path(), &rows).unwrap();
        let text = fs::read_to_string(balance_pre_path(dir.path())).unwrap();
        assert!(text.starts_with("asset,amount,normalised,convertible,reason"));
        assert!(text.contains("BTCUP,3,,no,blocked_suffix"));
    }

    #[test]
    fn test_summary_accumulates() {
        let dir = tempfile::tempdir().unwrap();
        let mut rejections = BTreeMap::new();
        rejections.insert("low_volume", 3u32);
        rejections.insert("no_route", 1u32);

        append_summary(dir.path(), "us", 2, &rejections).unwrap();
        append_summary(dir.path(), "us", 0, &BTreeMap::new()).unwrap();

        let text = fs::read_to_string(summary_path(dir.path())).unwrap();
        assert!(text.contains("Region=us Total=2"));
        assert!(text.contains("  low_volume: 3"));
        assert!(text.contains("Region=us Total=0"));
    }
}
