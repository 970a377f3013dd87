// =============================================================================
// Persistence — spec.md §6, §4.9
// =============================================================================
//
// Writes, on `cleanup()`: a JSON session file with the full round log,
// config snapshot, final leaderboard, and session summary; a CSV of the
// final leaderboard. Both use the atomic tmp+rename pattern taken directly
// from the teacher's `runtime_config.rs::save`. Failure to write either is
// logged but does not propagate (spec.md §4.9).
// =============================================================================

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::types::{LeaderboardRow, RoundRecord};

pub const RESULTS_DIR: &str = "data/results";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfigSnapshot {
    pub decision_interval: u64,
    pub capital_per_model: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionReport {
    pub session_id: String,
    pub session_start: DateTime<Utc>,
    pub session_end: Option<DateTime<Utc>>,
    pub symbols: Vec<String>,
    pub total_rounds: u64,
    pub config: SessionConfigSnapshot,
    pub final_leaderboard: Vec<LeaderboardRow>,
    pub round_results: Vec<RoundRecord>,
    pub summary: String,
}

/// `YYYYMMDD_HHMMSS` of session start, local time.
pub fn session_id_for(started_at: DateTime<Local>) -> String {
    started_at.format("%Y%m%d_%H%M%S").to_string()
}

fn atomic_write(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create results directory {}", parent.display()))?;
    }
    let tmp_path = path.with_extension(format!(
        "{}.tmp",
        path.extension().and_then(|e| e.to_str()).unwrap_or("tmp")
    ));
    std::fs::write(&tmp_path, content)
        .with_context(|| format!("failed to write tmp file {}", tmp_path.display()))?;
    std::fs::rename(&tmp_path, path)
        .with_context(|| format!("failed to rename tmp file to {}", path.display()))?;
    Ok(())
}

/// Write `data/results/session_<sessionId>.json`. Logs and swallows any
/// failure — persistence failure must never abort a clean shutdown.
pub fn write_session_json(results_dir: &Path, report: &SessionReport) {
    let path: PathBuf = results_dir.join(format!("session_{}.json", report.session_id));
    let write = (|| -> Result<()> {
        let content = serde_json::to_string_pretty(report).context("failed to serialize session report")?;
        atomic_write(&path, &content)
    })();
    if let Err(e) = write {
        warn!(error = %e, path = %path.display(), "failed to write session report");
    }
}

/// Write `data/results/leaderboard_<sessionId>.csv`: header row plus one row
/// per model, columns matching the `LeaderboardRow` field order. No crate
/// exists in the retrieved example pack for CSV writing; the format is
/// simple enough (flat decimal/string columns, no embedded commas or quotes
/// possible in any field) that hand-written line joining is used instead.
pub fn write_leaderboard_csv(results_dir: &Path, session_id: &str, rows: &[LeaderboardRow]) {
    let path: PathBuf = results_dir.join(format!("leaderboard_{session_id}.csv"));
    let write = (|| -> Result<()> {
        let mut content = String::from("model_id,total_return_pct,total_value,cash,trades,win_rate,errors,enabled\n");
        for r in rows {
            content.push_str(&format!(
                "{},{},{},{},{},{},{},{}\n",
                r.model_id, r.total_return_pct, r.total_value, r.cash, r.trades, r.win_rate, r.errors, r.enabled
            ));
        }
        atomic_write(&path, &content)
    })();
    if let Err(e) = write {
        warn!(error = %e, path = %path.display(), "failed to write leaderboard csv");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn session_id_format_matches_spec() {
        let t = Local.with_ymd_and_hms(2026, 8, 1, 9, 5, 3).unwrap();
        assert_eq!(session_id_for(t), "20260801_090503");
    }

    #[test]
    fn write_session_json_round_trips() {
        let dir = std::env::temp_dir().join(format!("arena-test-{}", uuid::Uuid::new_v4()));
        let report = SessionReport {
            session_id: "20260101_000000".into(),
            session_start: Utc::now(),
            session_end: None,
            symbols: vec!["BTC/USDT".into()],
            total_rounds: 2,
            config: SessionConfigSnapshot { decision_interval: 300, capital_per_model: 1000.0 },
            final_leaderboard: vec![],
            round_results: vec![],
            summary: "ran fine".into(),
        };
        write_session_json(&dir, &report);
        let path = dir.join("session_20260101_000000.json");
        let content = std::fs::read_to_string(&path).unwrap();
        let parsed: SessionReport = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed.session_id, report.session_id);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn write_leaderboard_csv_has_header_and_one_row_per_model() {
        let dir = std::env::temp_dir().join(format!("arena-test-{}", uuid::Uuid::new_v4()));
        let rows = vec![
            LeaderboardRow {
                model_id: "a".into(),
                total_return_pct: 1.5,
                total_value: 1015.0,
                cash: 1015.0,
                trades: 2,
                win_rate: 100.0,
                errors: 0,
                enabled: true,
            },
        ];
        write_leaderboard_csv(&dir, "20260101_000000", &rows);
        let path = dir.join("leaderboard_20260101_000000.csv");
        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("model_id,"));
        assert!(lines[1].starts_with("a,"));
        std::fs::remove_dir_all(&dir).ok();
    }
}
