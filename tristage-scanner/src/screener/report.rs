//! Report generation for scan outcomes.
//!
//! Generates reports in several formats:
//! - Markdown (human-readable summary with funnel and result tables)
//! - JSON (the full outcome, machine-readable)
//! - Watchlist (one symbol per line, importable into charting tools)

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tristage_common::error::{Result, ResultExt};

use super::engine::ScanOutcome;
use super::evaluate::ScanResult;

// ============================================================================
// Report Format
// ============================================================================

/// Supported report formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    /// Markdown format (human-readable)
    Markdown,
    /// JSON format (machine-readable)
    Json,
    /// Plain symbol list
    Watchlist,
}

impl ReportFormat {
    /// Default file extension.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Markdown => "md",
            Self::Json => "json",
            Self::Watchlist => "txt",
        }
    }
}

impl std::fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Markdown => write!(f, "markdown"),
            Self::Json => write!(f, "json"),
            Self::Watchlist => write!(f, "watchlist"),
        }
    }
}

impl std::str::FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "markdown" | "md" => Ok(Self::Markdown),
            "json" => Ok(Self::Json),
            "watchlist" | "txt" | "tv" => Ok(Self::Watchlist),
            _ => Err(format!("Unknown report format: {}", s)),
        }
    }
}

// ============================================================================
// Scan Report
// ============================================================================

/// Report generator for a scan outcome.
pub struct ScanReport {
    outcome: ScanOutcome,
}

impl ScanReport {
    /// Create a new report from a scan outcome.
    pub fn new(outcome: ScanOutcome) -> Self {
        Self { outcome }
    }

    /// Generate report in the specified format.
    pub fn generate(&self, format: ReportFormat) -> String {
        match format {
            ReportFormat::Markdown => self.to_markdown(),
            ReportFormat::Json => self.to_json(),
            ReportFormat::Watchlist => self.outcome.watchlist(),
        }
    }

    /// Save report to file, adding the format's extension when the path has
    /// none.
    pub fn save_to_file(&self, path: &Path, format: ReportFormat) -> Result<PathBuf> {
        let content = self.generate(format);

        let file_path = if path.extension().is_none() {
            path.with_extension(format.extension())
        } else {
            path.to_path_buf()
        };

        if let Some(parent) = file_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .context(format!("creating {}", parent.display()))?;
            }
        }

        std::fs::write(&file_path, content).context(format!("writing {}", file_path.display()))?;

        Ok(file_path)
    }

    /// Generate markdown report.
    pub fn to_markdown(&self) -> String {
        let outcome = &self.outcome;
        let mut md = String::new();

        md.push_str(&format!(
            "# Scan Report\n\n**Scan ID**: {}\n**Completed**: {}\n**Duration**: {:.1}s\n\n",
            outcome.id,
            outcome.completed_at.format("%Y-%m-%d %H:%M:%S"),
            outcome.duration_secs
        ));

        md.push_str("## Summary\n\n");
        md.push_str(&format!("- **Candidates**: {}\n", outcome.total_candidates));
        md.push_str(&format!("- **Passed**: {}\n", outcome.results.len()));
        md.push_str(&format!("- **Stages**: {}\n", stage_summary(outcome)));
        if outcome.discovery_failed {
            md.push_str("- **Discovery**: failed, no candidates were evaluated\n");
        }
        let skip_counts = outcome.skip_counts();
        if !skip_counts.is_empty() {
            let parts: Vec<String> = skip_counts
                .iter()
                .map(|(category, count)| format!("{} {}", category, count))
                .collect();
            md.push_str(&format!("- **Skipped**: {}\n", parts.join(", ")));
        }
        md.push('\n');

        md.push_str("### Filter Funnel\n\n");
        md.push_str("| Stage | Passed | Eliminated | Rate |\n");
        md.push_str("|-------|--------|------------|------|\n");
        for fr in &outcome.funnel {
            md.push_str(&format!(
                "| {} | {} | {} | {:.1}% |\n",
                fr.stage, fr.passed, fr.eliminated, fr.elimination_rate
            ));
        }
        md.push('\n');

        md.push_str("## Results\n\n");
        if outcome.results.is_empty() {
            md.push_str("No matches found.\n\n");
        } else {
            md.push_str(
                "| Symbol | Action | Price | Move | Condition | Vol Δ | ATR Δ | Momentum | Streak |\n",
            );
            md.push_str(
                "|--------|--------|-------|------|-----------|-------|-------|----------|--------|\n",
            );
            for result in &outcome.results {
                md.push_str(&result_row(result));
            }
            md.push('\n');
        }

        md.push_str("---\n\n");
        md.push_str(&format!(
            "*Report generated at {} UTC*\n",
            Utc::now().format("%Y-%m-%d %H:%M:%S")
        ));

        md
    }

    /// Generate JSON report.
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(&self.outcome).unwrap_or_else(|_| "{}".to_string())
    }

}

fn stage_summary(outcome: &ScanOutcome) -> String {
    let flag = |on: bool| if on { "on" } else { "off" };
    format!(
        "volatility {}, trend {}, momentum {}",
        flag(outcome.stages.stage1_enabled),
        flag(outcome.stages.stage2_enabled),
        flag(outcome.stages.stage3_enabled)
    )
}

fn pct(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{:+.1}%", v))
}

fn condition_cell(result: &ScanResult) -> String {
    match result.condition.hint() {
        "" => result.condition.to_string(),
        hint => format!("{} ({})", result.condition, hint),
    }
}

fn result_row(result: &ScanResult) -> String {
    format!(
        "| {} | {} | {:.2} | {:+.1}% | {} | {} | {} | {} | {}w / {}d |\n",
        result.symbol,
        result.action,
        result.price,
        result.move_pct,
        condition_cell(result),
        pct(result.volume_change_pct),
        pct(result.atr_change_pct),
        if result.momentum_confirmed { "yes" } else { "no" },
        result.condition_streak,
        result.momentum_streak,
    )
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{ConditionLabel, TrendDirection};
    use crate::screener::engine::SkippedSymbol;
    use crate::screener::evaluate::SkipReason;
    use crate::screener::funnel::{funnel_from_eliminations, FilterStage};
    use chrono::NaiveDate;
    use tristage_common::config::StageToggles;

    fn create_test_outcome(results: Vec<ScanResult>) -> ScanOutcome {
        let skipped = vec![SkippedSymbol {
            symbol: "ZZZZ".to_string(),
            reason: SkipReason::InsufficientHistory {
                bars: 40,
                required: 260,
            },
        }];
        let funnel =
            funnel_from_eliminations(results.len() + 1, &[FilterStage::History], results.len());
        ScanOutcome {
            id: "scan_test".to_string(),
            stages: StageToggles::all(),
            total_candidates: results.len() + 1,
            results,
            skipped,
            funnel,
            discovery_failed: false,
            started_at: Utc::now(),
            completed_at: Utc::now(),
            duration_secs: 2.5,
        }
    }

    fn create_test_result() -> ScanResult {
        ScanResult {
            symbol: "NVDA".to_string(),
            as_of: NaiveDate::from_ymd_opt(2024, 6, 7).unwrap(),
            direction: TrendDirection::Up,
            action: "LONG".to_string(),
            price: 120.5,
            move_pct: -18.0,
            condition: ConditionLabel::Compression,
            volume_change_pct: Some(12.0),
            atr_change_pct: Some(-8.0),
            atr_now: Some(4.6),
            atr_prev: Some(5.0),
            volume_now: 1_120_000,
            volume_prev: 1_000_000,
            momentum_confirmed: true,
            momentum_streak: 4,
            condition_streak: 2,
        }
    }

    #[test]
    fn test_markdown_generation() {
        let report = ScanReport::new(create_test_outcome(vec![create_test_result()]));
        let md = report.to_markdown();

        assert!(md.contains("# Scan Report"));
        assert!(md.contains(
            "| NVDA | LONG | 120.50 | -18.0% | Compression (Vol↑ ATR↓) | +12.0% | -8.0% |"
        ));
        assert!(md.contains("Filter Funnel"));
        assert!(md.contains("insufficient_history 1"));
    }

    #[test]
    fn test_condition_cell_hints() {
        let mut result = create_test_result();
        result.condition = ConditionLabel::QuietBreakout;
        assert_eq!(condition_cell(&result), "Quiet Breakout (Vol↑↑ ATR~)");

        result.condition = ConditionLabel::None;
        assert_eq!(condition_cell(&result), "None");
    }

    #[test]
    fn test_markdown_without_results() {
        let report = ScanReport::new(create_test_outcome(Vec::new()));
        assert!(report.to_markdown().contains("No matches found."));
    }

    #[test]
    fn test_json_generation() {
        let report = ScanReport::new(create_test_outcome(vec![create_test_result()]));
        let json: serde_json::Value = serde_json::from_str(&report.to_json()).unwrap();

        assert_eq!(json["id"], "scan_test");
        assert_eq!(json["results"][0]["symbol"], "NVDA");
        assert_eq!(json["skipped"][0]["reason"], "insufficient_history");
    }

    #[test]
    fn test_watchlist_generation() {
        let mut second = create_test_result();
        second.symbol = "AMD".to_string();
        let report = ScanReport::new(create_test_outcome(vec![create_test_result(), second]));
        assert_eq!(report.generate(ReportFormat::Watchlist), "NVDA\nAMD");
    }

    #[test]
    fn test_save_adds_extension() {
        let dir = tempfile::tempdir().unwrap();
        let report = ScanReport::new(create_test_outcome(vec![create_test_result()]));

        let path = report
            .save_to_file(&dir.path().join("out/watchlist"), ReportFormat::Watchlist)
            .unwrap();
        assert_eq!(path.extension().unwrap(), "txt");
        assert_eq!(std::fs::read_to_string(path).unwrap(), "NVDA");
    }

    #[test]
    fn test_save_failure_maps_to_io_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("taken");
        std::fs::write(&blocker, "file, not a directory").unwrap();
        let report = ScanReport::new(create_test_outcome(Vec::new()));

        let err = report
            .save_to_file(&blocker.join("scan.md"), ReportFormat::Markdown)
            .unwrap_err();
        assert_eq!(err.exit_code(), 74);
        assert!(err.to_string().starts_with("creating "));
    }

    #[test]
    fn test_report_format_parsing() {
        assert_eq!("markdown".parse::<ReportFormat>().unwrap(), ReportFormat::Markdown);
        assert_eq!("md".parse::<ReportFormat>().unwrap(), ReportFormat::Markdown);
        assert_eq!("JSON".parse::<ReportFormat>().unwrap(), ReportFormat::Json);
        assert_eq!("tv".parse::<ReportFormat>().unwrap(), ReportFormat::Watchlist);
        assert!("telegram".parse::<ReportFormat>().is_err());
    }
}
