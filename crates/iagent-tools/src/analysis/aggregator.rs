//! Report assembly
//!
//! [`AnalysisAggregator`] runs extraction and pattern analysis and produces a
//! [`StructuralReport`]. Recommendations are attached afterwards by consuming
//! the structural report into an [`AnalysisReport`]; nothing structural can
//! change once that happens.

use serde::Serialize;
use std::collections::BTreeSet;
use tracing::info;

use super::extractor::{AnalysisWindow, LogFormat, LogWindowExtractor};
use super::patterns::{
    round2, ErrorAnalysis, PatternAnalyzer, PerformanceAnalysis, SecurityAnalysis,
};
use iagent_core::IagentResult;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub total_entries: usize,
    pub entries_per_minute: f64,
    pub log_types: Vec<LogFormat>,
    pub parse_errors: usize,
}

/// Everything the analysis derives from the log text itself
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructuralReport {
    pub summary: Summary,
    pub analysis_window: AnalysisWindow,
    pub error_analysis: ErrorAnalysis,
    pub security_analysis: SecurityAnalysis,
    pub performance_analysis: PerformanceAnalysis,
}

impl StructuralReport {
    pub fn to_json(&self) -> IagentResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Final report: the frozen structure plus model recommendations
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    #[serde(flatten)]
    structure: StructuralReport,
    devops_recommendations: Vec<String>,
}

impl AnalysisReport {
    pub fn new(structure: StructuralReport, devops_recommendations: Vec<String>) -> Self {
        Self {
            structure,
            devops_recommendations,
        }
    }

    pub fn structure(&self) -> &StructuralReport {
        &self.structure
    }

    pub fn recommendations(&self) -> &[String] {
        &self.devops_recommendations
    }

    pub fn to_json(&self) -> IagentResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Runs extraction then pattern analysis
pub struct AnalysisAggregator {
    extractor: LogWindowExtractor,
}

impl AnalysisAggregator {
    pub fn new(extractor: LogWindowExtractor) -> Self {
        Self { extractor }
    }

    pub fn analyze(&self, text: &str) -> IagentResult<StructuralReport> {
        let extraction = self.extractor.extract(text)?;
        let records = &extraction.records;
        let patterns = PatternAnalyzer::analyze(records);

        let log_types: BTreeSet<LogFormat> = records.iter().map(|r| r.source_format).collect();
        let window = extraction.window;
        let summary = Summary {
            total_entries: records.len(),
            entries_per_minute: round2(records.len() as f64 / window.duration_minutes as f64),
            log_types: log_types.into_iter().collect(),
            parse_errors: extraction.parse_errors,
        };

        info!(
            format = %self.extractor.format(),
            entries = summary.total_entries,
            parse_errors = summary.parse_errors,
            threat_level = ?patterns.security_analysis.threat_level,
            "Log analysis complete"
        );

        Ok(StructuralReport {
            summary,
            analysis_window: window,
            error_analysis: patterns.error_analysis,
            security_analysis: patterns.security_analysis,
            performance_analysis: patterns.performance_analysis,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, Utc};

    fn nginx_log() -> String {
        let mut lines = Vec::new();
        for minute in 0..90u32 {
            let (hour, min) = (10 + minute / 60, minute % 60);
            let status = if minute % 10 == 0 { 500 } else { 200 };
            lines.push(format!(
                r#"10.1.1.{} - - [01/Mar/2024:{:02}:{:02}:00 +0000] "GET /health HTTP/1.1" {} 10 "-" "kube-probe/1.29""#,
                minute % 5,
                hour,
                min,
                status
            ));
        }
        lines.push("this line is broken".to_string());
        lines.join("\n")
    }

    fn aggregator(window: u64) -> AnalysisAggregator {
        AnalysisAggregator::new(LogWindowExtractor::new(LogFormat::Nginx, window).unwrap())
    }

    #[test]
    fn test_summary_and_window() {
        let report = aggregator(30).analyze(&nginx_log()).unwrap();

        // latest entry is 11:29; window 10:59..=11:29 holds 31 entries
        assert_eq!(report.summary.total_entries, 31);
        assert_eq!(report.summary.parse_errors, 1);
        assert_eq!(report.summary.entries_per_minute, round2(31.0 / 30.0));
        assert_eq!(report.summary.log_types, vec![LogFormat::Nginx]);
        assert_eq!(report.analysis_window.duration_minutes, 30);
        assert_eq!(
            report.analysis_window.end - report.analysis_window.start,
            Duration::minutes(30)
        );
    }

    #[test]
    fn test_records_respect_window_bounds() {
        let text = nginx_log();
        let extractor = LogWindowExtractor::new(LogFormat::Nginx, 45).unwrap();
        let extraction = extractor.extract(&text).unwrap();
        let latest: DateTime<Utc> = extraction.window.end;
        for record in &extraction.records {
            assert!(record.timestamp >= latest - Duration::minutes(45));
            assert!(record.timestamp <= latest);
        }
    }

    #[test]
    fn test_structural_json_is_deterministic() {
        let text = nginx_log();
        let first = aggregator(60).analyze(&text).unwrap().to_json().unwrap();
        let second = aggregator(60).analyze(&text).unwrap().to_json().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_report_key_order() {
        let structure = aggregator(60).analyze(&nginx_log()).unwrap();
        let report = AnalysisReport::new(structure, vec!["Add an alert".to_string()]);
        let json = report.to_json().unwrap();

        let keys = [
            "\"summary\"",
            "\"analysis_window\"",
            "\"error_analysis\"",
            "\"security_analysis\"",
            "\"performance_analysis\"",
            "\"devops_recommendations\"",
        ];
        let positions: Vec<usize> = keys.iter().map(|k| json.find(k).unwrap()).collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "{json}");

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["devops_recommendations"][0], "Add an alert");
        assert_eq!(value["summary"]["log_types"][0], "nginx");
    }
}
