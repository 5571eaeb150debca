//! Log analysis engine
//!
//! Pipeline used by the `parse_logs` tool:
//!
//! 1. [`LogWindowExtractor`] parses lines and keeps the trailing window.
//! 2. [`PatternAnalyzer`] classifies the windowed records.
//! 3. [`AnalysisAggregator`] assembles the structural report.
//! 4. [`RecommendationBridge`] asks the model for recommendations.

pub mod aggregator;
pub mod extractor;
pub mod patterns;
pub mod recommendations;

pub use aggregator::{AnalysisAggregator, AnalysisReport, StructuralReport, Summary};
pub use extractor::{AnalysisWindow, Extraction, LogFormat, LogRecord, LogWindowExtractor};
pub use patterns::{
    ErrorAnalysis, PatternAnalysis, PatternAnalyzer, PerformanceAnalysis, RequestTrend,
    SecurityAnalysis, SecurityEvent, ThreatLevel,
};
pub use recommendations::{split_sections, RecommendationBridge};
