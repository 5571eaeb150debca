//! Classification rules over windowed log records
//!
//! Everything here is a pure function of the record slice: HTTP status
//! buckets, fixed security signatures, and per-minute request rates.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;

use super::extractor::LogRecord;

/// Distinct example identifiers kept per security event
pub const MAX_EXAMPLES: usize = 5;

/// Relative change between bucket halves that counts as a trend
pub const TREND_THRESHOLD: f64 = 0.10;

const LOW_THREAT_MIN: usize = 1;
const MEDIUM_THREAT_MIN: usize = 5;
const HIGH_THREAT_MIN: usize = 20;

static PREAUTH_CLOSED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Connection closed by .*\[preauth\]").expect("valid preauth regex")
});

static FAILED_AUTH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)failed password|authentication failure|invalid user|failed publickey")
        .expect("valid auth regex")
});

static SENSITIVE_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)wp-admin|wp-login|phpmyadmin|admin|\.env|\.git|config|backup|\.sql|login")
        .expect("valid path regex")
});

static MISSING_FILE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"File does not exist:?\s*(\S*)").expect("valid missing file regex"));

static SCANNER_AGENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)sqlmap|nikto|nmap|masscan|zgrab|nuclei|dirbuster|gobuster|wpscan")
        .expect("valid scanner regex")
});

/// Fixed security signature
struct SecurityRule {
    name: &'static str,
    matches: fn(&LogRecord) -> bool,
}

/// Signature rules, in reporting order
static SECURITY_RULES: &[SecurityRule] = &[
    SecurityRule {
        name: "brute_force_attempt",
        matches: is_failed_authentication,
    },
    SecurityRule {
        name: "sensitive_path_probe",
        matches: is_sensitive_path_probe,
    },
    SecurityRule {
        name: "preauth_connection_closed",
        matches: is_preauth_closure,
    },
    SecurityRule {
        name: "scanner_user_agent",
        matches: is_scanner,
    },
];

fn is_preauth_closure(record: &LogRecord) -> bool {
    PREAUTH_CLOSED.is_match(&record.line)
}

fn is_failed_authentication(record: &LogRecord) -> bool {
    FAILED_AUTH.is_match(&record.line) && !is_preauth_closure(record)
}

fn is_sensitive_path_probe(record: &LogRecord) -> bool {
    if record.status_code == Some(404) {
        let path = record.field("path").unwrap_or(record.line.as_str());
        return SENSITIVE_PATH.is_match(path);
    }
    MISSING_FILE
        .captures(&record.line)
        .map(|caps| SENSITIVE_PATH.is_match(&caps[1]))
        .unwrap_or(false)
}

fn is_scanner(record: &LogRecord) -> bool {
    let haystack = record.field("user_agent").unwrap_or(record.line.as_str());
    SCANNER_AGENT.is_match(haystack)
}

/// Overall threat classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ThreatLevel {
    None,
    Low,
    Medium,
    High,
}

impl ThreatLevel {
    pub fn from_event_total(total: usize) -> Self {
        if total >= HIGH_THREAT_MIN {
            ThreatLevel::High
        } else if total >= MEDIUM_THREAT_MIN {
            ThreatLevel::Medium
        } else if total >= LOW_THREAT_MIN {
            ThreatLevel::Low
        } else {
            ThreatLevel::None
        }
    }
}

/// Matches of one signature rule
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SecurityEvent {
    #[serde(rename = "pattern")]
    pub pattern_name: String,
    pub count: usize,
    #[serde(rename = "examples")]
    pub example_identifiers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SecurityAnalysis {
    pub threat_level: ThreatLevel,
    pub total_security_events: usize,
    pub security_events: Vec<SecurityEvent>,
}

/// HTTP error rates, or a note when no status data exists
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ErrorAnalysis {
    Rates {
        total_requests: usize,
        error_4xx: usize,
        error_5xx: usize,
        error_4xx_rate: f64,
        error_5xx_rate: f64,
        status_codes: BTreeMap<u16, usize>,
    },
    NoStatusData {
        message: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestTrend {
    Increasing,
    Decreasing,
    Stable,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceAnalysis {
    pub peak_requests_per_minute: usize,
    pub average_requests_per_minute: f64,
    pub minutes_observed: usize,
    pub request_trend: RequestTrend,
}

/// Combined output of the analyzer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatternAnalysis {
    pub error_analysis: ErrorAnalysis,
    pub security_analysis: SecurityAnalysis,
    pub performance_analysis: PerformanceAnalysis,
}

/// Stateless rule engine
pub struct PatternAnalyzer;

impl PatternAnalyzer {
    pub fn analyze(records: &[LogRecord]) -> PatternAnalysis {
        PatternAnalysis {
            error_analysis: Self::error_analysis(records),
            security_analysis: Self::security_analysis(records),
            performance_analysis: Self::performance_analysis(records),
        }
    }

    pub fn error_analysis(records: &[LogRecord]) -> ErrorAnalysis {
        let mut status_codes: BTreeMap<u16, usize> = BTreeMap::new();
        for status in records.iter().filter_map(|r| r.status_code) {
            *status_codes.entry(status).or_default() += 1;
        }

        if status_codes.is_empty() {
            return ErrorAnalysis::NoStatusData {
                message: "No HTTP status codes found in log entries".to_string(),
            };
        }

        let count_range = |range: std::ops::Range<u16>| -> usize {
            status_codes.range(range).map(|(_, count)| count).sum()
        };
        let error_4xx = count_range(400..500);
        let error_5xx = count_range(500..600);
        let total_entries = records.len() as f64;

        ErrorAnalysis::Rates {
            total_requests: status_codes.values().sum(),
            error_4xx,
            error_5xx,
            error_4xx_rate: round2(error_4xx as f64 / total_entries * 100.0),
            error_5xx_rate: round2(error_5xx as f64 / total_entries * 100.0),
            status_codes,
        }
    }

    pub fn security_analysis(records: &[LogRecord]) -> SecurityAnalysis {
        let mut security_events = Vec::new();

        for rule in SECURITY_RULES {
            let mut count = 0;
            let mut examples: Vec<String> = Vec::new();
            for record in records.iter().filter(|r| (rule.matches)(r)) {
                count += 1;
                let identifier = example_identifier(record);
                if examples.len() < MAX_EXAMPLES && !examples.contains(&identifier) {
                    examples.push(identifier);
                }
            }
            if count > 0 {
                security_events.push(SecurityEvent {
                    pattern_name: rule.name.to_string(),
                    count,
                    example_identifiers: examples,
                });
            }
        }

        let total_security_events = security_events.iter().map(|e| e.count).sum();
        SecurityAnalysis {
            threat_level: ThreatLevel::from_event_total(total_security_events),
            total_security_events,
            security_events,
        }
    }

    pub fn performance_analysis(records: &[LogRecord]) -> PerformanceAnalysis {
        let mut buckets: BTreeMap<i64, usize> = BTreeMap::new();
        for record in records {
            *buckets
                .entry(record.timestamp.timestamp().div_euclid(60))
                .or_default() += 1;
        }

        let counts: Vec<usize> = buckets.into_values().collect();
        let minutes_observed = counts.len();
        let average = if minutes_observed == 0 {
            0.0
        } else {
            records.len() as f64 / minutes_observed as f64
        };

        PerformanceAnalysis {
            peak_requests_per_minute: counts.iter().copied().max().unwrap_or(0),
            average_requests_per_minute: round2(average),
            minutes_observed,
            request_trend: request_trend(&counts),
        }
    }
}

fn request_trend(counts: &[usize]) -> RequestTrend {
    if counts.len() < 2 {
        return RequestTrend::Stable;
    }
    let (first, second) = counts.split_at(counts.len() / 2);
    let mean = |half: &[usize]| half.iter().sum::<usize>() as f64 / half.len() as f64;
    let (first_mean, second_mean) = (mean(first), mean(second));

    let change = (second_mean - first_mean) / first_mean;
    if change > TREND_THRESHOLD {
        RequestTrend::Increasing
    } else if change < -TREND_THRESHOLD {
        RequestTrend::Decreasing
    } else {
        RequestTrend::Stable
    }
}

fn example_identifier(record: &LogRecord) -> String {
    match &record.client_identifier {
        Some(client) => client.clone(),
        None => record.line.chars().take(120).collect(),
    }
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
