//! Log line parsing and trailing-window extraction
//!
//! Lines are parsed according to a declared [`LogFormat`]. The window is
//! anchored on the newest timestamp found in the input, never on wall-clock
//! time, so replaying an old log yields the same result every time.

use chrono::{DateTime, Datelike, Duration, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use iagent_core::{IagentError, IagentResult};

static NGINX_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"^(\S+) (\S+) (\S+) \[([^\]]+)\] "([^"]*)" (\d{3}) (\S+)(?: "([^"]*)" "([^"]*)")?"#,
    )
    .expect("valid nginx regex")
});

static SYSLOG_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^([A-Z][a-z]{2})\s+(\d{1,2}) (\d{2}:\d{2}:\d{2}) (\S+) ([^:\[\s]+)(?:\[(\d+)\])?: ?(.*)$",
    )
    .expect("valid syslog regex")
});

static ISO_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(\d{4}-\d{2}-\d{2})[T ](\d{2}:\d{2}:\d{2}(?:\.\d+)?)(Z|[+-]\d{2}:?\d{2})?\s*(.*)$",
    )
    .expect("valid timestamp regex")
});

static LEVEL_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^\[?(trace|debug|info|notice|warning|warn|error|err|fatal|critical|crit)\b\]?:?\s*(.*)$",
    )
    .expect("valid level regex")
});

static CLIENT_IN_MESSAGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?:\[client |\bfrom |\bby )(\d{1,3}(?:\.\d{1,3}){3}|[0-9a-fA-F]*:[0-9a-fA-F:]+)",
    )
    .expect("valid client regex")
});

/// Largest accepted window (100 years)
pub const MAX_WINDOW_MINUTES: u64 = 100 * 365 * 24 * 60;

/// Declared log format
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Nginx,
    Syslog,
    Generic,
}

impl LogFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogFormat::Nginx => "nginx",
            LogFormat::Syslog => "syslog",
            LogFormat::Generic => "generic",
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogFormat {
    type Err = IagentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "nginx" => Ok(LogFormat::Nginx),
            "syslog" => Ok(LogFormat::Syslog),
            "generic" => Ok(LogFormat::Generic),
            other => Err(IagentError::invalid_argument(format!(
                "Unsupported log type: {} (expected nginx, syslog or generic)",
                other
            ))),
        }
    }
}

/// One parsed log line
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub timestamp: DateTime<Utc>,
    pub source_format: LogFormat,
    pub raw_fields: BTreeMap<String, String>,
    pub status_code: Option<u16>,
    pub client_identifier: Option<String>,
    /// Original line text
    pub line: String,
}

impl LogRecord {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.raw_fields.get(name).map(String::as_str)
    }
}

/// Trailing time window the analysis covers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalysisWindow {
    #[serde(serialize_with = "serialize_rfc3339")]
    pub start: DateTime<Utc>,
    #[serde(serialize_with = "serialize_rfc3339")]
    pub end: DateTime<Utc>,
    pub duration_minutes: u64,
}

impl AnalysisWindow {
    pub fn ending_at(end: DateTime<Utc>, duration_minutes: u64) -> Self {
        let minutes = duration_minutes.min(MAX_WINDOW_MINUTES) as i64;
        Self {
            start: end - Duration::minutes(minutes),
            end,
            duration_minutes,
        }
    }

    pub fn contains(&self, ts: &DateTime<Utc>) -> bool {
        self.start <= *ts && *ts <= self.end
    }
}

fn serialize_rfc3339<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Secs, true))
}

/// Output of an extraction pass
#[derive(Debug, Clone)]
pub struct Extraction {
    /// Records inside the window, oldest first
    pub records: Vec<LogRecord>,
    pub window: AnalysisWindow,
    pub parse_errors: usize,
    /// Non-blank lines read
    pub lines_read: usize,
}

/// Parses raw log text and keeps the trailing window
#[derive(Debug, Clone)]
pub struct LogWindowExtractor {
    format: LogFormat,
    window_minutes: u64,
    reference_year: i32,
}

impl LogWindowExtractor {
    pub fn new(format: LogFormat, window_minutes: u64) -> IagentResult<Self> {
        if window_minutes == 0 {
            return Err(IagentError::invalid_argument(
                "window_minutes must be greater than 0",
            ));
        }
        if window_minutes > MAX_WINDOW_MINUTES {
            return Err(IagentError::invalid_argument(format!(
                "window_minutes must be at most {}",
                MAX_WINDOW_MINUTES
            )));
        }
        Ok(Self {
            format,
            window_minutes,
            reference_year: Utc::now().year(),
        })
    }

    /// Year assumed for syslog timestamps, which carry none
    pub fn with_reference_year(mut self, year: i32) -> Self {
        self.reference_year = year;
        self
    }

    pub fn format(&self) -> LogFormat {
        self.format
    }

    pub fn extract(&self, text: &str) -> IagentResult<Extraction> {
        let mut parsed = Vec::new();
        let mut parse_errors = 0usize;
        let mut lines_read = 0usize;

        for line in text.lines() {
            if line.trim().is_empty() {
                continue;
            }
            lines_read += 1;
            match self.parse_line(line) {
                Ok(record) => parsed.push(record),
                Err(e) => {
                    parse_errors += 1;
                    debug!(format = %self.format, error = %e, "Skipping unparsable line");
                }
            }
        }

        if self.format == LogFormat::Syslog {
            parsed = self.assign_syslog_years(parsed, &mut parse_errors);
        }

        let latest = parsed
            .iter()
            .map(|r| r.timestamp)
            .max()
            .ok_or_else(|| IagentError::NoValidLogLines {
                lines: lines_read,
                format: self.format.to_string(),
            })?;

        let window = AnalysisWindow::ending_at(latest, self.window_minutes);
        let mut records: Vec<LogRecord> = parsed
            .into_iter()
            .filter(|r| window.contains(&r.timestamp))
            .collect();
        records.sort_by_key(|r| r.timestamp);

        debug!(
            format = %self.format,
            lines = lines_read,
            retained = records.len(),
            parse_errors,
            "Extracted log window"
        );

        Ok(Extraction {
            records,
            window,
            parse_errors,
            lines_read,
        })
    }

    /// Syslog lines carry no year. The newest lines keep the reference year;
    /// walking back through the file, a large drop in the month (Jan after Dec)
    /// marks a year boundary and earlier lines move one year back.
    fn assign_syslog_years(
        &self,
        records: Vec<LogRecord>,
        parse_errors: &mut usize,
    ) -> Vec<LogRecord> {
        let mut year = self.reference_year;
        let mut next_month: Option<u32> = None;
        let mut dated = Vec::with_capacity(records.len());

        for record in records.into_iter().rev() {
            let month = record.timestamp.month();
            if next_month.map_or(false, |next| month > next + 6) {
                year -= 1;
            }
            next_month = Some(month);

            if record.timestamp.year() == year {
                dated.push(record);
                continue;
            }
            match parse_syslog(&record.line, year) {
                Ok(record) => dated.push(record),
                Err(e) => {
                    *parse_errors += 1;
                    debug!(year, error = %e, "Skipping syslog line with no valid date");
                }
            }
        }

        dated.reverse();
        dated
    }

    /// Parse a single line under the configured format
    pub fn parse_line(&self, line: &str) -> IagentResult<LogRecord> {
        match self.format {
            LogFormat::Nginx => parse_nginx(line),
            LogFormat::Syslog => parse_syslog(line, self.reference_year),
            LogFormat::Generic => parse_generic(line),
        }
    }
}

fn parse_nginx(line: &str) -> IagentResult<LogRecord> {
    let caps = NGINX_LINE
        .captures(line)
        .ok_or_else(|| IagentError::parse("line does not match combined log format"))?;

    let timestamp = DateTime::parse_from_str(&caps[4], "%d/%b/%Y:%H:%M:%S %z")
        .map_err(|e| IagentError::parse(format!("bad nginx timestamp '{}': {}", &caps[4], e)))?
        .with_timezone(&Utc);

    let status: u16 = caps[6]
        .parse()
        .map_err(|_| IagentError::parse(format!("bad status code '{}'", &caps[6])))?;

    let mut request = caps[5].splitn(3, ' ');
    let method = request.next().unwrap_or_default();
    let path = request.next().unwrap_or_default();
    let protocol = request.next().unwrap_or_default();
    let client = caps[1].to_string();

    let mut fields = BTreeMap::new();
    fields.insert("client".to_string(), client.clone());
    fields.insert("method".to_string(), method.to_string());
    fields.insert("path".to_string(), path.to_string());
    fields.insert("protocol".to_string(), protocol.to_string());
    fields.insert("status".to_string(), caps[6].to_string());
    fields.insert("bytes".to_string(), caps[7].to_string());
    fields.insert(
        "referrer".to_string(),
        caps.get(8).map_or("", |m| m.as_str()).to_string(),
    );
    fields.insert(
        "user_agent".to_string(),
        caps.get(9).map_or("", |m| m.as_str()).to_string(),
    );

    Ok(LogRecord {
        timestamp,
        source_format: LogFormat::Nginx,
        raw_fields: fields,
        status_code: Some(status),
        client_identifier: Some(client),
        line: line.to_string(),
    })
}

fn parse_syslog(line: &str, year: i32) -> IagentResult<LogRecord> {
    let caps = SYSLOG_LINE
        .captures(line)
        .ok_or_else(|| IagentError::parse("line does not match syslog format"))?;

    let stamp = format!("{} {} {:0>2} {}", year, &caps[1], &caps[2], &caps[3]);
    let naive = NaiveDateTime::parse_from_str(&stamp, "%Y %b %d %H:%M:%S")
        .map_err(|e| IagentError::parse(format!("bad syslog timestamp '{}': {}", stamp, e)))?;

    let message = caps[7].to_string();
    let mut fields = BTreeMap::new();
    fields.insert("host".to_string(), caps[4].to_string());
    fields.insert("process".to_string(), caps[5].to_string());
    fields.insert(
        "pid".to_string(),
        caps.get(6).map_or("", |m| m.as_str()).to_string(),
    );
    fields.insert("message".to_string(), message.clone());

    Ok(LogRecord {
        timestamp: Utc.from_utc_datetime(&naive),
        source_format: LogFormat::Syslog,
        raw_fields: fields,
        status_code: None,
        client_identifier: client_from_message(&message),
        line: line.to_string(),
    })
}

fn parse_generic(line: &str) -> IagentResult<LogRecord> {
    let trimmed = line.trim_start();
    if trimmed.starts_with('{') {
        return parse_json_line(line);
    }

    let caps = ISO_PREFIX
        .captures(trimmed)
        .ok_or_else(|| IagentError::parse("line has no ISO-8601 timestamp prefix"))?;

    let timestamp = build_timestamp(&caps[1], &caps[2], caps.get(3).map(|m| m.as_str()))?;
    let rest = caps.get(4).map_or("", |m| m.as_str());
    let (level, message) = match LEVEL_PREFIX.captures(rest) {
        Some(level_caps) => (
            level_caps[1].to_uppercase(),
            level_caps.get(2).map_or("", |m| m.as_str()).to_string(),
        ),
        None => (String::new(), rest.to_string()),
    };

    let mut fields = BTreeMap::new();
    fields.insert("level".to_string(), level);
    fields.insert("message".to_string(), message.clone());

    Ok(LogRecord {
        timestamp,
        source_format: LogFormat::Generic,
        raw_fields: fields,
        status_code: None,
        client_identifier: client_from_message(&message),
        line: line.to_string(),
    })
}

fn parse_json_line(line: &str) -> IagentResult<LogRecord> {
    let value: serde_json::Value = serde_json::from_str(line)
        .map_err(|e| IagentError::parse(format!("invalid JSON line: {}", e)))?;
    let object = value
        .as_object()
        .ok_or_else(|| IagentError::parse("JSON line is not an object"))?;

    let text_field = |keys: &[&str]| {
        keys.iter()
            .find_map(|k| object.get(*k).and_then(|v| v.as_str()))
            .map(str::to_string)
    };

    let stamp = text_field(&["timestamp", "time", "ts"])
        .ok_or_else(|| IagentError::parse("JSON line has no timestamp/time/ts string field"))?;
    let caps = ISO_PREFIX
        .captures(stamp.trim())
        .ok_or_else(|| IagentError::parse(format!("bad JSON timestamp '{}'", stamp)))?;
    let timestamp = build_timestamp(&caps[1], &caps[2], caps.get(3).map(|m| m.as_str()))?;

    let message = text_field(&["message", "msg"]).unwrap_or_default();
    let level = text_field(&["level", "severity"])
        .map(|l| l.to_uppercase())
        .unwrap_or_default();
    let status_code = ["status", "status_code"]
        .iter()
        .find_map(|k| object.get(*k).and_then(|v| v.as_u64()))
        .and_then(|s| u16::try_from(s).ok());
    let client = text_field(&["client", "client_ip", "remote_addr", "ip"])
        .or_else(|| client_from_message(&message));

    let mut fields = BTreeMap::new();
    fields.insert("level".to_string(), level);
    fields.insert("message".to_string(), message);

    Ok(LogRecord {
        timestamp,
        source_format: LogFormat::Generic,
        raw_fields: fields,
        status_code,
        client_identifier: client,
        line: line.to_string(),
    })
}

fn build_timestamp(date: &str, time: &str, offset: Option<&str>) -> IagentResult<DateTime<Utc>> {
    match offset {
        None => {
            let naive =
                NaiveDateTime::parse_from_str(&format!("{}T{}", date, time), "%Y-%m-%dT%H:%M:%S%.f")
                    .map_err(|e| IagentError::parse(format!("bad timestamp: {}", e)))?;
            Ok(Utc.from_utc_datetime(&naive))
        }
        Some(offset) => {
            let offset = if offset == "Z" || offset.contains(':') {
                offset.to_string()
            } else {
                format!("{}:{}", &offset[..3], &offset[3..])
            };
            DateTime::parse_from_rfc3339(&format!("{}T{}{}", date, time, offset))
                .map(|ts| ts.with_timezone(&Utc))
                .map_err(|e| IagentError::parse(format!("bad timestamp: {}", e)))
        }
    }
}

fn client_from_message(message: &str) -> Option<String> {
    CLIENT_IN_MESSAGE
        .captures(message)
        .map(|caps| caps[1].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const NGINX: &str = r#"192.168.1.10 - - [10/Oct/2024:13:55:36 +0000] "GET /api/users HTTP/1.1" 200 512 "-" "curl/8.0""#;

    #[test]
    fn test_parse_nginx_fields() {
        let extractor = LogWindowExtractor::new(LogFormat::Nginx, 60).unwrap();
        let record = extractor.parse_line(NGINX).unwrap();
        assert_eq!(record.status_code, Some(200));
        assert_eq!(record.field("method"), Some("GET"));
        assert_eq!(record.field("path"), Some("/api/users"));
        assert_eq!(record.field("user_agent"), Some("curl/8.0"));
        assert_eq!(record.client_identifier.as_deref(), Some("192.168.1.10"));
        assert_eq!(
            record.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            "2024-10-10T13:55:36Z"
        );
    }

    #[test]
    fn test_nginx_offset_is_normalized_to_utc() {
        let line = r#"10.0.0.1 - - [10/Oct/2024:15:55:36 +0200] "GET / HTTP/1.1" 200 1 "-" "-""#;
        let extractor = LogWindowExtractor::new(LogFormat::Nginx, 60).unwrap();
        let record = extractor.parse_line(line).unwrap();
        assert_eq!(
            record.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            "2024-10-10T13:55:36Z"
        );
    }

    #[test]
    fn test_parse_syslog_with_reference_year() {
        let extractor = LogWindowExtractor::new(LogFormat::Syslog, 60)
            .unwrap()
            .with_reference_year(2024);
        let record = extractor
            .parse_line("Sep  6 09:30:15 server1 sshd[1234]: Failed password for root from 192.168.1.100 port 22 ssh2")
            .unwrap();
        assert_eq!(
            record.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            "2024-09-06T09:30:15Z"
        );
        assert_eq!(record.field("process"), Some("sshd"));
        assert_eq!(record.field("pid"), Some("1234"));
        assert_eq!(record.client_identifier.as_deref(), Some("192.168.1.100"));
        assert_eq!(record.status_code, None);
    }

    #[test]
    fn test_syslog_client_tag_and_missing_pid() {
        let extractor = LogWindowExtractor::new(LogFormat::Syslog, 60)
            .unwrap()
            .with_reference_year(2024);
        let record = extractor
            .parse_line("Sep 16 09:32:00 server1 apache2: [error] [client 198.51.100.10] File does not exist: /var/www/html/admin.php")
            .unwrap();
        assert_eq!(record.field("pid"), Some(""));
        assert_eq!(record.client_identifier.as_deref(), Some("198.51.100.10"));
    }

    #[test]
    fn test_parse_generic_text_and_json() {
        let extractor = LogWindowExtractor::new(LogFormat::Generic, 60).unwrap();

        let record = extractor
            .parse_line("2024-03-01 12:00:05.250 ERROR database connection refused")
            .unwrap();
        assert_eq!(record.field("level"), Some("ERROR"));
        assert_eq!(record.field("message"), Some("database connection refused"));

        let record = extractor
            .parse_line(r#"{"ts": "2024-03-01T12:00:05+01:00", "level": "warn", "msg": "slow query", "status": 503}"#)
            .unwrap();
        assert_eq!(record.field("level"), Some("WARN"));
        assert_eq!(record.status_code, Some(503));
        assert_eq!(
            record.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            "2024-03-01T11:00:05Z"
        );

        assert!(extractor.parse_line("no timestamp here").is_err());
    }

    #[test]
    fn test_window_anchored_on_latest_timestamp() {
        let text = "\
2024-03-01T10:00:00Z INFO old
2024-03-01T11:00:00Z INFO inside
garbage line

2024-03-01T11:30:00Z INFO newest
";
        let extraction = LogWindowExtractor::new(LogFormat::Generic, 45)
            .unwrap()
            .extract(text)
            .unwrap();

        assert_eq!(extraction.records.len(), 2);
        assert_eq!(extraction.parse_errors, 1);
        assert_eq!(extraction.lines_read, 4);
        let window = &extraction.window;
        assert_eq!(window.end - window.start, Duration::minutes(45));
        assert!(extraction.records.iter().all(|r| window.contains(&r.timestamp)));
    }

    #[test]
    fn test_syslog_year_rollover_keeps_newest_lines() {
        let text = "\
Dec 31 23:59:00 web1 sshd[10]: Accepted publickey for deploy from 10.0.0.9 port 22 ssh2
Jan  1 00:01:00 web1 sshd[11]: Accepted publickey for deploy from 10.0.0.9 port 22 ssh2
";
        let extraction = LogWindowExtractor::new(LogFormat::Syslog, 10)
            .unwrap()
            .with_reference_year(2025)
            .extract(text)
            .unwrap();

        assert_eq!(extraction.records.len(), 2);
        assert_eq!(
            extraction.window.end,
            Utc.with_ymd_and_hms(2025, 1, 1, 0, 1, 0).unwrap()
        );
        assert_eq!(
            extraction.records[0].timestamp,
            Utc.with_ymd_and_hms(2024, 12, 31, 23, 59, 0).unwrap()
        );
    }

    #[test]
    fn test_no_valid_lines() {
        let err = LogWindowExtractor::new(LogFormat::Nginx, 60)
            .unwrap()
            .extract("not a log\nstill not a log\n\n")
            .unwrap_err();
        match err {
            IagentError::NoValidLogLines { lines, format } => {
                assert_eq!(lines, 2);
                assert_eq!(format, "nginx");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_zero_window_rejected() {
        let err = LogWindowExtractor::new(LogFormat::Nginx, 0).unwrap_err();
        assert!(matches!(err, IagentError::InvalidArgument(_)));
    }

    #[test]
    fn test_window_serializes_rfc3339() {
        let end = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let window = AnalysisWindow::ending_at(end, 30);
        let json = serde_json::to_value(&window).unwrap();
        assert_eq!(json["start"], "2024-03-01T11:30:00Z");
        assert_eq!(json["end"], "2024-03-01T12:00:00Z");
        assert_eq!(json["duration_minutes"], 30);
    }
}
