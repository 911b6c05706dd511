//! Structured JSON logger for cursordb
//!
//! One line per event: `event` first, `severity` second, then the fields
//! sorted by key. Lines are written synchronously; ERROR and FATAL go to
//! stderr, everything else to stdout. A process-wide minimum severity
//! (INFO unless configured) filters what reaches either stream.

use std::fmt;
use std::io::{self, Write};
use std::sync::atomic::{AtomicU8, Ordering};

use serde::{Deserialize, Serialize};

static MIN_SEVERITY: AtomicU8 = AtomicU8::new(Severity::Info as u8);

/// Log severity, ordered from chattiest to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Cursor stage detail
    Trace = 0,
    Info = 1,
    /// Skipped joins, dangling tree parents
    Warn = 2,
    /// Failed cursor executions
    Error = 3,
    Fatal = 4,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Trace => "TRACE",
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
            Severity::Fatal => "FATAL",
        }
    }

    fn from_level(level: u8) -> Self {
        [
            Severity::Trace,
            Severity::Info,
            Severity::Warn,
            Severity::Error,
        ]
        .get(level as usize)
        .copied()
        .unwrap_or(Severity::Fatal)
    }

    fn to_stderr(self) -> bool {
        self >= Severity::Error
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Process-wide JSON line logger
pub struct Logger;

impl Logger {
    pub fn set_min_severity(severity: Severity) {
        MIN_SEVERITY.store(severity as u8, Ordering::Relaxed);
    }

    pub fn min_severity() -> Severity {
        Severity::from_level(MIN_SEVERITY.load(Ordering::Relaxed))
    }

    /// Returns true if lines at this severity are written
    pub fn enabled(severity: Severity) -> bool {
        severity >= Self::min_severity()
    }

    /// Write one event line if the severity passes the filter
    pub fn log(severity: Severity, event: &str, fields: &[(&str, &str)]) {
        if !Self::enabled(severity) {
            return;
        }
        let line = render(severity, event, fields);
        // Logging never fails an operation
        let _ = if severity.to_stderr() {
            io::stderr().lock().write_all(line.as_bytes())
        } else {
            io::stdout().lock().write_all(line.as_bytes())
        };
    }
}

/// Render one newline-terminated JSON log line
pub(crate) fn render(severity: Severity, event: &str, fields: &[(&str, &str)]) -> String {
    let mut sorted = fields.to_vec();
    sorted.sort_by_key(|(key, _)| *key);

    let mut line = String::with_capacity(64 + 32 * sorted.len());
    line.push_str("{\"event\":");
    push_json_str(&mut line, event);
    line.push_str(",\"severity\":");
    push_json_str(&mut line, severity.as_str());
    for (key, value) in sorted {
        line.push(',');
        push_json_str(&mut line, key);
        line.push(':');
        push_json_str(&mut line, value);
    }
    line.push_str("}\n");
    line
}

fn push_json_str(line: &mut String, text: &str) {
    match serde_json::to_string(text) {
        Ok(quoted) => line.push_str(&quoted),
        Err(_) => line.push_str("\"\""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Trace < Severity::Info);
        assert!(Severity::Warn < Severity::Error);
        assert!(Severity::Error < Severity::Fatal);
        assert!(Severity::Error.to_stderr());
        assert!(!Severity::Warn.to_stderr());
    }

    #[test]
    fn test_severity_from_config_string() {
        let parsed: Severity = serde_json::from_str("\"trace\"").unwrap();
        assert_eq!(parsed, Severity::Trace);
        assert_eq!(Severity::from_level(Severity::Warn as u8), Severity::Warn);
        assert_eq!(Severity::from_level(200), Severity::Fatal);
    }

    #[test]
    fn test_render_layout() {
        let line = render(
            Severity::Warn,
            "JOIN_SKIPPED",
            &[("model", "User"), ("joins", "2")],
        );
        assert_eq!(
            line,
            "{\"event\":\"JOIN_SKIPPED\",\"severity\":\"WARN\",\"joins\":\"2\",\"model\":\"User\"}\n"
        );
    }

    #[test]
    fn test_render_is_order_independent() {
        let a = render(Severity::Info, "E", &[("rows", "1"), ("model", "Tree")]);
        let b = render(Severity::Info, "E", &[("model", "Tree"), ("rows", "1")]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_render_escapes() {
        let line = render(
            Severity::Error,
            "CURSOR_EXEC_FAILED",
            &[("reason", "tab\there \"quoted\"\nnext")],
        );
        let parsed: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed["reason"], "tab\there \"quoted\"\nnext");
        assert_eq!(line.matches('\n').count(), 1);
    }
}
