//! Begin/complete tracing around one operation
//!
//! `{NAME}_BEGIN` and `{NAME}_COMPLETE` are TRACE lines, the latter with
//! `elapsed_ms`. `{NAME}_FAILED` is an ERROR line carrying the reason. A
//! scope dropped without either outcome logs `{NAME}_ABANDONED` at WARN.

use std::time::Instant;

use super::logger::{Logger, Severity};

/// Lifecycle logging for one operation
pub struct ObservationScope<'a> {
    name: &'a str,
    fields: Vec<(&'a str, String)>,
    started: Instant,
    finished: bool,
}

impl<'a> ObservationScope<'a> {
    pub fn new(name: &'a str) -> Self {
        Self::with_fields(name, Vec::new())
    }

    /// Open a scope whose fields repeat on every line it logs
    pub fn with_fields(name: &'a str, fields: Vec<(&'a str, String)>) -> Self {
        let scope = Self {
            name,
            fields,
            started: Instant::now(),
            finished: false,
        };
        scope.emit(Severity::Trace, "BEGIN", &[]);
        scope
    }

    pub fn complete(self) {
        self.complete_with_fields(&[]);
    }

    pub fn complete_with_fields(mut self, extra: &[(&str, &str)]) {
        self.finished = true;
        let elapsed = self.elapsed_ms().to_string();
        let mut fields = extra.to_vec();
        fields.push(("elapsed_ms", elapsed.as_str()));
        self.emit(Severity::Trace, "COMPLETE", &fields);
    }

    pub fn fail(mut self, reason: &str) {
        self.finished = true;
        self.emit(Severity::Error, "FAILED", &[("reason", reason)]);
    }

    /// Milliseconds since the scope opened
    pub fn elapsed_ms(&self) -> u128 {
        self.started.elapsed().as_millis()
    }

    fn emit(&self, severity: Severity, phase: &str, extra: &[(&str, &str)]) {
        if !Logger::enabled(severity) {
            return;
        }
        let mut fields: Vec<(&str, &str)> =
            self.fields.iter().map(|(k, v)| (*k, v.as_str())).collect();
        fields.extend_from_slice(extra);
        Logger::log(severity, &format!("{}_{}", self.name, phase), &fields);
    }
}

impl Drop for ObservationScope<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.emit(Severity::Warn, "ABANDONED", &[]);
        }
    }
}
