//! Observability subsystem for cursordb
//!
//! Discrete store and cursor events are typed (`Event`) and logged as JSON
//! lines. Cursor executions are traced with an `ObservationScope`. Each
//! datastore owns a `MetricsRegistry` of monotonic counters.
//!
//! Nothing here changes execution results.
//!
//! # Usage
//!
//! ```ignore
//! use cursordb::observability::{log_event_with_fields, Event, ObservationScope};
//!
//! log_event_with_fields(Event::IndexCreated, &[("field", "_model")]);
//!
//! let scope = ObservationScope::new("CURSOR_EXEC");
//! // ... do work ...
//! scope.complete();
//! ```

mod events;
mod logger;
mod metrics;
mod scope;

pub use events::Event;
pub use logger::{Logger, Severity};
pub use metrics::{MetricsRegistry, MetricsSnapshot};
pub use scope::ObservationScope;

/// Log a typed event at its own severity
pub fn log_event(event: Event) {
    log_event_with_fields(event, &[]);
}

/// Log a typed event with fields
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    Logger::log(event.severity(), event.as_str(), fields);
}
