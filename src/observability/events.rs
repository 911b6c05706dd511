//! Observable events for cursordb
//!
//! Discrete, typed events. Scoped operations (cursor execution) log through
//! `ObservationScope` instead.

use std::fmt;

use super::logger::Severity;

/// Observable events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Store lifecycle
    /// Datastore constructed
    StoreOpened,
    /// Configuration file loaded and validated
    ConfigLoaded,

    // Indexes
    /// Secondary index built
    IndexCreated,
    /// Secondary index dropped
    IndexRemoved,
    /// Write rejected by a unique index
    UniqueViolation,

    // Cursor
    /// Joins configured on a cursor without a model were not applied
    JoinSkipped,
    /// A tree node points at a parent that does not exist
    TreeParentMissing,
    /// A tree node points at a parent id shared by several nodes
    TreeParentAmbiguous,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::StoreOpened => "STORE_OPENED",
            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::IndexCreated => "INDEX_CREATED",
            Event::IndexRemoved => "INDEX_REMOVED",
            Event::UniqueViolation => "UNIQUE_CONSTRAINT_VIOLATED",
            Event::JoinSkipped => "JOIN_SKIPPED",
            Event::TreeParentMissing => "TREE_PARENT_MISSING",
            Event::TreeParentAmbiguous => "TREE_PARENT_AMBIGUOUS",
        }
    }

    /// Severity the event is logged at
    pub fn severity(&self) -> Severity {
        match self {
            Event::StoreOpened | Event::ConfigLoaded | Event::IndexCreated | Event::IndexRemoved => {
                Severity::Info
            }
            Event::TreeParentMissing => Severity::Trace,
            Event::UniqueViolation | Event::JoinSkipped | Event::TreeParentAmbiguous => {
                Severity::Warn
            }
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
