//! Execution result

use serde::Serialize;
use serde_json::Value;

use super::row::Row;

/// Rows produced by one cursor execution plus source statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExecutionResult {
    /// Output rows in final order
    pub rows: Vec<Row>,

    /// Number of requests sent to the candidate source
    pub source_requests: usize,

    /// Number of candidates the source returned in total
    pub candidates_scanned: usize,
}

impl ExecutionResult {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows as JSON objects, metadata under `__meta`
    pub fn to_values(&self) -> Vec<Value> {
        self.rows.iter().map(Row::to_value).collect()
    }

    /// Values of one top-level field, `Null` where absent
    pub fn column(&self, key: &str) -> Vec<Value> {
        self.rows
            .iter()
            .map(|r| r.get(key).cloned().unwrap_or(Value::Null))
            .collect()
    }
}
