//! Text search over a set of attributes
//!
//! A search is an OR of pattern matches, one per attribute, ANDed into the
//! cursor filter. Plain text is matched literally and case-insensitively
//! unless the cursor asks for case sensitivity.

use regex::{Regex, RegexBuilder};
use serde_json::Value;

use super::errors::{CursorError, CursorResult};
use crate::query::{Condition, FieldKey, Query};

/// What to search for
#[derive(Debug, Clone)]
pub enum SearchTerm {
    /// Literal text
    Text(String),
    /// Ready-made pattern, used as is
    Pattern(Regex),
    /// Any other dynamic value; rejected when the cursor runs
    Unsupported(Value),
}

impl SearchTerm {
    /// Interpret a JSON value: strings search as text, anything else is
    /// unsupported
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::String(text) => SearchTerm::Text(text),
            other => SearchTerm::Unsupported(other),
        }
    }

    fn pattern(&self, case_sensitive: bool) -> CursorResult<Regex> {
        match self {
            SearchTerm::Text(text) => RegexBuilder::new(&regex::escape(text))
                .case_insensitive(!case_sensitive)
                .build()
                .map_err(|e| CursorError::InvalidSearchTerm(e.to_string())),
            SearchTerm::Pattern(pattern) => Ok(pattern.clone()),
            SearchTerm::Unsupported(value) => Err(CursorError::InvalidSearchTerm(format!(
                "expected a string or a pattern, got {}",
                value
            ))),
        }
    }
}

impl From<&str> for SearchTerm {
    fn from(text: &str) -> Self {
        SearchTerm::Text(text.to_string())
    }
}

impl From<String> for SearchTerm {
    fn from(text: String) -> Self {
        SearchTerm::Text(text)
    }
}

impl From<Regex> for SearchTerm {
    fn from(pattern: Regex) -> Self {
        SearchTerm::Pattern(pattern)
    }
}

/// A configured search
#[derive(Debug, Clone)]
pub(crate) struct Search {
    pub(crate) term: SearchTerm,
    pub(crate) attributes: Vec<FieldKey>,
    pub(crate) case_sensitive: bool,
}

impl Search {
    /// Build the OR query over every attribute
    pub(crate) fn to_query(&self) -> CursorResult<Query> {
        let pattern = self.term.pattern(self.case_sensitive)?;
        let branches = self
            .attributes
            .iter()
            .map(|key| Query::field(key.clone(), Condition::Regex(pattern.clone())))
            .collect();
        Ok(Query::Or(branches))
    }
}
