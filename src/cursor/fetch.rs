//! Candidate fetching for one execution

use std::cell::Cell;

use super::errors::CursorResult;
use super::row::Row;
use crate::query::{matches, Query};
use crate::store::CandidateSource;

/// Pulls candidates from a source and filters them through the matcher.
///
/// Counts requests and scanned candidates for the execution result.
pub(crate) struct Fetcher<'s, S: CandidateSource + ?Sized> {
    source: &'s S,
    requests: Cell<usize>,
    scanned: Cell<usize>,
}

impl<'s, S: CandidateSource + ?Sized> Fetcher<'s, S> {
    pub(crate) fn new(source: &'s S) -> Self {
        Self {
            source,
            requests: Cell::new(0),
            scanned: Cell::new(0),
        }
    }

    /// Rows exactly matching the query, in source order
    pub(crate) fn fetch(&self, query: &Query) -> CursorResult<Vec<Row>> {
        let candidates = self.source.get_candidates(query)?;
        self.requests.set(self.requests.get() + 1);
        self.scanned.set(self.scanned.get() + candidates.len());

        Ok(candidates
            .into_iter()
            .filter(|doc| matches(doc, query))
            .map(Row::new)
            .collect())
    }

    pub(crate) fn requests(&self) -> usize {
        self.requests.get()
    }

    pub(crate) fn scanned(&self) -> usize {
        self.scanned.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Document;
    use serde_json::json;

    #[test]
    fn test_filters_and_counts() {
        let docs: Vec<Document> = vec![
            json!({"a": 1}).as_object().cloned().unwrap(),
            json!({"a": 2}).as_object().cloned().unwrap(),
        ];
        let fetcher = Fetcher::new(&docs);
        let rows = fetcher.fetch(&Query::eq("a", 2)).unwrap();
        assert_eq!(rows.len(), 1);
        fetcher.fetch(&Query::all()).unwrap();
        assert_eq!(fetcher.requests(), 2);
        assert_eq!(fetcher.scanned(), 4);
    }
}
