//! Store subsystem for cursordb
//!
//! - `CandidateSource`: the one interface the cursor pipeline reads through
//! - `Datastore`: in-memory, index-backed reference implementation
//! - `ModelScope`: one-shot model selector over a datastore
//! - `StoreConfig`: JSON configuration with defaults and validation
//!
//! # Invariants
//!
//! - `_id` is unique across the whole collection, whatever the model
//! - Candidates are owned copies; mutating them never changes the store
//! - Candidates are a superset of the matching documents

mod config;
mod datastore;
mod errors;
mod model_scope;

pub use config::{IndexOptions, StoreConfig};
pub use datastore::Datastore;
pub use errors::{StoreError, StoreResult};
pub use model_scope::ModelScope;

use crate::query::Query;
use crate::value::Document;

/// Source of candidate documents for a query
pub trait CandidateSource {
    /// Return owned copies of every document that may match the query
    fn get_candidates(&self, query: &Query) -> StoreResult<Vec<Document>>;
}

/// A plain document list is a full-scan candidate source
impl CandidateSource for Vec<Document> {
    fn get_candidates(&self, _query: &Query) -> StoreResult<Vec<Document>> {
        Ok(self.clone())
    }
}
