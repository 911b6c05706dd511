//! Query subsystem for cursordb
//!
//! - Typed query AST with model-qualified field keys
//! - JSON query object parsing
//! - Exact document matching
//! - Partitioning of multi-model queries and sorts
//!
//! Matching is deterministic and side-effect free. Candidate retrieval
//! lives in the store; this module only decides whether a document fits.

mod ast;
mod errors;
mod matcher;
mod parse;
mod partition;

pub use ast::{
    Condition, FieldKey, Query, SortDirection, SortKey, SortSpec, WhereFn, MODEL_SEPARATOR,
};
pub use errors::{QueryError, QueryResult};
pub use matcher::matches;
pub use partition::{partition, PartitionedQuery};
