//! Cursor subsystem for cursordb
//!
//! A cursor turns a query plus configuration into rows:
//!
//! - Queries on joined cursors are partitioned per model
//! - Left joins across models of one collection, with fan-out
//! - Tree assembly, top-down (lazy expansion) or bottom-up (ancestor closure)
//! - Group-by with aggregates and an optional rollup row
//! - Text search, sort, skip/limit and projection
//!
//! # Invariants
//!
//! - Execution never writes to the source; row metadata stays on the rows
//! - Aggregates see whole groups, paging applies after grouping
//! - Every left row survives a join at least once
//! - Tree levels are parent level + 1, roots are 0

mod aggregate;
#[allow(clippy::module_inception)]
mod cursor;
mod errors;
mod fetch;
mod join;
mod projection;
mod result;
mod row;
mod search;
mod sorter;
mod tree;

pub use aggregate::{AggregateOp, AggregateOutput, AggregateSpec};
pub use cursor::Cursor;
pub use errors::{CursorError, CursorResult};
pub use join::JoinSpec;
pub use result::ExecutionResult;
pub use row::{Row, RowMeta, META_FIELD};
pub use search::SearchTerm;
pub use tree::{TreeOptions, DEFAULT_TREE_ID, DEFAULT_TREE_PARENT};
