//! Index subsystem for cursordb
//!
//! Indexes are derived, in-memory state kept in step with datastore writes.
//!
//! # Design Principles
//!
//! - Derived state: indexes mirror the document set, never the source of truth
//! - Deterministic: BTreeMap iteration order, sorted sequence numbers
//! - Superset lookups: an index answers which documents *may* match; the
//!   matcher has the final word
//!
//! # Invariants
//!
//! - `_id` is always indexed and unique
//! - A rejected write leaves every index unchanged

mod btree;
mod errors;
mod manager;

pub use btree::{DocSeq, IndexKey, IndexTree};
pub use errors::{IndexError, IndexResult};
pub use manager::{document_keys, IndexManager};
