//! cursordb - An embedded document store with a query cursor engine
//!
//! Documents of several logical models share one collection, told apart by
//! their `_model` field. On top of index-backed candidate retrieval the
//! cursor provides:
//!
//! - Left joins across models with one-to-many fan-out
//! - Tree assembly from parent pointers, top-down or bottom-up
//! - Group-by with sum, avg, min, max, count, median and rollup
//! - Text search, sort, paging and projection
//!
//! ```ignore
//! use cursordb::{Datastore, Query, SortSpec};
//!
//! let db = Datastore::new();
//! db.model("Group").insert(json!({"_id": "g1", "name": "Admins"}))?;
//! db.model("User").insert(json!({"name": "Anton", "fkGroupId": "g1"}))?;
//!
//! let rows = db
//!     .model("Group")
//!     .find(Query::all())
//!     .left_join("Group:_id", "User:fkGroupId")
//!     .sort(SortSpec::new().asc("Group:name"))
//!     .exec()?
//!     .rows;
//! ```

pub mod cursor;
pub mod index;
pub mod observability;
pub mod query;
pub mod store;
pub mod value;

pub use cursor::{
    AggregateOp, AggregateSpec, Cursor, CursorError, CursorResult, ExecutionResult, Row, RowMeta,
    SearchTerm, TreeOptions,
};
pub use query::{FieldKey, Query, SortSpec};
pub use store::{CandidateSource, Datastore, IndexOptions, StoreConfig, StoreError, StoreResult};
pub use value::Document;
