//! Value utilities for cursordb
//!
//! Documents are `serde_json` maps. This module holds the primitives every
//! other subsystem leans on:
//!
//! - Dotted-path access (`get_dot_value`, `set_dot_value`)
//! - Total ordering across value types (`compare_values`)
//! - Canonical identity keys for grouping, joining and indexing
//! - Tagged date values (`{"$$date": millis}`)
//! - Lenient numeric parsing for aggregates (`parse_float`)

mod compare;
mod date;
mod number;
mod path;

pub use compare::{canonical_key, compare_values, values_equal};
pub use date::{as_date, date_value, DATE_TAG};
pub use number::{number_value, parse_float};
pub use path::{get_dot_value, remove_dot_value, set_dot_value};

/// A stored document: field name to value
pub type Document = serde_json::Map<String, serde_json::Value>;

/// Field holding the store-assigned identifier
pub const ID_FIELD: &str = "_id";

/// Field holding the model discriminator
pub const MODEL_FIELD: &str = "_model";
