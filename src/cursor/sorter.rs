//! Row sorting
//!
//! Sort keys are resolved to literal row paths before sorting, because the
//! same `FieldKey` addresses different columns depending on the row layout.

use std::cmp::Ordering;

use super::row::Row;
use crate::query::{FieldKey, SortDirection, SortSpec};
use crate::value::{compare_values, get_dot_value};

/// How fields are named in the rows being sorted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RowLayout {
    /// Home model fields, unprefixed
    Plain,
    /// Every field prefixed with its model
    Joined,
    /// Group-by output, keys as written
    Grouped,
}

/// A sort spec resolved against one row layout
#[derive(Debug, Clone, Default)]
pub(crate) struct RowSorter {
    keys: Vec<(String, SortDirection)>,
}

impl RowSorter {
    pub(crate) fn resolve(sort: &SortSpec, layout: RowLayout, home: Option<&str>) -> Self {
        let keys = sort
            .keys
            .iter()
            .map(|k| {
                let path = match (layout, &k.key.model, home) {
                    (RowLayout::Grouped, _, _) => k.key.qualified_name(),
                    (RowLayout::Joined, None, Some(home)) => {
                        FieldKey::qualified(home, k.key.path.as_str()).qualified_name()
                    }
                    (RowLayout::Plain, Some(model), Some(home)) if model == home => {
                        k.key.path.clone()
                    }
                    _ => k.key.qualified_name(),
                };
                (path, k.direction)
            })
            .collect();
        Self { keys }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub(crate) fn compare(&self, a: &Row, b: &Row) -> Ordering {
        for (path, direction) in &self.keys {
            let left = get_dot_value(&a.fields, path);
            let right = get_dot_value(&b.fields, path);
            let ord = compare_values(left.as_deref(), right.as_deref());
            let ord = match direction {
                SortDirection::Asc => ord,
                SortDirection::Desc => ord.reverse(),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }

    /// Stable sort; rows comparing equal keep their order
    pub(crate) fn sort(&self, rows: &mut [Row]) {
        if self.is_empty() {
            return;
        }
        rows.sort_by(|a, b| self.compare(a, b));
    }
}
