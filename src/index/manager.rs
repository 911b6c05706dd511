//! Index Manager for cursordb
//!
//! Maintains one `IndexTree` per indexed field path. `_id` is always
//! indexed and unique.
//!
//! # API
//!
//! - `ensure_index(field, unique, docs)` - Build an index over existing docs
//! - `remove_index(field)` - Drop an index (never `_id`)
//! - `check(doc, except)` - Unique-constraint check before a write
//! - `insert(seq, doc)` / `remove(seq, doc)` - Keep indexes in step with writes
//! - `lookup(field, condition)` - Candidate sequence numbers for a condition

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;

use serde_json::Value;

use super::btree::{DocSeq, IndexKey, IndexTree};
use super::errors::{IndexError, IndexResult};
use crate::query::Condition;
use crate::value::{get_dot_value, Document, ID_FIELD};

/// One secondary index
#[derive(Debug, Default)]
struct FieldIndex {
    unique: bool,
    tree: IndexTree,
}

/// Index Manager that maintains in-memory field indexes
#[derive(Debug)]
pub struct IndexManager {
    indexes: BTreeMap<String, FieldIndex>,
}

impl Default for IndexManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Index keys a document contributes for a field.
///
/// Array values contribute one key per indexable element; missing fields
/// contribute nothing.
pub fn document_keys(doc: &Document, field: &str) -> Vec<IndexKey> {
    let Some(value) = get_dot_value(doc, field) else {
        return Vec::new();
    };

    let mut keys: Vec<IndexKey> = match value.as_ref() {
        Value::Array(items) => items.iter().filter_map(IndexKey::from_json).collect(),
        other => IndexKey::from_json(other).into_iter().collect(),
    };
    keys.sort();
    keys.dedup();
    keys
}

impl IndexManager {
    /// Creates a manager holding only the unique `_id` index
    pub fn new() -> Self {
        let mut indexes = BTreeMap::new();
        indexes.insert(
            ID_FIELD.to_string(),
            FieldIndex {
                unique: true,
                tree: IndexTree::new(),
            },
        );
        Self { indexes }
    }

    /// Build an index on `field` over the given documents.
    ///
    /// Returns `Ok(false)` if the field is already indexed. A unique index
    /// over data with duplicate keys is rejected and nothing is installed.
    pub fn ensure_index<'a, I>(&mut self, field: &str, unique: bool, docs: I) -> IndexResult<bool>
    where
        I: IntoIterator<Item = (DocSeq, &'a Document)>,
    {
        if self.indexes.contains_key(field) {
            return Ok(false);
        }

        let mut tree = IndexTree::new();
        for (seq, doc) in docs {
            for key in document_keys(doc, field) {
                if unique && tree.contains_other(&key, Some(seq)) {
                    return Err(IndexError::UniqueSetup {
                        field: field.to_string(),
                        value: key.to_string(),
                    });
                }
                tree.insert(key, seq);
            }
        }

        self.indexes
            .insert(field.to_string(), FieldIndex { unique, tree });
        Ok(true)
    }

    /// Drop an index. The `_id` index can not be removed.
    pub fn remove_index(&mut self, field: &str) -> bool {
        if field == ID_FIELD {
            return false;
        }
        self.indexes.remove(field).is_some()
    }

    /// Returns true if the field is indexed
    pub fn has_index(&self, field: &str) -> bool {
        self.indexes.contains_key(field)
    }

    /// Indexed field names in sorted order
    pub fn indexed_fields(&self) -> impl Iterator<Item = &str> {
        self.indexes.keys().map(String::as_str)
    }

    /// Check unique constraints for a document about to be written.
    ///
    /// `except` is the sequence number the document already occupies, so an
    /// update does not conflict with its own previous version.
    pub fn check(&self, doc: &Document, except: Option<DocSeq>) -> IndexResult<()> {
        for (field, index) in self.indexes.iter().filter(|(_, i)| i.unique) {
            for key in document_keys(doc, field) {
                if index.tree.contains_other(&key, except) {
                    return Err(IndexError::UniqueConflict {
                        field: field.clone(),
                        value: key.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Add a document to every index
    pub fn insert(&mut self, seq: DocSeq, doc: &Document) {
        for (field, index) in self.indexes.iter_mut() {
            for key in document_keys(doc, field) {
                index.tree.insert(key, seq);
            }
        }
    }

    /// Remove a document from every index
    pub fn remove(&mut self, seq: DocSeq, doc: &Document) {
        for (field, index) in self.indexes.iter_mut() {
            for key in document_keys(doc, field) {
                index.tree.remove(&key, seq);
            }
        }
    }

    /// Candidate sequence numbers for a condition on a field.
    ///
    /// Returns `None` when the field is not indexed or the condition can not
    /// be answered from the index. Results are sorted ascending.
    pub fn lookup(&self, field: &str, condition: &Condition) -> Option<Vec<DocSeq>> {
        let tree = &self.indexes.get(field)?.tree;

        match condition {
            Condition::Eq(value) => {
                let key = IndexKey::from_json(value)?;
                Some(tree.lookup_eq(&key).to_vec())
            }
            Condition::In(values) => {
                let mut seqs = BTreeSet::new();
                for value in values {
                    let key = IndexKey::from_json(value)?;
                    seqs.extend(tree.lookup_eq(&key).iter().copied());
                }
                Some(seqs.into_iter().collect())
            }
            Condition::Gt(bound) => {
                let key = range_key(bound)?;
                Some(tree.lookup_range(Bound::Excluded(&key), Bound::Unbounded))
            }
            Condition::Gte(bound) => {
                let key = range_key(bound)?;
                Some(tree.lookup_range(Bound::Included(&key), Bound::Unbounded))
            }
            Condition::Lt(bound) => {
                let key = range_key(bound)?;
                Some(tree.lookup_range(Bound::Unbounded, Bound::Excluded(&key)))
            }
            Condition::Lte(bound) => {
                let key = range_key(bound)?;
                Some(tree.lookup_range(Bound::Unbounded, Bound::Included(&key)))
            }
            _ => None,
        }
    }
}

/// Only numbers, strings and dates are ordered by the matcher
fn range_key(bound: &Value) -> Option<IndexKey> {
    match IndexKey::from_json(bound)? {
        key @ (IndexKey::Number(_) | IndexKey::String(_) | IndexKey::Date(_)) => Some(key),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    fn manager_with(docs: &[Document], field: &str, unique: bool) -> IndexManager {
        let mut manager = IndexManager::new();
        for (seq, d) in docs.iter().enumerate() {
            manager.insert(seq as DocSeq, d);
        }
        manager
            .ensure_index(field, unique, docs.iter().enumerate().map(|(s, d)| (s as DocSeq, d)))
            .unwrap();
        manager
    }

    #[test]
    fn test_id_index_always_present() {
        let manager = IndexManager::new();
        assert!(manager.has_index("_id"));
        let mut manager = manager;
        assert!(!manager.remove_index("_id"));
    }

    #[test]
    fn test_lookup_eq_and_in() {
        let docs = vec![
            doc(json!({"_id": "a", "age": 25})),
            doc(json!({"_id": "b", "age": 30})),
            doc(json!({"_id": "c", "age": 25.0})),
        ];
        let manager = manager_with(&docs, "age", false);

        assert_eq!(manager.lookup("age", &Condition::Eq(json!(25))), Some(vec![0, 2]));
        assert_eq!(
            manager.lookup("age", &Condition::In(vec![json!(30), json!(25)])),
            Some(vec![0, 1, 2])
        );
        assert_eq!(manager.lookup("_id", &Condition::Eq(json!("b"))), Some(vec![1]));
        assert_eq!(manager.lookup("name", &Condition::Eq(json!("x"))), None);
        assert_eq!(manager.lookup("age", &Condition::Eq(json!([25]))), None);
        assert_eq!(manager.lookup("age", &Condition::Exists(true)), None);
    }

    #[test]
    fn test_lookup_range() {
        let docs: Vec<Document> = (0..5).map(|i| doc(json!({"n": i}))).collect();
        let manager = manager_with(&docs, "n", false);

        assert_eq!(manager.lookup("n", &Condition::Gt(json!(2))), Some(vec![3, 4]));
        assert_eq!(manager.lookup("n", &Condition::Lte(json!(1))), Some(vec![0, 1]));
        assert_eq!(manager.lookup("n", &Condition::Gt(json!(true))), None);
    }

    #[test]
    fn test_array_values_index_each_element() {
        let docs = vec![doc(json!({"tags": ["x", "y", "x"]})), doc(json!({"tags": "y"}))];
        let manager = manager_with(&docs, "tags", false);
        assert_eq!(manager.lookup("tags", &Condition::Eq(json!("y"))), Some(vec![0, 1]));
        assert_eq!(document_keys(&docs[0], "tags").len(), 2);
    }

    #[test]
    fn test_unique_setup_fails_on_duplicates() {
        let docs = vec![doc(json!({"email": "a"})), doc(json!({"email": "a"}))];
        let mut manager = IndexManager::new();
        let err = manager
            .ensure_index("email", true, docs.iter().enumerate().map(|(s, d)| (s as DocSeq, d)))
            .unwrap_err();
        assert!(matches!(err, IndexError::UniqueSetup { .. }));
        assert!(!manager.has_index("email"));
    }

    #[test]
    fn test_unique_check() {
        let docs = vec![doc(json!({"_id": "1", "email": "a"}))];
        let manager = manager_with(&docs, "email", true);

        let clash = doc(json!({"_id": "2", "email": "a"}));
        assert!(matches!(
            manager.check(&clash, None),
            Err(IndexError::UniqueConflict { .. })
        ));
        // Rewriting the same document is not a conflict
        assert!(manager.check(&docs[0], Some(0)).is_ok());
        // Missing fields are not constrained
        assert!(manager.check(&doc(json!({"_id": "3"})), None).is_ok());
    }

    #[test]
    fn test_remove_unindexes() {
        let docs = vec![doc(json!({"_id": "1", "age": 3}))];
        let mut manager = manager_with(&docs, "age", false);
        manager.remove(0, &docs[0]);
        assert_eq!(manager.lookup("age", &Condition::Eq(json!(3))), Some(vec![]));
        assert_eq!(manager.lookup("_id", &Condition::Eq(json!("1"))), Some(vec![]));
    }

    #[test]
    fn test_ensure_existing_is_noop() {
        let mut manager = IndexManager::new();
        assert!(manager.ensure_index("a", false, std::iter::empty()).unwrap());
        assert!(!manager.ensure_index("a", true, std::iter::empty()).unwrap());
        assert_eq!(manager.indexed_fields().collect::<Vec<_>>(), vec!["_id", "a"]);
    }
}
