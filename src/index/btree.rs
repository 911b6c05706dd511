//! BTreeMap-based index structures
//!
//! Indexes use BTreeMap<IndexKey, Vec<DocSeq>> for deterministic ordering.
//! Sequence numbers are always sorted ascending, which is insertion order.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Bound;

use serde_json::Value;

use crate::value::as_date;

/// Index key representing one indexable field value.
///
/// Ordering follows value ordering: Null < Number < String < Bool < Date.
/// Numbers share one variant so `1` and `1.0` are the same key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IndexKey {
    /// JSON null
    Null,
    /// Number (f64 bits rearranged for total ordering)
    Number(u64),
    /// String value
    String(String),
    /// Boolean value (false < true)
    Bool(bool),
    /// Date as epoch milliseconds
    Date(i64),
}

impl IndexKey {
    /// Create a key from a float
    ///
    /// Uses bit representation for total ordering.
    pub fn from_number(v: f64) -> Self {
        // Fold -0.0 onto 0.0 so both hash to one key
        let v = if v == 0.0 { 0.0 } else { v };
        let bits = v.to_bits();
        let ordered = if (bits >> 63) == 1 {
            !bits
        } else {
            bits ^ (1 << 63)
        };
        IndexKey::Number(ordered)
    }

    /// Create a key from a JSON value.
    ///
    /// Arrays and plain objects are not indexable.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(IndexKey::Null),
            Value::Bool(b) => Some(IndexKey::Bool(*b)),
            Value::Number(n) => n.as_f64().map(Self::from_number),
            Value::String(s) => Some(IndexKey::String(s.clone())),
            Value::Object(_) => as_date(value).map(|d| IndexKey::Date(d.timestamp_millis())),
            Value::Array(_) => None,
        }
    }

    /// Returns true if both keys are of the same value type
    pub fn same_kind(&self, other: &IndexKey) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

impl fmt::Display for IndexKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexKey::Null => write!(f, "null"),
            IndexKey::Number(ordered) => {
                let ordered = *ordered;
                let bits = if (ordered >> 63) == 1 {
                    ordered ^ (1 << 63)
                } else {
                    !ordered
                };
                write!(f, "{}", f64::from_bits(bits))
            }
            IndexKey::String(s) => write!(f, "{:?}", s),
            IndexKey::Bool(b) => write!(f, "{}", b),
            IndexKey::Date(ms) => write!(f, "date({})", ms),
        }
    }
}

/// Position of a document in the datastore, assigned at insert
pub type DocSeq = u64;

/// A single field index using BTreeMap for deterministic ordering.
#[derive(Debug, Default)]
pub struct IndexTree {
    /// Maps key values to sorted lists of sequence numbers
    tree: BTreeMap<IndexKey, Vec<DocSeq>>,
}

impl IndexTree {
    /// Creates a new empty index tree
    pub fn new() -> Self {
        Self {
            tree: BTreeMap::new(),
        }
    }

    /// Insert a sequence number for a key.
    ///
    /// Maintains sorted ascending order.
    pub fn insert(&mut self, key: IndexKey, seq: DocSeq) {
        let seqs = self.tree.entry(key).or_default();
        match seqs.binary_search(&seq) {
            Ok(_) => {}
            Err(pos) => seqs.insert(pos, seq),
        }
    }

    /// Remove a sequence number for a key.
    ///
    /// If the key has no more entries, removes the key entirely.
    pub fn remove(&mut self, key: &IndexKey, seq: DocSeq) {
        if let Some(seqs) = self.tree.get_mut(key) {
            if let Ok(pos) = seqs.binary_search(&seq) {
                seqs.remove(pos);
            }
            if seqs.is_empty() {
                self.tree.remove(key);
            }
        }
    }

    /// Lookup all entries for an exact key match, sorted ascending.
    pub fn lookup_eq(&self, key: &IndexKey) -> &[DocSeq] {
        self.tree.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Lookup entries between two bounds, restricted to keys of the same
    /// kind as the bounds.
    ///
    /// Returns sequence numbers sorted ascending.
    pub fn lookup_range(&self, min: Bound<&IndexKey>, max: Bound<&IndexKey>) -> Vec<DocSeq> {
        let kind = match (min, max) {
            (Bound::Included(k) | Bound::Excluded(k), _) => k,
            (_, Bound::Included(k) | Bound::Excluded(k)) => k,
            (Bound::Unbounded, Bound::Unbounded) => return self.all(),
        };

        let mut result: Vec<DocSeq> = self
            .tree
            .range((min, max))
            .filter(|(key, _)| key.same_kind(kind))
            .flat_map(|(_, seqs)| seqs.iter().copied())
            .collect();

        // Sort to ensure deterministic order even when combining multiple keys
        result.sort_unstable();
        result.dedup();
        result
    }

    fn all(&self) -> Vec<DocSeq> {
        let mut result: Vec<DocSeq> = self.tree.values().flatten().copied().collect();
        result.sort_unstable();
        result.dedup();
        result
    }

    /// Returns true if any entry other than `except` is stored under the key
    pub fn contains_other(&self, key: &IndexKey, except: Option<DocSeq>) -> bool {
        self.lookup_eq(key).iter().any(|seq| Some(*seq) != except)
    }

    /// Returns the number of distinct keys
    pub fn key_count(&self) -> usize {
        self.tree.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_key_ordering() {
        let keys = vec![
            IndexKey::Null,
            IndexKey::from_number(-100.5),
            IndexKey::from_number(0.0),
            IndexKey::from_number(2.0),
            IndexKey::from_number(100.0),
            IndexKey::String("aaa".into()),
            IndexKey::String("zzz".into()),
            IndexKey::Bool(false),
            IndexKey::Bool(true),
            IndexKey::Date(0),
        ];

        for i in 1..keys.len() {
            assert!(keys[i - 1] < keys[i], "Keys should be ordered at {}", i);
        }
    }

    #[test]
    fn test_from_json() {
        assert_eq!(IndexKey::from_json(&json!(1)), IndexKey::from_json(&json!(1.0)));
        assert_eq!(IndexKey::from_json(&json!(0)), IndexKey::from_json(&json!(-0.0)));
        assert_eq!(IndexKey::from_json(&json!({"$$date": 5})), Some(IndexKey::Date(5)));
        assert_eq!(IndexKey::from_json(&json!(null)), Some(IndexKey::Null));
        assert_eq!(IndexKey::from_json(&json!([1, 2, 3])), None);
        assert_eq!(IndexKey::from_json(&json!({"a": 1})), None);
    }

    #[test]
    fn test_display_decodes_numbers() {
        assert_eq!(IndexKey::from_number(-2.5).to_string(), "-2.5");
        assert_eq!(IndexKey::from_number(42.0).to_string(), "42");
        assert_eq!(IndexKey::String("a".into()).to_string(), "\"a\"");
    }

    #[test]
    fn test_insert_and_lookup() {
        let mut tree = IndexTree::new();

        tree.insert(IndexKey::String("alice".into()), 2);
        tree.insert(IndexKey::String("alice".into()), 1);
        tree.insert(IndexKey::String("bob".into()), 3);

        assert_eq!(tree.lookup_eq(&IndexKey::String("alice".into())), &[1, 2]);
        assert_eq!(tree.lookup_eq(&IndexKey::String("bob".into())), &[3]);
        assert!(tree.lookup_eq(&IndexKey::String("carol".into())).is_empty());
    }

    #[test]
    fn test_remove() {
        let mut tree = IndexTree::new();
        let key = IndexKey::from_number(1.0);

        tree.insert(key.clone(), 100);
        tree.insert(key.clone(), 200);
        tree.remove(&key, 100);
        assert_eq!(tree.lookup_eq(&key), &[200]);

        tree.remove(&key, 200);
        assert_eq!(tree.key_count(), 0);
    }

    #[test]
    fn test_lookup_range_stays_within_kind() {
        let mut tree = IndexTree::new();
        for (seq, n) in [1.0, 2.0, 3.0, 4.0, 5.0].iter().enumerate() {
            tree.insert(IndexKey::from_number(*n), seq as DocSeq);
        }
        tree.insert(IndexKey::String("x".into()), 10);

        let two = IndexKey::from_number(2.0);
        let four = IndexKey::from_number(4.0);
        assert_eq!(
            tree.lookup_range(Bound::Included(&two), Bound::Included(&four)),
            vec![1, 2, 3]
        );
        assert_eq!(
            tree.lookup_range(Bound::Excluded(&four), Bound::Unbounded),
            vec![4]
        );
    }

    #[test]
    fn test_contains_other() {
        let mut tree = IndexTree::new();
        let key = IndexKey::String("a".into());
        tree.insert(key.clone(), 7);
        assert!(tree.contains_other(&key, None));
        assert!(!tree.contains_other(&key, Some(7)));
    }
}
