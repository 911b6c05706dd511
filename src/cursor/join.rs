//! Left joins across models of one collection
//!
//! Rows are joined in prefixed form: every field of a `User` document is
//! renamed to `User:field`, so both sides stay addressable. A join is an
//! outer-left equality join with fan-out:
//!
//! - a row with k matches becomes k rows, each carrying the same left fields
//! - a row without a match is emitted once, without target fields
//! - null or missing left values never match

use std::collections::{HashMap, HashSet};

use serde_json::Value;

use super::errors::CursorResult;
use super::fetch::Fetcher;
use super::row::Row;
use crate::query::{matches, Condition, FieldKey, PartitionedQuery, Query};
use crate::store::CandidateSource;
use crate::value::{canonical_key, get_dot_value};

/// A declared left join: `from` on the current rows equals `to` on
/// documents of the model `to` names
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinSpec {
    pub from: FieldKey,
    pub to: FieldKey,
}

impl JoinSpec {
    /// `JoinSpec::new("Group:_id", "User:fkGroupId")`; a bare `from`
    /// refers to the home model
    pub fn new(from: &str, to: &str) -> Self {
        Self {
            from: FieldKey::parse(from),
            to: FieldKey::parse(to),
        }
    }

    /// Target model, if `to` is qualified
    pub fn target(&self) -> Option<&str> {
        self.to.model.as_deref()
    }

    fn from_column(&self, home: &str) -> String {
        match &self.from.model {
            Some(_) => self.from.qualified_name(),
            None => FieldKey::qualified(home, self.from.path.as_str()).qualified_name(),
        }
    }
}

/// Join prefixed rows against the target model of `join`
pub(crate) fn apply_join<S: CandidateSource + ?Sized>(
    fetcher: &Fetcher<'_, S>,
    rows: Vec<Row>,
    join: &JoinSpec,
    home: &str,
    parts: &PartitionedQuery,
) -> CursorResult<Vec<Row>> {
    let Some(target) = join.target() else {
        return Ok(rows);
    };
    let from_column = join.from_column(home);

    let mut values = Vec::new();
    let mut seen = HashSet::new();
    for row in &rows {
        if let Some(value) = get_dot_value(&row.fields, &from_column) {
            if !value.is_null() && seen.insert(canonical_key(Some(&*value))) {
                values.push(value.into_owned());
            }
        }
    }

    let mut buckets: HashMap<String, Vec<Row>> = HashMap::new();
    if !values.is_empty() {
        let query = Query::model(target).and(Query::field(
            FieldKey::bare(join.to.path.as_str()),
            Condition::In(values),
        ));
        for found in fetcher.fetch(&query)? {
            let keys = join_keys(found.get_path(&join.to.path));
            let found = found.prefixed(target);
            for key in keys {
                buckets.entry(key).or_default().push(found.clone());
            }
        }
    }

    let mut joined = Vec::with_capacity(rows.len());
    for row in rows {
        let matched = get_dot_value(&row.fields, &from_column)
            .filter(|v| !v.is_null())
            .and_then(|v| buckets.get(&canonical_key(Some(&*v))));

        match matched {
            Some(targets) => {
                for target_row in targets {
                    let mut merged = row.clone();
                    merged
                        .fields
                        .extend(target_row.fields.iter().map(|(k, v)| (k.clone(), v.clone())));
                    joined.push(merged);
                }
            }
            None => joined.push(row),
        }
    }

    let constraint = parts.query_for(target);
    if !constraint.is_trivial() {
        joined.retain(|row| matches(&row.fields, &constraint));
    }
    Ok(joined)
}

/// Filter joined rows by the partitions of models no join reached.
///
/// Those conditions name columns the rows never received, so they are
/// matched against the rows as written instead of being dropped.
pub(crate) fn apply_unjoined_constraints(
    mut rows: Vec<Row>,
    joins: &[JoinSpec],
    home: &str,
    parts: &PartitionedQuery,
) -> Vec<Row> {
    let joined: HashSet<&str> = joins.iter().filter_map(JoinSpec::target).collect();
    for model in parts.models() {
        if model == home || joined.contains(model) {
            continue;
        }
        let constraint = parts.query_for(model);
        if !constraint.is_trivial() {
            rows.retain(|row| matches(&row.fields, &constraint));
        }
    }
    rows
}

/// Bucket keys of a target value; array values join on each element
fn join_keys(value: Option<Value>) -> Vec<String> {
    match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => {
            let mut keys: Vec<String> = items
                .iter()
                .filter(|v| !v.is_null())
                .map(|v| canonical_key(Some(v)))
                .collect();
            keys.sort();
            keys.dedup();
            keys
        }
        Some(v) => vec![canonical_key(Some(&v))],
    }
}
