//! Multi-model query partitioning
//!
//! A cursor over model `Home` may carry conditions on joined models
//! (`"User:name"`). Partitioning splits the query and the sort spec into
//! one piece per referenced model:
//!
//! - bare keys belong to the home model
//! - keys qualified with the home model lose their qualifier
//! - keys qualified with a foreign model stay qualified, to be matched
//!   against prefixed rows after the join
//! - a bare `_model` condition survives only in the partition of the model
//!   it names
//!
//! Logical structure is preserved: `$or` stays `$or`. A branch that drops
//! out of a partition is treated as unconstrained, so each partition is a
//! relaxation of the input query, never stricter than it.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;

use super::ast::{Condition, FieldKey, Query, SortKey, SortSpec};

/// Per-model queries and sorts
#[derive(Debug, Clone, Default)]
pub struct PartitionedQuery {
    pub queries: BTreeMap<String, Query>,
    pub sorts: BTreeMap<String, SortSpec>,
}

impl PartitionedQuery {
    /// Query scoped to a model; unconstrained when the model is unknown
    pub fn query_for(&self, model: &str) -> Query {
        self.queries.get(model).cloned().unwrap_or_default()
    }

    /// Sort scoped to a model; empty when the model is unknown
    pub fn sort_for(&self, model: &str) -> SortSpec {
        self.sorts.get(model).cloned().unwrap_or_default()
    }

    /// Models discovered in the query, the sort and the home model
    pub fn models(&self) -> impl Iterator<Item = &str> {
        self.queries.keys().map(String::as_str)
    }
}

/// Split a query and sort spec by model
pub fn partition(query: &Query, sort: &SortSpec, home: &str) -> PartitionedQuery {
    let mut models = BTreeSet::new();
    models.insert(home.to_string());
    collect_models(query, &mut models);
    for key in &sort.keys {
        if let Some(model) = &key.key.model {
            models.insert(model.clone());
        }
    }

    let mut result = PartitionedQuery::default();
    for model in models {
        let scoped = Scope {
            model: &model,
            home,
        };
        result.queries.insert(model.clone(), scoped.rebuild(query));
        result.sorts.insert(model.clone(), scoped.rebuild_sort(sort));
    }
    result
}

fn collect_models(query: &Query, models: &mut BTreeSet<String>) {
    match query {
        Query::Field { key, .. } => {
            if let Some(model) = &key.model {
                models.insert(model.clone());
            }
        }
        Query::And(children) | Query::Or(children) => {
            for child in children {
                collect_models(child, models);
            }
        }
        Query::Not(child) => collect_models(child, models),
        Query::Where(_) => {}
    }
}

struct Scope<'a> {
    model: &'a str,
    home: &'a str,
}

impl Scope<'_> {
    fn is_home(&self) -> bool {
        self.model == self.home
    }

    /// Rewrite a key for this partition, or `None` if it belongs elsewhere
    fn key(&self, key: &FieldKey, condition: &Condition) -> Option<FieldKey> {
        match &key.model {
            None if key.is_model_field() => {
                let names_this_model = matches!(
                    condition,
                    Condition::Eq(Value::String(name)) if name == self.model
                );
                if names_this_model && self.is_home() {
                    Some(key.clone())
                } else if names_this_model {
                    Some(FieldKey::qualified(self.model, &key.path))
                } else if self.is_home() && !matches!(condition, Condition::Eq(_)) {
                    Some(key.clone())
                } else {
                    None
                }
            }
            None if self.is_home() => Some(key.clone()),
            None => None,
            Some(model) if model == self.model && self.is_home() => {
                Some(FieldKey::bare(&key.path))
            }
            Some(model) if model == self.model => Some(key.clone()),
            Some(_) => None,
        }
    }

    fn rebuild(&self, query: &Query) -> Query {
        match query {
            Query::Field { key, condition } => match self.key(key, condition) {
                Some(key) => Query::Field {
                    key,
                    condition: condition.clone(),
                },
                None => Query::all(),
            },
            Query::And(children) => Query::And(
                children
                    .iter()
                    .map(|child| self.rebuild(child))
                    .filter(|child| !child.is_trivial())
                    .collect(),
            ),
            Query::Or(children) => {
                let rebuilt: Vec<Query> = children.iter().map(|c| self.rebuild(c)).collect();
                if rebuilt.iter().any(Query::is_trivial) {
                    return Query::all();
                }
                Query::Or(rebuilt)
            }
            Query::Not(child) => {
                // Negating a partially dropped child would over-constrain
                if !self.owns(child) {
                    return Query::all();
                }
                Query::Not(Box::new(self.rebuild(child)))
            }
            Query::Where(_) if self.is_home() => query.clone(),
            Query::Where(_) => Query::all(),
        }
    }

    /// Returns true if every condition in the query survives in this partition
    fn owns(&self, query: &Query) -> bool {
        match query {
            Query::Field { key, condition } => self.key(key, condition).is_some(),
            Query::And(children) | Query::Or(children) => children.iter().all(|c| self.owns(c)),
            Query::Not(child) => self.owns(child),
            Query::Where(_) => self.is_home(),
        }
    }

    fn rebuild_sort(&self, sort: &SortSpec) -> SortSpec {
        let keys = sort
            .keys
            .iter()
            .filter_map(|sort_key| {
                let key = match &sort_key.key.model {
                    None if self.is_home() => sort_key.key.clone(),
                    Some(m) if m == self.model && self.is_home() => {
                        FieldKey::bare(&sort_key.key.path)
                    }
                    Some(m) if m == self.model => sort_key.key.clone(),
                    _ => return None,
                };
                Some(SortKey {
                    key,
                    direction: sort_key.direction,
                })
            })
            .collect();
        SortSpec { keys }
    }
}
