//! Tree assembly over parent-pointer documents
//!
//! Two strategies:
//!
//! - Top-down: start at the roots and expand only opened nodes. Children of
//!   a closed node are never fetched.
//! - Bottom-up: used when the query narrows beyond the model. Fetch the
//!   matching nodes, pull in every ancestor, then rebuild the hierarchy
//!   order and mark which nodes matched on their own.
//!
//! Both walk with explicit stacks. A node reached twice on one path is
//! reported as `CyclicHierarchy` instead of looping.
//!
//! Child counts come from one scan of the whole model, so a closed node
//! still reports how many children it has.

use std::collections::{HashMap, HashSet};

use serde::Deserialize;
use serde_json::Value;

use super::errors::{CursorError, CursorResult};
use super::fetch::Fetcher;
use super::row::Row;
use super::sorter::RowSorter;
use crate::observability::{log_event_with_fields, Event};
use crate::query::{Condition, FieldKey, Query};
use crate::store::CandidateSource;
use crate::value::{canonical_key, get_dot_value, ID_FIELD};

/// Default field holding a node's addressable id
pub const DEFAULT_TREE_ID: &str = "id";

/// Default field holding a node's parent id
pub const DEFAULT_TREE_PARENT: &str = "__parent";

/// Tree configuration of a cursor
///
/// Unset field names fall back to the datastore configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TreeOptions {
    /// Field holding a node's addressable id
    pub tree_id: Option<String>,
    /// Field holding the parent's id
    pub tree_parent_id: Option<String>,
    /// Ids of nodes whose children are shown
    pub open_tree_ids: Vec<Value>,
    /// Show every node's children
    pub open_all: bool,
}

impl TreeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tree_id(mut self, field: impl Into<String>) -> Self {
        self.tree_id = Some(field.into());
        self
    }

    pub fn tree_parent_id(mut self, field: impl Into<String>) -> Self {
        self.tree_parent_id = Some(field.into());
        self
    }

    pub fn open<I, V>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.open_tree_ids.extend(ids.into_iter().map(Into::into));
        self
    }

    pub fn open_all(mut self) -> Self {
        self.open_all = true;
        self
    }
}

/// Child counts keyed by canonical parent id
pub(crate) type ChildCounts = HashMap<String, usize>;

/// Canonical key of a non-null value at `field`
fn tree_key(row: &Row, field: &str) -> Option<String> {
    get_dot_value(&row.fields, field)
        .filter(|v| !v.is_null())
        .map(|v| canonical_key(Some(&*v)))
}

/// Returns true for parent pointers that mean "no parent": null, `false`,
/// `0` and `""`
fn is_no_parent(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    }
}

/// Canonical key of the parent a row points at, if any
fn parent_key(row: &Row, field: &str) -> Option<String> {
    get_dot_value(&row.fields, field)
        .filter(|v| !is_no_parent(v))
        .map(|v| canonical_key(Some(&*v)))
}

fn child_count(counts: &ChildCounts, id: Option<&str>) -> usize {
    id.and_then(|id| counts.get(id)).copied().unwrap_or(0)
}

/// Identity used to dedup and detect revisits
fn identity(row: &Row) -> String {
    match row.fields.get(ID_FIELD) {
        Some(id) => canonical_key(Some(id)),
        None => serde_json::to_string(&row.fields).unwrap_or_default(),
    }
}

/// One tree assembly run
pub(crate) struct TreeAssembly<'a> {
    pub(crate) id_field: &'a str,
    pub(crate) parent_field: &'a str,
    pub(crate) sorter: &'a RowSorter,
    pub(crate) options: &'a TreeOptions,
}

impl TreeAssembly<'_> {
    /// Assemble the tree of `scope`; a non-trivial `narrowing` query
    /// switches to bottom-up assembly
    pub(crate) fn run<S: CandidateSource + ?Sized>(
        &self,
        fetcher: &Fetcher<'_, S>,
        scope: &Query,
        narrowing: &Query,
    ) -> CursorResult<Vec<Row>> {
        let counts = self.child_counts(fetcher, scope)?;
        if narrowing.is_trivial() {
            self.top_down(fetcher, scope, &counts)
        } else {
            self.bottom_up(fetcher, scope, narrowing, &counts)
        }
    }

    fn child_counts<S: CandidateSource + ?Sized>(
        &self,
        fetcher: &Fetcher<'_, S>,
        scope: &Query,
    ) -> CursorResult<ChildCounts> {
        let mut counts = ChildCounts::new();
        for row in fetcher.fetch(scope)? {
            if let Some(parent) = parent_key(&row, self.parent_field) {
                *counts.entry(parent).or_default() += 1;
            }
        }
        Ok(counts)
    }

    fn parent_field(&self) -> FieldKey {
        FieldKey::bare(self.parent_field)
    }

    fn top_down<S: CandidateSource + ?Sized>(
        &self,
        fetcher: &Fetcher<'_, S>,
        scope: &Query,
        counts: &ChildCounts,
    ) -> CursorResult<Vec<Row>> {
        let open: HashSet<String> = self
            .options
            .open_tree_ids
            .iter()
            .map(|id| canonical_key(Some(id)))
            .collect();

        let no_parent = [Value::Null, Value::Bool(false), Value::from(0), Value::from("")];
        let mut root_conditions = vec![Query::field(self.parent_field(), Condition::Exists(false))];
        root_conditions.extend(
            no_parent
                .into_iter()
                .map(|v| Query::field(self.parent_field(), Condition::Eq(v))),
        );
        let roots = scope.clone().and(Query::Or(root_conditions));
        let mut level_rows = fetcher.fetch(&roots)?;
        self.sorter.sort(&mut level_rows);

        let mut out = Vec::new();
        let mut visited = HashSet::new();
        let mut stack = vec![level_rows.into_iter()];

        while let Some(siblings) = stack.last_mut() {
            let Some(mut row) = siblings.next() else {
                stack.pop();
                continue;
            };

            let node = identity(&row);
            if !visited.insert(node.clone()) {
                return Err(CursorError::CyclicHierarchy(node));
            }

            let id = get_dot_value(&row.fields, self.id_field)
                .filter(|v| !v.is_null())
                .map(|v| v.into_owned());
            let id_key = id.as_ref().map(|v| canonical_key(Some(v)));

            row.meta.level = Some(stack.len() - 1);
            row.meta.child_count = Some(child_count(counts, id_key.as_deref()));
            out.push(row);

            let is_open = match &id_key {
                Some(key) => self.options.open_all || open.contains(key),
                None => false,
            };
            if let (true, Some(id)) = (is_open, id) {
                let query = scope
                    .clone()
                    .and(Query::field(self.parent_field(), Condition::Eq(id)));
                let mut children = fetcher.fetch(&query)?;
                self.sorter.sort(&mut children);
                stack.push(children.into_iter());
            }
        }

        Ok(out)
    }

    fn bottom_up<S: CandidateSource + ?Sized>(
        &self,
        fetcher: &Fetcher<'_, S>,
        scope: &Query,
        narrowing: &Query,
        counts: &ChildCounts,
    ) -> CursorResult<Vec<Row>> {
        let mut collected = fetcher.fetch(&scope.clone().and(narrowing.clone()))?;
        let matched: HashSet<String> = collected.iter().map(identity).collect();
        let mut seen = matched.clone();
        let mut requested = HashSet::new();

        let mut next = 0;
        while next < collected.len() {
            let parent = get_dot_value(&collected[next].fields, self.parent_field)
                .filter(|v| !is_no_parent(v))
                .map(|v| v.into_owned());
            let node = identity(&collected[next]);
            next += 1;

            let Some(parent) = parent else {
                continue;
            };
            if !requested.insert(canonical_key(Some(&parent))) {
                continue;
            }

            let query = scope.clone().and(Query::field(
                FieldKey::bare(self.id_field),
                Condition::Eq(parent.clone()),
            ));
            let mut found = fetcher.fetch(&query)?;
            match found.len() {
                1 => {
                    let ancestor = found.remove(0);
                    if seen.insert(identity(&ancestor)) {
                        collected.push(ancestor);
                    }
                }
                0 => log_event_with_fields(
                    Event::TreeParentMissing,
                    &[("node", node.as_str()), ("parent", parent.to_string().as_str())],
                ),
                n => log_event_with_fields(
                    Event::TreeParentAmbiguous,
                    &[
                        ("candidates", n.to_string().as_str()),
                        ("node", node.as_str()),
                        ("parent", parent.to_string().as_str()),
                    ],
                ),
            }
        }

        for row in &mut collected {
            row.meta.criteria_match = Some(matched.contains(&identity(row)));
        }

        sort_list_as_tree(
            collected,
            self.id_field,
            self.parent_field,
            self.sorter,
            Some(counts),
        )
    }
}

/// Order a flat node list as a depth-first tree.
///
/// Nodes without a parent or whose parent is not in the list are roots.
/// Siblings are sorted with `sorter`. Levels are always assigned; child
/// counts only when `counts` is given, otherwise existing counts are kept.
pub(crate) fn sort_list_as_tree(
    rows: Vec<Row>,
    id_field: &str,
    parent_field: &str,
    sorter: &RowSorter,
    counts: Option<&ChildCounts>,
) -> CursorResult<Vec<Row>> {
    let ids: Vec<Option<String>> = rows.iter().map(|r| tree_key(r, id_field)).collect();
    let present: HashSet<&str> = ids.iter().flatten().map(String::as_str).collect();

    let mut groups: HashMap<Option<String>, Vec<usize>> = HashMap::new();
    for (i, row) in rows.iter().enumerate() {
        let parent = parent_key(row, parent_field).filter(|p| present.contains(p.as_str()));
        groups.entry(parent).or_default().push(i);
    }
    for members in groups.values_mut() {
        members.sort_by(|&a, &b| sorter.compare(&rows[a], &rows[b]));
    }

    let mut out = Vec::with_capacity(rows.len());
    let mut emitted = vec![false; rows.len()];
    let mut path: Vec<&str> = Vec::new();
    let roots = groups.get(&None).cloned().unwrap_or_default();
    let mut stack = vec![roots.into_iter()];

    while let Some(siblings) = stack.last_mut() {
        let Some(i) = siblings.next() else {
            stack.pop();
            path.pop();
            continue;
        };

        let mut row = rows[i].clone();
        row.meta.level = Some(stack.len() - 1);
        if let Some(counts) = counts {
            row.meta.child_count = Some(child_count(counts, ids[i].as_deref()));
        }
        emitted[i] = true;
        out.push(row);

        if let Some(id) = ids[i].as_deref() {
            if let Some(children) = groups.get(&Some(id.to_string())) {
                if path.contains(&id) {
                    return Err(CursorError::CyclicHierarchy(id.to_string()));
                }
                path.push(id);
                stack.push(children.clone().into_iter());
            }
        }
    }

    // Nodes only reachable through each other form a cycle
    if let Some(i) = emitted.iter().position(|done| !done) {
        let node = ids[i].clone().unwrap_or_else(|| identity(&rows[i]));
        return Err(CursorError::CyclicHierarchy(node));
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{SortSpec, MODEL_SEPARATOR};
    use crate::cursor::sorter::RowLayout;
    use crate::value::Document;
    use serde_json::json;

    fn docs(values: Vec<Value>) -> Vec<Document> {
        values
            .into_iter()
            .map(|v| v.as_object().cloned().unwrap())
            .collect()
    }

    fn forest() -> Vec<Document> {
        docs(vec![
            json!({"_id": "a", "id": 1, "name": "Alpha"}),
            json!({"_id": "b", "id": 2, "name": "Beta"}),
            json!({"_id": "a1", "id": 11, "name": "Alpha 1", "__parent": 1}),
            json!({"_id": "a2", "id": 12, "name": "Alpha 2", "__parent": 1}),
            json!({"_id": "a11", "id": 111, "name": "Alpha 1.1", "__parent": 11}),
            json!({"_id": "b1", "id": 21, "name": "Beta 1", "__parent": 2}),
        ])
    }

    fn names(rows: &[Row]) -> Vec<(String, usize)> {
        rows.iter()
            .map(|r| {
                (
                    r.get("name").and_then(Value::as_str).unwrap_or_default().to_string(),
                    r.meta.level.unwrap(),
                )
            })
            .collect()
    }

    fn run(source: &Vec<Document>, options: &TreeOptions, narrowing: Query) -> Vec<Row> {
        let sorter = RowSorter::resolve(&SortSpec::new().asc("name"), RowLayout::Plain, None);
        let assembly = TreeAssembly {
            id_field: "id",
            parent_field: "__parent",
            sorter: &sorter,
            options,
        };
        let fetcher = Fetcher::new(source);
        assembly.run(&fetcher, &Query::all(), &narrowing).unwrap()
    }

    #[test]
    fn test_top_down_closed() {
        let rows = run(&forest(), &TreeOptions::new(), Query::all());
        assert_eq!(names(&rows), vec![("Alpha".into(), 0), ("Beta".into(), 0)]);
        assert_eq!(rows[0].meta.child_count, Some(2));
        assert_eq!(rows[1].meta.child_count, Some(1));
    }

    #[test]
    fn test_top_down_open_ids() {
        let rows = run(&forest(), &TreeOptions::new().open([1, 11]), Query::all());
        assert_eq!(
            names(&rows),
            vec![
                ("Alpha".into(), 0),
                ("Alpha 1".into(), 1),
                ("Alpha 1.1".into(), 2),
                ("Alpha 2".into(), 1),
                ("Beta".into(), 0),
            ]
        );
    }

    #[test]
    fn test_top_down_open_all() {
        let rows = run(&forest(), &TreeOptions::new().open_all(), Query::all());
        assert_eq!(rows.len(), 6);
        assert_eq!(rows[5].get("name"), Some(&json!("Beta 1")));
        assert_eq!(rows[5].meta.level, Some(1));
    }

    #[test]
    fn test_bottom_up_marks_matches() {
        let rows = run(&forest(), &TreeOptions::new(), Query::eq("name", "Alpha 1.1"));
        assert_eq!(
            names(&rows),
            vec![
                ("Alpha".into(), 0),
                ("Alpha 1".into(), 1),
                ("Alpha 1.1".into(), 2),
            ]
        );
        let marks: Vec<_> = rows.iter().map(|r| r.meta.criteria_match).collect();
        assert_eq!(marks, vec![Some(false), Some(false), Some(true)]);
        assert_eq!(rows[0].meta.child_count, Some(2));
    }

    #[test]
    fn test_missing_parent_is_root() {
        let source = docs(vec![
            json!({"_id": "x", "id": 5, "name": "Orphan", "__parent": 99}),
            json!({"_id": "y", "id": 6, "name": "Child", "__parent": 5}),
        ]);
        let rows = run(&source, &TreeOptions::new(), Query::eq("name", "Child"));
        assert_eq!(names(&rows), vec![("Orphan".into(), 0), ("Child".into(), 1)]);
    }

    #[test]
    fn test_falsy_parents_are_roots() {
        let source = docs(vec![
            json!({"_id": "n", "id": 1, "name": "Null", "__parent": null}),
            json!({"_id": "z", "id": 2, "name": "Zero", "__parent": 0}),
            json!({"_id": "e", "id": 3, "name": "Empty", "__parent": ""}),
            json!({"_id": "f", "id": 4, "name": "False", "__parent": false}),
            json!({"_id": "c", "id": 5, "name": "Child", "__parent": 3}),
        ]);

        let rows = run(&source, &TreeOptions::new(), Query::all());
        assert_eq!(
            names(&rows),
            vec![
                ("Empty".into(), 0),
                ("False".into(), 0),
                ("Null".into(), 0),
                ("Zero".into(), 0),
            ]
        );
        assert_eq!(rows[0].meta.child_count, Some(1));
        assert_eq!(rows[3].meta.child_count, Some(0));

        let rows = run(&source, &TreeOptions::new(), Query::eq("name", "Zero"));
        assert_eq!(names(&rows), vec![("Zero".into(), 0)]);
    }

    #[test]
    fn test_cycle_is_reported() {
        let source = docs(vec![
            json!({"_id": "x", "id": 1, "__parent": 2}),
            json!({"_id": "y", "id": 2, "__parent": 1}),
        ]);
        let rows: Vec<Row> = source.into_iter().map(Row::new).collect();
        let result = sort_list_as_tree(rows, "id", "__parent", &RowSorter::default(), None);
        assert!(matches!(result, Err(CursorError::CyclicHierarchy(_))));
    }

    #[test]
    fn test_duplicate_ids_on_a_path_are_reported() {
        let source = docs(vec![
            json!({"_id": "x", "id": 1}),
            json!({"_id": "y", "id": 1, "__parent": 1}),
        ]);
        let rows = TreeAssembly {
            id_field: "id",
            parent_field: "__parent",
            sorter: &RowSorter::default(),
            options: &TreeOptions::new().open_all(),
        }
        .run(&Fetcher::new(&source), &Query::all(), &Query::all());
        assert!(matches!(rows, Err(CursorError::CyclicHierarchy(_))));
    }

    #[test]
    fn test_reconstruction_on_prefixed_rows_keeps_counts() {
        let mut rows: Vec<Row> = forest()
            .into_iter()
            .map(|d| Row::new(d).prefixed("Tree"))
            .collect();
        rows.reverse();
        rows[0].meta.child_count = Some(7);
        let id = format!("Tree{}id", MODEL_SEPARATOR);
        let parent = format!("Tree{}__parent", MODEL_SEPARATOR);
        let out = sort_list_as_tree(rows, &id, &parent, &RowSorter::default(), None).unwrap();
        assert_eq!(out.len(), 6);
        assert_eq!(out[0].get("Tree:name"), Some(&json!("Beta")));
        assert_eq!(out[1].get("Tree:name"), Some(&json!("Beta 1")));
        assert_eq!(out[1].meta.child_count, Some(7));
        assert!(out.iter().all(|r| r.meta.level.is_some()));
    }

    #[test]
    fn test_options_from_json() {
        let options: TreeOptions =
            serde_json::from_value(json!({"openTreeIds": [1, 4], "treeParentId": "parent"}))
                .unwrap();
        assert_eq!(options.open_tree_ids, vec![json!(1), json!(4)]);
        assert_eq!(options.tree_parent_id.as_deref(), Some("parent"));
        assert!(!options.open_all);
    }
}
