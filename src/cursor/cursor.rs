//! Cursor builder and execution pipeline
//!
//! Stages run in a fixed order, each at most once:
//!
//! ```text
//! fetch | tree -> join -> group / aggregate -> sort -> skip/limit -> rollup -> project
//! ```
//!
//! - A bare aggregate (no group-by) returns its single row right away.
//! - Tree mode never sorts globally; siblings are sorted during assembly.
//! - The first failing stage aborts the execution.

use serde_json::Value;

use super::aggregate::{self, AggregateSpec};
use super::errors::CursorResult;
use super::fetch::Fetcher;
use super::join::{apply_join, apply_unjoined_constraints, JoinSpec};
use super::projection::Projection;
use super::result::ExecutionResult;
use super::row::Row;
use super::search::{Search, SearchTerm};
use super::sorter::{RowLayout, RowSorter};
use super::tree::{
    sort_list_as_tree, TreeAssembly, TreeOptions, DEFAULT_TREE_ID, DEFAULT_TREE_PARENT,
};
use crate::observability::{log_event_with_fields, Event, ObservationScope};
use crate::query::{partition, Condition, FieldKey, Query, SortSpec};
use crate::store::CandidateSource;

enum Aggregates {
    Spec(AggregateSpec),
    Json(Value),
}

/// A configured query over a candidate source
///
/// Built with chained calls and run with [`Cursor::exec`]. Running does not
/// consume the cursor, so the same configuration can be executed again.
pub struct Cursor<'a, S: CandidateSource + ?Sized> {
    source: &'a S,
    query: Query,
    model: Option<String>,
    sort: SortSpec,
    skip: usize,
    limit: Option<usize>,
    projection: Option<Value>,
    joins: Vec<JoinSpec>,
    tree: Option<TreeOptions>,
    tree_id_field: String,
    tree_parent_field: String,
    group_by: Option<String>,
    aggregates: Option<Aggregates>,
    rollup: bool,
    search: Option<Search>,
}

impl<'a, S: CandidateSource + ?Sized> Cursor<'a, S> {
    pub fn new(source: &'a S, query: Query) -> Self {
        Self {
            source,
            query,
            model: None,
            sort: SortSpec::new(),
            skip: 0,
            limit: None,
            projection: None,
            joins: Vec::new(),
            tree: None,
            tree_id_field: DEFAULT_TREE_ID.to_string(),
            tree_parent_field: DEFAULT_TREE_PARENT.to_string(),
            group_by: None,
            aggregates: None,
            rollup: false,
            search: None,
        }
    }

    /// Scope the cursor to a home model
    pub fn model(mut self, name: impl Into<String>) -> Self {
        self.model = Some(name.into());
        self
    }

    pub(crate) fn with_tree_fields(mut self, id_field: &str, parent_field: &str) -> Self {
        self.tree_id_field = id_field.to_string();
        self.tree_parent_field = parent_field.to_string();
        self
    }

    pub fn sort(mut self, sort: SortSpec) -> Self {
        self.sort = sort;
        self
    }

    pub fn skip(mut self, n: usize) -> Self {
        self.skip = n;
        self
    }

    /// Maximum number of rows; 0 means unlimited
    pub fn limit(mut self, n: usize) -> Self {
        self.limit = (n > 0).then_some(n);
        self
    }

    /// Projection object, validated when the cursor runs
    pub fn projection(mut self, spec: Value) -> Self {
        self.projection = Some(spec);
        self
    }

    /// Add a left join, e.g. `left_join("Group:_id", "User:fkGroupId")`.
    /// Joins run in declaration order and need a model-scoped cursor.
    pub fn left_join(mut self, from: &str, to: &str) -> Self {
        self.joins.push(JoinSpec::new(from, to));
        self
    }

    pub fn as_tree(mut self, options: TreeOptions) -> Self {
        self.tree = Some(options);
        self
    }

    pub fn group_by(mut self, attribute: impl Into<String>) -> Self {
        self.group_by = Some(attribute.into());
        self
    }

    pub fn aggregates(mut self, spec: AggregateSpec) -> Self {
        self.aggregates = Some(Aggregates::Spec(spec));
        self
    }

    /// Aggregates as `{"name": ["op", "field"]}`, validated when the cursor runs
    pub fn aggregates_json(mut self, spec: Value) -> Self {
        self.aggregates = Some(Aggregates::Json(spec));
        self
    }

    /// Append a rollup row over all grouped rows
    pub fn with_rollup(mut self) -> Self {
        self.rollup = true;
        self
    }

    /// Case-insensitive search over the given attributes
    pub fn search(self, term: impl Into<SearchTerm>, attributes: &[&str]) -> Self {
        self.search_with(term.into(), attributes, false)
    }

    pub fn search_case_sensitive(self, term: impl Into<SearchTerm>, attributes: &[&str]) -> Self {
        self.search_with(term.into(), attributes, true)
    }

    fn search_with(mut self, term: SearchTerm, attributes: &[&str], case_sensitive: bool) -> Self {
        self.search = Some(Search {
            term,
            attributes: attributes.iter().map(|a| FieldKey::parse(a)).collect(),
            case_sensitive,
        });
        self
    }

    /// Run the pipeline
    pub fn exec(&self) -> CursorResult<ExecutionResult> {
        let scope = ObservationScope::with_fields(
            "CURSOR_EXEC",
            vec![("model", self.model.clone().unwrap_or_default())],
        );

        match self.run() {
            Ok(result) => {
                scope.complete_with_fields(&[
                    ("rows", result.len().to_string().as_str()),
                    ("source_requests", result.source_requests.to_string().as_str()),
                ]);
                Ok(result)
            }
            Err(err) => {
                scope.fail(&err.to_string());
                Err(err)
            }
        }
    }

    fn run(&self) -> CursorResult<ExecutionResult> {
        let fetcher = Fetcher::new(self.source);

        let mut filter = self.query.clone();
        if let Some(search) = &self.search {
            filter = filter.and(search.to_query()?);
        }
        let home = self.home_model(&filter);
        let home = home.as_deref();

        // Only joins split the filter by model; otherwise it is matched as written
        let joined = match home {
            Some(home) if !self.joins.is_empty() => {
                Some((home, partition(&filter, &self.sort, home)))
            }
            None if !self.joins.is_empty() => {
                log_event_with_fields(
                    Event::JoinSkipped,
                    &[("joins", self.joins.len().to_string().as_str())],
                );
                None
            }
            _ => None,
        };
        let home_query = match &joined {
            Some((home, parts)) => parts.query_for(home),
            None => filter,
        };
        let (scope, narrowing) = self.split_scope(&home_query);

        let mut rows = match &self.tree {
            Some(options) => {
                let sorter = RowSorter::resolve(&self.sort, RowLayout::Plain, home);
                let assembly = TreeAssembly {
                    id_field: self.tree_id(options),
                    parent_field: self.tree_parent(options),
                    sorter: &sorter,
                    options,
                };
                assembly.run(&fetcher, &scope, &narrowing)?
            }
            None => fetcher.fetch(&scope.and(narrowing))?,
        };

        let mut layout = RowLayout::Plain;
        if let Some((home, parts)) = &joined {
            let home = *home;
            rows = rows.into_iter().map(|r| r.prefixed(home)).collect();
            for join in &self.joins {
                rows = apply_join(&fetcher, rows, join, home, parts)?;
            }
            rows = apply_unjoined_constraints(rows, &self.joins, home, parts);
            layout = RowLayout::Joined;

            if let Some(options) = &self.tree {
                let sorter = RowSorter::resolve(&self.sort, RowLayout::Joined, Some(home));
                let id_field = FieldKey::qualified(home, self.tree_id(options)).qualified_name();
                let parent_field =
                    FieldKey::qualified(home, self.tree_parent(options)).qualified_name();
                rows = sort_list_as_tree(rows, &id_field, &parent_field, &sorter, None)?;
            }
        }

        let mut rollup = None;
        if let Some(attribute) = &self.group_by {
            let spec = self.aggregate_spec()?.unwrap_or_default();
            if self.rollup {
                rollup = Some(aggregate::rollup(&rows, attribute, &spec));
            }
            rows = aggregate::group_by(&rows, attribute, &spec);
            layout = RowLayout::Grouped;
        } else if let Some(spec) = self.aggregate_spec()? {
            let row = aggregate::aggregate(&rows, &spec);
            return Ok(Self::finish(&fetcher, vec![row]));
        }

        if self.tree.is_none() {
            RowSorter::resolve(&self.sort, layout, home).sort(&mut rows);
        }

        let mut rows: Vec<Row> = rows
            .into_iter()
            .skip(self.skip)
            .take(self.limit.unwrap_or(usize::MAX))
            .collect();
        rows.extend(rollup);

        if let Some(spec) = &self.projection {
            let projection = Projection::from_json(spec)?;
            rows = rows.into_iter().map(|r| projection.apply(r)).collect();
        }

        Ok(Self::finish(&fetcher, rows))
    }

    fn finish(fetcher: &Fetcher<'_, S>, rows: Vec<Row>) -> ExecutionResult {
        ExecutionResult {
            rows,
            source_requests: fetcher.requests(),
            candidates_scanned: fetcher.scanned(),
        }
    }

    /// The cursor's model, or the model a top-level `_model` equality names
    fn home_model(&self, filter: &Query) -> Option<String> {
        if let Some(model) = &self.model {
            return Some(model.clone());
        }
        filter.conjuncts().iter().find_map(|part| match part {
            Query::Field {
                key,
                condition: Condition::Eq(Value::String(name)),
            } if key.is_model_field() => Some(name.clone()),
            _ => None,
        })
    }

    /// Split the home query into model scope (`_model` equality) and the
    /// narrowing rest
    fn split_scope(&self, home_query: &Query) -> (Query, Query) {
        let mut scope = match &self.model {
            Some(model) => Query::model(model),
            None => Query::all(),
        };
        let mut narrowing = Query::all();

        for part in home_query.conjuncts() {
            let is_scope = matches!(
                part,
                Query::Field { key, condition: Condition::Eq(_) } if key.is_model_field()
            );
            if is_scope {
                scope = scope.and(part.clone());
            } else {
                narrowing = narrowing.and(part.clone());
            }
        }
        (scope, narrowing)
    }

    fn aggregate_spec(&self) -> CursorResult<Option<AggregateSpec>> {
        match &self.aggregates {
            None => Ok(None),
            Some(Aggregates::Spec(spec)) => Ok(Some(spec.clone())),
            Some(Aggregates::Json(value)) => AggregateSpec::from_json(value).map(Some),
        }
    }

    fn tree_id<'o>(&'o self, options: &'o TreeOptions) -> &'o str {
        options.tree_id.as_deref().unwrap_or(&self.tree_id_field)
    }

    fn tree_parent<'o>(&'o self, options: &'o TreeOptions) -> &'o str {
        options
            .tree_parent_id
            .as_deref()
            .unwrap_or(&self.tree_parent_field)
    }
}
