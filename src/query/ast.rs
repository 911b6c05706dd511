//! Query AST
//!
//! Field keys are parsed once into `FieldKey`, so model qualification
//! (`"User:name"`) never has to be re-split during partitioning or joins.

use std::fmt;
use std::sync::Arc;

use regex::Regex;
use serde_json::Value;

use super::errors::{QueryError, QueryResult};
use crate::value::{Document, MODEL_FIELD};

/// Separator between a model name and a field path
pub const MODEL_SEPARATOR: char = ':';

/// A possibly model-qualified field path
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldKey {
    /// Owning model, if qualified
    pub model: Option<String>,
    /// Dotted field path
    pub path: String,
}

impl FieldKey {
    /// Parse a raw key.
    ///
    /// `"Model:path"` is qualified only when the split yields exactly two
    /// non-empty parts; anything else is a bare path.
    pub fn parse(raw: &str) -> Self {
        let mut parts = raw.split(MODEL_SEPARATOR);
        if let (Some(model), Some(path), None) = (parts.next(), parts.next(), parts.next()) {
            if !model.is_empty() && !path.is_empty() {
                return Self::qualified(model, path);
            }
        }
        Self::bare(raw)
    }

    /// An unqualified key
    pub fn bare(path: impl Into<String>) -> Self {
        Self {
            model: None,
            path: path.into(),
        }
    }

    /// A key qualified with a model
    pub fn qualified(model: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            model: Some(model.into()),
            path: path.into(),
        }
    }

    /// Returns true if this key names a model
    pub fn is_qualified(&self) -> bool {
        self.model.is_some()
    }

    /// The key as it appears in a row: `Model:path` or `path`
    pub fn qualified_name(&self) -> String {
        match &self.model {
            Some(model) => format!("{}{}{}", model, MODEL_SEPARATOR, self.path),
            None => self.path.clone(),
        }
    }

    /// Returns true if this is the bare model discriminator
    pub fn is_model_field(&self) -> bool {
        self.model.is_none() && self.path == MODEL_FIELD
    }
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.qualified_name())
    }
}

impl From<&str> for FieldKey {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}

/// Comparison applied to one field
#[derive(Debug, Clone)]
pub enum Condition {
    /// Equal (arrays match if any element is equal)
    Eq(Value),
    /// Not equal (missing fields qualify)
    Ne(Value),
    /// Greater than
    Gt(Value),
    /// Greater than or equal
    Gte(Value),
    /// Less than
    Lt(Value),
    /// Less than or equal
    Lte(Value),
    /// Equal to any listed value
    In(Vec<Value>),
    /// Equal to none of the listed values
    Nin(Vec<Value>),
    /// Field presence
    Exists(bool),
    /// Pattern match on string values
    Regex(Regex),
}

impl Condition {
    /// Returns the operator name
    pub fn op_name(&self) -> &'static str {
        match self {
            Condition::Eq(_) => "$eq",
            Condition::Ne(_) => "$ne",
            Condition::Gt(_) => "$gt",
            Condition::Gte(_) => "$gte",
            Condition::Lt(_) => "$lt",
            Condition::Lte(_) => "$lte",
            Condition::In(_) => "$in",
            Condition::Nin(_) => "$nin",
            Condition::Exists(_) => "$exists",
            Condition::Regex(_) => "$regex",
        }
    }
}

/// Arbitrary predicate over a whole document
#[derive(Clone)]
pub struct WhereFn(Arc<dyn Fn(&Document) -> bool + Send + Sync>);

impl WhereFn {
    pub fn call(&self, doc: &Document) -> bool {
        (self.0)(doc)
    }
}

impl fmt::Debug for WhereFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("WhereFn(..)")
    }
}

/// A query predicate tree
#[derive(Debug, Clone)]
pub enum Query {
    /// Condition on one field
    Field { key: FieldKey, condition: Condition },
    /// All children match; an empty conjunction matches everything
    And(Vec<Query>),
    /// Any child matches
    Or(Vec<Query>),
    /// Child does not match
    Not(Box<Query>),
    /// Custom predicate
    Where(WhereFn),
}

impl Query {
    /// The query matching every document
    pub fn all() -> Self {
        Query::And(Vec::new())
    }

    /// Field condition
    pub fn field(key: impl Into<FieldKey>, condition: Condition) -> Self {
        Query::Field {
            key: key.into(),
            condition,
        }
    }

    /// Equality shorthand
    pub fn eq(key: impl Into<FieldKey>, value: impl Into<Value>) -> Self {
        Self::field(key, Condition::Eq(value.into()))
    }

    /// Custom predicate
    pub fn where_fn<F>(predicate: F) -> Self
    where
        F: Fn(&Document) -> bool + Send + Sync + 'static,
    {
        Query::Where(WhereFn(Arc::new(predicate)))
    }

    /// Restrict to documents tagged with a model
    pub fn model(name: &str) -> Self {
        Self::eq(FieldKey::bare(MODEL_FIELD), name)
    }

    /// Returns true if the query can not exclude any document
    pub fn is_trivial(&self) -> bool {
        match self {
            Query::And(children) => children.iter().all(Query::is_trivial),
            _ => false,
        }
    }

    /// Conjunction that flattens nested ANDs and drops trivial parts
    pub fn and(self, other: Query) -> Query {
        let mut children = Vec::new();
        for part in [self, other] {
            match part {
                Query::And(inner) => children.extend(inner.into_iter().filter(|q| !q.is_trivial())),
                q => children.push(q),
            }
        }
        if children.len() == 1 {
            return children.remove(0);
        }
        Query::And(children)
    }

    /// Top-level conjuncts of the query
    pub fn conjuncts(&self) -> &[Query] {
        match self {
            Query::And(children) => children,
            other => std::slice::from_ref(other),
        }
    }
}

impl Default for Query {
    fn default() -> Self {
        Self::all()
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

/// One sort criterion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    /// Field to sort by
    pub key: FieldKey,
    /// Sort direction
    pub direction: SortDirection,
}

/// Ordered list of sort criteria; earlier keys take precedence
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortSpec {
    pub keys: Vec<SortKey>,
}

impl SortSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn asc(mut self, key: impl Into<FieldKey>) -> Self {
        self.keys.push(SortKey {
            key: key.into(),
            direction: SortDirection::Asc,
        });
        self
    }

    pub fn desc(mut self, key: impl Into<FieldKey>) -> Self {
        self.keys.push(SortKey {
            key: key.into(),
            direction: SortDirection::Desc,
        });
        self
    }

    /// Parse `{"field": 1, "Model:other": -1}`
    pub fn from_json(value: &Value) -> QueryResult<Self> {
        let Value::Object(map) = value else {
            return Err(QueryError::operand("sort", "an object of field directions"));
        };

        let mut spec = Self::new();
        for (field, direction) in map {
            spec = match direction.as_f64() {
                Some(d) if d > 0.0 => spec.asc(field.as_str()),
                Some(d) if d < 0.0 => spec.desc(field.as_str()),
                _ => return Err(QueryError::operand("sort", "1 or -1 per field")),
            };
        }
        Ok(spec)
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
