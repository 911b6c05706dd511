//! Result rows and their transient metadata

use serde::Serialize;
use serde_json::{Map, Value};

use crate::query::MODEL_SEPARATOR;
use crate::value::{get_dot_value, Document};

/// Key under which metadata appears when a row is serialized
pub const META_FIELD: &str = "__meta";

/// Per-row metadata produced during execution; never stored
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RowMeta {
    /// Depth in an assembled tree, roots are 0
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<usize>,

    /// Number of direct children in the whole model
    #[serde(skip_serializing_if = "Option::is_none")]
    pub child_count: Option<usize>,

    /// Row holds the rollup over every input row
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub rollup_row: bool,

    /// In bottom-up trees: node matched the query itself rather than
    /// being pulled in as an ancestor
    #[serde(skip_serializing_if = "Option::is_none")]
    pub criteria_match: Option<bool>,
}

impl RowMeta {
    pub fn is_empty(&self) -> bool {
        self.level.is_none()
            && self.child_count.is_none()
            && !self.rollup_row
            && self.criteria_match.is_none()
    }

    fn to_value(&self) -> Value {
        let mut map = Map::new();
        if let Some(level) = self.level {
            map.insert("level".into(), level.into());
        }
        if let Some(count) = self.child_count {
            map.insert("child_count".into(), count.into());
        }
        if self.rollup_row {
            map.insert("rollup_row".into(), true.into());
        }
        if let Some(matched) = self.criteria_match {
            map.insert("criteria_match".into(), matched.into());
        }
        Value::Object(map)
    }
}

/// One output row of a cursor
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Row {
    #[serde(flatten)]
    pub fields: Document,

    #[serde(rename = "__meta", skip_serializing_if = "RowMeta::is_empty")]
    pub meta: RowMeta,
}

impl Row {
    pub fn new(fields: Document) -> Self {
        Self {
            fields,
            meta: RowMeta::default(),
        }
    }

    /// Top-level field by literal name, `"User:name"` included
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Field by dotted path
    pub fn get_path(&self, path: &str) -> Option<Value> {
        get_dot_value(&self.fields, path).map(|v| v.into_owned())
    }

    /// Rename every field to `Model:field`; metadata is kept as is
    pub(crate) fn prefixed(self, model: &str) -> Self {
        let fields = self
            .fields
            .into_iter()
            .map(|(k, v)| (format!("{}{}{}", model, MODEL_SEPARATOR, k), v))
            .collect();
        Self {
            fields,
            meta: self.meta,
        }
    }

    /// Fields plus a `__meta` object when metadata is present
    pub fn to_value(&self) -> Value {
        let mut map = self.fields.clone();
        if !self.meta.is_empty() {
            map.insert(META_FIELD.to_string(), self.meta.to_value());
        }
        Value::Object(map)
    }
}

impl From<Document> for Row {
    fn from(fields: Document) -> Self {
        Row::new(fields)
    }
}
