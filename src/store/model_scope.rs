//! Model selector
//!
//! `db.model("User")` scopes exactly one following call to the `User`
//! partition of the collection. Every method consumes the scope, so the
//! selection can not leak into a later call.

use serde_json::Value;

use super::datastore::Datastore;
use super::errors::StoreResult;
use crate::cursor::Cursor;
use crate::query::Query;
use crate::value::{Document, MODEL_FIELD};

/// A one-shot model selection on a datastore
#[derive(Debug, Clone)]
pub struct ModelScope<'a> {
    db: &'a Datastore,
    model: String,
}

impl<'a> ModelScope<'a> {
    pub(crate) fn new(db: &'a Datastore, model: String) -> Self {
        Self { db, model }
    }

    /// Selected model name
    pub fn name(&self) -> &str {
        &self.model
    }

    fn tag(&self, mut doc: Value) -> Value {
        if let Value::Object(map) = &mut doc {
            map.insert(MODEL_FIELD.to_string(), Value::String(self.model.clone()));
        }
        doc
    }

    fn scoped(&self, query: &Query) -> Query {
        Query::model(&self.model).and(query.clone())
    }

    /// Insert a document tagged with the model
    pub fn insert(self, doc: Value) -> StoreResult<Document> {
        let doc = self.tag(doc);
        self.db.insert(doc)
    }

    /// Insert several documents tagged with the model
    pub fn insert_many(self, docs: Vec<Value>) -> StoreResult<Vec<Document>> {
        let docs = docs.into_iter().map(|d| self.tag(d)).collect();
        self.db.insert_many(docs)
    }

    /// Cursor with the model as its home model
    pub fn find(self, query: Query) -> Cursor<'a, Datastore> {
        self.db.find(query).model(self.model)
    }

    /// First matching document of the model
    pub fn find_one(self, query: &Query) -> StoreResult<Option<Document>> {
        self.db.find_one(&self.scoped(query))
    }

    /// Number of matching documents of the model
    pub fn count(self, query: &Query) -> StoreResult<usize> {
        self.db.count(&self.scoped(query))
    }

    /// Patch matching documents of the model; the patch can not move a
    /// document to another model
    pub fn update(self, query: &Query, patch: &Document, multi: bool) -> StoreResult<usize> {
        let mut patch = patch.clone();
        patch.remove(MODEL_FIELD);
        self.db.update(&self.scoped(query), &patch, multi)
    }

    /// Remove matching documents of the model
    pub fn remove(self, query: &Query, multi: bool) -> StoreResult<usize> {
        self.db.remove(&self.scoped(query), multi)
    }
}
