//! In-memory datastore
//!
//! Documents live in insertion order behind one `RwLock`, alongside the
//! index manager. Every read hands out clones, so cursor stages can attach
//! metadata and rename fields without touching stored documents.
//!
//! A rejected write (unique conflict, invalid document) leaves documents
//! and indexes exactly as they were.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde_json::Value;
use uuid::Uuid;

use super::config::{IndexOptions, StoreConfig};
use super::errors::{StoreError, StoreResult};
use super::model_scope::ModelScope;
use super::CandidateSource;
use crate::cursor::{Cursor, META_FIELD};
use crate::index::{DocSeq, IndexManager};
use crate::observability::{
    log_event, log_event_with_fields, Event, Logger, MetricsRegistry, MetricsSnapshot,
};
use crate::query::{matches, Query};
use crate::value::{set_dot_value, Document, ID_FIELD};

#[derive(Debug, Default)]
struct State {
    docs: BTreeMap<DocSeq, Document>,
    next_seq: DocSeq,
    indexes: IndexManager,
}

impl State {
    /// Sequence numbers that may match, from the first indexable conjunct
    fn candidate_seqs(&self, query: &Query) -> Option<Vec<DocSeq>> {
        query.conjuncts().iter().find_map(|part| match part {
            Query::Field { key, condition } => {
                self.indexes.lookup(&key.qualified_name(), condition)
            }
            _ => None,
        })
    }

    /// Candidate documents and whether an index answered the request
    fn candidates(&self, query: &Query) -> (Vec<(DocSeq, &Document)>, bool) {
        match self.candidate_seqs(query) {
            Some(seqs) => {
                let docs = seqs
                    .into_iter()
                    .filter_map(|seq| self.docs.get(&seq).map(|d| (seq, d)))
                    .collect();
                (docs, true)
            }
            None => (self.docs.iter().map(|(s, d)| (*s, d)).collect(), false),
        }
    }

    fn matching(&self, query: &Query) -> Vec<(DocSeq, &Document)> {
        let (candidates, _) = self.candidates(query);
        candidates
            .into_iter()
            .filter(|(_, doc)| matches(doc, query))
            .collect()
    }

    /// Add a prepared document, or leave state untouched on conflict
    fn add(&mut self, doc: Document) -> StoreResult<()> {
        self.indexes.check(&doc, None)?;
        let seq = self.next_seq;
        self.next_seq += 1;
        self.indexes.insert(seq, &doc);
        self.docs.insert(seq, doc);
        Ok(())
    }

    fn delete(&mut self, seq: DocSeq) -> Option<Document> {
        let doc = self.docs.remove(&seq)?;
        self.indexes.remove(seq, &doc);
        Some(doc)
    }

    /// Swap the document at `seq`, returning the previous version
    fn replace(&mut self, seq: DocSeq, doc: Document) -> StoreResult<Document> {
        self.indexes.check(&doc, Some(seq))?;
        let old = self
            .docs
            .remove(&seq)
            .ok_or_else(|| StoreError::InvalidDocument(format!("no document at {}", seq)))?;
        self.indexes.remove(seq, &old);
        self.indexes.insert(seq, &doc);
        self.docs.insert(seq, doc);
        Ok(old)
    }
}

/// Embedded in-memory document store
#[derive(Debug)]
pub struct Datastore {
    state: RwLock<State>,
    metrics: MetricsRegistry,
    config: StoreConfig,
}

impl Default for Datastore {
    fn default() -> Self {
        Self::new()
    }
}

impl Datastore {
    /// Create an empty datastore with default configuration
    pub fn new() -> Self {
        log_event(Event::StoreOpened);
        Self {
            state: RwLock::new(State::default()),
            metrics: MetricsRegistry::new(),
            config: StoreConfig::default(),
        }
    }

    /// Create an empty datastore, applying the log level and ensuring the
    /// configured indexes
    pub fn with_config(config: StoreConfig) -> StoreResult<Self> {
        config.validate()?;
        Logger::set_min_severity(config.log_level);

        let store = Self {
            state: RwLock::new(State::default()),
            metrics: MetricsRegistry::new(),
            config,
        };
        for index in store.config.indexes.clone() {
            store.ensure_index(index)?;
        }

        log_event_with_fields(
            Event::StoreOpened,
            &[("indexes", store.config.indexes.len().to_string().as_str())],
        );
        Ok(store)
    }

    /// Load configuration from a JSON file and open a datastore with it
    pub fn open(config_path: &Path) -> StoreResult<Self> {
        let config = StoreConfig::load(config_path)?;
        log_event_with_fields(
            Event::ConfigLoaded,
            &[("path", config_path.display().to_string().as_str())],
        );
        Self::with_config(config)
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Snapshot of the operational counters
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, State>> {
        self.state.read().map_err(|_| StoreError::LockPoisoned)
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, State>> {
        self.state.write().map_err(|_| StoreError::LockPoisoned)
    }

    fn record_violation(&self, err: &StoreError) {
        if let StoreError::UniqueConstraintViolation { field, value } = err {
            self.metrics.increment_unique_violations();
            log_event_with_fields(
                Event::UniqueViolation,
                &[("field", field.as_str()), ("value", value.as_str())],
            );
        }
    }

    // ==================
    // Writes
    // ==================

    /// Insert one document, generating `_id` when absent.
    ///
    /// Returns the stored document.
    pub fn insert(&self, doc: Value) -> StoreResult<Document> {
        let mut inserted = self.insert_many(vec![doc])?;
        inserted
            .pop()
            .ok_or_else(|| StoreError::InvalidDocument("nothing inserted".to_string()))
    }

    /// Insert several documents; either all are stored or none
    pub fn insert_many(&self, docs: Vec<Value>) -> StoreResult<Vec<Document>> {
        let prepared = docs
            .into_iter()
            .map(prepare_document)
            .collect::<StoreResult<Vec<_>>>()?;

        let mut state = self.write()?;
        let first_seq = state.next_seq;

        for doc in &prepared {
            if let Err(err) = state.add(doc.clone()) {
                let added: Vec<DocSeq> = (first_seq..state.next_seq).collect();
                for seq in added {
                    state.delete(seq);
                }
                state.next_seq = first_seq;
                drop(state);
                self.record_violation(&err);
                return Err(err);
            }
        }

        self.metrics.add_inserts(prepared.len() as u64);
        Ok(prepared)
    }

    /// Apply a shallow field patch to matching documents.
    ///
    /// Patch keys may be dotted paths. `_id` can not be changed. Returns the
    /// number of documents modified.
    pub fn update(&self, query: &Query, patch: &Document, multi: bool) -> StoreResult<usize> {
        let mut state = self.write()?;

        let mut targets: Vec<(DocSeq, Document)> = state
            .matching(query)
            .into_iter()
            .map(|(seq, doc)| (seq, doc.clone()))
            .collect();
        if !multi {
            targets.truncate(1);
        }

        let mut applied: Vec<(DocSeq, Document)> = Vec::with_capacity(targets.len());
        for (seq, mut doc) in targets {
            let result = apply_patch(&mut doc, patch).and_then(|_| state.replace(seq, doc));
            match result {
                Ok(old) => applied.push((seq, old)),
                Err(err) => {
                    for (seq, old) in applied.into_iter().rev() {
                        // Restoring a previous version can not conflict
                        let _ = state.replace(seq, old);
                    }
                    drop(state);
                    self.record_violation(&err);
                    return Err(err);
                }
            }
        }

        self.metrics.add_updates(applied.len() as u64);
        Ok(applied.len())
    }

    /// Remove matching documents, returning how many were removed
    pub fn remove(&self, query: &Query, multi: bool) -> StoreResult<usize> {
        let mut state = self.write()?;

        let mut seqs: Vec<DocSeq> = state.matching(query).into_iter().map(|(s, _)| s).collect();
        if !multi {
            seqs.truncate(1);
        }
        for seq in &seqs {
            state.delete(*seq);
        }

        self.metrics.add_removes(seqs.len() as u64);
        Ok(seqs.len())
    }

    // ==================
    // Reads
    // ==================

    /// Number of matching documents
    pub fn count(&self, query: &Query) -> StoreResult<usize> {
        Ok(self.read()?.matching(query).len())
    }

    /// First matching document in insertion order
    pub fn find_one(&self, query: &Query) -> StoreResult<Option<Document>> {
        let state = self.read()?;
        let found = state
            .matching(query)
            .into_iter()
            .next()
            .map(|(_, doc)| doc.clone());
        Ok(found)
    }

    /// Cursor over matching documents
    pub fn find(&self, query: Query) -> Cursor<'_, Self> {
        Cursor::new(self, query)
            .with_tree_fields(&self.config.tree_id_field, &self.config.tree_parent_field)
    }

    /// Restrict exactly one following call to documents of a model
    pub fn model(&self, name: impl Into<String>) -> ModelScope<'_> {
        ModelScope::new(self, name.into())
    }

    // ==================
    // Indexes
    // ==================

    /// Build an index over the current documents.
    ///
    /// Ensuring an existing index is a no-op.
    pub fn ensure_index(&self, options: IndexOptions) -> StoreResult<()> {
        let mut guard = self.write()?;
        let state = &mut *guard;

        let created = state.indexes.ensure_index(
            &options.field_name,
            options.unique,
            state.docs.iter().map(|(seq, doc)| (*seq, doc)),
        )?;

        if created {
            log_event_with_fields(
                Event::IndexCreated,
                &[
                    ("field", options.field_name.as_str()),
                    ("unique", if options.unique { "true" } else { "false" }),
                ],
            );
        }
        Ok(())
    }

    /// Drop an index; returns false if there was none
    pub fn remove_index(&self, field_name: &str) -> StoreResult<bool> {
        let removed = self.write()?.indexes.remove_index(field_name);
        if removed {
            log_event_with_fields(Event::IndexRemoved, &[("field", field_name)]);
        }
        Ok(removed)
    }

    /// Indexed field paths, including `_id`
    pub fn indexed_fields(&self) -> StoreResult<Vec<String>> {
        Ok(self
            .read()?
            .indexes
            .indexed_fields()
            .map(str::to_string)
            .collect())
    }
}

impl CandidateSource for Datastore {
    fn get_candidates(&self, query: &Query) -> StoreResult<Vec<Document>> {
        let state = self.read()?;
        let (candidates, used_index) = state.candidates(query);
        let docs: Vec<Document> = candidates.into_iter().map(|(_, d)| d.clone()).collect();
        self.metrics
            .record_candidate_request(used_index, docs.len() as u64);
        Ok(docs)
    }
}

/// Validate a document for insertion and assign `_id` if needed
fn prepare_document(value: Value) -> StoreResult<Document> {
    let Value::Object(mut doc) = value else {
        return Err(StoreError::InvalidDocument(
            "documents must be JSON objects".to_string(),
        ));
    };
    doc.remove(META_FIELD);

    match doc.get(ID_FIELD) {
        None => {
            doc.insert(
                ID_FIELD.to_string(),
                Value::String(Uuid::new_v4().simple().to_string()),
            );
        }
        Some(Value::String(_) | Value::Number(_)) => {}
        Some(other) => {
            return Err(StoreError::InvalidDocument(format!(
                "_id must be a string or number, got {}",
                other
            )))
        }
    }
    Ok(doc)
}

fn apply_patch(doc: &mut Document, patch: &Document) -> StoreResult<()> {
    for (key, value) in patch {
        if key == META_FIELD {
            continue;
        }
        if key == ID_FIELD {
            if doc.get(ID_FIELD) != Some(value) {
                return Err(StoreError::InvalidDocument("_id can not be modified".to_string()));
            }
            continue;
        }
        set_dot_value(doc, key, value.clone());
    }
    Ok(())
}
