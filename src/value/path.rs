//! Dotted-path access into documents
//!
//! `"address.city"` walks nested objects. A numeric segment indexes into an
//! array; any other segment applied to an array is mapped over its
//! elements, so `"tags.name"` on `[{name: a}, {name: b}]` yields `[a, b]`.

use std::borrow::Cow;

use serde_json::{Map, Value};

use super::Document;

/// Read the value at a dotted path.
///
/// Borrowed when the path resolves to a stored value, owned when array
/// mapping had to build a new one.
pub fn get_dot_value<'a>(doc: &'a Document, path: &str) -> Option<Cow<'a, Value>> {
    let mut parts = path.split('.');
    let first = parts.next()?;
    let root = doc.get(first)?;
    let rest: Vec<&str> = parts.collect();
    resolve(root, &rest)
}

fn resolve<'a>(value: &'a Value, parts: &[&str]) -> Option<Cow<'a, Value>> {
    let Some((head, tail)) = parts.split_first() else {
        return Some(Cow::Borrowed(value));
    };

    match value {
        Value::Object(map) => resolve(map.get(*head)?, tail),
        Value::Array(items) => {
            if let Ok(index) = head.parse::<usize>() {
                return resolve(items.get(index)?, tail);
            }
            let mapped: Vec<Value> = items
                .iter()
                .filter_map(|item| resolve(item, parts).map(Cow::into_owned))
                .collect();
            Some(Cow::Owned(Value::Array(mapped)))
        }
        _ => None,
    }
}

/// Write a value at a dotted path, creating intermediate objects.
///
/// Intermediate non-object values are replaced.
pub fn set_dot_value(doc: &mut Document, path: &str, value: Value) {
    match path.split_once('.') {
        None => {
            doc.insert(path.to_string(), value);
        }
        Some((head, rest)) => {
            let slot = doc
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !slot.is_object() {
                *slot = Value::Object(Map::new());
            }
            if let Value::Object(inner) = slot {
                set_dot_value(inner, rest, value);
            }
        }
    }
}

/// Remove the value at a dotted path, returning it if present
pub fn remove_dot_value(doc: &mut Document, path: &str) -> Option<Value> {
    match path.split_once('.') {
        None => doc.remove(path),
        Some((head, rest)) => match doc.get_mut(head) {
            Some(Value::Object(inner)) => remove_dot_value(inner, rest),
            _ => None,
        },
    }
}
