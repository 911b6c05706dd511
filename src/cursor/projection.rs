//! Field projection
//!
//! `{"name": 1, "address.city": 1}` keeps the listed fields (and `_id`
//! unless `"_id": 0`); `{"secret": 0}` drops them. Modes can not be mixed,
//! except that `_id` may always be excluded. Row metadata always survives.

use serde_json::{Map, Value};

use super::errors::{CursorError, CursorResult};
use super::row::Row;
use crate::value::{get_dot_value, remove_dot_value, set_dot_value, Document, ID_FIELD};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Include,
    Exclude,
}

/// A validated projection
#[derive(Debug, Clone)]
pub(crate) struct Projection {
    mode: Mode,
    fields: Vec<String>,
    keep_id: bool,
}

impl Projection {
    pub(crate) fn from_json(spec: &Value) -> CursorResult<Self> {
        let Value::Object(map) = spec else {
            return Err(CursorError::projection(format!(
                "expected an object, got {}",
                spec
            )));
        };

        let mut mode = None;
        let mut fields = Vec::new();
        let mut keep_id = true;

        for (field, flag) in map {
            let include = flag_value(field, flag)?;
            if field == ID_FIELD {
                keep_id = include;
                continue;
            }
            let field_mode = if include { Mode::Include } else { Mode::Exclude };
            match mode {
                Some(m) if m != field_mode => {
                    return Err(CursorError::projection(
                        "can not mix inclusion and exclusion",
                    ));
                }
                _ => mode = Some(field_mode),
            }
            fields.push(field.clone());
        }

        // {"_id": 1} alone keeps only the id; {"_id": 0} alone drops it
        let mode = mode.unwrap_or(if keep_id { Mode::Include } else { Mode::Exclude });
        Ok(Self {
            mode,
            fields,
            keep_id,
        })
    }

    pub(crate) fn apply(&self, row: Row) -> Row {
        let Row { fields, meta } = row;
        let fields = match self.mode {
            Mode::Include => self.include(&fields),
            Mode::Exclude => self.exclude(fields),
        };
        Row { fields, meta }
    }

    fn include(&self, source: &Document) -> Document {
        let mut out = Map::new();
        if self.keep_id {
            if let Some(id) = source.get(ID_FIELD) {
                out.insert(ID_FIELD.to_string(), id.clone());
            }
        }
        for field in &self.fields {
            if let Some(value) = get_dot_value(source, field) {
                set_dot_value(&mut out, field, value.into_owned());
            }
        }
        out
    }

    fn exclude(&self, mut fields: Document) -> Document {
        for field in &self.fields {
            remove_dot_value(&mut fields, field);
        }
        if !self.keep_id {
            fields.remove(ID_FIELD);
        }
        fields
    }
}

fn flag_value(field: &str, flag: &Value) -> CursorResult<bool> {
    match flag {
        Value::Bool(b) => Ok(*b),
        Value::Number(n) if n.as_f64() == Some(1.0) => Ok(true),
        Value::Number(n) if n.as_f64() == Some(0.0) => Ok(false),
        other => Err(CursorError::projection(format!(
            "'{}' must be 0 or 1, got {}",
            field, other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        Row::new(value.as_object().cloned().unwrap())
    }

    fn project(spec: Value, value: Value) -> Value {
        Projection::from_json(&spec).unwrap().apply(row(value)).to_value()
    }

    #[test]
    fn test_include_keeps_id() {
        let out = project(
            json!({"name": 1, "address.city": 1}),
            json!({"_id": "a", "name": "Ann", "age": 3, "address": {"city": "Graz", "zip": "8010"}}),
        );
        assert_eq!(out, json!({"_id": "a", "name": "Ann", "address": {"city": "Graz"}}));
    }

    #[test]
    fn test_include_without_id() {
        let out = project(json!({"name": 1, "_id": 0}), json!({"_id": "a", "name": "Ann"}));
        assert_eq!(out, json!({"name": "Ann"}));
    }

    #[test]
    fn test_exclude() {
        let out = project(
            json!({"age": 0, "address.zip": false}),
            json!({"_id": "a", "age": 3, "address": {"city": "Graz", "zip": "8010"}}),
        );
        assert_eq!(out, json!({"_id": "a", "address": {"city": "Graz"}}));
    }

    #[test]
    fn test_meta_survives() {
        let mut r = row(json!({"_id": "a", "name": "Ann"}));
        r.meta.level = Some(2);
        let out = Projection::from_json(&json!({"name": 1})).unwrap().apply(r);
        assert_eq!(out.meta.level, Some(2));
    }

    #[test]
    fn test_malformed_specs() {
        assert!(matches!(
            Projection::from_json(&json!({"a": 1, "b": 0})),
            Err(CursorError::Projection(_))
        ));
        assert!(matches!(
            Projection::from_json(&json!({"a": "yes"})),
            Err(CursorError::Projection(_))
        ));
        assert!(matches!(
            Projection::from_json(&json!(["a"])),
            Err(CursorError::Projection(_))
        ));
    }
}
