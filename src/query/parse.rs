//! JSON query objects to typed queries
//!
//! ```text
//! {"name": "Alpha"}                       equality
//! {"age": {"$gt": 18, "$lte": 65}}       operator object (AND of operators)
//! {"$or": [{"a": 1}, {"b": 2}]}          logical combinators
//! {"Group:name": "Admins"}               model-qualified key
//! ```

use regex::RegexBuilder;
use serde_json::{Map, Value};

use super::ast::{Condition, FieldKey, Query};
use super::errors::{QueryError, QueryResult};
use crate::value::as_date;

impl Query {
    /// Parse a JSON query object
    pub fn from_json(value: &Value) -> QueryResult<Query> {
        match value {
            Value::Object(map) => parse_object(map),
            other => Err(QueryError::NotAnObject(type_name(other).to_string())),
        }
    }
}

fn parse_object(map: &Map<String, Value>) -> QueryResult<Query> {
    let mut parts = Vec::with_capacity(map.len());

    for (key, value) in map {
        let part = match key.as_str() {
            "$and" => Query::And(parse_query_list(key, value)?),
            "$or" => Query::Or(parse_query_list(key, value)?),
            "$not" => Query::Not(Box::new(Query::from_json(value)?)),
            "$where" => {
                return Err(QueryError::operand(
                    "$where",
                    "a closure built with Query::where_fn",
                ))
            }
            op if op.starts_with('$') => return Err(QueryError::UnknownOperator(op.to_string())),
            field => parse_field(FieldKey::parse(field), value)?,
        };
        parts.push(part);
    }

    if parts.len() == 1 {
        return Ok(parts.remove(0));
    }
    Ok(Query::And(parts))
}

fn parse_query_list(operator: &str, value: &Value) -> QueryResult<Vec<Query>> {
    let Value::Array(items) = value else {
        return Err(QueryError::operand(operator, "an array of query objects"));
    };
    items.iter().map(Query::from_json).collect()
}

fn is_operator_object(value: &Value) -> QueryResult<bool> {
    let Value::Object(map) = value else {
        return Ok(false);
    };
    if as_date(value).is_some() || map.is_empty() {
        return Ok(false);
    }

    let operators = map.keys().filter(|k| k.starts_with('$')).count();
    if operators == 0 {
        return Ok(false);
    }
    if operators != map.len() {
        return Err(QueryError::operand(
            "field condition",
            "either only operators or only plain fields",
        ));
    }
    Ok(true)
}

fn parse_field(key: FieldKey, value: &Value) -> QueryResult<Query> {
    if !is_operator_object(value)? {
        return Ok(Query::Field {
            key,
            condition: Condition::Eq(value.clone()),
        });
    }

    let Value::Object(ops) = value else {
        return Ok(Query::all());
    };

    let mut conditions = Vec::with_capacity(ops.len());
    for (op, operand) in ops {
        let condition = match op.as_str() {
            "$eq" => Condition::Eq(operand.clone()),
            "$ne" => Condition::Ne(operand.clone()),
            "$gt" => Condition::Gt(operand.clone()),
            "$gte" => Condition::Gte(operand.clone()),
            "$lt" => Condition::Lt(operand.clone()),
            "$lte" => Condition::Lte(operand.clone()),
            "$in" => Condition::In(expect_array(op, operand)?),
            "$nin" => Condition::Nin(expect_array(op, operand)?),
            "$exists" => Condition::Exists(truthy(operand)),
            "$regex" => {
                let flags = ops.get("$options").and_then(Value::as_str).unwrap_or("");
                Condition::Regex(build_regex(operand, flags)?)
            }
            "$options" => continue,
            other => return Err(QueryError::UnknownOperator(other.to_string())),
        };
        conditions.push(Query::Field {
            key: key.clone(),
            condition,
        });
    }

    if conditions.len() == 1 {
        return Ok(conditions.remove(0));
    }
    Ok(Query::And(conditions))
}

fn expect_array(operator: &str, value: &Value) -> QueryResult<Vec<Value>> {
    match value {
        Value::Array(items) => Ok(items.clone()),
        _ => Err(QueryError::operand(operator, "an array")),
    }
}

fn build_regex(pattern: &Value, flags: &str) -> QueryResult<regex::Regex> {
    let Some(pattern) = pattern.as_str() else {
        return Err(QueryError::operand("$regex", "a string pattern"));
    };
    RegexBuilder::new(pattern)
        .case_insensitive(flags.contains('i'))
        .multi_line(flags.contains('m'))
        .dot_matches_new_line(flags.contains('s'))
        .ignore_whitespace(flags.contains('x'))
        .build()
        .map_err(|e| QueryError::InvalidRegex {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plain_equality() {
        let q = Query::from_json(&json!({"name": "Alpha"})).unwrap();
        match q {
            Query::Field { key, condition: Condition::Eq(v) } => {
                assert_eq!(key, FieldKey::bare("name"));
                assert_eq!(v, json!("Alpha"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_empty_object_is_trivial() {
        assert!(Query::from_json(&json!({})).unwrap().is_trivial());
    }

    #[test]
    fn test_operator_object_becomes_conjunction() {
        let q = Query::from_json(&json!({"age": {"$gt": 18, "$lte": 65}})).unwrap();
        assert_eq!(q.conjuncts().len(), 2);
    }

    #[test]
    fn test_qualified_keys() {
        let q = Query::from_json(&json!({"Group:name": "Admins"})).unwrap();
        match q {
            Query::Field { key, .. } => assert_eq!(key, FieldKey::qualified("Group", "name")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_nested_logic() {
        let q = Query::from_json(&json!({
            "$or": [{"a": 1}, {"$and": [{"b": 2}, {"c": {"$in": [3, 4]}}]}]
        }))
        .unwrap();
        match q {
            Query::Or(children) => {
                assert_eq!(children.len(), 2);
                assert!(matches!(children[1], Query::And(_)));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_dates_are_values_not_operators() {
        let q = Query::from_json(&json!({"date": {"$$date": 0}})).unwrap();
        assert!(matches!(q, Query::Field { condition: Condition::Eq(_), .. }));
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            Query::from_json(&json!([1])),
            Err(QueryError::NotAnObject(_))
        ));
        assert!(matches!(
            Query::from_json(&json!({"$nor": []})),
            Err(QueryError::UnknownOperator(_))
        ));
        assert!(matches!(
            Query::from_json(&json!({"a": {"$in": 3}})),
            Err(QueryError::InvalidOperand { .. })
        ));
        assert!(matches!(
            Query::from_json(&json!({"a": {"$regex": "("}})),
            Err(QueryError::InvalidRegex { .. })
        ));
        assert!(matches!(
            Query::from_json(&json!({"a": {"$gt": 1, "b": 2}})),
            Err(QueryError::InvalidOperand { .. })
        ));
    }
}
