//! Document matching
//!
//! Exact predicate evaluation, run after the candidate source has narrowed
//! the document set. Keys are looked up by their qualified name, so a row
//! carrying `"User:name"` is matched by a `User:name` condition.

use std::cmp::Ordering;

use serde_json::Value;

use super::ast::{Condition, Query};
use crate::value::{as_date, compare_values, get_dot_value, values_equal, Document};

/// Returns true if the document satisfies the query
pub fn matches(doc: &Document, query: &Query) -> bool {
    match query {
        Query::Field { key, condition } => {
            let value = get_dot_value(doc, &key.qualified_name());
            matches_condition(value.as_deref(), condition)
        }
        Query::And(children) => children.iter().all(|q| matches(doc, q)),
        Query::Or(children) => children.iter().any(|q| matches(doc, q)),
        Query::Not(child) => !matches(doc, child),
        Query::Where(predicate) => predicate.call(doc),
    }
}

fn matches_condition(actual: Option<&Value>, condition: &Condition) -> bool {
    match condition {
        Condition::Exists(expected) => actual.is_some() == *expected,
        Condition::Ne(expected) => !any_equal(actual, expected),
        Condition::Nin(values) => !values.iter().any(|v| any_equal(actual, v)),
        Condition::Eq(expected) => any_equal(actual, expected),
        Condition::In(values) => values.iter().any(|v| any_equal(actual, v)),
        Condition::Regex(re) => any_element(actual, |v| v.as_str().is_some_and(|s| re.is_match(s))),
        Condition::Gt(bound) => ordered(actual, bound, |o| o == Ordering::Greater),
        Condition::Gte(bound) => ordered(actual, bound, |o| o != Ordering::Less),
        Condition::Lt(bound) => ordered(actual, bound, |o| o == Ordering::Less),
        Condition::Lte(bound) => ordered(actual, bound, |o| o != Ordering::Greater),
    }
}

/// Equality where an array field matches if the whole array or any of its
/// elements is equal to the expected value
fn any_equal(actual: Option<&Value>, expected: &Value) -> bool {
    let Some(actual) = actual else {
        return false;
    };
    if values_equal(actual, expected) {
        return true;
    }
    match actual {
        Value::Array(items) => items.iter().any(|item| values_equal(item, expected)),
        _ => false,
    }
}

fn any_element(actual: Option<&Value>, test: impl Fn(&Value) -> bool) -> bool {
    match actual {
        None => false,
        Some(Value::Array(items)) => items.iter().any(&test),
        Some(value) => test(value),
    }
}

/// Ordering operators only compare numbers with numbers, strings with
/// strings and dates with dates
fn ordered(actual: Option<&Value>, bound: &Value, accept: impl Fn(Ordering) -> bool) -> bool {
    any_element(actual, |value| {
        comparable(value, bound) && accept(compare_values(Some(value), Some(bound)))
    })
}

fn comparable(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(_), Value::Number(_)) => true,
        (Value::String(_), Value::String(_)) => true,
        _ => as_date(a).is_some() && as_date(b).is_some(),
    }
}
