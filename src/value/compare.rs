//! Value ordering and identity
//!
//! Ordering rules (ascending):
//! missing < null < number < string < bool < date < array < object
//!
//! Within a type the natural order applies: numbers numerically, strings
//! by code point, dates by instant, arrays element-wise then by length,
//! objects by sorted keys and then values.

use std::cmp::Ordering;

use serde_json::Value;

use super::date::{as_date, canonical_date};

fn type_rank(value: Option<&Value>) -> u8 {
    match value {
        None => 0,
        Some(Value::Null) => 1,
        Some(Value::Number(_)) => 2,
        Some(Value::String(_)) => 3,
        Some(Value::Bool(_)) => 4,
        Some(v @ Value::Object(_)) if as_date(v).is_some() => 5,
        Some(Value::Array(_)) => 6,
        Some(Value::Object(_)) => 7,
    }
}

/// Compare two possibly-missing values
pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let (rank_a, rank_b) = (type_rank(a), type_rank(b));
    if rank_a != rank_b {
        return rank_a.cmp(&rank_b);
    }

    let (Some(a), Some(b)) = (a, b) else {
        return Ordering::Equal;
    };

    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => {
            for (left, right) in x.iter().zip(y.iter()) {
                let ordering = compare_values(Some(left), Some(right));
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            x.len().cmp(&y.len())
        }
        (Value::Object(_), Value::Object(_)) => {
            if let (Some(x), Some(y)) = (as_date(a), as_date(b)) {
                return x.cmp(&y);
            }
            compare_objects(a, b)
        }
        _ => Ordering::Equal,
    }
}

fn compare_objects(a: &Value, b: &Value) -> Ordering {
    let (Some(x), Some(y)) = (a.as_object(), b.as_object()) else {
        return Ordering::Equal;
    };

    let mut keys_x: Vec<&String> = x.keys().collect();
    let mut keys_y: Vec<&String> = y.keys().collect();
    keys_x.sort();
    keys_y.sort();

    for (kx, ky) in keys_x.iter().zip(keys_y.iter()) {
        let ordering = kx
            .cmp(ky)
            .then_with(|| compare_values(x.get(*kx), y.get(*ky)));
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    keys_x.len().cmp(&keys_y.len())
}

/// Equality as the matcher understands it: `1 == 1.0`, dates by instant,
/// everything else structurally.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(_), Value::Number(_)) => {
            compare_values(Some(a), Some(b)) == Ordering::Equal
        }
        (Value::Object(_), Value::Object(_)) => match (as_date(a), as_date(b)) {
            (Some(x), Some(y)) => x == y,
            _ => a == b,
        },
        _ => a == b,
    }
}

/// Canonical identity string of a value.
///
/// Two values with the same canonical key belong to the same group, join
/// bucket or tree parent slot. Missing and null collapse to one key.
pub fn canonical_key(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => "null".to_string(),
        Some(Value::Bool(b)) => format!("b:{}", b),
        Some(Value::Number(n)) => match n.as_f64() {
            Some(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => format!("n:{}", f as i64),
            Some(f) => format!("n:{}", f),
            None => format!("n:{}", n),
        },
        Some(Value::String(s)) => format!("s:{}", s),
        Some(v) => match as_date(v) {
            Some(date) => format!("d:{}", canonical_date(&date)),
            None => format!("j:{}", v),
        },
    }
}
