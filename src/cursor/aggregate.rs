//! Group-by and aggregates
//!
//! Groups are keyed by canonical value identity and emitted in order of
//! first appearance. Aggregates always see the whole group: grouping runs
//! before any sort, skip or limit.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde_json::{Map, Value};

use super::errors::{CursorError, CursorResult};
use super::row::Row;
use crate::value::{
    canonical_key, get_dot_value, number_value, parse_float, set_dot_value,
};

/// Aggregate operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateOp {
    Sum,
    Avg,
    Min,
    Max,
    Count,
    Median,
}

impl AggregateOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            AggregateOp::Sum => "sum",
            AggregateOp::Avg => "avg",
            AggregateOp::Min => "min",
            AggregateOp::Max => "max",
            AggregateOp::Count => "count",
            AggregateOp::Median => "median",
        }
    }
}

impl FromStr for AggregateOp {
    type Err = CursorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sum" => Ok(AggregateOp::Sum),
            "avg" => Ok(AggregateOp::Avg),
            "min" => Ok(AggregateOp::Min),
            "max" => Ok(AggregateOp::Max),
            "count" => Ok(AggregateOp::Count),
            "median" => Ok(AggregateOp::Median),
            other => Err(CursorError::UnknownAggregateOperator(other.to_string())),
        }
    }
}

impl fmt::Display for AggregateOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One named aggregate output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateOutput {
    pub name: String,
    pub op: AggregateOp,
    pub field: String,
}

/// Named aggregate outputs, computed in declaration order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregateSpec {
    pub outputs: Vec<AggregateOutput>,
}

impl AggregateSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, op: AggregateOp, field: impl Into<String>) -> Self {
        self.outputs.push(AggregateOutput {
            name: name.into(),
            op,
            field: field.into(),
        });
        self
    }

    /// Parse `{"sumOf": ["sum", "number"], "n": ["count", "number"]}`
    pub fn from_json(value: &Value) -> CursorResult<Self> {
        let Value::Object(map) = value else {
            return Err(CursorError::InvalidAggregateSpec(format!(
                "expected an object, got {}",
                value
            )));
        };

        let mut spec = Self::new();
        for (name, entry) in map {
            let (op, field) = match entry.as_array().map(Vec::as_slice) {
                Some([Value::String(op), Value::String(field)]) => (op, field),
                _ => {
                    return Err(CursorError::InvalidAggregateSpec(format!(
                        "'{}' must be [operator, field], got {}",
                        name, entry
                    )))
                }
            };
            spec = spec.with(name.as_str(), op.parse()?, field.as_str());
        }
        Ok(spec)
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    fn compute_into(&self, out: &mut Map<String, Value>, rows: &[&Row]) {
        for output in &self.outputs {
            out.insert(output.name.clone(), compute(output.op, &output.field, rows));
        }
    }
}

fn compute(op: AggregateOp, field: &str, rows: &[&Row]) -> Value {
    let numbers = || {
        rows.iter()
            .map(|r| parse_float(get_dot_value(&r.fields, field).as_deref()))
    };

    match op {
        AggregateOp::Count => Value::from(rows.len()),
        AggregateOp::Sum => number_value(numbers().sum()),
        AggregateOp::Avg => {
            if rows.is_empty() {
                return Value::Null;
            }
            number_value(numbers().sum::<f64>() / rows.len() as f64)
        }
        AggregateOp::Min => extreme(numbers(), |v, acc| v < acc),
        AggregateOp::Max => extreme(numbers(), |v, acc| v > acc),
        AggregateOp::Median => {
            let mut values: Vec<f64> = numbers().filter(|v| !v.is_nan()).collect();
            if values.is_empty() {
                return Value::from(0);
            }
            values.sort_by(|a, b| a.total_cmp(b));
            let half = values.len() / 2;
            let median = if values.len() % 2 == 1 {
                values[half]
            } else {
                (values[half - 1] + values[half]) / 2.0
            };
            number_value(median)
        }
    }
}

fn extreme(values: impl Iterator<Item = f64>, better: impl Fn(f64, f64) -> bool) -> Value {
    let mut acc: Option<f64> = None;
    for v in values.filter(|v| !v.is_nan()) {
        acc = match acc {
            Some(current) if !better(v, current) => Some(current),
            _ => Some(v),
        };
    }
    acc.map(number_value).unwrap_or(Value::Null)
}

/// One row of aggregates over every input row
pub(crate) fn aggregate(rows: &[Row], spec: &AggregateSpec) -> Row {
    let all: Vec<&Row> = rows.iter().collect();
    let mut fields = Map::new();
    spec.compute_into(&mut fields, &all);
    Row::new(fields)
}

/// One row per distinct value of `attribute`
pub(crate) fn group_by(rows: &[Row], attribute: &str, spec: &AggregateSpec) -> Vec<Row> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<&Row>> = HashMap::new();
    for row in rows {
        let key = canonical_key(get_dot_value(&row.fields, attribute).as_deref());
        groups
            .entry(key.clone())
            .or_insert_with(|| {
                order.push(key);
                Vec::new()
            })
            .push(row);
    }

    order
        .iter()
        .filter_map(|key| groups.get(key))
        .map(|members| {
            let value = get_dot_value(&members[0].fields, attribute)
                .map(|v| v.into_owned())
                .unwrap_or(Value::Null);
            let mut fields = Map::new();
            set_dot_value(&mut fields, attribute, value);
            spec.compute_into(&mut fields, members);
            Row::new(fields)
        })
        .collect()
}

/// The rollup row: aggregates over every input row, grouping value null
pub(crate) fn rollup(rows: &[Row], attribute: &str, spec: &AggregateSpec) -> Row {
    let mut row = aggregate(rows, spec);
    let mut fields = Map::new();
    set_dot_value(&mut fields, attribute, Value::Null);
    fields.extend(row.fields);
    row.fields = fields;
    row.meta.rollup_row = true;
    row
}
