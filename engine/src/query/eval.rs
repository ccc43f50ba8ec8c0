//! In-process query evaluation, shared by the local adapters.

use super::{Filter, Operator, Query, SortDirection};
use crate::Record;
use serde_json::Value;
use std::cmp::Ordering;

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Total order over JSON values.
///
/// null < bool < number < string < array < object. Numbers compare
/// numerically, strings lexically, arrays element-wise.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            match (x.as_i64(), y.as_i64()) {
                (Some(x), Some(y)) => x.cmp(&y),
                _ => {
                    let x = x.as_f64().unwrap_or(0.0);
                    let y = y.as_f64().unwrap_or(0.0);
                    x.partial_cmp(&y).unwrap_or(Ordering::Equal)
                }
            }
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => {
            for (l, r) in x.iter().zip(y.iter()) {
                match compare_values(l, r) {
                    Ordering::Equal => continue,
                    other => return other,
                }
            }
            x.len().cmp(&y.len())
        }
        (Value::Object(_), Value::Object(_)) => a.to_string().cmp(&b.to_string()),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    compare_values(a, b) == Ordering::Equal
}

fn operator_matches(op: &Operator, value: &Value) -> bool {
    match op {
        Operator::Ne(v) => !values_equal(value, v),
        Operator::In(vs) => vs.iter().any(|v| values_equal(value, v)),
        Operator::Nin(vs) => !vs.iter().any(|v| values_equal(value, v)),
        Operator::Lt(v) => compare_values(value, v) == Ordering::Less,
        Operator::Lte(v) => compare_values(value, v) != Ordering::Greater,
        Operator::Gt(v) => compare_values(value, v) == Ordering::Greater,
        Operator::Gte(v) => compare_values(value, v) != Ordering::Less,
        Operator::Unknown(..) => true,
    }
}

impl Filter {
    /// Test a single field value. A missing field is tested as `null`.
    pub fn matches(&self, value: Option<&Value>) -> bool {
        let value = value.unwrap_or(&Value::Null);
        match self {
            Filter::Equals(expected) => values_equal(value, expected),
            Filter::Operators(ops) => ops.iter().all(|op| operator_matches(op, value)),
        }
    }
}

impl Query {
    /// Whether a record passes every filter.
    pub fn matches(&self, record: &Record) -> bool {
        self.filters.iter().all(|(field, filter)| {
            if field == crate::ID_FIELD {
                filter.matches(Some(&Value::String(record.id.clone())))
            } else {
                filter.matches(record.field(field))
            }
        })
    }

    /// Run the query: filter, then sort, then skip, then limit, then select.
    ///
    /// Sorting is stable, so ties keep the order the records came in.
    pub fn apply<I>(&self, records: I) -> Vec<Record>
    where
        I: IntoIterator<Item = Record>,
    {
        let mut matched: Vec<Record> = records.into_iter().filter(|r| self.matches(r)).collect();

        if let Some(sort) = &self.sort {
            matched.sort_by(|a, b| {
                let ord = compare_values(
                    &a.get(&sort.field).unwrap_or(Value::Null),
                    &b.get(&sort.field).unwrap_or(Value::Null),
                );
                match sort.direction {
                    SortDirection::Ascending => ord,
                    SortDirection::Descending => ord.reverse(),
                }
            });
        }

        let skip = self.skip.unwrap_or(0);
        let limit = self.limit.unwrap_or(usize::MAX);
        let page = matched.into_iter().skip(skip).take(limit);

        match &self.select {
            Some(select) => page.map(|r| r.project(select)).collect(),
            None => page.collect(),
        }
    }
}
