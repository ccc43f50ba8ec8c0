//! JSON object and URL query-string forms of a [`Query`].
//!
//! Object form: `{ field: value | {"$ne": v, "$in": [..], ...}, "$limit": n,
//! "$skip": n, "$sort": {field: 1 | -1}, "$select": [field, ...] }`.
//!
//! Query-string form uses bracket notation (`text[$in][]=a`, `$sort[text]=1`).
//! Scalars are written as JSON text; strings are written raw unless the raw
//! text would itself parse as JSON, in which case they are quoted.

use super::{Filter, Operator, Query, Sort, SortDirection};
use crate::{error::Result, Error};
use serde_json::{Map, Value};

const LIMIT: &str = "$limit";
const SKIP: &str = "$skip";
const SORT: &str = "$sort";
const SELECT: &str = "$select";

fn invalid(msg: impl Into<String>) -> Error {
    Error::InvalidQuery(msg.into())
}

fn parse_count(key: &str, value: &Value) -> Result<usize> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .map(|n| n as usize)
            .ok_or_else(|| invalid(format!("{key} must be a non-negative integer"))),
        Value::String(s) => s
            .parse()
            .map_err(|_| invalid(format!("{key} must be a non-negative integer"))),
        _ => Err(invalid(format!("{key} must be a non-negative integer"))),
    }
}

fn parse_direction(value: &Value) -> Result<SortDirection> {
    match value {
        Value::Number(n) if n.as_i64() == Some(1) => Ok(SortDirection::Ascending),
        Value::Number(n) if n.as_i64() == Some(-1) => Ok(SortDirection::Descending),
        Value::String(s) => match s.as_str() {
            "1" | "asc" => Ok(SortDirection::Ascending),
            "-1" | "desc" => Ok(SortDirection::Descending),
            other => Err(invalid(format!("unknown sort direction: {other}"))),
        },
        other => Err(invalid(format!("unknown sort direction: {other}"))),
    }
}

fn as_list(value: Value) -> Vec<Value> {
    match value {
        Value::Array(values) => values,
        single => vec![single],
    }
}

fn is_operator_object(map: &Map<String, Value>) -> bool {
    !map.is_empty() && map.keys().all(|k| k.starts_with('$'))
}

fn parse_operator(name: &str, value: Value) -> Operator {
    match name {
        "$ne" => Operator::Ne(value),
        "$in" => Operator::In(as_list(value)),
        "$nin" => Operator::Nin(as_list(value)),
        "$lt" => Operator::Lt(value),
        "$lte" => Operator::Lte(value),
        "$gt" => Operator::Gt(value),
        "$gte" => Operator::Gte(value),
        other => Operator::Unknown(other.to_string(), value),
    }
}

impl Operator {
    fn wire_name(&self) -> &str {
        match self {
            Operator::Ne(_) => "$ne",
            Operator::In(_) => "$in",
            Operator::Nin(_) => "$nin",
            Operator::Lt(_) => "$lt",
            Operator::Lte(_) => "$lte",
            Operator::Gt(_) => "$gt",
            Operator::Gte(_) => "$gte",
            Operator::Unknown(name, _) => name,
        }
    }

    fn wire_value(&self) -> Value {
        match self {
            Operator::In(vs) | Operator::Nin(vs) => Value::Array(vs.clone()),
            Operator::Ne(v)
            | Operator::Lt(v)
            | Operator::Lte(v)
            | Operator::Gt(v)
            | Operator::Gte(v)
            | Operator::Unknown(_, v) => v.clone(),
        }
    }
}

impl Query {
    /// Parse the JSON object form.
    pub fn from_value(value: &Value) -> Result<Query> {
        let obj = match value {
            Value::Null => return Ok(Query::default()),
            Value::Object(obj) => obj,
            _ => return Err(invalid("query must be an object")),
        };

        let mut query = Query::default();
        for (key, value) in obj {
            match key.as_str() {
                LIMIT => query.limit = Some(parse_count(key, value)?),
                SKIP => query.skip = Some(parse_count(key, value)?),
                SORT => {
                    let sort = value
                        .as_object()
                        .ok_or_else(|| invalid("$sort must be an object"))?;
                    if let Some((field, direction)) = sort.iter().next() {
                        query.sort = Some(Sort {
                            field: field.clone(),
                            direction: parse_direction(direction)?,
                        });
                    }
                }
                SELECT => {
                    let fields = as_list(value.clone())
                        .into_iter()
                        .map(|v| match v {
                            Value::String(s) => Ok(s),
                            other => Err(invalid(format!("$select entry must be a string: {other}"))),
                        })
                        .collect::<Result<Vec<_>>>()?;
                    query.select = Some(fields);
                }
                k if k.starts_with('$') => {
                    tracing::debug!(key = %k, "ignoring unknown query parameter");
                }
                field => {
                    let filter = match value {
                        Value::Object(ops) if is_operator_object(ops) => Filter::Operators(
                            ops.iter()
                                .map(|(name, v)| parse_operator(name, v.clone()))
                                .collect(),
                        ),
                        other => Filter::Equals(other.clone()),
                    };
                    query.filters.insert(field.to_string(), filter);
                }
            }
        }
        Ok(query)
    }

    /// Render the JSON object form.
    pub fn to_value(&self) -> Value {
        let mut obj = Map::new();
        for (field, filter) in &self.filters {
            let value = match filter {
                Filter::Equals(v) => v.clone(),
                Filter::Operators(ops) => Value::Object(
                    ops.iter()
                        .map(|op| (op.wire_name().to_string(), op.wire_value()))
                        .collect(),
                ),
            };
            obj.insert(field.clone(), value);
        }
        if let Some(limit) = self.limit {
            obj.insert(LIMIT.into(), Value::from(limit as u64));
        }
        if let Some(skip) = self.skip {
            obj.insert(SKIP.into(), Value::from(skip as u64));
        }
        if let Some(sort) = &self.sort {
            let dir = match sort.direction {
                SortDirection::Ascending => 1,
                SortDirection::Descending => -1,
            };
            let mut s = Map::new();
            s.insert(sort.field.clone(), Value::from(dir));
            obj.insert(SORT.into(), Value::Object(s));
        }
        if let Some(select) = &self.select {
            obj.insert(
                SELECT.into(),
                Value::Array(select.iter().cloned().map(Value::String).collect()),
            );
        }
        Value::Object(obj)
    }

    /// Render the URL query-string form (without the leading `?`).
    pub fn to_query_string(&self) -> String {
        let mut pairs = Vec::new();
        flatten(String::new(), &self.to_value(), &mut pairs);
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for (key, value) in &pairs {
            serializer.append_pair(key, value);
        }
        serializer.finish()
    }

    /// Parse the URL query-string form.
    pub fn from_query_string(qs: &str) -> Result<Query> {
        let qs = qs.strip_prefix('?').unwrap_or(qs);
        let mut root = Value::Object(Map::new());
        for (key, raw) in url::form_urlencoded::parse(qs.as_bytes()) {
            let path = split_key(&key)?;
            insert_at(&mut root, &path, decode_scalar(&raw))?;
        }
        Query::from_value(&root)
    }
}

fn encode_scalar(value: &Value) -> String {
    match value {
        Value::String(s) if serde_json::from_str::<Value>(s).is_err() => s.clone(),
        other => other.to_string(),
    }
}

fn decode_scalar(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn flatten(prefix: String, value: &Value, out: &mut Vec<(String, String)>) {
    match value {
        Value::Object(obj) if !obj.is_empty() => {
            for (k, v) in obj {
                let key = if prefix.is_empty() {
                    k.clone()
                } else {
                    format!("{prefix}[{k}]")
                };
                flatten(key, v, out);
            }
        }
        // An empty array has no items to spell out, so it goes as JSON text.
        Value::Array(items) if items.is_empty() => out.push((prefix, "[]".to_string())),
        Value::Array(items) => {
            for item in items {
                out.push((format!("{prefix}[]"), encode_scalar(item)));
            }
        }
        scalar => out.push((prefix, encode_scalar(scalar))),
    }
}

fn split_key(key: &str) -> Result<Vec<String>> {
    let Some(open) = key.find('[') else {
        return Ok(vec![key.to_string()]);
    };
    let mut path = vec![key[..open].to_string()];
    let mut rest = &key[open..];
    while !rest.is_empty() {
        let inner = rest
            .strip_prefix('[')
            .and_then(|r| r.find(']').map(|close| (&r[..close], &r[close + 1..])))
            .ok_or_else(|| invalid(format!("malformed query key: {key}")))?;
        path.push(inner.0.to_string());
        rest = inner.1;
    }
    Ok(path)
}

fn insert_at(target: &mut Value, path: &[String], value: Value) -> Result<()> {
    let Some((head, tail)) = path.split_first() else {
        *target = value;
        return Ok(());
    };

    if head.is_empty() {
        if !tail.is_empty() {
            return Err(invalid("array segments must come last"));
        }
        if target.is_null() {
            *target = Value::Array(Vec::new());
        }
        return match target {
            Value::Array(items) => {
                items.push(value);
                Ok(())
            }
            _ => Err(invalid("conflicting query keys")),
        };
    }

    if target.is_null() {
        *target = Value::Object(Map::new());
    }
    match target {
        Value::Object(obj) => {
            let slot = obj.entry(head.clone()).or_insert(Value::Null);
            insert_at(slot, tail, value)
        }
        _ => Err(invalid("conflicting query keys")),
    }
}
