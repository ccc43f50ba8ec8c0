//! Filter/sort/paginate queries against Readable fields.
//!
//! A [`Query`] holds per-field filters plus `limit`, `skip`, `sort` and
//! `select`. Evaluation order is fixed: filter, sort, skip, limit, select.
//! Operators this crate does not know are kept but always match.

mod eval;
mod wire;

pub use eval::compare_values;

use serde_json::Value;
use std::collections::BTreeMap;

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// Single-field sort.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    pub field: String,
    pub direction: SortDirection,
}

/// A comparison operator in a field filter.
#[derive(Debug, Clone, PartialEq)]
pub enum Operator {
    /// `$ne`
    Ne(Value),
    /// `$in`
    In(Vec<Value>),
    /// `$nin`
    Nin(Vec<Value>),
    /// `$lt`
    Lt(Value),
    /// `$lte`
    Lte(Value),
    /// `$gt`
    Gt(Value),
    /// `$gte`
    Gte(Value),
    /// Anything else. Always matches.
    Unknown(String, Value),
}

/// Filter on one field.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Plain equality
    Equals(Value),
    /// All operators must match
    Operators(Vec<Operator>),
}

/// A list query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filters: BTreeMap<String, Filter>,
    pub limit: Option<usize>,
    pub skip: Option<usize>,
    pub sort: Option<Sort>,
    pub select: Option<Vec<String>>,
}

impl Query {
    /// An empty query matching every record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Field equals value.
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters
            .insert(field.into(), Filter::Equals(value.into()));
        self
    }

    fn op(mut self, field: impl Into<String>, op: Operator) -> Self {
        let entry = self
            .filters
            .entry(field.into())
            .or_insert_with(|| Filter::Operators(Vec::new()));
        match entry {
            Filter::Operators(ops) => ops.push(op),
            Filter::Equals(_) => *entry = Filter::Operators(vec![op]),
        }
        self
    }

    pub fn ne(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.op(field, Operator::Ne(value.into()))
    }

    pub fn is_in(self, field: impl Into<String>, values: Vec<Value>) -> Self {
        self.op(field, Operator::In(values))
    }

    pub fn not_in(self, field: impl Into<String>, values: Vec<Value>) -> Self {
        self.op(field, Operator::Nin(values))
    }

    pub fn lt(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.op(field, Operator::Lt(value.into()))
    }

    pub fn lte(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.op(field, Operator::Lte(value.into()))
    }

    pub fn gt(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.op(field, Operator::Gt(value.into()))
    }

    pub fn gte(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.op(field, Operator::Gte(value.into()))
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn skip(mut self, skip: usize) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn sort_asc(mut self, field: impl Into<String>) -> Self {
        self.sort = Some(Sort {
            field: field.into(),
            direction: SortDirection::Ascending,
        });
        self
    }

    pub fn sort_desc(mut self, field: impl Into<String>) -> Self {
        self.sort = Some(Sort {
            field: field.into(),
            direction: SortDirection::Descending,
        });
        self
    }

    pub fn select<S: Into<String>>(mut self, fields: impl IntoIterator<Item = S>) -> Self {
        self.select = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// True when the query neither filters, pages, sorts nor projects.
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
            && self.limit.is_none()
            && self.skip.is_none()
            && self.sort.is_none()
            && self.select.is_none()
    }

    /// Overlay `self` on top of `defaults`: fields set here win.
    pub fn merged_over(self, defaults: &Query) -> Query {
        let mut filters = defaults.filters.clone();
        filters.extend(self.filters);
        Query {
            filters,
            limit: self.limit.or(defaults.limit),
            skip: self.skip.or(defaults.skip),
            sort: self.sort.or_else(|| defaults.sort.clone()),
            select: self.select.or_else(|| defaults.select.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builder_collects_operators_per_field() {
        let query = Query::new().gt("n", 1).lt("n", 5).eq("done", false);
        assert_eq!(
            query.filters.get("n"),
            Some(&Filter::Operators(vec![
                Operator::Gt(json!(1)),
                Operator::Lt(json!(5))
            ]))
        );
        assert_eq!(query.filters.get("done"), Some(&Filter::Equals(json!(false))));
    }

    #[test]
    fn merged_over_prefers_input() {
        let defaults = Query::new().eq("completed", false).limit(10).sort_asc("text");
        let input = Query::new().eq("completed", true).skip(2);
        let merged = input.merged_over(&defaults);

        assert_eq!(
            merged.filters.get("completed"),
            Some(&Filter::Equals(json!(true)))
        );
        assert_eq!(merged.limit, Some(10));
        assert_eq!(merged.skip, Some(2));
        assert_eq!(merged.sort.unwrap().field, "text");
    }

    #[test]
    fn empty_query() {
        assert!(Query::new().is_empty());
        assert!(!Query::new().limit(1).is_empty());
    }
}
