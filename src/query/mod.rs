//! Client-supplied filter and sort parameters.
//!
//! A request's query string is parsed into a [`QueryClause`] ([`parser`]),
//! checked against the resource's whitelist ([`validator`]), then compiled to
//! parameterised SQL ([`sql`]). Only whitelisted keys ever reach the compiler.

pub mod parser;
pub mod sql;
pub mod validator;

use std::collections::BTreeMap;

pub use parser::{parse_query, Paging, ParsedQuery};
pub use sql::{select_owned, DEFAULT_TASK_SORT, TASKS_TABLE};
pub use validator::{validate_query, Whitelist, TASK_WHITELIST};

/// Comparison applied by a single filter condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    Nin,
    Exists,
    NotExists,
}

impl Operator {
    /// Operator named by a JSON filter key such as `$gte`.
    pub fn from_json_key(key: &str) -> Option<Self> {
        match key {
            "$eq" => Some(Operator::Eq),
            "$ne" => Some(Operator::Ne),
            "$gt" => Some(Operator::Gt),
            "$gte" => Some(Operator::Gte),
            "$lt" => Some(Operator::Lt),
            "$lte" => Some(Operator::Lte),
            "$in" => Some(Operator::In),
            "$nin" => Some(Operator::Nin),
            "$exists" => Some(Operator::Exists),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    pub op: Operator,
    /// Raw operand(s); empty for `Exists` / `NotExists`.
    pub values: Vec<String>,
}

impl Condition {
    pub fn new(op: Operator, values: Vec<String>) -> Self {
        Self { op, values }
    }
}

/// What a filter key maps to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldFilter {
    /// All conditions must hold for the field.
    Conditions(Vec<Condition>),
    /// `$and`: every nested filter must match.
    All(Vec<FilterMap>),
    /// `$or`: at least one nested filter must match.
    Any(Vec<FilterMap>),
}

pub type FilterMap = BTreeMap<String, FieldFilter>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// Sort keys in precedence order. A key appears at most once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortClause(Vec<(String, SortDirection)>);

impl SortClause {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the direction for `key`, keeping its position if already present.
    pub fn set(&mut self, key: impl Into<String>, direction: SortDirection) {
        let key = key.into();
        match self.0.iter_mut().find(|(existing, _)| *existing == key) {
            Some(entry) => entry.1 = direction,
            None => self.0.push((key, direction)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(key, _)| key.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, SortDirection)> {
        self.0.iter().map(|(key, direction)| (key.as_str(), *direction))
    }

    /// Applies this clause on top of `defaults`: default keys keep their
    /// leading position, client directions win for shared keys, and client-only
    /// keys follow.
    pub fn over_defaults(&self, defaults: &[(&str, SortDirection)]) -> SortClause {
        let mut merged = SortClause::new();
        for (key, direction) in defaults {
            merged.set(*key, *direction);
        }
        for (key, direction) in self.iter() {
            merged.set(key, direction);
        }
        merged
    }
}

/// Proposed filter and sort keys, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryClause {
    pub filter: FilterMap,
    pub sort: SortClause,
}
