//! Query-string parsing.
//!
//! Plain terms are comparison expressions (`status=done`, `due>=2024-01-01`,
//! `categories=work,home`, `!description`). The reserved keys `filter`, `sort`,
//! `limit`, and `skip` carry a JSON filter document, sort keys, and paging.

use actix_web::web;
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Map, Value};

use super::{Condition, FieldFilter, FilterMap, Operator, QueryClause, SortDirection};
use crate::error::AppError;

lazy_static! {
    static ref TERM_REGEX: Regex =
        Regex::new(r"^(?P<not>!?)(?P<key>[^><!=]+)(?:(?P<op>>=|<=|!=|=|>|<)(?P<value>.*))?$")
            .unwrap();
}

const FILTER_KEY: &str = "filter";
const SORT_KEY: &str = "sort";
const LIMIT_KEY: &str = "limit";
const SKIP_KEY: &str = "skip";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Paging {
    pub limit: Option<u64>,
    pub skip: Option<u64>,
}

/// A parsed query string: the clause to validate plus paging.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedQuery {
    pub clause: QueryClause,
    pub paging: Paging,
}

/// Parses a raw (still percent-encoded) query string.
pub fn parse_query(query_string: &str) -> Result<ParsedQuery, AppError> {
    let mut parsed = ParsedQuery::default();

    for segment in query_string.split('&').filter(|segment| !segment.is_empty()) {
        let term = decode_term(segment)?;
        let captures = match TERM_REGEX.captures(&term) {
            Some(captures) => captures,
            None => {
                return Err(AppError::invalid_query_key(
                    term.clone(),
                    format!("{} is not a valid query term.", term),
                ))
            }
        };

        let negated = !captures["not"].is_empty();
        let key = captures["key"].trim().to_string();
        let op = captures.name("op").map(|op| op.as_str());
        let value = captures
            .name("value")
            .map(|value| value.as_str().trim().to_string());

        match (key.as_str(), op, value) {
            (FILTER_KEY, Some("="), Some(document)) if !negated => {
                merge_filter(&mut parsed.clause.filter, parse_filter_document(&document)?);
            }
            (SORT_KEY, Some("="), Some(keys)) if !negated => parse_sort(&mut parsed.clause, &keys),
            (LIMIT_KEY, Some("="), Some(limit)) if !negated => {
                parsed.paging.limit = Some(parse_count(LIMIT_KEY, &limit)?);
            }
            (SKIP_KEY, Some("="), Some(skip)) if !negated => {
                parsed.paging.skip = Some(parse_count(SKIP_KEY, &skip)?);
            }
            (_, None, _) => {
                let op = if negated {
                    Operator::NotExists
                } else {
                    Operator::Exists
                };
                push_condition(&mut parsed.clause.filter, key, Condition::new(op, Vec::new()));
            }
            (_, Some(op), Some(value)) if !negated => {
                let condition = comparison(op, value);
                push_condition(&mut parsed.clause.filter, key, condition);
            }
            _ => {
                return Err(AppError::invalid_query_key(
                    key,
                    format!("{} is not a valid query term.", term),
                ))
            }
        }
    }

    Ok(parsed)
}

/// Percent-decodes one `&`-separated segment as a whole, keeping any `=` in it.
fn decode_term(segment: &str) -> Result<String, AppError> {
    let escaped = segment.replace('=', "%3D");
    let pairs = web::Query::<Vec<(String, String)>>::from_query(&escaped).map_err(|_| {
        AppError::invalid_query_key(
            segment.to_string(),
            format!("{} is not a valid query term.", segment),
        )
    })?;

    Ok(pairs
        .into_inner()
        .into_iter()
        .next()
        .map(|(key, _)| key)
        .unwrap_or_default())
}

fn comparison(op: &str, value: String) -> Condition {
    let list = || value.split(',').map(|item| item.trim().to_string()).collect();
    match op {
        "=" if value.contains(',') => Condition::new(Operator::In, list()),
        "!=" if value.contains(',') => Condition::new(Operator::Nin, list()),
        "!=" => Condition::new(Operator::Ne, vec![value]),
        ">" => Condition::new(Operator::Gt, vec![value]),
        ">=" => Condition::new(Operator::Gte, vec![value]),
        "<" => Condition::new(Operator::Lt, vec![value]),
        "<=" => Condition::new(Operator::Lte, vec![value]),
        _ => Condition::new(Operator::Eq, vec![value]),
    }
}

fn parse_sort(clause: &mut QueryClause, keys: &str) {
    for key in keys.split(',').map(str::trim).filter(|key| !key.is_empty()) {
        match key.strip_prefix('-') {
            Some(key) => clause.sort.set(key.trim(), SortDirection::Desc),
            None => clause
                .sort
                .set(key.trim_start_matches('+').trim(), SortDirection::Asc),
        }
    }
}

fn parse_count(key: &str, value: &str) -> Result<u64, AppError> {
    value.parse::<u64>().map_err(|_| {
        AppError::invalid_query_key(key, format!("{} must be a non-negative integer.", key))
    })
}

fn push_condition(filter: &mut FilterMap, key: String, condition: Condition) {
    match filter.get_mut(&key) {
        Some(FieldFilter::Conditions(conditions)) => conditions.push(condition),
        _ => {
            filter.insert(key, FieldFilter::Conditions(vec![condition]));
        }
    }
}

fn merge_filter(filter: &mut FilterMap, document: FilterMap) {
    for (key, incoming) in document {
        match (filter.get_mut(&key), incoming) {
            (Some(FieldFilter::Conditions(existing)), FieldFilter::Conditions(more)) => {
                existing.extend(more)
            }
            (Some(FieldFilter::All(existing)), FieldFilter::All(more)) => existing.extend(more),
            (Some(FieldFilter::Any(existing)), FieldFilter::Any(more)) => existing.extend(more),
            (_, incoming) => {
                filter.insert(key, incoming);
            }
        }
    }
}

fn invalid_filter(message: impl Into<String>) -> AppError {
    AppError::invalid_query_key(FILTER_KEY, message)
}

/// Parses a `filter=` JSON document such as
/// `{"$or":[{"status":"done"},{"due":{"$lt":"2024-01-01"}}]}`.
pub fn parse_filter_document(document: &str) -> Result<FilterMap, AppError> {
    let value: Value = serde_json::from_str(document)
        .map_err(|_| invalid_filter("filter must be a valid JSON object."))?;

    match value {
        Value::Object(object) => filter_from_object(&object),
        _ => Err(invalid_filter("filter must be a valid JSON object.")),
    }
}

fn filter_from_object(object: &Map<String, Value>) -> Result<FilterMap, AppError> {
    let mut filter = FilterMap::new();

    for (key, value) in object {
        let field_filter = match key.as_str() {
            "$and" => FieldFilter::All(nested_filters(key, value)?),
            "$or" => FieldFilter::Any(nested_filters(key, value)?),
            _ => FieldFilter::Conditions(conditions_from_value(key, value)?),
        };
        filter.insert(key.clone(), field_filter);
    }

    Ok(filter)
}

fn nested_filters(key: &str, value: &Value) -> Result<Vec<FilterMap>, AppError> {
    let items = value
        .as_array()
        .ok_or_else(|| invalid_filter(format!("{} must be an array of filters.", key)))?;

    items
        .iter()
        .map(|item| match item {
            Value::Object(object) => filter_from_object(object),
            _ => Err(invalid_filter(format!("{} must be an array of filters.", key))),
        })
        .collect()
}

fn conditions_from_value(key: &str, value: &Value) -> Result<Vec<Condition>, AppError> {
    match value {
        Value::Null => Ok(vec![Condition::new(Operator::NotExists, Vec::new())]),
        Value::Array(items) => Ok(vec![Condition::new(Operator::In, scalars(key, items)?)]),
        Value::Object(operators) => operators
            .iter()
            .map(|(name, operand)| operator_condition(key, name, operand))
            .collect(),
        scalar => Ok(vec![Condition::new(Operator::Eq, vec![scalar_text(key, scalar)?])]),
    }
}

fn operator_condition(key: &str, name: &str, operand: &Value) -> Result<Condition, AppError> {
    let op = Operator::from_json_key(name)
        .ok_or_else(|| invalid_filter(format!("{} is not a valid operator for {}.", name, key)))?;

    match (op, operand) {
        (Operator::Exists, Value::Bool(true)) => Ok(Condition::new(Operator::Exists, Vec::new())),
        (Operator::Exists, Value::Bool(false)) => {
            Ok(Condition::new(Operator::NotExists, Vec::new()))
        }
        (Operator::Exists, _) => Err(invalid_filter(format!("$exists for {} must be a boolean.", key))),
        (Operator::In | Operator::Nin, Value::Array(items)) => {
            Ok(Condition::new(op, scalars(key, items)?))
        }
        (Operator::In | Operator::Nin, _) => {
            Err(invalid_filter(format!("{} for {} must be an array.", name, key)))
        }
        (_, operand) => Ok(Condition::new(op, vec![scalar_text(key, operand)?])),
    }
}

fn scalars(key: &str, items: &[Value]) -> Result<Vec<String>, AppError> {
    items.iter().map(|item| scalar_text(key, item)).collect()
}

fn scalar_text(key: &str, value: &Value) -> Result<String, AppError> {
    match value {
        Value::String(text) => Ok(text.clone()),
        Value::Number(_) | Value::Bool(_) => Ok(value.to_string()),
        _ => Err(invalid_filter(format!("{} must be compared with a plain value.", key))),
    }
}
