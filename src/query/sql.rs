//! Compiles validated query clauses to parameterised Postgres.
//!
//! Every client value is bound, never interpolated. Column names come only from
//! the static [`Table`] declarations below.

use chrono::{DateTime, Utc};
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use super::parser::Paging;
use super::{Condition, FieldFilter, FilterMap, Operator, SortClause, SortDirection};
use crate::error::AppError;
use crate::models::task::TASK_COLUMNS;
use crate::models::CastFailure;
use crate::serializers::parse_date;

/// How a column's values are compared and cast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Uuid,
    Text,
    /// Text stored lower-case; operands are lower-cased before binding.
    Keyword,
    Timestamp,
    TextArray,
}

#[derive(Debug, Clone, Copy)]
pub struct Column {
    /// Client-facing key.
    pub key: &'static str,
    pub name: &'static str,
    pub kind: ColumnType,
}

#[derive(Debug)]
pub struct Table {
    pub name: &'static str,
    pub select: &'static str,
    pub owner_column: &'static str,
    pub columns: &'static [Column],
}

impl Table {
    fn column(&self, key: &str) -> Option<&Column> {
        self.columns.iter().find(|column| column.key == key)
    }
}

pub static TASKS_TABLE: Table = Table {
    name: "tasks",
    select: TASK_COLUMNS,
    owner_column: "user_id",
    columns: &[
        Column {
            key: "id",
            name: "id",
            kind: ColumnType::Uuid,
        },
        Column {
            key: "title",
            name: "title",
            kind: ColumnType::Text,
        },
        Column {
            key: "description",
            name: "description",
            kind: ColumnType::Text,
        },
        Column {
            key: "due",
            name: "due",
            kind: ColumnType::Timestamp,
        },
        Column {
            key: "categories",
            name: "categories",
            kind: ColumnType::TextArray,
        },
        Column {
            key: "status",
            name: "status",
            kind: ColumnType::Keyword,
        },
        Column {
            key: "createdAt",
            name: "created_at",
            kind: ColumnType::Timestamp,
        },
        Column {
            key: "updatedAt",
            name: "updated_at",
            kind: ColumnType::Timestamp,
        },
    ],
};

/// Order applied to task listings before any client sort keys.
pub const DEFAULT_TASK_SORT: &[(&str, SortDirection)] = &[
    ("due", SortDirection::Desc),
    ("createdAt", SortDirection::Desc),
];

/// A cast operand ready to bind.
#[derive(Debug, Clone, PartialEq)]
enum SqlValue {
    Uuid(Uuid),
    Text(String),
    Timestamp(DateTime<Utc>),
    UuidList(Vec<Uuid>),
    TextList(Vec<String>),
    TimestampList(Vec<DateTime<Utc>>),
}

impl SqlValue {
    fn cast(column: &Column, raw: &str) -> Result<SqlValue, CastFailure> {
        match column.kind {
            ColumnType::Uuid => Uuid::parse_str(raw.trim())
                .map(SqlValue::Uuid)
                .map_err(|_| CastFailure::new("UUID", raw, column.key)),
            ColumnType::Timestamp => parse_date(raw)
                .map(SqlValue::Timestamp)
                .ok_or_else(|| CastFailure::new("date", raw, column.key)),
            ColumnType::Keyword | ColumnType::TextArray => Ok(SqlValue::Text(raw.to_lowercase())),
            ColumnType::Text => Ok(SqlValue::Text(raw.to_string())),
        }
    }

    fn cast_list(column: &Column, raws: &[String]) -> Result<SqlValue, CastFailure> {
        let values = raws
            .iter()
            .map(|raw| SqlValue::cast(column, raw))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(match column.kind {
            ColumnType::Uuid => SqlValue::UuidList(
                values
                    .into_iter()
                    .filter_map(|value| match value {
                        SqlValue::Uuid(id) => Some(id),
                        _ => None,
                    })
                    .collect(),
            ),
            ColumnType::Timestamp => SqlValue::TimestampList(
                values
                    .into_iter()
                    .filter_map(|value| match value {
                        SqlValue::Timestamp(at) => Some(at),
                        _ => None,
                    })
                    .collect(),
            ),
            _ => SqlValue::TextList(
                values
                    .into_iter()
                    .filter_map(|value| match value {
                        SqlValue::Text(text) => Some(text),
                        _ => None,
                    })
                    .collect(),
            ),
        })
    }

    fn bind(self, builder: &mut QueryBuilder<'static, Postgres>) {
        match self {
            SqlValue::Uuid(value) => builder.push_bind(value),
            SqlValue::Text(value) => builder.push_bind(value),
            SqlValue::Timestamp(value) => builder.push_bind(value),
            SqlValue::UuidList(values) => builder.push_bind(values),
            SqlValue::TextList(values) => builder.push_bind(values),
            SqlValue::TimestampList(values) => builder.push_bind(values),
        };
    }
}

/// Builds `SELECT ... WHERE <owner> AND <filter> ORDER BY ... LIMIT ... OFFSET ...`.
///
/// `filter` and `sort` must already have passed the whitelist; keys nested in
/// `$and`/`$or` are checked here against the table's columns.
pub fn select_owned(
    table: &Table,
    owner: Uuid,
    filter: &FilterMap,
    sort: &SortClause,
    paging: &Paging,
) -> Result<QueryBuilder<'static, Postgres>, AppError> {
    let mut builder = QueryBuilder::new(format!(
        "SELECT {} FROM {} WHERE {} = ",
        table.select, table.name, table.owner_column
    ));
    builder.push_bind(owner);

    if !filter.is_empty() {
        builder.push(" AND ");
        push_filter(&mut builder, table, filter)?;
    }

    push_order(&mut builder, table, sort)?;

    if let Some(limit) = paging.limit {
        builder.push(" LIMIT ");
        builder.push_bind(i64::try_from(limit).unwrap_or(i64::MAX));
    }
    if let Some(skip) = paging.skip {
        builder.push(" OFFSET ");
        builder.push_bind(i64::try_from(skip).unwrap_or(i64::MAX));
    }

    Ok(builder)
}

fn push_filter(
    builder: &mut QueryBuilder<'static, Postgres>,
    table: &Table,
    filter: &FilterMap,
) -> Result<(), AppError> {
    if filter.is_empty() {
        builder.push("TRUE");
        return Ok(());
    }

    builder.push("(");
    for (index, (key, field_filter)) in filter.iter().enumerate() {
        if index > 0 {
            builder.push(" AND ");
        }
        match field_filter {
            FieldFilter::All(filters) => push_group(builder, table, filters, " AND ", "TRUE")?,
            FieldFilter::Any(filters) => push_group(builder, table, filters, " OR ", "FALSE")?,
            FieldFilter::Conditions(conditions) => {
                let column = table.column(key).ok_or_else(|| {
                    AppError::invalid_query_key(key.clone(), format!("{} is not a valid filter.", key))
                })?;
                push_conditions(builder, column, conditions)?;
            }
        }
    }
    builder.push(")");

    Ok(())
}

/// An empty `$and` matches everything and an empty `$or` matches nothing.
fn push_group(
    builder: &mut QueryBuilder<'static, Postgres>,
    table: &Table,
    filters: &[FilterMap],
    separator: &str,
    empty: &str,
) -> Result<(), AppError> {
    if filters.is_empty() {
        builder.push(empty);
        return Ok(());
    }

    builder.push("(");
    for (index, filter) in filters.iter().enumerate() {
        if index > 0 {
            builder.push(separator);
        }
        push_filter(builder, table, filter)?;
    }
    builder.push(")");

    Ok(())
}

fn push_conditions(
    builder: &mut QueryBuilder<'static, Postgres>,
    column: &Column,
    conditions: &[Condition],
) -> Result<(), AppError> {
    builder.push("(");
    for (index, condition) in conditions.iter().enumerate() {
        if index > 0 {
            builder.push(" AND ");
        }
        if column.kind == ColumnType::TextArray {
            push_array_condition(builder, column, condition)?;
        } else {
            push_scalar_condition(builder, column, condition)?;
        }
    }
    builder.push(")");

    Ok(())
}

fn single_operand<'a>(column: &Column, condition: &'a Condition) -> Result<&'a str, AppError> {
    condition.values.first().map(String::as_str).ok_or_else(|| {
        AppError::invalid_query_key(column.key, format!("{} needs a value.", column.key))
    })
}

fn push_scalar_condition(
    builder: &mut QueryBuilder<'static, Postgres>,
    column: &Column,
    condition: &Condition,
) -> Result<(), AppError> {
    let name = column.name;
    let comparison = match condition.op {
        Operator::Exists => {
            builder.push(format!("{} IS NOT NULL", name));
            return Ok(());
        }
        Operator::NotExists => {
            builder.push(format!("{} IS NULL", name));
            return Ok(());
        }
        Operator::In => {
            builder.push(format!("{} = ANY(", name));
            SqlValue::cast_list(column, &condition.values)?.bind(builder);
            builder.push(")");
            return Ok(());
        }
        Operator::Nin => {
            builder.push(format!("NOT ({} = ANY(", name));
            SqlValue::cast_list(column, &condition.values)?.bind(builder);
            builder.push("))");
            return Ok(());
        }
        Operator::Eq => "=",
        Operator::Ne => "IS DISTINCT FROM",
        Operator::Gt => ">",
        Operator::Gte => ">=",
        Operator::Lt => "<",
        Operator::Lte => "<=",
    };

    let value = SqlValue::cast(column, single_operand(column, condition)?)?;
    builder.push(format!("{} {} ", name, comparison));
    value.bind(builder);

    Ok(())
}

fn push_array_condition(
    builder: &mut QueryBuilder<'static, Postgres>,
    column: &Column,
    condition: &Condition,
) -> Result<(), AppError> {
    let name = column.name;
    match condition.op {
        Operator::Exists => {
            builder.push(format!("cardinality({}) > 0", name));
        }
        Operator::NotExists => {
            builder.push(format!("cardinality({}) = 0", name));
        }
        Operator::Eq | Operator::Ne => {
            let value = SqlValue::cast(column, single_operand(column, condition)?)?;
            if condition.op == Operator::Ne {
                builder.push("NOT ");
            }
            value.bind(builder);
            builder.push(format!(" = ANY({})", name));
        }
        Operator::In | Operator::Nin => {
            if condition.op == Operator::Nin {
                builder.push("NOT ");
            }
            builder.push(format!("{} && ", name));
            SqlValue::cast_list(column, &condition.values)?.bind(builder);
        }
        Operator::Gt | Operator::Gte | Operator::Lt | Operator::Lte => {
            return Err(AppError::invalid_query_key(
                column.key,
                format!("{} does not support range comparisons.", column.key),
            ));
        }
    }

    Ok(())
}

fn push_order(
    builder: &mut QueryBuilder<'static, Postgres>,
    table: &Table,
    sort: &SortClause,
) -> Result<(), AppError> {
    for (index, (key, direction)) in sort.iter().enumerate() {
        let column = table.column(key).ok_or_else(|| {
            AppError::invalid_query_key(key, format!("{} is not a valid sort.", key))
        })?;
        builder.push(if index == 0 { " ORDER BY " } else { ", " });
        builder.push(format!("{} {}", column.name, direction.as_sql()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::parse_query;
    use pretty_assertions::assert_eq;

    fn compile(query: &str) -> Result<String, AppError> {
        let parsed = parse_query(query)?;
        let sort = parsed.clause.sort.over_defaults(DEFAULT_TASK_SORT);
        let builder = select_owned(
            &TASKS_TABLE,
            Uuid::nil(),
            &parsed.clause.filter,
            &sort,
            &parsed.paging,
        )?;
        Ok(builder.sql().to_string())
    }

    #[test]
    fn test_unfiltered_listing_is_owner_scoped_with_default_sort() {
        assert_eq!(
            compile("").unwrap(),
            format!(
                "SELECT {} FROM tasks WHERE user_id = $1 ORDER BY due DESC, created_at DESC",
                TASK_COLUMNS
            )
        );
    }

    #[test]
    fn test_filters_sort_and_paging() {
        let sql = compile("status=Done&due>=2024-01-01&sort=title,due&limit=5&skip=10").unwrap();
        assert_eq!(
            sql,
            format!(
                "SELECT {} FROM tasks WHERE user_id = $1 AND ((due >= $2) AND (status = $3)) \
                 ORDER BY due ASC, created_at DESC, title ASC LIMIT $4 OFFSET $5",
                TASK_COLUMNS
            )
        );
    }

    #[test]
    fn test_category_membership() {
        let sql = compile("categories=work&categories!=home,errands").unwrap();
        assert!(sql.contains("($2 = ANY(categories) AND NOT categories && $3)"));
    }

    #[test]
    fn test_boolean_groups() {
        let filter = r#"{"$or":[{"status":"done"},{"$and":[]}],"$and":[{"$or":[]}]}"#;
        let query = format!("filter={}", filter.replace('&', "%26"));
        let sql = compile(&query).unwrap();
        assert!(sql.contains("AND (((FALSE)) AND (((status = $2)) OR (TRUE)))"));
    }

    #[test]
    fn test_existence() {
        let sql = compile("description&!categories").unwrap();
        assert!(sql.contains("((cardinality(categories) = 0) AND (description IS NOT NULL))"));
    }

    #[test]
    fn test_uncastable_values_are_cast_errors() {
        match compile("id=not-a-uuid") {
            Err(AppError::Cast(failure)) => {
                assert_eq!(failure.kind, "UUID");
                assert_eq!(failure.path, "id");
                assert_eq!(failure.value, "not-a-uuid");
            }
            other => panic!("unexpected result: {:?}", other),
        }

        match compile("due<someday") {
            Err(AppError::Cast(failure)) => assert_eq!(failure.kind, "date"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_range_on_categories_is_rejected() {
        assert!(matches!(
            compile("categories>a"),
            Err(AppError::QueryValidation(_))
        ));
    }

    #[test]
    fn test_nested_unknown_key_is_rejected() {
        match compile(r#"filter={"$or":[{"owner":"x"}]}"#) {
            Err(AppError::QueryValidation(errors)) => {
                assert_eq!(errors["owner"], vec!["owner is not a valid filter."]);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
