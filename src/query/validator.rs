use super::QueryClause;
use crate::error::{AppError, FieldMessages};

/// Filter and sort keys a resource accepts from clients.
#[derive(Debug, Clone, Copy)]
pub struct Whitelist {
    pub resource: &'static str,
    pub keys: &'static [&'static str],
}

impl Whitelist {
    pub fn allows(&self, key: &str) -> bool {
        self.keys.contains(&key)
    }
}

pub static TASK_WHITELIST: Whitelist = Whitelist {
    resource: "Tasks",
    keys: &[
        "id",
        "title",
        "due",
        "categories",
        "status",
        "createdAt",
        "updatedAt",
        "description",
        "$and",
        "$or",
    ],
};

/// Checks every filter and sort key name against `whitelist`.
///
/// All invalid keys are collected before failing. A key invalid in both
/// clauses keeps both messages, filter first.
pub fn validate_query(clause: &QueryClause, whitelist: &Whitelist) -> Result<(), AppError> {
    let mut errors = FieldMessages::new();

    for key in clause.filter.keys() {
        if !whitelist.allows(key) {
            errors
                .entry(key.clone())
                .or_default()
                .push(format!("{} is not a valid filter.", key));
        }
    }

    for key in clause.sort.keys() {
        if !whitelist.allows(key) {
            errors
                .entry(key.to_string())
                .or_default()
                .push(format!("{} is not a valid sort.", key));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        log::debug!(
            "{} query rejected: {:?}",
            whitelist.resource,
            errors.keys().collect::<Vec<_>>()
        );
        Err(AppError::query_validation(errors))
    }
}
