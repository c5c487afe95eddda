//! Typed filter predicates for the analysis queries.
//!
//! Predicates refer to the fixed aliases `r` (records), `pd` (practice_details)
//! and `t` (tags). Every user value is bound, never spliced into the SQL text.

use std::str::FromStr;

use chrono::NaiveDate;
use sqlx::{QueryBuilder, Sqlite};

use crate::error::AppError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    DateFrom(NaiveDate),
    DateTo(NaiveDate),
    ContentIn(Vec<String>),
    TagNameIn(Vec<String>),
    DescriptionContains(String),
    Owner(String),
}

impl Predicate {
    pub fn push_sql(&self, query: &mut QueryBuilder<'_, Sqlite>) {
        match self {
            Predicate::DateFrom(date) => {
                query.push("r.date >= ").push_bind(*date);
            }
            Predicate::DateTo(date) => {
                query.push("r.date <= ").push_bind(*date);
            }
            Predicate::ContentIn(contents) => push_in_list(query, "pd.content", contents),
            Predicate::TagNameIn(names) => push_in_list(query, "t.name", names),
            Predicate::DescriptionContains(needle) => {
                query
                    .push("r.description LIKE ")
                    .push_bind(format!("%{}%", escape_like(needle)))
                    .push(" ESCAPE '\\'");
            }
            Predicate::Owner(user_id) => {
                query.push("r.user_id = ").push_bind(user_id.clone());
            }
        }
    }
}

fn push_in_list(query: &mut QueryBuilder<'_, Sqlite>, column: &str, values: &[String]) {
    query.push(column).push(" IN (");
    let mut separated = query.separated(", ");
    for value in values {
        separated.push_bind(value.clone());
    }
    separated.push_unseparated(")");
}

fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Appends ` WHERE p1 AND p2 ...`, or nothing when there are no predicates.
pub fn push_where(query: &mut QueryBuilder<'_, Sqlite>, predicates: &[Predicate]) {
    for (i, predicate) in predicates.iter().enumerate() {
        query.push(if i == 0 { " WHERE " } else { " AND " });
        query.push("(");
        predicate.push_sql(query);
        query.push(")");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TagCondition {
    /// A detail must carry every requested tag.
    And,
    /// A detail must carry at least one requested tag.
    #[default]
    Or,
}

impl FromStr for TagCondition {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "and" => Ok(TagCondition::And),
            "or" => Ok(TagCondition::Or),
            other => Err(AppError::Validation(format!(
                "condition must be 'and' or 'or', got '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalysisFilter {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub contents: Vec<String>,
    pub tag_names: Vec<String>,
    pub description: Option<String>,
    pub user_id: Option<String>,
    pub condition: TagCondition,
}

impl AnalysisFilter {
    /// Predicates on records and details. Tag names are handled separately because the
    /// two analysis queries apply them differently.
    pub fn record_predicates(&self) -> Vec<Predicate> {
        let mut predicates = Vec::new();

        if let Some(start) = self.start_date {
            predicates.push(Predicate::DateFrom(start));
        }
        if let Some(end) = self.end_date {
            predicates.push(Predicate::DateTo(end));
        }
        if !self.contents.is_empty() {
            predicates.push(Predicate::ContentIn(self.contents.clone()));
        }
        if let Some(description) = self.description.as_deref().filter(|d| !d.is_empty()) {
            predicates.push(Predicate::DescriptionContains(description.to_string()));
        }
        if let Some(user_id) = self.user_id.as_deref().filter(|u| !u.is_empty()) {
            predicates.push(Predicate::Owner(user_id.to_string()));
        }

        predicates
    }

    pub fn tag_predicate(&self) -> Option<Predicate> {
        if self.tag_names.is_empty() {
            None
        } else {
            Some(Predicate::TagNameIn(self.tag_names.clone()))
        }
    }

    /// Every predicate, tag names included.
    pub fn predicates(&self) -> Vec<Predicate> {
        let mut predicates = self.record_predicates();
        predicates.extend(self.tag_predicate());
        predicates
    }
}
