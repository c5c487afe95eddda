use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Serialize, Deserialize, Validate, Debug, Clone, PartialEq, Eq)]
pub struct PracticeTag {
    #[validate(length(min = 1, message = "Tag name must not be empty"))]
    pub name: String,
}

impl PracticeTag {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// One activity in a session. Used both in request payloads and in responses.
#[derive(Serialize, Deserialize, Validate, Debug, Clone, PartialEq, Eq)]
pub struct PracticeDetail {
    pub content: String,
    #[validate(nested)]
    pub tags: Vec<PracticeTag>,
}

#[derive(Serialize, Deserialize, Validate, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct NewRecord {
    pub description: String,
    pub date: NaiveDate,
    pub start_time: String,
    pub start_minute: String,
    pub end_time: String,
    pub end_minute: String,
    #[validate(length(min = 1, message = "userId is required"))]
    pub user_id: String,
    #[validate(nested)]
    pub practice_details: Vec<PracticeDetail>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub id: i64,
    pub description: String,
    pub date: NaiveDate,
    pub start_time: String,
    pub start_minute: String,
    pub end_time: String,
    pub end_minute: String,
    pub user_id: String,
    pub practice_details: Vec<PracticeDetail>,
}

#[derive(sqlx::FromRow, Clone, Debug)]
pub struct DbRecord {
    pub id: i64,
    pub description: Option<String>,
    pub date: NaiveDate,
    pub start_time: Option<String>,
    pub start_minute: Option<String>,
    pub end_time: Option<String>,
    pub end_minute: Option<String>,
    pub user_id: Option<String>,
}

impl Record {
    pub fn from_db(record: DbRecord, practice_details: Vec<PracticeDetail>) -> Self {
        Self {
            id: record.id,
            description: record.description.unwrap_or_default(),
            date: record.date,
            start_time: record.start_time.unwrap_or_default(),
            start_minute: record.start_minute.unwrap_or_default(),
            end_time: record.end_time.unwrap_or_default(),
            end_minute: record.end_minute.unwrap_or_default(),
            user_id: record.user_id.unwrap_or_default(),
            practice_details,
        }
    }
}

#[derive(sqlx::FromRow, Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub id: i64,
    pub name: String,
}

/// Detail/tag pair as read back for a batch of records. Details without tags have no tag name.
#[derive(sqlx::FromRow, Debug)]
pub struct DbDetailTag {
    pub detail_id: i64,
    pub record_id: i64,
    pub content: Option<String>,
    pub tag_name: Option<String>,
}

/// Tag counts for one content value.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ContentTagCount {
    pub content: String,
    pub tags: BTreeMap<String, i64>,
}

#[derive(sqlx::FromRow, Debug)]
pub struct DbTagCount {
    pub content: Option<String>,
    pub tag_name: String,
    pub count: i64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DetailAnalysis {
    pub id: i64,
    pub content: String,
    pub description: String,
    pub date: String,
    pub tags: Vec<String>,
}

#[derive(sqlx::FromRow, Debug)]
pub struct DbDetailAnalysis {
    pub id: i64,
    pub content: Option<String>,
    pub description: Option<String>,
    pub date: NaiveDate,
    pub tags: Option<String>,
}

impl From<DbDetailAnalysis> for DetailAnalysis {
    fn from(row: DbDetailAnalysis) -> Self {
        let tags = match row.tags.as_deref() {
            Some(json) => serde_json::from_str::<Vec<Option<String>>>(json)
                .map(|names| names.into_iter().flatten().collect())
                .unwrap_or_else(|err| {
                    tracing::warn!(detail_id = row.id, error = %err, "Could not decode aggregated tags");
                    Vec::new()
                }),
            None => Vec::new(),
        };

        Self {
            id: row.id,
            content: row.content.unwrap_or_default(),
            description: row.description.unwrap_or_default(),
            date: row.date.format("%Y-%m-%d").to_string(),
            tags,
        }
    }
}
