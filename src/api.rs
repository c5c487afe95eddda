use chrono::NaiveDate;
use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use rocket::{FromForm, Request, State};
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Sqlite};

use crate::db::{
    AnalysisFilter, TagCondition, count_tags_by_content, create_record, delete_record,
    get_record, get_records_by_month, list_details, update_record,
};
use crate::error::AppError;
use crate::models::{ContentTagCount, DetailAnalysis, NewRecord, Record};
use crate::validation::{
    ApiResult, AppErrorExt, JsonValidateExt, ToValidationResponse, ValidationResponse,
};

#[derive(Serialize, Deserialize, Debug)]
pub struct MessageResponse {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
}

impl MessageResponse {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
            id: None,
        }
    }
}

#[derive(FromForm, Debug)]
pub struct OwnerQuery {
    #[field(name = "userId")]
    user_id: String,
}

impl OwnerQuery {
    fn user_id(&self) -> Result<&str, AppError> {
        if self.user_id.trim().is_empty() {
            return Err(AppError::Validation("userId is required".to_string()));
        }
        Ok(&self.user_id)
    }
}

#[post("/records", data = "<record>")]
pub async fn api_create_record(
    record: Json<NewRecord>,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<MessageResponse>> {
    let record = record.validate_custom()?;

    let id = create_record(db, &record).await.validate_custom()?;

    Ok(Json(MessageResponse {
        message: "Record created successfully".to_string(),
        id: Some(id),
    }))
}

#[get("/records/<year>/<month>?<owner..>")]
pub async fn api_get_records_by_month(
    year: i32,
    month: u32,
    owner: OwnerQuery,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<Vec<Record>>> {
    let user_id = owner.user_id().validate_custom()?;

    let records = get_records_by_month(db, year, month, user_id)
        .await
        .validate_custom()?;

    Ok(Json(records))
}

#[get("/records/<record_id>?<owner..>")]
pub async fn api_get_record(
    record_id: i64,
    owner: OwnerQuery,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<Record>> {
    let user_id = owner.user_id().validate_custom()?;

    let record = get_record(db, record_id, user_id).await.validate_custom()?;

    Ok(Json(record))
}

#[delete("/records/<record_id>?<owner..>")]
pub async fn api_delete_record(
    record_id: i64,
    owner: OwnerQuery,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<MessageResponse>> {
    let user_id = owner.user_id().validate_custom()?;

    delete_record(db, record_id, user_id)
        .await
        .validate_custom()?;

    Ok(Json(MessageResponse::new("Record deleted successfully")))
}

#[put("/records/<record_id>", data = "<record>")]
pub async fn api_update_record(
    record_id: i64,
    record: Json<NewRecord>,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<MessageResponse>> {
    let record = record.validate_custom()?;

    update_record(db, record_id, &record)
        .await
        .validate_custom()?;

    Ok(Json(MessageResponse::new("Record updated successfully")))
}

/// Query string shared by both analysis endpoints. List parameters repeat:
/// `tag_names=a&tag_names=b`.
#[derive(FromForm, Debug, Default)]
pub struct AnalysisQuery {
    start_date: Option<String>,
    end_date: Option<String>,
    contents: Option<Vec<String>>,
    tag_names: Option<Vec<String>>,
    description: Option<String>,
    #[field(name = "userId")]
    user_id: Option<String>,
    condition: Option<String>,
}

impl AnalysisQuery {
    pub fn into_filter(self) -> Result<AnalysisFilter, AppError> {
        let condition = match self.condition.as_deref() {
            Some(raw) if !raw.trim().is_empty() => raw.parse::<TagCondition>()?,
            _ => TagCondition::default(),
        };

        Ok(AnalysisFilter {
            start_date: parse_query_date("start_date", self.start_date.as_deref())?,
            end_date: parse_query_date("end_date", self.end_date.as_deref())?,
            contents: non_empty_values(self.contents),
            tag_names: non_empty_values(self.tag_names),
            description: self.description,
            user_id: self.user_id,
            condition,
        })
    }
}

fn parse_query_date(field: &str, raw: Option<&str>) -> Result<Option<NaiveDate>, AppError> {
    match raw.map(str::trim).filter(|value| !value.is_empty()) {
        Some(value) => NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| {
                AppError::Validation(format!(
                    "{} must be a date formatted as YYYY-MM-DD, got '{}'",
                    field, value
                ))
            }),
        None => Ok(None),
    }
}

fn non_empty_values(values: Option<Vec<String>>) -> Vec<String> {
    values
        .unwrap_or_default()
        .into_iter()
        .filter(|value| !value.is_empty())
        .collect()
}

#[get("/analysis_tag?<query..>")]
pub async fn api_analysis_tag(
    query: AnalysisQuery,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<Vec<ContentTagCount>>> {
    let filter = query.into_filter().validate_custom()?;

    let counts = count_tags_by_content(db, &filter).await.validate_custom()?;

    Ok(Json(counts))
}

#[get("/analysis_detail?<query..>")]
pub async fn api_analysis_detail(
    query: AnalysisQuery,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<Vec<DetailAnalysis>>> {
    let filter = query.into_filter().validate_custom()?;

    let details = list_details(db, &filter).await.validate_custom()?;

    Ok(Json(details))
}

#[get("/health")]
pub fn health() -> &'static str {
    "OK"
}

#[catch(default)]
pub fn default_catcher(status: Status, _req: &Request) -> Custom<Json<ValidationResponse>> {
    status.to_validation_response()
}
