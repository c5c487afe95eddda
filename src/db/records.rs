use std::collections::HashMap;

use chrono::NaiveDate;
use sqlx::{Pool, QueryBuilder, Sqlite, SqliteConnection};
use tracing::{info, instrument};

use crate::db::{find_or_create_tag, link_tag, unlink_all_tags};
use crate::error::AppError;
use crate::models::{DbDetailTag, DbRecord, NewRecord, PracticeDetail, PracticeTag, Record};

const RECORD_COLUMNS: &str =
    "id, description, date, start_time, start_minute, end_time, end_minute, user_id";

/// Inclusive first and last day of a calendar month.
pub fn month_range(year: i32, month: u32) -> Result<(NaiveDate, NaiveDate), AppError> {
    if !(1..=12).contains(&month) {
        return Err(AppError::Validation(format!(
            "Month must be between 1 and 12, got {}",
            month
        )));
    }

    let start = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| AppError::Validation(format!("Year {} is out of range", year)))?;

    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };

    let end = NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first_of_next| first_of_next.pred_opt())
        .ok_or_else(|| AppError::Validation(format!("Year {} is out of range", year)))?;

    Ok((start, end))
}

#[instrument(skip(pool, record), fields(user_id = %record.user_id))]
pub async fn create_record(pool: &Pool<Sqlite>, record: &NewRecord) -> Result<i64, AppError> {
    info!("Creating record");
    let mut tx = pool.begin().await?;

    let res = sqlx::query(
        "INSERT INTO records
         (description, date, start_time, start_minute, end_time, end_minute, user_id)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&record.description)
    .bind(record.date)
    .bind(&record.start_time)
    .bind(&record.start_minute)
    .bind(&record.end_time)
    .bind(&record.end_minute)
    .bind(&record.user_id)
    .execute(&mut *tx)
    .await?;

    let record_id = res.last_insert_rowid();
    insert_details(&mut tx, record_id, &record.practice_details).await?;

    tx.commit().await?;
    Ok(record_id)
}

#[instrument(skip(pool))]
pub async fn get_records_by_month(
    pool: &Pool<Sqlite>,
    year: i32,
    month: u32,
    user_id: &str,
) -> Result<Vec<Record>, AppError> {
    info!("Getting records by month");
    let (start, end) = month_range(year, month)?;

    let rows = sqlx::query_as::<_, DbRecord>(&format!(
        "SELECT {} FROM records
         WHERE user_id = ? AND date >= ? AND date <= ?
         ORDER BY date, id",
        RECORD_COLUMNS
    ))
    .bind(user_id)
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await?;

    let record_ids: Vec<i64> = rows.iter().map(|row| row.id).collect();
    let mut details = get_details_for_records(pool, &record_ids).await?;

    Ok(rows
        .into_iter()
        .map(|row| {
            let practice_details = details.remove(&row.id).unwrap_or_default();
            Record::from_db(row, practice_details)
        })
        .collect())
}

#[instrument(skip(pool))]
pub async fn get_record(pool: &Pool<Sqlite>, id: i64, user_id: &str) -> Result<Record, AppError> {
    info!("Getting record by ID");
    let row = sqlx::query_as::<_, DbRecord>(&format!(
        "SELECT {} FROM records WHERE id = ? AND user_id = ?",
        RECORD_COLUMNS
    ))
    .bind(id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => {
            let mut details = get_details_for_records(pool, &[row.id]).await?;
            let practice_details = details.remove(&row.id).unwrap_or_default();
            Ok(Record::from_db(row, practice_details))
        }
        _ => Err(record_not_found(id)),
    }
}

#[instrument(skip(pool))]
pub async fn delete_record(pool: &Pool<Sqlite>, id: i64, user_id: &str) -> Result<(), AppError> {
    info!("Deleting record");
    let mut tx = pool.begin().await?;

    ensure_record_owned(&mut tx, id, user_id).await?;
    delete_details(&mut tx, id).await?;

    sqlx::query("DELETE FROM records WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}

#[instrument(skip(pool, record), fields(user_id = %record.user_id))]
pub async fn update_record(
    pool: &Pool<Sqlite>,
    id: i64,
    record: &NewRecord,
) -> Result<(), AppError> {
    info!("Updating record");
    let mut tx = pool.begin().await?;

    ensure_record_owned(&mut tx, id, &record.user_id).await?;

    sqlx::query(
        "UPDATE records
         SET description = ?, date = ?, start_time = ?, start_minute = ?,
             end_time = ?, end_minute = ?
         WHERE id = ?",
    )
    .bind(&record.description)
    .bind(record.date)
    .bind(&record.start_time)
    .bind(&record.start_minute)
    .bind(&record.end_time)
    .bind(&record.end_minute)
    .bind(id)
    .execute(&mut *tx)
    .await?;

    delete_details(&mut tx, id).await?;
    insert_details(&mut tx, id, &record.practice_details).await?;

    tx.commit().await?;
    Ok(())
}

fn record_not_found(id: i64) -> AppError {
    AppError::NotFound(format!("Record with id {} not found", id))
}

async fn ensure_record_owned(
    conn: &mut SqliteConnection,
    id: i64,
    user_id: &str,
) -> Result<(), AppError> {
    let exists = sqlx::query_scalar::<_, i64>("SELECT id FROM records WHERE id = ? AND user_id = ?")
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?;

    match exists {
        Some(_) => Ok(()),
        None => Err(record_not_found(id)),
    }
}

async fn insert_details(
    conn: &mut SqliteConnection,
    record_id: i64,
    details: &[PracticeDetail],
) -> Result<(), AppError> {
    for detail in details {
        let res = sqlx::query("INSERT INTO practice_details (record_id, content) VALUES (?, ?)")
            .bind(record_id)
            .bind(&detail.content)
            .execute(&mut *conn)
            .await?;
        let detail_id = res.last_insert_rowid();

        for tag in &detail.tags {
            let tag_id = find_or_create_tag(&mut *conn, &tag.name).await?;
            link_tag(&mut *conn, detail_id, tag_id).await?;
        }
    }

    Ok(())
}

/// Removes every detail of a record, unlinking its tags first. Tag rows are kept.
async fn delete_details(conn: &mut SqliteConnection, record_id: i64) -> Result<u64, AppError> {
    let detail_ids =
        sqlx::query_scalar::<_, i64>("SELECT id FROM practice_details WHERE record_id = ?")
            .bind(record_id)
            .fetch_all(&mut *conn)
            .await?;

    for detail_id in &detail_ids {
        unlink_all_tags(&mut *conn, *detail_id).await?;
    }

    let res = sqlx::query("DELETE FROM practice_details WHERE record_id = ?")
        .bind(record_id)
        .execute(&mut *conn)
        .await?;

    Ok(res.rows_affected())
}

async fn get_details_for_records(
    pool: &Pool<Sqlite>,
    record_ids: &[i64],
) -> Result<HashMap<i64, Vec<PracticeDetail>>, AppError> {
    if record_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let mut query = QueryBuilder::<Sqlite>::new(
        "SELECT pd.id AS detail_id, pd.record_id AS record_id, pd.content AS content,
                t.name AS tag_name
         FROM practice_details pd
         LEFT JOIN practice_tag_association pta ON pta.practice_detail_id = pd.id
         LEFT JOIN tags t ON t.id = pta.tag_id
         WHERE pd.record_id IN (",
    );
    let mut ids = query.separated(", ");
    for id in record_ids {
        ids.push_bind(*id);
    }
    ids.push_unseparated(") ORDER BY pd.id, pta.rowid");

    let rows = query.build_query_as::<DbDetailTag>().fetch_all(pool).await?;

    Ok(group_details(rows))
}

fn group_details(rows: Vec<DbDetailTag>) -> HashMap<i64, Vec<PracticeDetail>> {
    let mut grouped: HashMap<i64, Vec<PracticeDetail>> = HashMap::new();
    let mut current_detail = None;

    for row in rows {
        let details = grouped.entry(row.record_id).or_default();

        if current_detail != Some(row.detail_id) {
            details.push(PracticeDetail {
                content: row.content.unwrap_or_default(),
                tags: Vec::new(),
            });
            current_detail = Some(row.detail_id);
        }

        if let (Some(name), Some(detail)) = (row.tag_name, details.last_mut()) {
            detail.tags.push(PracticeTag::new(name));
        }
    }

    grouped
}
