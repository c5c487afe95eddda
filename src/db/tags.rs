use sqlx::SqliteConnection;
use tracing::{debug, info, instrument};

use crate::error::AppError;
use crate::models::Tag;

#[instrument(skip(conn))]
pub async fn find_tag_by_name(
    conn: &mut SqliteConnection,
    name: &str,
) -> Result<Option<Tag>, AppError> {
    let tag = sqlx::query_as::<_, Tag>("SELECT id, name FROM tags WHERE name = ?")
        .bind(name)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(tag)
}

/// Fails with a unique violation if the name already exists.
#[instrument(skip(conn))]
pub async fn create_tag(conn: &mut SqliteConnection, name: &str) -> Result<i64, AppError> {
    info!("Creating tag");
    let res = sqlx::query("INSERT INTO tags (name) VALUES (?)")
        .bind(name)
        .execute(&mut *conn)
        .await?;

    Ok(res.last_insert_rowid())
}

#[instrument(skip(conn))]
pub async fn find_or_create_tag(conn: &mut SqliteConnection, name: &str) -> Result<i64, AppError> {
    match find_tag_by_name(conn, name).await? {
        Some(tag) => {
            debug!(tag_id = tag.id, "Reusing existing tag");
            Ok(tag.id)
        }
        None => create_tag(conn, name).await,
    }
}

#[instrument(skip(conn))]
pub async fn link_tag(
    conn: &mut SqliteConnection,
    practice_detail_id: i64,
    tag_id: i64,
) -> Result<(), AppError> {
    sqlx::query(
        "INSERT OR IGNORE INTO practice_tag_association (practice_detail_id, tag_id)
         VALUES (?, ?)",
    )
    .bind(practice_detail_id)
    .bind(tag_id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

#[instrument(skip(conn))]
pub async fn unlink_all_tags(
    conn: &mut SqliteConnection,
    practice_detail_id: i64,
) -> Result<u64, AppError> {
    let res = sqlx::query("DELETE FROM practice_tag_association WHERE practice_detail_id = ?")
        .bind(practice_detail_id)
        .execute(&mut *conn)
        .await?;

    Ok(res.rows_affected())
}
