use sqlx::{Pool, QueryBuilder, Sqlite};
use tracing::{info, instrument};

use crate::db::filter::{AnalysisFilter, Predicate, TagCondition, push_where};
use crate::error::AppError;
use crate::models::{ContentTagCount, DbDetailAnalysis, DbTagCount, DetailAnalysis};

/// Counts detail/tag pairs grouped by detail content and tag name.
#[instrument(skip(pool))]
pub async fn count_tags_by_content(
    pool: &Pool<Sqlite>,
    filter: &AnalysisFilter,
) -> Result<Vec<ContentTagCount>, AppError> {
    info!("Counting tags by content");
    let mut query = QueryBuilder::<Sqlite>::new(
        "SELECT pd.content AS content, t.name AS tag_name, COUNT(*) AS count
         FROM practice_details pd
         JOIN records r ON r.id = pd.record_id
         JOIN practice_tag_association pta ON pta.practice_detail_id = pd.id
         JOIN tags t ON t.id = pta.tag_id",
    );
    push_where(&mut query, &filter.predicates());
    query.push(" GROUP BY pd.content, t.name ORDER BY pd.content, t.name");

    let rows = query.build_query_as::<DbTagCount>().fetch_all(pool).await?;

    Ok(fold_tag_counts(rows))
}

fn fold_tag_counts(rows: Vec<DbTagCount>) -> Vec<ContentTagCount> {
    let mut counts: Vec<ContentTagCount> = Vec::new();

    for row in rows {
        let content = row.content.unwrap_or_default();
        match counts.last_mut() {
            Some(entry) if entry.content == content => {
                *entry.tags.entry(row.tag_name).or_insert(0) += row.count;
            }
            _ => {
                let mut entry = ContentTagCount {
                    content,
                    tags: Default::default(),
                };
                entry.tags.insert(row.tag_name, row.count);
                counts.push(entry);
            }
        }
    }

    counts
}

/// Lists details with the full set of tags attached to each.
///
/// Requested tag names select which details qualify; they do not narrow the
/// returned tag list.
#[instrument(skip(pool))]
pub async fn list_details(
    pool: &Pool<Sqlite>,
    filter: &AnalysisFilter,
) -> Result<Vec<DetailAnalysis>, AppError> {
    info!("Listing details with aggregated tags");
    let mut query = QueryBuilder::<Sqlite>::new(
        "SELECT DISTINCT pd.id AS id, pd.content AS content, r.description AS description,
                r.date AS date, agg.tags AS tags
         FROM practice_details pd
         JOIN records r ON r.id = pd.record_id
         LEFT JOIN (
             SELECT ordered.detail_id AS detail_id, json_group_array(ordered.name) AS tags
             FROM (
                 SELECT pta.practice_detail_id AS detail_id, t.name AS name
                 FROM practice_tag_association pta
                 JOIN tags t ON t.id = pta.tag_id
                 ORDER BY pta.rowid
             ) ordered
             GROUP BY ordered.detail_id
         ) agg ON agg.detail_id = pd.id",
    );

    if !filter.tag_names.is_empty() {
        query.push(" JOIN (");
        push_qualifying_details(&mut query, &filter.tag_names, filter.condition);
        query.push(") qualifying ON qualifying.detail_id = pd.id");
    }

    push_where(&mut query, &filter.record_predicates());
    query.push(" ORDER BY r.date, pd.id");

    let rows = query
        .build_query_as::<DbDetailAnalysis>()
        .fetch_all(pool)
        .await?;

    Ok(rows.into_iter().map(DetailAnalysis::from).collect())
}

/// Selects the ids of details matching the requested tags.
///
/// `Or` keeps details with any of the tags. `And` groups by detail and requires a
/// positive indicator sum for every requested tag.
fn push_qualifying_details(
    query: &mut QueryBuilder<'_, Sqlite>,
    tag_names: &[String],
    condition: TagCondition,
) {
    query.push(
        "SELECT DISTINCT pta.practice_detail_id AS detail_id
         FROM practice_tag_association pta
         JOIN tags t ON t.id = pta.tag_id",
    );

    match condition {
        TagCondition::Or => {
            push_where(query, &[Predicate::TagNameIn(tag_names.to_vec())]);
        }
        TagCondition::And => {
            query.push(" GROUP BY pta.practice_detail_id HAVING ");
            for (i, name) in tag_names.iter().enumerate() {
                if i > 0 {
                    query.push(" AND ");
                }
                query
                    .push("SUM(CASE WHEN t.name = ")
                    .push_bind(name.clone())
                    .push(" THEN 1 ELSE 0 END) >= 1");
            }
        }
    }
}
