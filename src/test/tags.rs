#[cfg(test)]
mod tests {
    use crate::{
        db::{create_tag, find_or_create_tag, find_tag_by_name, link_tag, unlink_all_tags},
        error::AppError,
        test::test_utils::{TestDbBuilder, create_standard_test_db},
    };

    #[rocket::async_test]
    async fn test_find_or_create_reuses_existing_tag() {
        let test_db = TestDbBuilder::new()
            .build()
            .await
            .expect("Failed to build test database");
        let mut conn = test_db.pool.acquire().await.unwrap();

        let first = find_or_create_tag(&mut conn, "warmup").await.unwrap();
        let second = find_or_create_tag(&mut conn, "warmup").await.unwrap();
        let other = find_or_create_tag(&mut conn, "Warmup").await.unwrap();

        assert_eq!(first, second);
        // Names are case sensitive
        assert_ne!(first, other);

        let tag = find_tag_by_name(&mut conn, "warmup")
            .await
            .unwrap()
            .expect("tag should exist");
        assert_eq!(tag.id, first);
        assert_eq!(tag.name, "warmup");
    }

    #[rocket::async_test]
    async fn test_duplicate_tag_name_is_rejected() {
        let test_db = TestDbBuilder::new()
            .build()
            .await
            .expect("Failed to build test database");
        let mut conn = test_db.pool.acquire().await.unwrap();

        create_tag(&mut conn, "technique").await.unwrap();
        let err = create_tag(&mut conn, "technique").await.unwrap_err();

        assert!(matches!(err, AppError::Database(_)));
        assert!(err.is_unique_violation());
        drop(conn);

        assert_eq!(test_db.tag_count("technique").await, 1);
    }

    #[rocket::async_test]
    async fn test_find_missing_tag_returns_none() {
        let test_db = create_standard_test_db().await;
        let mut conn = test_db.pool.acquire().await.unwrap();

        let tag = find_tag_by_name(&mut conn, "does-not-exist").await.unwrap();
        assert!(tag.is_none());
    }

    #[rocket::async_test]
    async fn test_linking_twice_keeps_one_row() {
        let test_db = TestDbBuilder::new()
            .record("alice", "2024-03-05", "Linking")
            .detail("Scales", &[])
            .build()
            .await
            .expect("Failed to build test database");
        let mut conn = test_db.pool.acquire().await.unwrap();

        let detail_id = sqlx::query_scalar::<_, i64>("SELECT id FROM practice_details")
            .fetch_one(&mut *conn)
            .await
            .unwrap();
        let tag_id = create_tag(&mut conn, "warmup").await.unwrap();

        link_tag(&mut conn, detail_id, tag_id).await.unwrap();
        link_tag(&mut conn, detail_id, tag_id).await.unwrap();
        drop(conn);

        assert_eq!(test_db.links_for_tag("warmup").await, 1);
    }

    #[rocket::async_test]
    async fn test_unlink_all_tags_keeps_tags() {
        let test_db = TestDbBuilder::new()
            .record("alice", "2024-03-05", "Unlinking")
            .detail("Scales", &["warmup", "technique"])
            .build()
            .await
            .expect("Failed to build test database");
        let mut conn = test_db.pool.acquire().await.unwrap();

        let detail_id = sqlx::query_scalar::<_, i64>("SELECT id FROM practice_details")
            .fetch_one(&mut *conn)
            .await
            .unwrap();

        let removed = unlink_all_tags(&mut conn, detail_id).await.unwrap();
        assert_eq!(removed, 2);
        drop(conn);

        assert_eq!(test_db.count("practice_tag_association").await, 0);
        assert_eq!(test_db.count("tags").await, 2);
    }
}
