#[cfg(test)]
mod tests {
    use crate::db::{create_record, delete_record, get_record, get_records_by_month, update_record};
    use crate::error::AppError;
    use crate::models::PracticeTag;
    use crate::test::test_utils::{
        TestDbBuilder, create_standard_test_db, date, detail, new_record,
    };

    #[rocket::async_test]
    async fn test_create_then_get_returns_same_record() {
        let test_db = TestDbBuilder::new().build().await.unwrap();
        let input = new_record(
            "alice",
            "2024-03-05",
            "Morning run-through",
            vec![
                detail("Scales", &["warmup", "technique"]),
                detail("Sonata", &["repertoire"]),
            ],
        );

        let id = create_record(&test_db.pool, &input).await.unwrap();
        let record = get_record(&test_db.pool, id, "alice").await.unwrap();

        assert_eq!(record.id, id);
        assert_eq!(record.description, input.description);
        assert_eq!(record.date, input.date);
        assert_eq!(record.start_time, "18");
        assert_eq!(record.start_minute, "05");
        assert_eq!(record.end_time, "19");
        assert_eq!(record.end_minute, "30");
        assert_eq!(record.user_id, "alice");
        assert_eq!(record.practice_details, input.practice_details);
    }

    #[rocket::async_test]
    async fn test_tag_names_are_shared_across_details() {
        let test_db = TestDbBuilder::new()
            .record("alice", "2024-03-05", "Shared tags")
            .detail("Scales", &["X"])
            .detail("Arpeggios", &["X"])
            .build()
            .await
            .unwrap();

        assert_eq!(test_db.tag_count("X").await, 1);
        assert_eq!(test_db.links_for_tag("X").await, 2);
    }

    #[rocket::async_test]
    async fn test_repeated_tag_on_one_detail_links_once() {
        let test_db = TestDbBuilder::new()
            .record("alice", "2024-03-05", "Repeated tag")
            .detail("Scales", &["X", "X"])
            .build()
            .await
            .unwrap();

        assert_eq!(test_db.tag_count("X").await, 1);
        assert_eq!(test_db.links_for_tag("X").await, 1);
    }

    #[rocket::async_test]
    async fn test_detail_without_tags_round_trips() {
        let test_db = create_standard_test_db().await;
        let id = test_db.record_id("Sight reading");

        let record = get_record(&test_db.pool, id, "alice").await.unwrap();
        assert_eq!(record.practice_details.len(), 1);
        assert_eq!(record.practice_details[0].content, "Sight reading");
        assert!(record.practice_details[0].tags.is_empty());
    }

    #[rocket::async_test]
    async fn test_update_replaces_details_wholesale() {
        let test_db = create_standard_test_db().await;
        let id = test_db.record_id("Evening scales");

        let replacement = new_record(
            "alice",
            "2024-02-11",
            "Evening scales, revised",
            vec![detail("Chorale", &["ensemble"])],
        );
        update_record(&test_db.pool, id, &replacement).await.unwrap();

        let record = get_record(&test_db.pool, id, "alice").await.unwrap();
        assert_eq!(record.description, "Evening scales, revised");
        assert_eq!(record.date, date("2024-02-11"));
        assert_eq!(record.practice_details.len(), 1);
        assert_eq!(record.practice_details[0].content, "Chorale");
        assert_eq!(
            record.practice_details[0].tags,
            vec![PracticeTag::new("ensemble")]
        );

        // Tags survive even when nothing links to them any more.
        assert_eq!(test_db.tag_count("repertoire").await, 1);
        assert_eq!(test_db.links_for_tag("repertoire").await, 0);
    }

    #[rocket::async_test]
    async fn test_update_to_no_details_leaves_none() {
        let test_db = create_standard_test_db().await;
        let id = test_db.record_id("Leap day etudes");

        let replacement = new_record("alice", "2024-02-29", "Rest day", Vec::new());
        update_record(&test_db.pool, id, &replacement).await.unwrap();

        let record = get_record(&test_db.pool, id, "alice").await.unwrap();
        assert!(record.practice_details.is_empty());
    }

    #[rocket::async_test]
    async fn test_delete_leaves_no_orphans() {
        let test_db = create_standard_test_db().await;
        let id = test_db.record_id("Evening scales");
        let details_before = test_db.count("practice_details").await;
        let links_before = test_db.count("practice_tag_association").await;

        delete_record(&test_db.pool, id, "alice").await.unwrap();

        let result = get_record(&test_db.pool, id, "alice").await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
        assert_eq!(test_db.count("practice_details").await, details_before - 2);
        assert_eq!(
            test_db.count("practice_tag_association").await,
            links_before - 3
        );

        let orphans = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM practice_tag_association pta
             LEFT JOIN practice_details pd ON pd.id = pta.practice_detail_id
             WHERE pd.id IS NULL",
        )
        .fetch_one(&test_db.pool)
        .await
        .unwrap();
        assert_eq!(orphans, 0);

        assert_eq!(test_db.tag_count("repertoire").await, 1);
    }

    #[rocket::async_test]
    async fn test_other_user_cannot_touch_record() {
        let test_db = create_standard_test_db().await;
        let id = test_db.record_id("Evening scales");

        let result = get_record(&test_db.pool, id, "bob").await;
        assert!(matches!(result, Err(AppError::NotFound(_))));

        let replacement = new_record("bob", "2024-02-10", "Hijacked", Vec::new());
        let result = update_record(&test_db.pool, id, &replacement).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));

        let result = delete_record(&test_db.pool, id, "bob").await;
        assert!(matches!(result, Err(AppError::NotFound(_))));

        let record = get_record(&test_db.pool, id, "alice").await.unwrap();
        assert_eq!(record.description, "Evening scales");
        assert_eq!(record.practice_details.len(), 2);
    }

    #[rocket::async_test]
    async fn test_missing_record_is_not_found() {
        let test_db = create_standard_test_db().await;

        match get_record(&test_db.pool, 9999, "alice").await {
            Err(AppError::NotFound(msg)) => assert_eq!(msg, "Record with id 9999 not found"),
            other => panic!("expected NotFound, got {:?}", other),
        }
        let result = delete_record(&test_db.pool, 9999, "alice").await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[rocket::async_test]
    async fn test_month_listing_is_scoped_and_ordered() {
        let test_db = create_standard_test_db().await;

        let february = get_records_by_month(&test_db.pool, 2024, 2, "alice")
            .await
            .unwrap();
        let descriptions: Vec<_> = february.iter().map(|r| r.description.as_str()).collect();
        assert_eq!(descriptions, vec!["Evening scales", "Leap day etudes"]);
        assert_eq!(february[0].practice_details.len(), 2);
        assert_eq!(february[1].practice_details[0].content, "Etude");

        let bob = get_records_by_month(&test_db.pool, 2024, 2, "bob")
            .await
            .unwrap();
        assert_eq!(bob.len(), 1);
        assert_eq!(bob[0].user_id, "bob");
    }

    #[rocket::async_test]
    async fn test_month_boundaries_across_year_end() {
        let test_db = TestDbBuilder::new()
            .record("alice", "2024-11-30", "November")
            .record("alice", "2024-12-01", "First of December")
            .record("alice", "2024-12-31", "New Year's Eve")
            .record("alice", "2025-01-01", "New Year's Day")
            .build()
            .await
            .unwrap();

        let december = get_records_by_month(&test_db.pool, 2024, 12, "alice")
            .await
            .unwrap();
        let descriptions: Vec<_> = december.iter().map(|r| r.description.as_str()).collect();
        assert_eq!(descriptions, vec!["First of December", "New Year's Eve"]);

        let january = get_records_by_month(&test_db.pool, 2025, 1, "alice")
            .await
            .unwrap();
        assert_eq!(january.len(), 1);
        assert_eq!(january[0].description, "New Year's Day");
    }

    #[rocket::async_test]
    async fn test_empty_month_and_invalid_month() {
        let test_db = create_standard_test_db().await;

        let empty = get_records_by_month(&test_db.pool, 2023, 7, "alice")
            .await
            .unwrap();
        assert!(empty.is_empty());

        let result = get_records_by_month(&test_db.pool, 2024, 13, "alice").await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[rocket::async_test]
    async fn test_failed_create_writes_nothing() {
        let test_db = TestDbBuilder::new().build().await.unwrap();
        sqlx::query("DROP TABLE practice_tag_association")
            .execute(&test_db.pool)
            .await
            .unwrap();

        let input = new_record(
            "alice",
            "2024-03-05",
            "Doomed",
            vec![detail("Scales", &["warmup"])],
        );
        let result = create_record(&test_db.pool, &input).await;

        assert!(matches!(result, Err(AppError::Database(_))));
        assert_eq!(test_db.count("records").await, 0);
        assert_eq!(test_db.count("practice_details").await, 0);
        assert_eq!(test_db.count("tags").await, 0);
    }
}
