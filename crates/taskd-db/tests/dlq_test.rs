//! Integration tests for the dead-letter queue table.

use taskd_db::models::TaskStatus;
use taskd_db::pool;
use taskd_db::queries::{dlq, tasks};

use taskd_test_utils::{create_test_db, drop_test_db};

async fn make_failed_task(db: &sqlx::PgPool, kind: &str) -> taskd_db::models::Task {
    let task = tasks::create(db, kind, serde_json::json!({}), 0).await.unwrap();
    tasks::transition(
        db,
        task.id,
        TaskStatus::Pending,
        TaskStatus::Running,
        Some(chrono::Utc::now()),
        None,
        None,
        None,
        None,
    )
    .await
    .unwrap();
    tasks::transition(
        db,
        task.id,
        TaskStatus::Running,
        TaskStatus::Failed,
        None,
        Some(chrono::Utc::now()),
        None,
        Some("boom"),
        Some("TimeoutError"),
    )
    .await
    .unwrap();
    tasks::get(db, task.id).await.unwrap().unwrap()
}

#[tokio::test]
async fn add_list_and_remove_round_trip() {
    let (db, db_name) = create_test_db().await;
    pool::run_migrations(&db).await.unwrap();

    let task = make_failed_task(&db, "text_processing").await;
    let entry = dlq::add(&db, &task).await.unwrap();
    assert_eq!(entry.task_id, task.id);
    assert_eq!(entry.error_kind.as_deref(), Some("TimeoutError"));

    let all = dlq::list(&db, None).await.unwrap();
    assert_eq!(all.len(), 1);

    let filtered = dlq::list(&db, Some("ai_summarization")).await.unwrap();
    assert!(filtered.is_empty());

    assert!(dlq::remove(&db, task.id).await.unwrap());
    assert!(dlq::list(&db, None).await.unwrap().is_empty());
    assert!(!dlq::remove(&db, task.id).await.unwrap());

    db.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn purge_respects_age_and_kind_filter() {
    let (db, db_name) = create_test_db().await;
    pool::run_migrations(&db).await.unwrap();

    let task = make_failed_task(&db, "batch_processing").await;
    dlq::add(&db, &task).await.unwrap();

    // Not old enough to purge at a 24h cutoff.
    let purged = dlq::purge(&db, None, 24).await.unwrap();
    assert_eq!(purged, 0);

    // A cutoff of 0 hours purges anything already inserted.
    let purged = dlq::purge(&db, Some("batch_processing"), 0).await.unwrap();
    assert_eq!(purged, 1);
    assert!(dlq::get(&db, task.id).await.unwrap().is_none());

    db.close().await;
    drop_test_db(&db_name).await;
}
