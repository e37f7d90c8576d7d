//! Lesson progress store against an in-memory database

mod helpers;

use helpers::*;
use lms_progress::{ErrorKind, LessonProgressStore};
use std::time::Duration;

#[tokio::test]
async fn test_complete_then_incomplete() {
    let pool = test_pool().await;
    let store = LessonProgressStore::new(pool, TIMEOUT);

    assert!(store.get_progress("u1", "l1").await.unwrap().is_none());

    let record = store.mark_completed("u1", "l1").await.unwrap();
    assert!(record.completed);
    assert!(record.completed_at.is_some());
    assert_eq!(record.learner_id, "u1");
    assert_eq!(record.lesson_id, "l1");

    store.mark_incomplete("u1", "l1").await.unwrap();
    let record = store.get_progress("u1", "l1").await.unwrap().unwrap();
    assert!(!record.completed);
    assert!(record.completed_at.is_none());
}

#[tokio::test]
async fn test_one_record_per_learner_and_lesson() {
    let pool = test_pool().await;
    let store = LessonProgressStore::new(pool.clone(), TIMEOUT);

    let first = store.mark_completed("u1", "l1").await.unwrap();
    store.mark_incomplete("u1", "l1").await.unwrap();
    let again = store.mark_completed("u1", "l1").await.unwrap();

    assert_eq!(first.id, again.id, "record identity survives toggling");

    let (count,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM lesson_progress WHERE user_id = 'u1' AND lesson_id = 'l1'",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn test_incomplete_without_record_is_noop() {
    let pool = test_pool().await;
    let store = LessonProgressStore::new(pool, TIMEOUT);

    store.mark_incomplete("u1", "never-started").await.unwrap();
    assert!(store
        .get_progress("u1", "never-started")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_recompleting_refreshes_timestamp() {
    let pool = test_pool().await;
    let store = LessonProgressStore::new(pool, TIMEOUT);

    let first = store.mark_completed("u1", "l1").await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    let second = store.mark_completed("u1", "l1").await.unwrap();

    assert!(second.completed);
    assert!(second.completed_at.unwrap() > first.completed_at.unwrap());
}

#[tokio::test]
async fn test_completed_lessons_filters_by_learner_and_set() {
    let pool = test_pool().await;
    let store = LessonProgressStore::new(pool, TIMEOUT);

    store.mark_completed("u1", "l1").await.unwrap();
    store.mark_completed("u1", "l2").await.unwrap();
    store.mark_completed("u1", "other-course").await.unwrap();
    store.mark_completed("u2", "l3").await.unwrap();
    store.mark_completed("u1", "l3").await.unwrap();
    store.mark_incomplete("u1", "l3").await.unwrap();

    let course = vec!["l1".to_string(), "l2".to_string(), "l3".to_string()];
    let done = store.completed_lessons("u1", &course).await.unwrap();

    assert_eq!(done.len(), 2);
    assert!(done.contains("l1"));
    assert!(done.contains("l2"));

    assert!(store.completed_lessons("u1", &[]).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_get_all_progress_is_per_learner() {
    let pool = test_pool().await;
    let store = LessonProgressStore::new(pool, TIMEOUT);

    store.mark_completed("u1", "b").await.unwrap();
    store.mark_completed("u1", "a").await.unwrap();
    store.mark_completed("u2", "c").await.unwrap();

    let all = store.get_all_progress("u1").await.unwrap();
    let lessons: Vec<&str> = all.iter().map(|p| p.lesson_id.as_str()).collect();
    assert_eq!(lessons, vec!["a", "b"]);
}

#[tokio::test]
async fn test_empty_ids_rejected() {
    let pool = test_pool().await;
    let store = LessonProgressStore::new(pool, TIMEOUT);

    let err = store.mark_completed("", "l1").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = store.mark_incomplete("u1", "  ").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = store.get_progress("u1", "").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn test_closed_store_is_transient() {
    let pool = test_pool().await;
    let store = LessonProgressStore::new(pool.clone(), TIMEOUT);
    pool.close().await;

    let err = store.mark_completed("u1", "l1").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TransientStore);
    assert!(err.is_retryable());
}
