//! Tests for database initialization and migrations
//!
//! - Automatic database creation on first run
//! - Reopening an existing database
//! - Certificate de-duplication and unique index (migration v1)
//! - lesson_progress completion timestamp repair (migration v2)

use lms_common::db::{get_schema_version, init_database, init_schema, CURRENT_SCHEMA_VERSION};
use lms_common::db::is_unique_violation;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

async fn memory_pool() -> SqlitePool {
    SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap()
}

#[tokio::test]
async fn test_database_creation_when_missing() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("nested").join("lms.db");

    let result = init_database(&db_path).await;

    assert!(result.is_ok(), "Database initialization failed: {:?}", result.err());
    assert!(db_path.exists(), "Database file was not created");
}

#[tokio::test]
async fn test_database_opens_existing() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("lms.db");

    let pool1 = init_database(&db_path).await.unwrap();
    sqlx::query("INSERT INTO profiles (id, name) VALUES ('u1', 'Ana')")
        .execute(&pool1)
        .await
        .unwrap();
    pool1.close().await;

    let pool2 = init_database(&db_path).await.unwrap();
    let name: String = sqlx::query_scalar("SELECT name FROM profiles WHERE id = 'u1'")
        .fetch_one(&pool2)
        .await
        .unwrap();
    assert_eq!(name, "Ana");
    assert_eq!(get_schema_version(&pool2).await.unwrap(), CURRENT_SCHEMA_VERSION);
}

#[tokio::test]
async fn test_all_tables_created() {
    let pool = memory_pool().await;
    init_schema(&pool).await.unwrap();

    for table in [
        "courses",
        "modules",
        "lessons",
        "profiles",
        "enrollments",
        "lesson_progress",
        "certificates",
    ] {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name=?)",
        )
        .bind(table)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert!(exists, "table {} missing", table);
    }
}

#[tokio::test]
async fn test_init_schema_is_idempotent() {
    let pool = memory_pool().await;
    init_schema(&pool).await.unwrap();
    init_schema(&pool).await.unwrap();

    let versions: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM schema_version")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(versions, CURRENT_SCHEMA_VERSION as i64);
}

#[tokio::test]
async fn test_migration_v1_removes_duplicate_certificates() {
    let pool = memory_pool().await;

    // Legacy table without the unique index, holding a duplicate pair
    sqlx::query(
        r#"
        CREATE TABLE certificates (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            course_id TEXT NOT NULL,
            user_name TEXT NOT NULL,
            course_name TEXT NOT NULL,
            issue_date TEXT NOT NULL,
            expiry_date TEXT,
            certificate_url TEXT
        )
        "#,
    )
    .execute(&pool)
    .await
    .unwrap();

    for (id, issued) in [
        ("late", "2025-03-01T00:00:00+00:00"),
        ("early", "2025-01-01T00:00:00+00:00"),
    ] {
        sqlx::query(
            "INSERT INTO certificates (id, user_id, course_id, user_name, course_name, issue_date) \
             VALUES (?, 'u1', 'c1', 'Ana', 'Rust', ?)",
        )
        .bind(id)
        .bind(issued)
        .execute(&pool)
        .await
        .unwrap();
    }

    init_schema(&pool).await.unwrap();

    let ids: Vec<String> = sqlx::query_scalar("SELECT id FROM certificates")
        .fetch_all(&pool)
        .await
        .unwrap();
    assert_eq!(ids, vec!["early".to_string()]);

    let dup = sqlx::query(
        "INSERT INTO certificates (id, user_id, course_id, user_name, course_name, issue_date) \
         VALUES ('again', 'u1', 'c1', 'Ana', 'Rust', '2025-05-01T00:00:00+00:00')",
    )
    .execute(&pool)
    .await
    .unwrap_err();
    assert!(is_unique_violation(&dup), "expected unique violation, got {:?}", dup);
}

#[tokio::test]
async fn test_migration_v2_repairs_completion_timestamps() {
    let pool = memory_pool().await;

    sqlx::query(
        r#"
        CREATE TABLE lesson_progress (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            lesson_id TEXT NOT NULL,
            completed INTEGER NOT NULL DEFAULT 0,
            completed_at TEXT,
            UNIQUE (user_id, lesson_id)
        )
        "#,
    )
    .execute(&pool)
    .await
    .unwrap();

    sqlx::query(
        "INSERT INTO lesson_progress (id, user_id, lesson_id, completed, completed_at) VALUES \
         ('p1', 'u1', 'l1', 0, '2025-01-01T00:00:00+00:00'), \
         ('p2', 'u1', 'l2', 1, NULL), \
         ('p3', 'u1', 'l3', 1, '2025-02-01T00:00:00+00:00')",
    )
    .execute(&pool)
    .await
    .unwrap();

    init_schema(&pool).await.unwrap();

    let violations: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM lesson_progress \
         WHERE (completed = 0 AND completed_at IS NOT NULL) \
            OR (completed = 1 AND completed_at IS NULL)",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(violations, 0);

    let untouched: String =
        sqlx::query_scalar("SELECT completed_at FROM lesson_progress WHERE id = 'p3'")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(untouched, "2025-02-01T00:00:00+00:00");
}
