//! In-memory database fixtures

use lms_common::db::{init_schema, Enrollment};
use lms_progress::sqlite::SqliteEnrollments;
use lms_progress::Player;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Sqlite};
use std::time::Duration;

/// Bounded wait used by every store in tests
pub const TIMEOUT: Duration = Duration::from_secs(5);

/// In-memory database with the full schema
///
/// One connection: every connection to `sqlite::memory:` is its own database.
pub async fn test_pool() -> Pool<Sqlite> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    init_schema(&pool).await.unwrap();
    pool
}

/// Insert a course with modules and lessons, all in the given order
pub async fn seed_course(
    pool: &Pool<Sqlite>,
    course_id: &str,
    title: &str,
    modules: &[(&str, &[&str])],
) {
    sqlx::query("INSERT INTO courses (id, title, instructor) VALUES (?, ?, 'Instructor')")
        .bind(course_id)
        .bind(title)
        .execute(pool)
        .await
        .unwrap();

    for (module_order, (module_id, lessons)) in modules.iter().enumerate() {
        sqlx::query("INSERT INTO modules (id, course_id, title, order_number) VALUES (?, ?, ?, ?)")
            .bind(*module_id)
            .bind(course_id)
            .bind(format!("Module {}", module_id))
            .bind(module_order as i64)
            .execute(pool)
            .await
            .unwrap();

        for (lesson_order, lesson_id) in lessons.iter().enumerate() {
            sqlx::query(
                "INSERT INTO lessons (id, module_id, title, order_number) VALUES (?, ?, ?, ?)",
            )
            .bind(*lesson_id)
            .bind(*module_id)
            .bind(format!("Lesson {}", lesson_id))
            .bind(lesson_order as i64)
            .execute(pool)
            .await
            .unwrap();
        }
    }
}

/// Insert a learner profile
pub async fn seed_profile(pool: &Pool<Sqlite>, learner_id: &str, name: Option<&str>) {
    sqlx::query("INSERT INTO profiles (id, name) VALUES (?, ?)")
        .bind(learner_id)
        .bind(name)
        .execute(pool)
        .await
        .unwrap();
}

/// Enroll a learner (the external enrollment flow)
pub async fn enroll(pool: &Pool<Sqlite>, learner_id: &str, course_id: &str) -> Enrollment {
    SqliteEnrollments::new(pool.clone(), TIMEOUT)
        .enroll(learner_id, course_id)
        .await
        .unwrap()
}

/// Player wired to the test database
pub fn player(pool: &Pool<Sqlite>) -> Player {
    Player::from_sqlite(pool.clone(), TIMEOUT)
}
