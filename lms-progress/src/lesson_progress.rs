//! Lesson Progress Store
//!
//! One completion record per (learner, lesson). Records are created on the
//! first completion, mutated in place afterwards, and never deleted by the
//! learning flow. Every call is a direct, bounded round trip to the
//! database: no caching, no retry.

use lms_common::db::{bounded, LessonProgress};
use lms_common::error::require_non_empty;
use lms_common::{time, uuid_utils, Error, Result};
use sqlx::{Pool, QueryBuilder, Sqlite};
use std::collections::HashSet;
use std::time::Duration;
use tracing::debug;

/// SQLite-backed lesson progress store
#[derive(Debug, Clone)]
pub struct LessonProgressStore {
    db: Pool<Sqlite>,
    timeout: Duration,
}

impl LessonProgressStore {
    /// Create a store with a bounded wait per call
    pub fn new(db: Pool<Sqlite>, timeout: Duration) -> Self {
        Self { db, timeout }
    }

    /// Completion record for one lesson, if any
    pub async fn get_progress(
        &self,
        learner_id: &str,
        lesson_id: &str,
    ) -> Result<Option<LessonProgress>> {
        require_non_empty("learner_id", learner_id)?;
        require_non_empty("lesson_id", lesson_id)?;

        bounded(self.timeout, "get lesson progress", async {
            let row = sqlx::query(
                "SELECT id, user_id, lesson_id, completed, completed_at \
                 FROM lesson_progress WHERE user_id = ? AND lesson_id = ?",
            )
            .bind(learner_id)
            .bind(lesson_id)
            .fetch_optional(&self.db)
            .await?;

            Ok::<_, Error>(row.map(|r| LessonProgress::from_row(&r)).transpose()?)
        })
        .await
    }

    /// Every completion record of a learner, ordered by lesson id
    pub async fn get_all_progress(&self, learner_id: &str) -> Result<Vec<LessonProgress>> {
        require_non_empty("learner_id", learner_id)?;

        bounded(self.timeout, "list lesson progress", async {
            let rows = sqlx::query(
                "SELECT id, user_id, lesson_id, completed, completed_at \
                 FROM lesson_progress WHERE user_id = ? ORDER BY lesson_id",
            )
            .bind(learner_id)
            .fetch_all(&self.db)
            .await?;

            Ok::<_, Error>(rows
                .iter()
                .map(LessonProgress::from_row)
                .collect::<sqlx::Result<Vec<_>>>()?)
        })
        .await
    }

    /// Subset of `lesson_ids` the learner has completed
    pub async fn completed_lessons(
        &self,
        learner_id: &str,
        lesson_ids: &[String],
    ) -> Result<HashSet<String>> {
        require_non_empty("learner_id", learner_id)?;
        if lesson_ids.is_empty() {
            return Ok(HashSet::new());
        }

        bounded(self.timeout, "count completed lessons", async {
            let mut query = QueryBuilder::<Sqlite>::new(
                "SELECT lesson_id FROM lesson_progress WHERE completed = 1 AND user_id = ",
            );
            query.push_bind(learner_id);
            query.push(" AND lesson_id IN (");
            let mut separated = query.separated(", ");
            for lesson_id in lesson_ids {
                separated.push_bind(lesson_id.as_str());
            }
            separated.push_unseparated(")");

            let completed: Vec<String> = query.build_query_scalar().fetch_all(&self.db).await?;
            Ok::<_, Error>(completed.into_iter().collect())
        })
        .await
    }

    /// Mark a lesson completed
    ///
    /// Creates the record on first completion. On an already-completed
    /// lesson the completion time is refreshed to now.
    pub async fn mark_completed(&self, learner_id: &str, lesson_id: &str) -> Result<LessonProgress> {
        require_non_empty("learner_id", learner_id)?;
        require_non_empty("lesson_id", lesson_id)?;

        let progress = bounded(self.timeout, "mark lesson completed", async {
            let row = sqlx::query(
                r#"
                INSERT INTO lesson_progress (id, user_id, lesson_id, completed, completed_at)
                VALUES (?, ?, ?, 1, ?)
                ON CONFLICT (user_id, lesson_id) DO UPDATE
                    SET completed = 1, completed_at = excluded.completed_at
                RETURNING id, user_id, lesson_id, completed, completed_at
                "#,
            )
            .bind(uuid_utils::generate_id())
            .bind(learner_id)
            .bind(lesson_id)
            .bind(time::now())
            .fetch_one(&self.db)
            .await?;

            Ok::<_, Error>(LessonProgress::from_row(&row)?)
        })
        .await?;

        debug!(learner_id, lesson_id, "Lesson marked completed");
        Ok(progress)
    }

    /// Mark a lesson not completed
    ///
    /// A lesson the learner never completed has no record; that is a no-op.
    pub async fn mark_incomplete(&self, learner_id: &str, lesson_id: &str) -> Result<()> {
        require_non_empty("learner_id", learner_id)?;
        require_non_empty("lesson_id", lesson_id)?;

        let updated = bounded(self.timeout, "mark lesson incomplete", async {
            let result = sqlx::query(
                "UPDATE lesson_progress SET completed = 0, completed_at = NULL \
                 WHERE user_id = ? AND lesson_id = ?",
            )
            .bind(learner_id)
            .bind(lesson_id)
            .execute(&self.db)
            .await?;

            Ok::<_, Error>(result.rows_affected())
        })
        .await?;

        if updated == 0 {
            debug!(learner_id, lesson_id, "No progress record to un-complete");
        } else {
            debug!(learner_id, lesson_id, "Lesson marked incomplete");
        }
        Ok(())
    }
}
