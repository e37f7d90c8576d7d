//! Enrollment rows and their cached progress

use crate::collaborators::EnrollmentStore;
use async_trait::async_trait;
use lms_common::db::{bounded, Enrollment};
use lms_common::error::require_non_empty;
use lms_common::{time, uuid_utils, Error, Result};
use sqlx::{Pool, Sqlite};
use std::time::Duration;
use tracing::info;

/// Enrollment store over the `enrollments` table
#[derive(Debug, Clone)]
pub struct SqliteEnrollments {
    db: Pool<Sqlite>,
    timeout: Duration,
}

impl SqliteEnrollments {
    pub fn new(db: Pool<Sqlite>, timeout: Duration) -> Self {
        Self { db, timeout }
    }

    /// Enroll a learner in a course; an existing enrollment is returned as is
    pub async fn enroll(&self, learner_id: &str, course_id: &str) -> Result<Enrollment> {
        require_non_empty("learner_id", learner_id)?;
        require_non_empty("course_id", course_id)?;

        let inserted = bounded(self.timeout, "enroll", async {
            let result = sqlx::query(
                "INSERT OR IGNORE INTO enrollments (id, user_id, course_id, progress, enrolled_at) \
                 VALUES (?, ?, ?, 0, ?)",
            )
            .bind(uuid_utils::generate_id())
            .bind(learner_id)
            .bind(course_id)
            .bind(time::now())
            .execute(&self.db)
            .await?;
            Ok::<_, Error>(result.rows_affected() > 0)
        })
        .await?;

        if inserted {
            info!(learner_id, course_id, "Learner enrolled");
        }

        self.get_enrollment(learner_id, course_id)
            .await?
            .ok_or_else(|| {
                Error::Internal(format!(
                    "enrollment {}/{} missing after insert",
                    learner_id, course_id
                ))
            })
    }
}

#[async_trait]
impl EnrollmentStore for SqliteEnrollments {
    async fn get_progress(&self, learner_id: &str, course_id: &str) -> Result<Option<u8>> {
        let progress: Option<i64> = bounded(self.timeout, "get enrollment progress", async {
            Ok::<_, Error>(
                sqlx::query_scalar(
                    "SELECT progress FROM enrollments WHERE user_id = ? AND course_id = ?",
                )
                .bind(learner_id)
                .bind(course_id)
                .fetch_optional(&self.db)
                .await?,
            )
        })
        .await?;

        Ok(progress.map(|p| p.clamp(0, 100) as u8))
    }

    async fn set_progress(
        &self,
        learner_id: &str,
        course_id: &str,
        progress: u8,
    ) -> Result<bool> {
        let progress = progress.min(100);

        // completed_at follows progress: stamped on first reaching 100,
        // cleared when progress drops below it
        bounded(self.timeout, "set enrollment progress", async {
            let result = sqlx::query(
                r#"
                UPDATE enrollments
                SET progress = ?,
                    completed_at = CASE WHEN ? >= 100 THEN COALESCE(completed_at, ?) ELSE NULL END
                WHERE user_id = ? AND course_id = ?
                "#,
            )
            .bind(progress as i64)
            .bind(progress as i64)
            .bind(time::now())
            .bind(learner_id)
            .bind(course_id)
            .execute(&self.db)
            .await?;
            Ok::<_, Error>(result.rows_affected() > 0)
        })
        .await
    }

    async fn get_enrollment(
        &self,
        learner_id: &str,
        course_id: &str,
    ) -> Result<Option<Enrollment>> {
        bounded(self.timeout, "get enrollment", async {
            let row = sqlx::query(
                "SELECT id, user_id, course_id, progress, enrolled_at, completed_at \
                 FROM enrollments WHERE user_id = ? AND course_id = ?",
            )
            .bind(learner_id)
            .bind(course_id)
            .fetch_optional(&self.db)
            .await?;
            Ok::<_, Error>(row.map(|r| Enrollment::from_row(&r)).transpose()?)
        })
        .await
    }
}
