//! Course structure and learner profile reads

use crate::collaborators::{Catalog, Identity};
use async_trait::async_trait;
use lms_common::db::{bounded, ModuleLessons};
use lms_common::{Error, Result};
use sqlx::{Pool, Row, Sqlite};
use std::time::Duration;

/// Catalog over the `courses`, `modules` and `lessons` tables
#[derive(Debug, Clone)]
pub struct SqliteCatalog {
    db: Pool<Sqlite>,
    timeout: Duration,
}

impl SqliteCatalog {
    pub fn new(db: Pool<Sqlite>, timeout: Duration) -> Self {
        Self { db, timeout }
    }
}

#[async_trait]
impl Catalog for SqliteCatalog {
    async fn modules_with_lessons(&self, course_id: &str) -> Result<Vec<ModuleLessons>> {
        let rows = bounded(self.timeout, "load course outline", async {
            Ok::<_, Error>(
                sqlx::query(
                    r#"
                    SELECT m.id AS module_id, l.id AS lesson_id
                    FROM modules m
                    LEFT JOIN lessons l ON l.module_id = m.id
                    WHERE m.course_id = ?
                    ORDER BY m.order_number, m.id, l.order_number, l.id
                    "#,
                )
                .bind(course_id)
                .fetch_all(&self.db)
                .await?,
            )
        })
        .await?;

        // Rows arrive grouped by module; a module without lessons has one
        // row with a NULL lesson id
        let mut modules: Vec<ModuleLessons> = Vec::new();
        for row in &rows {
            let module_id: String = row.try_get("module_id")?;
            let lesson_id: Option<String> = row.try_get("lesson_id")?;

            if modules.last().map(|m| m.module_id != module_id).unwrap_or(true) {
                modules.push(ModuleLessons {
                    module_id,
                    lesson_ids: Vec::new(),
                });
            }
            if let (Some(lesson_id), Some(module)) = (lesson_id, modules.last_mut()) {
                module.lesson_ids.push(lesson_id);
            }
        }

        Ok(modules)
    }

    async fn course_title(&self, course_id: &str) -> Result<String> {
        bounded(self.timeout, "get course title", async {
            Ok::<_, Error>(
                sqlx::query_scalar::<_, String>("SELECT title FROM courses WHERE id = ?")
                    .bind(course_id)
                    .fetch_optional(&self.db)
                    .await?,
            )
        })
        .await?
        .ok_or_else(|| Error::NotFound(format!("course {}", course_id)))
    }
}

/// Identity over the `profiles` table
#[derive(Debug, Clone)]
pub struct SqliteIdentity {
    db: Pool<Sqlite>,
    timeout: Duration,
}

impl SqliteIdentity {
    pub fn new(db: Pool<Sqlite>, timeout: Duration) -> Self {
        Self { db, timeout }
    }
}

#[async_trait]
impl Identity for SqliteIdentity {
    async fn display_name(&self, learner_id: &str) -> Result<String> {
        let name: Option<String> = bounded(self.timeout, "get display name", async {
            let row = sqlx::query("SELECT name FROM profiles WHERE id = ?")
                .bind(learner_id)
                .fetch_optional(&self.db)
                .await?
                .ok_or_else(|| Error::NotFound(format!("learner {}", learner_id)))?;
            Ok::<_, Error>(row.try_get("name")?)
        })
        .await?;

        Ok(name.unwrap_or_default())
    }
}
