//! Database schema migrations
//!
//! Versioned, idempotent migrations tracked in the `schema_version` table.
//! Table creation in [`crate::db::init`] always runs first, so every
//! migration may assume its tables exist.
//!
//! # Migration Guidelines
//!
//! 1. **Never modify existing migrations** - databases in the field already ran them
//! 2. **Always add new migrations** - one function per schema or data change
//! 3. **Stay idempotent** - a migration may be retried after a partial failure

use crate::Result;
use sqlx::SqlitePool;
use tracing::{info, warn};

/// Current schema version
///
/// **IMPORTANT:** Increment this when adding new migrations
pub const CURRENT_SCHEMA_VERSION: i32 = 2;

/// Get current schema version from database
///
/// Returns 0 if schema_version has no rows
pub async fn get_schema_version(pool: &SqlitePool) -> Result<i32> {
    let version: Option<i32> =
        sqlx::query_scalar("SELECT version FROM schema_version ORDER BY version DESC LIMIT 1")
            .fetch_optional(pool)
            .await?;

    Ok(version.unwrap_or(0))
}

async fn set_schema_version(pool: &SqlitePool, version: i32) -> Result<()> {
    sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (?)")
        .bind(version)
        .execute(pool)
        .await?;

    Ok(())
}

/// Run all pending migrations
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    let current_version = get_schema_version(pool).await?;

    if current_version == CURRENT_SCHEMA_VERSION {
        info!("Database schema is up to date (v{})", current_version);
        return Ok(());
    }

    if current_version > CURRENT_SCHEMA_VERSION {
        warn!(
            "Database schema version ({}) is newer than code version ({})",
            current_version, CURRENT_SCHEMA_VERSION
        );
        return Ok(());
    }

    info!(
        "Running database migrations: v{} -> v{}",
        current_version, CURRENT_SCHEMA_VERSION
    );

    if current_version < 1 {
        migrate_v1(pool).await?;
        set_schema_version(pool, 1).await?;
        info!("Migration v1 completed");
    }

    if current_version < 2 {
        migrate_v2(pool).await?;
        set_schema_version(pool, 2).await?;
        info!("Migration v2 completed");
    }

    Ok(())
}

/// Migration v1: one certificate per (user, course)
///
/// Older databases could hold several certificates for the same learner and
/// course. Keep the earliest issued one, then back the rule with a unique
/// index so concurrent issuers in different processes collide in the store.
async fn migrate_v1(pool: &SqlitePool) -> Result<()> {
    info!("Running migration v1: unique certificate per user and course");

    let removed = sqlx::query(
        r#"
        DELETE FROM certificates
        WHERE rowid NOT IN (
            SELECT (
                SELECT c2.rowid FROM certificates c2
                WHERE c2.user_id = c1.user_id AND c2.course_id = c1.course_id
                ORDER BY c2.issue_date, c2.rowid
                LIMIT 1
            )
            FROM certificates c1
        )
        "#,
    )
    .execute(pool)
    .await?
    .rows_affected();

    if removed > 0 {
        warn!("  Removed {} duplicate certificate(s)", removed);
    }

    sqlx::query(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_certificates_user_course \
         ON certificates(user_id, course_id)",
    )
    .execute(pool)
    .await?;

    info!("  Created idx_certificates_user_course");
    Ok(())
}

/// Migration v2: repair completed/completed_at pairs in lesson_progress
///
/// A lesson that is not completed carries no completion time; a completed
/// lesson always has one. Rows without a timestamp get the migration time.
async fn migrate_v2(pool: &SqlitePool) -> Result<()> {
    info!("Running migration v2: lesson_progress completion timestamps");

    let cleared = sqlx::query(
        "UPDATE lesson_progress SET completed_at = NULL \
         WHERE completed = 0 AND completed_at IS NOT NULL",
    )
    .execute(pool)
    .await?
    .rows_affected();

    let stamped = sqlx::query(
        "UPDATE lesson_progress SET completed_at = ? \
         WHERE completed = 1 AND completed_at IS NULL",
    )
    .bind(crate::time::now())
    .execute(pool)
    .await?
    .rows_affected();

    if cleared + stamped > 0 {
        info!(
            "  Repaired lesson_progress rows: {} cleared, {} stamped",
            cleared, stamped
        );
    }

    Ok(())
}
