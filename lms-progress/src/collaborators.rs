//! Interfaces to the external collaborators the engine consumes
//!
//! The engine never owns catalog, identity or enrollment creation. It reads
//! them through these traits and writes only the enrollment's cached
//! progress.

use async_trait::async_trait;
use lms_common::db::{Enrollment, ModuleLessons};
use lms_common::Result;

/// Course structure and titles
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Modules of a course in course order, each with its lessons in module order
    ///
    /// An unknown course or a course without modules yields an empty list.
    async fn modules_with_lessons(&self, course_id: &str) -> Result<Vec<ModuleLessons>>;

    /// Display title of a course; `NotFound` for an unknown course
    async fn course_title(&self, course_id: &str) -> Result<String>;
}

/// Learner identity data
#[async_trait]
pub trait Identity: Send + Sync {
    /// Learner display name; may be blank when the profile has none.
    /// `NotFound` for an unknown learner.
    async fn display_name(&self, learner_id: &str) -> Result<String>;
}

/// Enrollment rows and their cached progress
#[async_trait]
pub trait EnrollmentStore: Send + Sync {
    /// Cached progress, or `None` when the learner is not enrolled
    async fn get_progress(&self, learner_id: &str, course_id: &str) -> Result<Option<u8>>;

    /// Overwrite the cached progress
    ///
    /// Returns `false` without creating anything when no enrollment exists.
    async fn set_progress(&self, learner_id: &str, course_id: &str, progress: u8)
        -> Result<bool>;

    /// Full enrollment row, if any
    async fn get_enrollment(&self, learner_id: &str, course_id: &str)
        -> Result<Option<Enrollment>>;
}
