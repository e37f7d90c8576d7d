//! Persisted models for the progress and certification engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

/// Completion record for one (learner, lesson) pair
///
/// `completed == false` implies `completed_at == None` and vice versa.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonProgress {
    pub id: String,
    pub learner_id: String,
    pub lesson_id: String,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
}

impl LessonProgress {
    /// Map a `lesson_progress` row
    pub fn from_row(row: &SqliteRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            learner_id: row.try_get("user_id")?,
            lesson_id: row.try_get("lesson_id")?,
            completed: row.try_get("completed")?,
            completed_at: row.try_get("completed_at")?,
        })
    }
}

/// Link between a learner and a course, with the cached percentage
///
/// `progress` is derived from lesson progress and may lag behind it until
/// the next recomputation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: String,
    pub learner_id: String,
    pub course_id: String,
    pub progress: u8,
    pub enrolled_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Enrollment {
    /// Map an `enrollments` row
    pub fn from_row(row: &SqliteRow) -> sqlx::Result<Self> {
        let progress: i64 = row.try_get("progress")?;
        Ok(Self {
            id: row.try_get("id")?,
            learner_id: row.try_get("user_id")?,
            course_id: row.try_get("course_id")?,
            progress: progress.clamp(0, 100) as u8,
            enrolled_at: row.try_get("enrolled_at")?,
            completed_at: row.try_get("completed_at")?,
        })
    }
}

/// Course completion certificate; at most one per (learner, course)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Certificate {
    pub id: String,
    pub learner_id: String,
    pub course_id: String,
    pub learner_display_name: String,
    pub course_title: String,
    pub issue_date: DateTime<Utc>,
    pub expiry_date: Option<DateTime<Utc>>,
    pub certificate_url: Option<String>,
}

impl Certificate {
    /// Map a `certificates` row
    pub fn from_row(row: &SqliteRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            learner_id: row.try_get("user_id")?,
            course_id: row.try_get("course_id")?,
            learner_display_name: row.try_get("user_name")?,
            course_title: row.try_get("course_name")?,
            issue_date: row.try_get("issue_date")?,
            expiry_date: row.try_get("expiry_date")?,
            certificate_url: row.try_get("certificate_url")?,
        })
    }
}

/// Administrative certificate creation request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCertificate {
    pub learner_id: String,
    pub course_id: String,
    pub learner_display_name: String,
    pub course_title: String,
    /// Defaults to the creation time
    #[serde(default)]
    pub issue_date: Option<DateTime<Utc>>,
}

/// Metadata patch for an existing certificate
///
/// The (learner, course) identity pair is not patchable. `Some(None)`
/// clears an optional field; `None` leaves it unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateUpdate {
    pub learner_display_name: Option<String>,
    pub course_title: Option<String>,
    pub issue_date: Option<DateTime<Utc>>,
    pub expiry_date: Option<Option<DateTime<Utc>>>,
    pub certificate_url: Option<Option<String>>,
}

impl CertificateUpdate {
    /// True when the patch changes nothing
    pub fn is_empty(&self) -> bool {
        self.learner_display_name.is_none()
            && self.course_title.is_none()
            && self.issue_date.is_none()
            && self.expiry_date.is_none()
            && self.certificate_url.is_none()
    }

    /// Apply the patch to a certificate in memory
    pub fn apply_to(&self, certificate: &mut Certificate) {
        if let Some(name) = &self.learner_display_name {
            certificate.learner_display_name = name.trim().to_string();
        }
        if let Some(title) = &self.course_title {
            certificate.course_title = title.trim().to_string();
        }
        if let Some(issue_date) = self.issue_date {
            certificate.issue_date = issue_date;
        }
        if let Some(expiry_date) = self.expiry_date {
            certificate.expiry_date = expiry_date;
        }
        if let Some(url) = &self.certificate_url {
            certificate.certificate_url = url.clone();
        }
    }
}

/// One module of a course and its lessons, both in stored order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleLessons {
    pub module_id: String,
    pub lesson_ids: Vec<String>,
}
