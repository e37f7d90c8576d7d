//! Player/Progress façade
//!
//! What the presentation layer calls: open a course, select a lesson, mark
//! it complete and refresh the percentage, advance to the next lesson, and
//! request a certificate once progress qualifies. The only state held here
//! is the session's lesson selection; everything durable lives in the
//! stores.

use crate::aggregator::CourseProgressAggregator;
use crate::certificates::CertificateService;
use crate::collaborators::Catalog;
use crate::lesson_progress::LessonProgressStore;
use crate::sqlite::{SqliteCatalog, SqliteEnrollments, SqliteIdentity};
use lms_common::db::{Certificate, LessonProgress, ModuleLessons};
use lms_common::error::require_non_empty;
use lms_common::{Error, Result};
use sqlx::{Pool, Sqlite};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// One learner's view of one course
#[derive(Debug, Clone)]
pub struct PlayerSession {
    learner_id: String,
    course_id: String,
    outline: Vec<ModuleLessons>,
    /// (module index, lesson index) into `outline`
    position: Option<(usize, usize)>,
    progress: u8,
}

impl PlayerSession {
    /// Session positioned on the first lesson of the first non-empty module
    pub fn new(learner_id: &str, course_id: &str, outline: Vec<ModuleLessons>) -> Self {
        let position = first_lesson_from(&outline, 0);
        Self {
            learner_id: learner_id.to_string(),
            course_id: course_id.to_string(),
            outline,
            position,
            progress: 0,
        }
    }

    pub fn learner_id(&self) -> &str {
        &self.learner_id
    }

    pub fn course_id(&self) -> &str {
        &self.course_id
    }

    pub fn outline(&self) -> &[ModuleLessons] {
        &self.outline
    }

    /// Last percentage shown to the learner
    pub fn progress(&self) -> u8 {
        self.progress
    }

    pub fn current_lesson(&self) -> Option<&str> {
        self.position
            .map(|(m, l)| self.outline[m].lesson_ids[l].as_str())
    }

    pub fn current_module(&self) -> Option<&str> {
        self.position.map(|(m, _)| self.outline[m].module_id.as_str())
    }

    /// Select a lesson of this course; `NotFound` otherwise
    pub fn select_lesson(&mut self, lesson_id: &str) -> Result<()> {
        for (m, module) in self.outline.iter().enumerate() {
            if let Some(l) = module.lesson_ids.iter().position(|id| id == lesson_id) {
                self.position = Some((m, l));
                return Ok(());
            }
        }
        Err(Error::NotFound(format!(
            "lesson {} in course {}",
            lesson_id, self.course_id
        )))
    }

    /// Advance to the next lesson in module order, then to the first lesson
    /// of the next module that has any
    ///
    /// Returns the new lesson, or `None` (position unchanged) at the end.
    pub fn next_lesson(&mut self) -> Option<&str> {
        let (m, l) = self.position?;
        let next = if l + 1 < self.outline[m].lesson_ids.len() {
            Some((m, l + 1))
        } else {
            first_lesson_from(&self.outline, m + 1)
        };

        match next {
            Some(position) => {
                self.position = Some(position);
                self.current_lesson()
            }
            None => None,
        }
    }

    fn require_current_lesson(&self) -> Result<String> {
        self.current_lesson()
            .map(str::to_string)
            .ok_or_else(|| Error::Validation("no lesson selected".to_string()))
    }
}

/// First lesson at or after module index `from`
fn first_lesson_from(outline: &[ModuleLessons], from: usize) -> Option<(usize, usize)> {
    outline
        .iter()
        .enumerate()
        .skip(from)
        .find(|(_, module)| !module.lesson_ids.is_empty())
        .map(|(m, _)| (m, 0))
}

/// Orchestrates the progress store, aggregator and certificate service
#[derive(Clone)]
pub struct Player {
    catalog: Arc<dyn Catalog>,
    lessons: LessonProgressStore,
    aggregator: CourseProgressAggregator,
    certificates: CertificateService,
}

impl Player {
    pub fn new(
        catalog: Arc<dyn Catalog>,
        lessons: LessonProgressStore,
        aggregator: CourseProgressAggregator,
        certificates: CertificateService,
    ) -> Self {
        Self {
            catalog,
            lessons,
            aggregator,
            certificates,
        }
    }

    /// Wire every component to one SQLite database
    pub fn from_sqlite(db: Pool<Sqlite>, timeout: Duration) -> Self {
        let catalog: Arc<dyn Catalog> = Arc::new(SqliteCatalog::new(db.clone(), timeout));
        let enrollments = Arc::new(SqliteEnrollments::new(db.clone(), timeout));
        let identity = Arc::new(SqliteIdentity::new(db.clone(), timeout));
        let lessons = LessonProgressStore::new(db.clone(), timeout);

        let aggregator =
            CourseProgressAggregator::new(catalog.clone(), lessons.clone(), enrollments.clone());
        let certificates =
            CertificateService::new(db, timeout, enrollments, catalog.clone(), identity);

        Self::new(catalog, lessons, aggregator, certificates)
    }

    pub fn lessons(&self) -> &LessonProgressStore {
        &self.lessons
    }

    pub fn aggregator(&self) -> &CourseProgressAggregator {
        &self.aggregator
    }

    pub fn certificates(&self) -> &CertificateService {
        &self.certificates
    }

    /// Load the course outline and a freshly computed percentage
    pub async fn open(&self, learner_id: &str, course_id: &str) -> Result<PlayerSession> {
        require_non_empty("learner_id", learner_id)?;
        require_non_empty("course_id", course_id)?;

        let outline = self.catalog.modules_with_lessons(course_id).await?;
        let mut session = PlayerSession::new(learner_id, course_id, outline);
        self.refresh_progress(&mut session).await?;

        debug!(
            learner_id,
            course_id,
            lesson = ?session.current_lesson(),
            progress = session.progress,
            "Player session opened"
        );
        Ok(session)
    }

    /// Recompute the course percentage and store it on the session
    pub async fn refresh_progress(&self, session: &mut PlayerSession) -> Result<u8> {
        session.progress = self
            .aggregator
            .recompute(&session.learner_id, &session.course_id)
            .await?;
        Ok(session.progress)
    }

    /// Completion record of the selected lesson
    pub async fn current_lesson_progress(
        &self,
        session: &PlayerSession,
    ) -> Result<Option<LessonProgress>> {
        let lesson_id = session.require_current_lesson()?;
        self.lessons.get_progress(&session.learner_id, &lesson_id).await
    }

    /// Mark the selected lesson complete, then refresh the percentage
    pub async fn mark_current_complete(&self, session: &mut PlayerSession) -> Result<u8> {
        let lesson_id = session.require_current_lesson()?;
        self.lessons
            .mark_completed(&session.learner_id, &lesson_id)
            .await?;
        self.refresh_progress(session).await
    }

    /// Mark the selected lesson not complete, then refresh the percentage
    pub async fn mark_current_incomplete(&self, session: &mut PlayerSession) -> Result<u8> {
        let lesson_id = session.require_current_lesson()?;
        self.lessons
            .mark_incomplete(&session.learner_id, &lesson_id)
            .await?;
        self.refresh_progress(session).await
    }

    /// Recompute the learner's percentage, then check eligibility against it
    ///
    /// Returns the fresh percentage and whether it qualifies.
    pub async fn check_eligibility(&self, learner_id: &str, course_id: &str) -> Result<(u8, bool)> {
        let percent = self.aggregator.recompute(learner_id, course_id).await?;
        let eligible = self.certificates.is_eligible(learner_id, course_id).await;
        Ok((percent, eligible))
    }

    /// Certificate for the session's course, issued on first qualifying request
    ///
    /// Progress is recomputed first so eligibility never rests on a stale
    /// cached value. `None` while the learner does not qualify.
    pub async fn request_certificate(
        &self,
        session: &mut PlayerSession,
    ) -> Result<Option<Certificate>> {
        self.refresh_progress(session).await?;

        if !self
            .certificates
            .is_eligible(&session.learner_id, &session.course_id)
            .await
        {
            debug!(
                learner_id = %session.learner_id,
                course_id = %session.course_id,
                progress = session.progress,
                "Certificate requested before eligibility"
            );
            return Ok(None);
        }

        self.certificates
            .issue(&session.learner_id, &session.course_id)
            .await
            .map(Some)
    }
}
