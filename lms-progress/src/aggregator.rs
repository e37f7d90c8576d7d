//! Course Progress Aggregator
//!
//! Derives a learner's 0-100 percentage for a course from the lesson set
//! under the course's modules and the learner's completion records, then
//! caches it on the enrollment.
//!
//! Recomputation always re-derives from the full completed-lesson count, so
//! it is idempotent and tolerant of duplicate or out-of-order completion
//! events. Concurrent recomputations are last-writer-wins on the cached
//! value; the next recomputation corrects a stale write.

use crate::collaborators::{Catalog, EnrollmentStore};
use crate::lesson_progress::LessonProgressStore;
use lms_common::error::require_non_empty;
use lms_common::Result;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

/// Round-half-up percentage of `completed` out of `total`, clamped to 0..=100
///
/// Integer arithmetic only: `floor(100 * completed / total + 1/2)`, so 89.5%
/// is 90 on every platform. An empty course is 0%.
pub fn percent_complete(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let completed = completed.min(total) as u64;
    let total = total as u64;
    let percent = (200 * completed + total) / (2 * total);
    percent.min(100) as u8
}

/// Result of one recomputation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CourseProgress {
    pub completed_lessons: usize,
    pub total_lessons: usize,
    pub percent: u8,
    /// Whether an enrollment row received the value
    pub enrollment_updated: bool,
}

/// Recomputes course percentages and writes them to enrollments
#[derive(Clone)]
pub struct CourseProgressAggregator {
    catalog: Arc<dyn Catalog>,
    lessons: LessonProgressStore,
    enrollments: Arc<dyn EnrollmentStore>,
}

impl CourseProgressAggregator {
    pub fn new(
        catalog: Arc<dyn Catalog>,
        lessons: LessonProgressStore,
        enrollments: Arc<dyn EnrollmentStore>,
    ) -> Self {
        Self {
            catalog,
            lessons,
            enrollments,
        }
    }

    /// Recompute and persist the learner's percentage for a course
    pub async fn recompute(&self, learner_id: &str, course_id: &str) -> Result<u8> {
        Ok(self.recompute_detailed(learner_id, course_id).await?.percent)
    }

    /// Recompute with lesson counts
    ///
    /// A course with no lessons is 0% and leaves the enrollment untouched.
    /// A missing enrollment is skipped, never created.
    pub async fn recompute_detailed(
        &self,
        learner_id: &str,
        course_id: &str,
    ) -> Result<CourseProgress> {
        require_non_empty("learner_id", learner_id)?;
        require_non_empty("course_id", course_id)?;

        let lesson_ids = self.course_lesson_ids(course_id).await?;
        if lesson_ids.is_empty() {
            debug!(course_id, "Course has no lessons; progress is 0");
            return Ok(CourseProgress {
                completed_lessons: 0,
                total_lessons: 0,
                percent: 0,
                enrollment_updated: false,
            });
        }

        let completed = self
            .lessons
            .completed_lessons(learner_id, &lesson_ids)
            .await?
            .len();
        let percent = percent_complete(completed, lesson_ids.len());

        let enrollment_updated = self
            .enrollments
            .set_progress(learner_id, course_id, percent)
            .await?;

        if enrollment_updated {
            info!(
                learner_id,
                course_id,
                completed,
                total = lesson_ids.len(),
                percent,
                "Course progress updated"
            );
        } else {
            debug!(
                learner_id,
                course_id, percent, "No enrollment row; progress not persisted"
            );
        }

        Ok(CourseProgress {
            completed_lessons: completed,
            total_lessons: lesson_ids.len(),
            percent,
            enrollment_updated,
        })
    }

    /// Distinct lesson ids of a course, in course order
    async fn course_lesson_ids(&self, course_id: &str) -> Result<Vec<String>> {
        let modules = self.catalog.modules_with_lessons(course_id).await?;

        let mut seen = HashSet::new();
        Ok(modules
            .into_iter()
            .flat_map(|module| module.lesson_ids)
            .filter(|lesson_id| seen.insert(lesson_id.clone()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_course_is_zero() {
        assert_eq!(percent_complete(0, 0), 0);
        assert_eq!(percent_complete(3, 0), 0);
    }

    #[test]
    fn test_exact_fractions() {
        assert_eq!(percent_complete(0, 5), 0);
        assert_eq!(percent_complete(4, 5), 80);
        assert_eq!(percent_complete(5, 5), 100);
        assert_eq!(percent_complete(1, 4), 25);
    }

    #[test]
    fn test_rounds_half_up() {
        // 1/3 = 33.33 -> 33, 2/3 = 66.67 -> 67
        assert_eq!(percent_complete(1, 3), 33);
        assert_eq!(percent_complete(2, 3), 67);
        // 1/8 = 12.5 -> 13
        assert_eq!(percent_complete(1, 8), 13);
    }

    #[test]
    fn test_eligibility_boundary_rounds_up() {
        // 179/200 = 89.5% -> 90
        assert_eq!(percent_complete(179, 200), 90);
        // 178/200 = 89.0% -> 89
        assert_eq!(percent_complete(178, 200), 89);
        // 17/19 = 89.47% -> 89
        assert_eq!(percent_complete(17, 19), 89);
    }

    #[test]
    fn test_clamped_when_completed_exceeds_total() {
        assert_eq!(percent_complete(7, 5), 100);
    }

    #[test]
    fn test_matches_float_round_for_all_small_courses() {
        for total in 1..=60usize {
            for completed in 0..=total {
                let expected = (100.0 * completed as f64 / total as f64 + 0.5).floor() as u8;
                assert_eq!(
                    percent_complete(completed, total),
                    expected,
                    "{}/{}",
                    completed,
                    total
                );
            }
        }
    }
}
