//! Collaborator doubles

use async_trait::async_trait;
use lms_common::db::Enrollment;
use lms_common::{Error, Result};
use lms_progress::EnrollmentStore;
use std::collections::HashMap;
use std::sync::Mutex;

/// Enrollment store whose every call fails as if the store were unreachable
pub struct FailingEnrollments;

#[async_trait]
impl EnrollmentStore for FailingEnrollments {
    async fn get_progress(&self, _learner_id: &str, _course_id: &str) -> Result<Option<u8>> {
        Err(Error::Timeout("enrollment store unreachable".to_string()))
    }

    async fn set_progress(&self, _learner_id: &str, _course_id: &str, _progress: u8) -> Result<bool> {
        Err(Error::Timeout("enrollment store unreachable".to_string()))
    }

    async fn get_enrollment(
        &self,
        _learner_id: &str,
        _course_id: &str,
    ) -> Result<Option<Enrollment>> {
        Err(Error::Timeout("enrollment store unreachable".to_string()))
    }
}

/// In-memory enrollment progress keyed by (learner, course)
#[derive(Default)]
pub struct StaticEnrollments {
    progress: Mutex<HashMap<(String, String), u8>>,
}

impl StaticEnrollments {
    pub fn with(entries: &[(&str, &str, u8)]) -> Self {
        let store = Self::default();
        {
            let mut progress = store.progress.lock().unwrap();
            for (learner, course, value) in entries {
                progress.insert((learner.to_string(), course.to_string()), *value);
            }
        }
        store
    }

    pub fn stored(&self, learner_id: &str, course_id: &str) -> Option<u8> {
        self.progress
            .lock()
            .unwrap()
            .get(&(learner_id.to_string(), course_id.to_string()))
            .copied()
    }
}

#[async_trait]
impl EnrollmentStore for StaticEnrollments {
    async fn get_progress(&self, learner_id: &str, course_id: &str) -> Result<Option<u8>> {
        Ok(self.stored(learner_id, course_id))
    }

    async fn set_progress(&self, learner_id: &str, course_id: &str, progress: u8) -> Result<bool> {
        let mut map = self.progress.lock().unwrap();
        match map.get_mut(&(learner_id.to_string(), course_id.to_string())) {
            Some(value) => {
                *value = progress;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn get_enrollment(
        &self,
        _learner_id: &str,
        _course_id: &str,
    ) -> Result<Option<Enrollment>> {
        Ok(None)
    }
}
