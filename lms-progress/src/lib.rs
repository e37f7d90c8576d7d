//! # LMS Progress Engine
//!
//! Learning-progress and certification engine:
//! - [`lesson_progress`]: one completion record per (learner, lesson)
//! - [`aggregator`]: per-course percentage, cached on the enrollment
//! - [`certificates`]: eligibility gate and idempotent issuance
//! - [`player`]: the thin façade the presentation layer calls
//!
//! Catalog, identity and enrollment data come from external collaborators
//! behind the traits in [`collaborators`]; [`sqlite`] provides adapters over
//! the shared database.

pub mod aggregator;
pub mod certificates;
pub mod collaborators;
pub mod keyed_lock;
pub mod lesson_progress;
pub mod player;
pub mod sqlite;

pub use aggregator::{percent_complete, CourseProgress, CourseProgressAggregator};
pub use certificates::{CertificateService, DEFAULT_DISPLAY_NAME, ELIGIBILITY_THRESHOLD};
pub use collaborators::{Catalog, EnrollmentStore, Identity};
pub use lesson_progress::LessonProgressStore;
pub use player::{Player, PlayerSession};
pub use lms_common::{Error, ErrorKind, Result};
