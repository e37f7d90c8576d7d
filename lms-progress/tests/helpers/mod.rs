//! Test helper modules for progress engine integration tests
//!
//! - fixtures: in-memory database, catalog seeding, enrollment setup
//! - doubles: collaborator implementations with injected failures

#![allow(dead_code)]

pub mod doubles;
pub mod fixtures;

pub use doubles::{FailingEnrollments, StaticEnrollments};
pub use fixtures::{enroll, player, seed_course, seed_profile, test_pool, TIMEOUT};
