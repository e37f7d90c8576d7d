//! # LMS Common Library
//!
//! Shared code for the learning-progress services including:
//! - Database schema, migrations and persisted models
//! - Error taxonomy shared by every store and service
//! - Bootstrap configuration loading
//! - Timestamp and identifier helpers

pub mod config;
pub mod db;
pub mod error;
pub mod time;
pub mod uuid_utils;

pub use error::{Error, ErrorKind, Result};
