//! SQLite adapters for the external collaborators
//!
//! Catalog, identity and enrollment tables live in the same database as the
//! engine's own tables; these adapters read them through the collaborator
//! traits so the engine never queries them directly.

mod catalog;
mod enrollments;

pub use catalog::{SqliteCatalog, SqliteIdentity};
pub use enrollments::SqliteEnrollments;
