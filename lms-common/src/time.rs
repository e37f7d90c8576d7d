//! Timestamp utilities

use chrono::{DateTime, SubsecRound, Utc};

/// Current UTC timestamp, truncated to millisecond precision
///
/// Stored timestamps round-trip through SQLite text columns, so values
/// handed back to callers must carry no more precision than the store keeps.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}
