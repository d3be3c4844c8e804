//! Database schema version type.
//!
//! A [`DbVersion`] pairs a migration revision id with a human-facing
//! `(major, minor)` number. Ordering and equality compare the numeric pair
//! only; the revision id and timestamp are bookkeeping. Comparison against
//! anything that is not a `DbVersion` is rejected by the type system, which
//! is the point of making this a dedicated type.

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Minor number reserved for "unknown": rendered as `major.?`.
pub const DB_UNKNOWN_MINOR: i32 = 99;

/// Revision id of the null (pre-schema) version.
pub const NULL_REVISION: &str = "000000000000";

/// One schema version of the snkmt database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbVersion {
    /// Migration revision id (the primary key of the version table).
    pub revision: String,
    pub major: i32,
    pub minor: i32,
    /// When this version row was written.
    pub timestamp: DateTime<Utc>,
}

impl DbVersion {
    pub fn new(revision: impl Into<String>, major: i32, minor: i32) -> Self {
        Self {
            revision: revision.into(),
            major,
            minor,
            timestamp: Utc::now(),
        }
    }

    /// Sentinel for "no version table or row yet" (brand-new database).
    pub fn null() -> Self {
        Self::new(NULL_REVISION, -1, 0)
    }

    pub fn is_null(&self) -> bool {
        self.major == -1
    }
}

impl PartialEq for DbVersion {
    fn eq(&self, other: &Self) -> bool {
        (self.major, self.minor) == (other.major, other.minor)
    }
}

impl Eq for DbVersion {}

impl PartialOrd for DbVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DbVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor).cmp(&(other.major, other.minor))
    }
}

impl fmt::Display for DbVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.minor == DB_UNKNOWN_MINOR {
            write!(f, "{}.?", self.major)
        } else {
            write!(f, "{}.{}", self.major, self.minor)
        }
    }
}
