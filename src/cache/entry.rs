//! Cache Entry Module
//!
//! Defines the persisted form of a cached model result.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// == Cache Entry ==
/// A previously computed result plus the metadata recorded at write time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// The stored result payload
    pub result: Value,
    /// Seconds spent computing the result
    pub cost: f64,
    /// Subject the result was computed for, when one applies
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    /// Write timestamp
    pub created_at: DateTime<Utc>,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new entry stamped with the current time.
    ///
    /// # Arguments
    /// * `result` - The payload to persist
    /// * `cost` - Elapsed computation time in seconds
    pub fn new(result: Value, cost: f64) -> Self {
        Self {
            result,
            cost,
            subject: None,
            created_at: Utc::now(),
        }
    }

    /// Records the subject the result was computed for.
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    // == Age ==
    /// Returns how long ago the entry was written, clamped at zero.
    pub fn age(&self) -> chrono::Duration {
        let age = Utc::now() - self.created_at;
        age.max(chrono::Duration::zero())
    }
}
