//! Response DTOs for the exam service API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;
use serde_json::Value;

use crate::cache::CacheStats;

/// Uniform envelope wrapping every API response
///
/// `code` is 0 on success and 1 on failure, in which case `data` is null.
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse<T> {
    pub code: i32,
    pub msg: String,
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    /// Wraps a successful payload
    pub fn success(data: T) -> Self {
        Self {
            code: 0,
            msg: "ok".to_string(),
            data: Some(data),
        }
    }

    /// Builds a failure envelope carrying `msg`
    pub fn failure(msg: impl Into<String>) -> Self {
        Self {
            code: 1,
            msg: msg.into(),
            data: None,
        }
    }
}

/// Payload of POST /api/extract
#[derive(Debug, Clone, Serialize)]
pub struct ExtractResponse {
    /// Whether the result came from the cache
    pub from_cache: bool,
    /// Seconds spent serving the request
    pub cost: f64,
    /// Subject the result was extracted as
    pub subject: String,
    /// Parsed model output or `{"raw_output": ...}`
    pub result: Value,
    /// Raw model text, present only for fresh results in debug mode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
}

/// Payload of POST /api/explain
#[derive(Debug, Clone, Serialize)]
pub struct ExplainResponse {
    pub from_cache: bool,
    /// Seconds spent serving the request, including any hit delay
    pub cost: f64,
    pub explanation: String,
}

/// Per-cache statistics
#[derive(Debug, Clone, Serialize)]
pub struct CacheStatsResponse {
    pub hits: u64,
    pub misses: u64,
    pub writes: u64,
    pub evictions: u64,
    pub total_entries: usize,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
}

impl From<CacheStats> for CacheStatsResponse {
    fn from(stats: CacheStats) -> Self {
        Self {
            hit_rate: stats.hit_rate(),
            hits: stats.hits,
            misses: stats.misses,
            writes: stats.writes,
            evictions: stats.evictions,
            total_entries: stats.total_entries,
        }
    }
}

/// Payload of GET /api/stats
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub extract: CacheStatsResponse,
    pub explain: CacheStatsResponse,
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}
