//! Request and Response models for the exam service API
//!
//! This module defines the DTOs (Data Transfer Objects) used for
//! serializing/deserializing HTTP request and response bodies.

pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use requests::{ExplainRequest, ExtractParams};
pub use responses::{
    ApiResponse, CacheStatsResponse, ExplainResponse, ExtractResponse, HealthResponse,
    StatsResponse,
};
