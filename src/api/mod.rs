//! API Module
//!
//! HTTP handlers and routing for the exam service REST API.
//!
//! # Endpoints
//! - `POST /api/extract` - Extract an uploaded exam image
//! - `POST /api/explain` - Explain a single question
//! - `GET /api/stats` - Cache statistics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
