//! Exam Lens - exam paper extraction and explanation service
//!
//! Sends exam photos to a hosted vision model for structured extraction and
//! asks it to explain single questions, caching both kinds of answers on disk
//! by content hash.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod gateway;
pub mod models;
pub mod normalizer;
pub mod prompts;
pub mod service;
pub mod subject;
pub mod tasks;

pub use api::AppState;
pub use config::Config;
pub use error::ServiceError;
pub use tasks::spawn_sweep_task;
