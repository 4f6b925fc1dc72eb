//! Background Tasks Module
//!
//! Contains background tasks that run periodically during server operation.
//!
//! # Tasks
//! - Cache sweep: Enforces the entry count and age bounds of every cache

mod sweep;

pub use sweep::{spawn_sweep_task, sweep_all};
