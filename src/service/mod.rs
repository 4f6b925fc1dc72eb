//! Service Module
//!
//! The two cached request paths: exam extraction and question explanation.

mod explain;
mod extract;

pub use explain::ExplanationService;
pub use extract::{parse_model_output, ExtractionService};
