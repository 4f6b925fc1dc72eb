//! Request DTOs for the exam service API
//!
//! Defines the structure of incoming HTTP request bodies and query strings.

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::subject::SubjectChoice;

/// Query parameters of POST /api/extract
///
/// # Fields
/// - `subject`: `math`, `english` or `auto` (default)
/// - `debug`: include the raw model text in fresh results
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExtractParams {
    #[serde(default)]
    pub subject: SubjectChoice,
    #[serde(default)]
    pub debug: bool,
}

/// Request body of POST /api/explain
#[derive(Debug, Clone, Deserialize)]
pub struct ExplainRequest {
    /// `math` or `english`; anything else, including non-strings, is
    /// treated as math
    #[serde(default)]
    pub subject: Option<Value>,
    /// The question object as produced by extraction
    #[serde(default = "empty_object")]
    pub question: Value,
}

impl ExplainRequest {
    /// The declared subject name when it is a JSON string.
    pub fn subject_name(&self) -> Option<&str> {
        self.subject.as_ref().and_then(Value::as_str)
    }
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}
