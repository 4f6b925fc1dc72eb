//! Prompt Templates
//!
//! Subject-specific prompt texts, loaded once at startup from a directory.

use std::io::ErrorKind;
use std::path::Path;

use serde_json::Value;
use tokio::fs;
use tracing::{info, warn};

use crate::error::{Result, ServiceError};
use crate::subject::Subject;

/// Token replaced by the question JSON in explanation templates
pub const QUESTION_PLACEHOLDER: &str = "{{QUESTION_JSON}}";

pub const EXTRACT_MATH_FILE: &str = "prompt_math.txt";
pub const EXTRACT_ENGLISH_FILE: &str = "prompt_english.txt";
pub const EXPLAIN_MATH_FILE: &str = "explain_math.txt";
pub const EXPLAIN_ENGLISH_FILE: &str = "explain_english.txt";

/// The four prompt templates used by the service.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromptSet {
    pub extract_math: String,
    pub extract_english: String,
    pub explain_math: String,
    pub explain_english: String,
}

impl PromptSet {
    /// Loads templates from `dir`. A missing file yields an empty template,
    /// which later surfaces as an invalid request when it is needed.
    pub async fn load(dir: &Path) -> Result<Self> {
        let prompts = Self {
            extract_math: read_template(dir, EXTRACT_MATH_FILE).await?,
            extract_english: read_template(dir, EXTRACT_ENGLISH_FILE).await?,
            explain_math: read_template(dir, EXPLAIN_MATH_FILE).await?,
            explain_english: read_template(dir, EXPLAIN_ENGLISH_FILE).await?,
        };
        info!(dir = %dir.display(), "prompt templates loaded");
        Ok(prompts)
    }

    /// Extraction prompt for `subject`.
    pub fn extraction(&self, subject: Subject) -> &str {
        match subject {
            Subject::Math => &self.extract_math,
            Subject::English => &self.extract_english,
        }
    }

    /// Explanation template for `subject`; a blank template falls back to math.
    pub fn explanation(&self, subject: Subject) -> &str {
        let template = match subject {
            Subject::Math => &self.explain_math,
            Subject::English => &self.explain_english,
        };
        if template.trim().is_empty() {
            &self.explain_math
        } else {
            template
        }
    }

    /// Fills the explanation template for `subject` with `question`.
    pub fn render_explanation(&self, subject: Subject, question: &Value) -> Result<String> {
        let question_json = serde_json::to_string_pretty(question)
            .map_err(|e| ServiceError::Internal(format!("cannot render question: {}", e)))?;
        Ok(self
            .explanation(subject)
            .replace(QUESTION_PLACEHOLDER, &question_json))
    }
}

async fn read_template(dir: &Path, name: &str) -> Result<String> {
    let path = dir.join(name);
    match fs::read_to_string(&path).await {
        Ok(text) => Ok(text),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            warn!(path = %path.display(), "prompt template missing");
            Ok(String::new())
        }
        Err(e) => Err(ServiceError::Internal(format!(
            "cannot read {}: {}",
            path.display(),
            e
        ))),
    }
}
