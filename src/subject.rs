//! Subject Classifier
//!
//! Decides between the math and English prompt families when a request does
//! not declare its subject.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::gateway::ModelGateway;
use crate::normalizer::NormalizedImage;

/// Classification prompt: "Judge the subject of this exam image, answer with
/// exactly one word: 数学 (math) / 英语 (English) / 未知 (unknown)".
pub const CLASSIFY_PROMPT: &str = "请判断该试卷图片的学科类型，只输出一个词：数学 / 英语 / 未知";

/// Marker character of a math answer ("数" in 数学)
pub const MATH_MARKER: char = '数';

/// Marker character of an English answer ("英" in 英语)
pub const ENGLISH_MARKER: char = '英';

/// A concrete exam subject.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Subject {
    #[default]
    Math,
    English,
}

impl Subject {
    pub fn as_str(&self) -> &'static str {
        match self {
            Subject::Math => "math",
            Subject::English => "english",
        }
    }

    /// Parses a subject name, coercing anything but exactly `english` to
    /// math.
    pub fn coerce(name: Option<&str>) -> Self {
        match name {
            Some("english") => Subject::English,
            _ => Subject::Math,
        }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The subject as declared by an extraction request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubjectChoice {
    Math,
    English,
    #[default]
    Auto,
}

impl SubjectChoice {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubjectChoice::Math => "math",
            SubjectChoice::English => "english",
            SubjectChoice::Auto => "auto",
        }
    }

    /// The declared subject, or None for `auto`.
    pub fn fixed(&self) -> Option<Subject> {
        match self {
            SubjectChoice::Math => Some(Subject::Math),
            SubjectChoice::English => Some(Subject::English),
            SubjectChoice::Auto => None,
        }
    }
}

impl std::str::FromStr for SubjectChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "math" => Ok(SubjectChoice::Math),
            "english" => Ok(SubjectChoice::English),
            "auto" | "" => Ok(SubjectChoice::Auto),
            other => Err(format!("unknown subject: {}", other)),
        }
    }
}

impl fmt::Display for SubjectChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maps a classifier reply to a subject. The math marker is checked first
/// and anything without a marker falls back to math.
pub fn subject_from_reply(reply: &str) -> Subject {
    if reply.contains(MATH_MARKER) {
        Subject::Math
    } else if reply.contains(ENGLISH_MARKER) {
        Subject::English
    } else {
        Subject::Math
    }
}

/// Asks the model which subject the image belongs to.
///
/// Never fails: gateway errors resolve to math like an unknown reply.
pub async fn classify(gateway: &ModelGateway, image: &NormalizedImage) -> Subject {
    match gateway.call_model(CLASSIFY_PROMPT, Some(image)).await {
        Ok(reply) => {
            let subject = subject_from_reply(&reply);
            info!(reply = %reply, %subject, "subject detected");
            subject
        }
        Err(e) => {
            warn!(error = %e, "subject detection failed, defaulting to math");
            Subject::Math
        }
    }
}

/// Resolves a declared subject, classifying only for `auto`.
pub async fn resolve(
    choice: SubjectChoice,
    gateway: &ModelGateway,
    image: &NormalizedImage,
) -> Subject {
    match choice.fixed() {
        Some(subject) => subject,
        None => classify(gateway, image).await,
    }
}
