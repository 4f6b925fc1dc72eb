//! Extraction path: image upload to structured exam JSON.

use std::sync::Arc;
use std::time::Instant;

use serde_json::{json, Value};
use tracing::{info, warn};

use crate::cache::{extraction_key, CacheEntry, DiskCache};
use crate::error::Result;
use crate::gateway::ModelGateway;
use crate::models::ExtractResponse;
use crate::normalizer::{normalize_blocking, NormalizerSettings};
use crate::prompts::PromptSet;
use crate::subject::{self, Subject, SubjectChoice};

/// Parses a model reply as JSON, wrapping non-JSON text as
/// `{"raw_output": <text>}`.
pub fn parse_model_output(text: &str) -> Value {
    match serde_json::from_str(text) {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, "model output is not valid JSON, keeping raw text");
            json!({ "raw_output": text })
        }
    }
}

/// Extraction cache keyed by the raw upload bytes.
#[derive(Clone)]
pub struct ExtractionService {
    cache: Arc<DiskCache>,
    gateway: ModelGateway,
    prompts: Arc<PromptSet>,
    normalizer: NormalizerSettings,
}

impl ExtractionService {
    pub fn new(
        cache: Arc<DiskCache>,
        gateway: ModelGateway,
        prompts: Arc<PromptSet>,
        normalizer: NormalizerSettings,
    ) -> Self {
        Self {
            cache,
            gateway,
            prompts,
            normalizer,
        }
    }

    pub fn cache(&self) -> &Arc<DiskCache> {
        &self.cache
    }

    /// Extracts the exam content of `image_bytes`.
    ///
    /// A cached result is returned as-is for any declared subject, reporting
    /// the subject it was computed for. On a miss the image is normalized,
    /// the subject resolved, the model called and the parsed result persisted.
    /// `debug` adds the raw model text to a fresh result.
    pub async fn extract(
        &self,
        image_bytes: Vec<u8>,
        choice: SubjectChoice,
        debug: bool,
    ) -> Result<ExtractResponse> {
        let start = Instant::now();
        let key = extraction_key(&image_bytes);

        if let Some(entry) = self.cache.get(&key).await? {
            let subject = entry
                .subject
                .as_deref()
                .map(|name| Subject::coerce(Some(name)))
                .or_else(|| choice.fixed())
                .unwrap_or_default();
            info!(key = %key, declared = %choice, cached = %subject, "extraction cache hit");
            return Ok(ExtractResponse {
                from_cache: true,
                cost: start.elapsed().as_secs_f64(),
                subject: subject.to_string(),
                result: entry.result,
                raw: None,
            });
        }

        info!(key = %key, declared = %choice, bytes = image_bytes.len(), "extraction cache miss");

        let image = normalize_blocking(image_bytes, self.normalizer).await?;
        let subject = subject::resolve(choice, &self.gateway, &image).await;

        let raw = self
            .gateway
            .call_model(self.prompts.extraction(subject), Some(&image))
            .await?;
        let result = parse_model_output(&raw);
        let cost = start.elapsed().as_secs_f64();

        let entry = CacheEntry::new(result.clone(), cost).with_subject(subject.as_str());
        self.cache.put(&key, &entry).await?;

        info!(key = %key, %subject, cost, "extraction complete");

        Ok(ExtractResponse {
            from_cache: false,
            cost,
            subject: subject.to_string(),
            result,
            raw: debug.then_some(raw),
        })
    }
}
