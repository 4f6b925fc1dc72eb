//! API Handlers
//!
//! HTTP request handlers for each exam service endpoint.

use std::sync::Arc;

use axum::{
    extract::{Multipart, Query, State},
    Json,
};
use tracing::debug;

use crate::cache::{CachePolicy, DiskCache, EXPLAIN_DIR, EXTRACT_DIR};
use crate::config::Config;
use crate::error::{Result, ServiceError};
use crate::gateway::{ChatCompletionsClient, ModelClient, ModelGateway, RetryPolicy};
use crate::models::{
    ApiResponse, ExplainRequest, ExplainResponse, ExtractParams, ExtractResponse,
    HealthResponse, StatsResponse,
};
use crate::normalizer::NormalizerSettings;
use crate::prompts::PromptSet;
use crate::service::{ExplanationService, ExtractionService};
use crate::subject::SubjectChoice;

/// Multipart field carrying the exam image
pub const FILE_FIELD: &str = "file";

/// Application state shared across all handlers.
///
/// Both services share one model gateway and one prompt set; each owns its
/// cache directory.
#[derive(Clone)]
pub struct AppState {
    pub extraction: ExtractionService,
    pub explanation: ExplanationService,
    /// Request body limit applied by the router
    pub max_upload_bytes: usize,
}

impl AppState {
    /// Creates a new AppState from already-built services.
    pub fn new(extraction: ExtractionService, explanation: ExplanationService) -> Self {
        Self {
            extraction,
            explanation,
            max_upload_bytes: Config::default().max_upload_bytes,
        }
    }

    /// Creates a new AppState from configuration, talking to the configured
    /// chat-completions endpoint.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let client = ChatCompletionsClient::from_config(config)?;
        Self::with_client(config, Arc::new(client)).await
    }

    /// Creates a new AppState from configuration with a given model client.
    ///
    /// Opens `<cache_dir>/extract` and `<cache_dir>/explain` and loads the
    /// prompt templates.
    pub async fn with_client(config: &Config, client: Arc<dyn ModelClient>) -> Result<Self> {
        let policy = CachePolicy {
            max_entries: config.cache_max_entries,
            max_age: config.cache_max_age,
        };
        let extract_cache = DiskCache::open(config.cache_dir.join(EXTRACT_DIR), policy).await?;
        let explain_cache = DiskCache::open(config.cache_dir.join(EXPLAIN_DIR), policy).await?;

        let prompts = Arc::new(PromptSet::load(&config.prompt_dir).await?);
        let gateway = ModelGateway::new(client, RetryPolicy::from_config(config));
        let normalizer = NormalizerSettings {
            max_edge: config.image_max_edge,
            quality: config.image_quality,
        };

        let extraction = ExtractionService::new(
            Arc::new(extract_cache),
            gateway.clone(),
            prompts.clone(),
            normalizer,
        );
        let explanation = ExplanationService::new(
            Arc::new(explain_cache),
            gateway,
            prompts,
            config.explain_hit_delay,
        );

        Ok(Self {
            extraction,
            explanation,
            max_upload_bytes: config.max_upload_bytes,
        })
    }

    /// The caches, for background maintenance.
    pub fn caches(&self) -> Vec<Arc<DiskCache>> {
        vec![
            self.extraction.cache().clone(),
            self.explanation.cache().clone(),
        ]
    }
}

fn multipart_error(err: axum::extract::multipart::MultipartError) -> ServiceError {
    ServiceError::InvalidRequest(format!("malformed upload: {}", err))
}

/// Handler for POST /api/extract
///
/// Reads the `file` field of a multipart upload. `subject` and `debug` come
/// from the query string; multipart text fields of the same name override it.
pub async fn extract_handler(
    State(state): State<AppState>,
    Query(params): Query<ExtractParams>,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<ExtractResponse>>> {
    let mut subject = params.subject;
    let mut include_raw = params.debug;
    let mut image = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            FILE_FIELD => {
                let file_name = field.file_name().map(str::to_string);
                let bytes = field.bytes().await.map_err(multipart_error)?;
                debug!(bytes = bytes.len(), file = ?file_name, "received upload");
                image = Some(bytes.to_vec());
            }
            "subject" => {
                let text = field.text().await.map_err(multipart_error)?;
                subject = text
                    .parse::<SubjectChoice>()
                    .map_err(ServiceError::InvalidRequest)?;
            }
            "debug" => {
                let text = field.text().await.map_err(multipart_error)?;
                include_raw = matches!(text.trim(), "true" | "1");
            }
            _ => {}
        }
    }

    let image = image.ok_or_else(|| {
        ServiceError::InvalidRequest(format!("missing multipart field '{}'", FILE_FIELD))
    })?;

    let response = state.extraction.extract(image, subject, include_raw).await?;
    Ok(Json(ApiResponse::success(response)))
}

/// Handler for POST /api/explain
///
/// Explains one question for the given subject.
pub async fn explain_handler(
    State(state): State<AppState>,
    Json(req): Json<ExplainRequest>,
) -> Result<Json<ApiResponse<ExplainResponse>>> {
    let response = state
        .explanation
        .explain(req.subject_name(), &req.question)
        .await?;
    Ok(Json(ApiResponse::success(response)))
}

/// Handler for GET /api/stats
///
/// Returns statistics of both caches.
pub async fn stats_handler(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<StatsResponse>>> {
    let extract = state.extraction.cache().stats().await?;
    let explain = state.explanation.cache().stats().await?;

    Ok(Json(ApiResponse::success(StatsResponse {
        extract: extract.into(),
        explain: explain.into(),
    })))
}

/// Handler for GET /health
///
/// Returns health status of the server.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
