//! Configuration Module
//!
//! Handles loading and managing service configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Default chat-completions endpoint of the hosted vision model.
pub const DEFAULT_MODEL_API_URL: &str = "https://open.bigmodel.cn/api/paas/v4/chat/completions";

/// Default vision model name.
pub const DEFAULT_MODEL_NAME: &str = "glm-4.6v";

/// Service configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// API credential for the remote model (empty = not configured)
    pub api_key: String,
    /// Chat-completions endpoint URL
    pub model_api_url: String,
    /// Model identifier sent with every request
    pub model_name: String,
    /// Per-call network timeout
    pub model_timeout: Duration,
    /// Additional attempts after a failed model call
    pub model_retries: u32,
    /// Fixed pause between model call attempts
    pub model_retry_delay: Duration,
    /// Artificial delay applied to explanation cache hits
    pub explain_hit_delay: Duration,
    /// Longest edge of a normalized image, in pixels
    pub image_max_edge: u32,
    /// JPEG quality of a normalized image (1-100)
    pub image_quality: u8,
    /// Root directory holding the `extract/` and `explain/` caches
    pub cache_dir: PathBuf,
    /// Directory holding the prompt templates
    pub prompt_dir: PathBuf,
    /// Maximum entries per cache, 0 = unbounded
    pub cache_max_entries: usize,
    /// Maximum entry age, None = never expires
    pub cache_max_age: Option<Duration>,
    /// Interval between background cache sweeps in seconds
    pub sweep_interval: u64,
    /// HTTP server port
    pub server_port: u16,
    /// Maximum accepted request body size in bytes
    pub max_upload_bytes: usize,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `ZHIPU_API_KEY` - Model API credential (default: empty)
    /// - `MODEL_API_URL` - Chat-completions endpoint (default: Zhipu v4)
    /// - `MODEL_NAME` - Model name (default: glm-4.6v)
    /// - `MODEL_TIMEOUT` - Per-call timeout in seconds (default: 60)
    /// - `MODEL_RETRIES` - Extra attempts after a failure (default: 2)
    /// - `MODEL_RETRY_DELAY_MS` - Pause between attempts (default: 1000)
    /// - `EXPLAIN_CACHE_DELAY` - Explanation hit delay in seconds (default: 12)
    /// - `IMAGE_MAX_EDGE` - Longest edge after resize (default: 1400)
    /// - `IMAGE_QUALITY` - JPEG quality (default: 75)
    /// - `CACHE_DIR` - Cache root (default: cache)
    /// - `PROMPT_DIR` - Prompt template directory (default: prompts)
    /// - `CACHE_MAX_ENTRIES` - Entries kept per cache (default: 5000)
    /// - `CACHE_MAX_AGE` - Entry lifetime in seconds, 0 = forever (default: 0)
    /// - `SWEEP_INTERVAL` - Cache sweep frequency in seconds (default: 300)
    /// - `SERVER_PORT` - HTTP server port (default: 8000)
    /// - `MAX_UPLOAD_BYTES` - Request body limit (default: 20 MiB)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let explain_hit_delay = parse_var("EXPLAIN_CACHE_DELAY")
            .and_then(|secs: f64| Duration::try_from_secs_f64(secs).ok())
            .unwrap_or(defaults.explain_hit_delay);
        let max_age_secs: u64 = parse_var("CACHE_MAX_AGE").unwrap_or(0);

        Self {
            api_key: env::var("ZHIPU_API_KEY").unwrap_or_default(),
            model_api_url: env::var("MODEL_API_URL").unwrap_or(defaults.model_api_url),
            model_name: env::var("MODEL_NAME").unwrap_or(defaults.model_name),
            model_timeout: parse_var("MODEL_TIMEOUT")
                .map(Duration::from_secs)
                .unwrap_or(defaults.model_timeout),
            model_retries: parse_var("MODEL_RETRIES").unwrap_or(defaults.model_retries),
            model_retry_delay: parse_var("MODEL_RETRY_DELAY_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.model_retry_delay),
            explain_hit_delay,
            image_max_edge: parse_var("IMAGE_MAX_EDGE")
                .filter(|v: &u32| *v > 0)
                .unwrap_or(defaults.image_max_edge),
            image_quality: parse_var("IMAGE_QUALITY")
                .map(|q: u8| q.clamp(1, 100))
                .unwrap_or(defaults.image_quality),
            cache_dir: env::var("CACHE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.cache_dir),
            prompt_dir: env::var("PROMPT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.prompt_dir),
            cache_max_entries: parse_var("CACHE_MAX_ENTRIES")
                .unwrap_or(defaults.cache_max_entries),
            cache_max_age: (max_age_secs > 0).then(|| Duration::from_secs(max_age_secs)),
            sweep_interval: parse_var("SWEEP_INTERVAL")
                .filter(|v: &u64| *v > 0)
                .unwrap_or(defaults.sweep_interval),
            server_port: parse_var("SERVER_PORT").unwrap_or(defaults.server_port),
            max_upload_bytes: parse_var("MAX_UPLOAD_BYTES").unwrap_or(defaults.max_upload_bytes),
        }
    }
}

fn parse_var<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model_api_url: DEFAULT_MODEL_API_URL.to_string(),
            model_name: DEFAULT_MODEL_NAME.to_string(),
            model_timeout: Duration::from_secs(60),
            model_retries: 2,
            model_retry_delay: Duration::from_secs(1),
            explain_hit_delay: Duration::from_secs(12),
            image_max_edge: 1400,
            image_quality: 75,
            cache_dir: PathBuf::from("cache"),
            prompt_dir: PathBuf::from("prompts"),
            cache_max_entries: 5000,
            cache_max_age: None,
            sweep_interval: 300,
            server_port: 8000,
            max_upload_bytes: 20 * 1024 * 1024,
        }
    }
}
