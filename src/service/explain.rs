//! Explanation path: one question to a natural-language explanation.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::{json, Value};
use tracing::{info, warn};

use crate::cache::{explanation_key, CacheEntry, DiskCache};
use crate::error::{Result, ServiceError};
use crate::gateway::ModelGateway;
use crate::models::ExplainResponse;
use crate::prompts::PromptSet;
use crate::subject::Subject;

/// Explanation cache keyed by subject and canonical question JSON.
#[derive(Clone)]
pub struct ExplanationService {
    cache: Arc<DiskCache>,
    gateway: ModelGateway,
    prompts: Arc<PromptSet>,
    /// Pause applied before answering from cache
    hit_delay: Duration,
}

impl ExplanationService {
    pub fn new(
        cache: Arc<DiskCache>,
        gateway: ModelGateway,
        prompts: Arc<PromptSet>,
        hit_delay: Duration,
    ) -> Self {
        Self {
            cache,
            gateway,
            prompts,
            hit_delay,
        }
    }

    pub fn cache(&self) -> &Arc<DiskCache> {
        &self.cache
    }

    /// Explains `question` for `subject` (anything but `english` means math).
    ///
    /// Cache hits are held back by the configured delay so they take about as
    /// long as a fresh answer; the reported cost includes the delay.
    pub async fn explain(&self, subject: Option<&str>, question: &Value) -> Result<ExplainResponse> {
        let start = Instant::now();
        let subject = Subject::coerce(subject);
        let key = explanation_key(subject.as_str(), question);

        if let Some(entry) = self.cache.get(&key).await? {
            match entry.result.get("explanation").and_then(Value::as_str) {
                Some(explanation) => {
                    info!(key = %key, %subject, delay = ?self.hit_delay, "explanation cache hit");
                    tokio::time::sleep(self.hit_delay).await;

                    return Ok(ExplainResponse {
                        from_cache: true,
                        cost: start.elapsed().as_secs_f64(),
                        explanation: explanation.to_string(),
                    });
                }
                None => {
                    warn!(key = %key, %subject, "discarding cached explanation without text");
                    self.cache.remove(&key).await?;
                }
            }
        }

        info!(key = %key, %subject, "explanation cache miss");

        let prompt = self.prompts.render_explanation(subject, question)?;
        if prompt.trim().is_empty() {
            return Err(ServiceError::InvalidRequest(format!(
                "explanation prompt for {} is empty",
                subject
            )));
        }

        let explanation = self.gateway.call_model(&prompt, None).await?;
        let cost = start.elapsed().as_secs_f64();

        let entry = CacheEntry::new(json!({ "explanation": explanation }), cost)
            .with_subject(subject.as_str());
        self.cache.put(&key, &entry).await?;

        info!(key = %key, %subject, cost, "explanation complete");

        Ok(ExplainResponse {
            from_cache: false,
            cost,
            explanation,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CachePolicy;
    use crate::gateway::testing::ScriptedClient;
    use crate::gateway::RetryPolicy;
    use tempfile::TempDir;

    const DELAY: Duration = Duration::from_millis(50);

    struct Fixture {
        _dir: TempDir,
        client: Arc<ScriptedClient>,
        service: ExplanationService,
    }

    async fn fixture(client: ScriptedClient, prompts: PromptSet) -> Fixture {
        let dir = TempDir::new().unwrap();
        let cache = DiskCache::open(dir.path().join("explain"), CachePolicy::unbounded())
            .await
            .unwrap();
        let client = Arc::new(client);
        let gateway = ModelGateway::new(
            client.clone(),
            RetryPolicy {
                retries: 0,
                delay: Duration::ZERO,
            },
        );
        let service = ExplanationService::new(Arc::new(cache), gateway, Arc::new(prompts), DELAY);
        Fixture {
            _dir: dir,
            client,
            service,
        }
    }

    fn prompts() -> PromptSet {
        PromptSet {
            explain_math: "MATH {{QUESTION_JSON}}".to_string(),
            explain_english: "ENGLISH {{QUESTION_JSON}}".to_string(),
            ..PromptSet::default()
        }
    }

    #[tokio::test]
    async fn test_miss_then_delayed_hit() {
        let f = fixture(ScriptedClient::new().reply("  先求导，再代入。 "), prompts()).await;
        let question = json!({"id": "3", "stem": "求 f(x)=x^2 的导数"});

        let first = f.service.explain(Some("math"), &question).await.unwrap();
        assert!(!first.from_cache);
        assert_eq!(first.explanation, "先求导，再代入。");

        let calls = f.client.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].prompt.starts_with("MATH {"));
        assert!(calls[0].prompt.contains("求 f(x)=x^2 的导数"));
        assert!(!calls[0].with_image);

        let second = f.service.explain(Some("math"), &question).await.unwrap();
        assert!(second.from_cache);
        assert_eq!(second.explanation, first.explanation);
        assert!(second.cost >= DELAY.as_secs_f64());
        assert_eq!(f.client.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_key_order_does_not_matter() {
        let f = fixture(ScriptedClient::new().reply("because"), prompts()).await;
        let a: Value = serde_json::from_str(r#"{"id":"1","options":{"A":"x","B":"y"}}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"options":{"B":"y","A":"x"},"id":"1"}"#).unwrap();

        f.service.explain(Some("english"), &a).await.unwrap();
        let second = f.service.explain(Some("english"), &b).await.unwrap();
        assert!(second.from_cache);
    }

    #[tokio::test]
    async fn test_unknown_subject_coerced_to_math() {
        let f = fixture(
            ScriptedClient::new().reply("first").reply("second"),
            prompts(),
        )
        .await;
        let question = json!({"id": "1"});

        f.service.explain(Some("physics"), &question).await.unwrap();
        assert!(f.client.calls()[0].prompt.starts_with("MATH"));

        // Shares the math entry
        let again = f.service.explain(None, &question).await.unwrap();
        assert!(again.from_cache);
        assert_eq!(again.explanation, "first");
    }

    #[tokio::test]
    async fn test_entry_without_text_is_recomputed() {
        let f = fixture(ScriptedClient::new().reply("fresh"), prompts()).await;
        let question = json!({"id": "4"});
        let key = explanation_key("math", &question);
        f.service
            .cache()
            .put(&key, &CacheEntry::new(json!({"other": 1}), 0.5))
            .await
            .unwrap();

        let response = f.service.explain(Some("math"), &question).await.unwrap();
        assert!(!response.from_cache);
        assert_eq!(response.explanation, "fresh");
        assert_eq!(f.client.calls().len(), 1);

        // The replacement is stored and served next time
        let stored = f.service.cache().get(&key).await.unwrap().unwrap();
        assert_eq!(stored.result, json!({"explanation": "fresh"}));
        let again = f.service.explain(Some("math"), &question).await.unwrap();
        assert!(again.from_cache);
        assert_eq!(again.explanation, "fresh");
    }

    #[tokio::test]
    async fn test_blank_english_template_uses_math() {
        let mut p = prompts();
        p.explain_english = String::new();
        let f = fixture(ScriptedClient::new().reply("ok"), p).await;

        f.service.explain(Some("english"), &json!({"id": "1"})).await.unwrap();
        assert!(f.client.calls()[0].prompt.starts_with("MATH"));
    }

    #[tokio::test]
    async fn test_blank_prompt_is_invalid_request() {
        let f = fixture(ScriptedClient::new().reply("unused"), PromptSet::default()).await;

        let result = f.service.explain(Some("math"), &json!({"id": "1"})).await;
        assert!(matches!(result, Err(ServiceError::InvalidRequest(_))));
        assert!(f.client.calls().is_empty());
    }

    #[tokio::test]
    async fn test_subjects_cache_separately() {
        let f = fixture(ScriptedClient::new().reply("m").reply("e"), prompts()).await;
        let question = json!({"id": "9"});

        let math = f.service.explain(Some("math"), &question).await.unwrap();
        let english = f.service.explain(Some("english"), &question).await.unwrap();
        assert!(!english.from_cache);
        assert_eq!(math.explanation, "m");
        assert_eq!(english.explanation, "e");
    }
}
