//! Model Gateway Module
//!
//! Everything that talks to the remote vision model goes through
//! [`ModelGateway`], which enforces the prompt precondition and the retry
//! policy on top of a [`ModelClient`] transport.

mod chat;
mod retry;

use async_trait::async_trait;

use crate::error::Result;
use crate::normalizer::NormalizedImage;

pub use chat::ChatCompletionsClient;
pub use retry::{ModelGateway, RetryPolicy};

// == Model Client ==
/// A single attempt at a model completion.
///
/// Implementations send the text part before the image part.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Sends one user message and returns the text of the first reply.
    async fn complete(&self, prompt: &str, image: Option<&NormalizedImage>) -> Result<String>;
}
