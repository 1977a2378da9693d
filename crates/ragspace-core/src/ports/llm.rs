use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::error::CoreResult;

/// Pull-based token stream; each item is one incremental text fragment.
pub type TokenStream = Pin<Box<dyn Stream<Item = CoreResult<String>> + Send>>;

/// LLM provider port. Adapters own prompt composition (policy + template)
/// and receive the already-built context and the query transcript.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn generate_answer(&self, query: &str, context: &str) -> CoreResult<String>;

    /// Open a token stream. Retries apply to this call only, never to an
    /// already-open stream.
    async fn generate_stream(&self, query: &str, context: &str) -> CoreResult<TokenStream>;
}
