//! Deterministic provider fakes, selected by `fake_embeddings` / `fake_llm`.
//! They keep the whole pipeline runnable (and testable) without external
//! model servers.

use async_trait::async_trait;

use crate::domain::EMBEDDING_DIMENSION;
use crate::error::CoreResult;
use crate::ports::{EmbeddingProvider, LlmProvider, TokenStream};

/// Bag-of-words hash embedding: shared tokens produce correlated vectors,
/// so similarity ranking stays meaningful end to end.
pub struct FakeEmbeddingProvider {
    dimension: usize,
}

impl FakeEmbeddingProvider {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        for token in text.to_lowercase().split_whitespace() {
            let idx = (fnv1a(token.as_bytes()) as usize) % self.dimension;
            vector[idx] += 1.0;
        }

        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }
        vector
    }
}

impl Default for FakeEmbeddingProvider {
    fn default() -> Self {
        Self::new(EMBEDDING_DIMENSION)
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

#[async_trait]
impl EmbeddingProvider for FakeEmbeddingProvider {
    fn model_id(&self) -> &str {
        "fake-embeddings"
    }

    async fn embed_query(&self, text: &str) -> CoreResult<Vec<f32>> {
        Ok(self.embed_text(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> CoreResult<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}

/// Echoes the supplied context so grounding assertions hold without a model.
pub struct FakeLlmProvider;

impl FakeLlmProvider {
    fn compose_answer(query: &str, context: &str) -> String {
        format!("[respuesta-simulada] Pregunta: {query}\nEvidencia:\n{context}")
    }
}

#[async_trait]
impl LlmProvider for FakeLlmProvider {
    async fn generate_answer(&self, query: &str, context: &str) -> CoreResult<String> {
        Ok(Self::compose_answer(query, context))
    }

    async fn generate_stream(&self, query: &str, context: &str) -> CoreResult<TokenStream> {
        let answer = Self::compose_answer(query, context);
        let tokens: Vec<CoreResult<String>> = answer
            .split_inclusive(' ')
            .map(|piece| Ok(piece.to_string()))
            .collect();
        Ok(Box::pin(futures::stream::iter(tokens)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::similarity::cosine_similarity;
    use futures::StreamExt;

    #[tokio::test]
    async fn embeddings_are_deterministic_and_normalized() {
        let provider = FakeEmbeddingProvider::new(64);
        let a = provider.embed_query("expenses need approval").await.unwrap();
        let b = provider.embed_query("expenses need approval").await.unwrap();
        assert_eq!(a, b);

        let norm: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn related_texts_score_higher_than_unrelated() {
        let provider = FakeEmbeddingProvider::new(256);
        let doc = provider
            .embed_query("expenses over fifty need approval")
            .await
            .unwrap();
        let related = provider
            .embed_query("what expenses need approval")
            .await
            .unwrap();
        let unrelated = provider
            .embed_query("quantum tunneling energy bands")
            .await
            .unwrap();

        assert!(cosine_similarity(&doc, &related) > cosine_similarity(&doc, &unrelated));
    }

    #[tokio::test]
    async fn batch_preserves_order_and_length() {
        let provider = FakeEmbeddingProvider::new(32);
        let texts = vec!["a".to_string(), "b".to_string(), "a".to_string()];
        let out = provider.embed_batch(&texts).await.unwrap();
        assert_eq!(out.len(), 3);
        assert_eq!(out[0], out[2]);
    }

    #[tokio::test]
    async fn stream_concatenates_to_the_sync_answer() {
        let provider = FakeLlmProvider;
        let sync = provider.generate_answer("q", "ctx").await.unwrap();

        let mut stream = provider.generate_stream("q", "ctx").await.unwrap();
        let mut streamed = String::new();
        while let Some(token) = stream.next().await {
            streamed.push_str(&token.unwrap());
        }
        assert_eq!(streamed, sync);
    }
}
