//! HTTP adapters for the embedding and LLM ports (OpenAI-compatible
//! endpoints). Only these modules talk to provider APIs; everything else
//! goes through the ports.

pub mod embedding;
pub mod llm;

pub use embedding::HttpEmbeddingProvider;
pub use llm::HttpLlmProvider;
