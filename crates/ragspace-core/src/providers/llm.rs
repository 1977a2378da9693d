//! OpenAI-compatible chat provider. Owns prompt composition: the composed
//! policy+template gets the built context and query transcript substituted
//! before the call.

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::LlmConfig;
use crate::error::{CoreError, CoreResult};
use crate::ports::{LlmProvider, TokenStream};
use crate::services::PromptComposer;

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: usize,
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ResponseChoice>,
}

#[derive(Debug, Deserialize)]
struct ResponseChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChunk {
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: Delta,
}

#[derive(Debug, Deserialize)]
struct Delta {
    content: Option<String>,
}

pub struct HttpLlmProvider {
    client: Client,
    config: LlmConfig,
    composer: Arc<PromptComposer>,
}

impl HttpLlmProvider {
    pub fn new(config: LlmConfig, composer: Arc<PromptComposer>) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(config.timeout_seconds))
                .build()
                .unwrap_or_else(|_| Client::new()),
            config,
            composer,
        }
    }

    fn build_request(&self, query: &str, context: &str, stream: bool) -> CoreResult<ChatCompletionRequest> {
        let prompt = self.composer.format(context, query)?;
        Ok(ChatCompletionRequest {
            model: self.config.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt,
            }],
            max_tokens: self.config.max_tokens,
            temperature: 0.2,
            stream,
        })
    }

    async fn send(&self, request: &ChatCompletionRequest) -> CoreResult<reqwest::Response> {
        let url = format!("{}/v1/chat/completions", self.config.base_url);

        let mut builder = self.client.post(&url).json(request);
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| CoreError::llm(format!("Failed to reach LLM server: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CoreError::llm_with_status(
                format!("LLM API error ({status}): {body}"),
                status.as_u16(),
            ));
        }
        Ok(response)
    }
}

#[async_trait]
impl LlmProvider for HttpLlmProvider {
    async fn generate_answer(&self, query: &str, context: &str) -> CoreResult<String> {
        let request = self.build_request(query, context, false)?;
        let response = self.send(&request).await?;

        let body: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| CoreError::llm(format!("Malformed LLM response: {e}")))?;

        body.choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| CoreError::llm("LLM response contained no choices"))
    }

    async fn generate_stream(&self, query: &str, context: &str) -> CoreResult<TokenStream> {
        let request = self.build_request(query, context, true)?;
        let response = self.send(&request).await?;
        debug!("llm stream opened");

        let bytes_stream = response.bytes_stream();

        // SSE framing: "data: {json}\n\n", terminated by "data: [DONE]".
        // A line can straddle two network chunks, so carry a buffer.
        let parsed = futures::stream::unfold(
            (bytes_stream, String::new(), false),
            |(mut stream, mut buffer, done)| async move {
                if done {
                    return None;
                }

                loop {
                    if let Some(newline) = buffer.find('\n') {
                        let line: String = buffer.drain(..=newline).collect();
                        let line = line.trim();

                        let Some(payload) = line.strip_prefix("data: ") else {
                            continue;
                        };
                        if payload == "[DONE]" {
                            return None;
                        }
                        if let Ok(chunk) = serde_json::from_str::<ChatCompletionChunk>(payload) {
                            if let Some(content) = chunk
                                .choices
                                .first()
                                .and_then(|choice| choice.delta.content.clone())
                            {
                                if !content.is_empty() {
                                    return Some((Ok(content), (stream, buffer, false)));
                                }
                            }
                        }
                        continue;
                    }

                    match stream.next().await {
                        Some(Ok(bytes)) => {
                            buffer.push_str(&String::from_utf8_lossy(&bytes));
                        }
                        Some(Err(e)) => {
                            return Some((
                                Err(CoreError::llm(format!("Stream error: {e}"))),
                                (stream, buffer, true),
                            ));
                        }
                        None => return None,
                    }
                }
            },
        );

        Ok(Box::pin(parsed))
    }
}
