//! Thin client for an Ollama compatible HTTP endpoint.
//!
//! Used for three things: URL relevance classification (`/api/generate` with
//! `format: "json"`), answer generation (`/api/generate`, free text) and
//! embeddings (`/api/embeddings`).

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::LlmError;

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: Option<String>,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl OllamaClient {
    pub fn new(base_url: &str, timeout: Duration) -> OllamaClient {
        OllamaClient {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        }
    }

    /// Non-streaming generation. With `json_format` the model is asked to emit a JSON document.
    pub async fn generate(
        &self,
        model: &str,
        prompt: &str,
        json_format: bool,
    ) -> Result<String, LlmError> {
        let body = GenerateRequest {
            model,
            prompt,
            stream: false,
            format: json_format.then_some("json"),
        };
        let res = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            return Err(LlmError::Status(status.as_u16()));
        }

        let parsed: GenerateResponse = serde_json::from_str(&res.text().await?)?;
        parsed
            .response
            .ok_or_else(|| LlmError::Malformed("missing `response` field".to_string()))
    }

    pub async fn embed(&self, model: &str, text: &str) -> Result<Vec<f32>, LlmError> {
        let res = self
            .client
            .post(format!("{}/api/embeddings", self.base_url))
            .timeout(self.timeout)
            .json(&EmbeddingRequest {
                model,
                prompt: text,
            })
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            return Err(LlmError::Status(status.as_u16()));
        }

        let parsed: EmbeddingResponse = serde_json::from_str(&res.text().await?)?;
        if parsed.embedding.is_empty() {
            return Err(LlmError::Malformed("empty embedding".to_string()));
        }
        Ok(parsed.embedding)
    }
}
