//! Language-model client for an Ollama-compatible `/api/generate` endpoint.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use docqa_core::config::Settings;
use docqa_core::error::{Error, Result};
use docqa_core::traits::Generator;

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Clone)]
pub struct OllamaGenerator {
    http: Client,
    base_url: String,
    model: String,
    model_id: String,
}

impl OllamaGenerator {
    pub fn new(base_url: &str, model: &str, timeout: Duration) -> Self {
        let http = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            model_id: format!("ollama:{model}"),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            &settings.ollama.base_url,
            &settings.ollama.llm_model,
            Duration::from_secs(settings.ollama.timeout_secs),
        )
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/api/generate", self.base_url);
        let started = Instant::now();
        let resp = self
            .http
            .post(&url)
            .json(&GenerateRequest { model: &self.model, prompt, stream: false })
            .send()
            .await
            .map_err(|e| Error::Generation(format!("request to {url} failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorBody>(&text).map(|b| b.error).unwrap_or(text);
            return Err(Error::Generation(format!("{} returned {}: {}", url, status, detail)));
        }

        let body: GenerateResponse = resp
            .json()
            .await
            .map_err(|e| Error::Generation(format!("invalid response from {url}: {e}")))?;
        debug!(
            model = %self.model,
            prompt_chars = prompt.len(),
            answer_chars = body.response.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "generation finished"
        );
        Ok(body.response)
    }
}
