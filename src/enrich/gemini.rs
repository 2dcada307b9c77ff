//! Gemini `generateContent` client

use super::{Enricher, EnrichmentError};
use crate::config::EnrichmentConfig;
use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

/// Enrichment capability backed by the Gemini REST API
pub struct GeminiClient {
    client: Client,
    endpoint: String,
    model: String,
    api_key: String,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

impl GeminiClient {
    pub fn new(client: Client, config: &EnrichmentConfig, api_key: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: api_key.into(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    /// Builds a client using the API key named by `config.api_key_env`
    ///
    /// # Returns
    ///
    /// * `Ok(GeminiClient)` - The key is present
    /// * `Err(EnrichmentError::Unavailable)` - Enrichment is disabled or the key is missing
    pub fn from_env(client: Client, config: &EnrichmentConfig) -> Result<Self, EnrichmentError> {
        if !config.enabled {
            return Err(EnrichmentError::Unavailable(
                "disabled in configuration".to_string(),
            ));
        }

        match std::env::var(&config.api_key_env) {
            Ok(key) if !key.trim().is_empty() => Ok(Self::new(client, config, key.trim())),
            _ => Err(EnrichmentError::Unavailable(format!(
                "{} is not set",
                config.api_key_env
            ))),
        }
    }

    fn url(&self) -> String {
        format!("{}/models/{}:generateContent", self.endpoint, self.model)
    }

    /// Sends one request and concatenates the text parts of the first candidate
    async fn generate(&self, parts: Vec<Value>) -> Result<String, EnrichmentError> {
        let body = json!({
            "contents": [
                { "parts": parts }
            ]
        });

        let response = self
            .client
            .post(self.url())
            .header("x-goog-api-key", &self.api_key)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EnrichmentError::Status {
                code: status.as_u16(),
                body: body.chars().take(500).collect(),
            });
        }

        let parsed: GenerateResponse = response.json().await?;
        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect()
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(EnrichmentError::EmptyResponse);
        }
        Ok(text.trim().to_string())
    }
}

#[async_trait]
impl Enricher for GeminiClient {
    async fn translate(&self, text: &str, target_language: &str) -> Result<String, EnrichmentError> {
        let prompt = format!(
            "Translate the following product name to {target_language} accurately and concisely: \"{text}\"\n\
             Return exactly one name. Do not list options, do not explain, do not add a brand suffix."
        );
        self.generate(vec![json!({ "text": prompt })]).await
    }

    async fn extract_table_from_image(
        &self,
        image: &[u8],
        mime_type: &str,
        instructions: &str,
    ) -> Result<String, EnrichmentError> {
        let data = base64::engine::general_purpose::STANDARD.encode(image);
        self.generate(vec![
            json!({ "text": instructions }),
            json!({ "inline_data": { "mime_type": mime_type, "data": data } }),
        ])
        .await
    }
}
