//! Text-completion boundary. One operation: prompt in, text out. Prompt
//! engineering and output parsing live with the callers in `responder`.

use std::time::Duration;

use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(&self, model_hint: &str, prompt: &str) -> Result<String>;
}

/// Used when no completion endpoint is configured. Every call fails, so
/// every generation mode takes its degraded path.
pub struct DisabledCompletion;

#[async_trait]
impl CompletionService for DisabledCompletion {
    async fn complete(&self, _model_hint: &str, _prompt: &str) -> Result<String> {
        bail!("completion service is not configured")
    }
}

/// `generateContent`-style HTTP endpoint.
pub struct HttpCompletion {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

impl HttpCompletion {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }
}

#[async_trait]
impl CompletionService for HttpCompletion {
    async fn complete(&self, model_hint: &str, prompt: &str) -> Result<String> {
        let mut request = self
            .client
            .post(format!("{}/models/{}:generateContent", self.base_url, model_hint))
            .json(&json!({ "contents": [{ "parts": [{ "text": prompt }] }] }));
        if let Some(key) = &self.api_key {
            request = request.header("x-goog-api-key", key);
        }

        let resp = request
            .send()
            .await
            .map_err(|e| anyhow!("completion request failed: {}", e))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            bail!("completion failed ({}): {}", status, body.chars().take(200).collect::<String>());
        }

        let body: GenerateResponse = resp.json().await?;
        let text: String = body
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().map(|p| p.text).collect())
            .unwrap_or_default();

        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_text_is_joined_from_parts() {
        let raw = r#"{"candidates":[{"content":{"parts":[{"text":"hello "},{"text":"there"}]}}]}"#;
        let body: GenerateResponse = serde_json::from_str(raw).unwrap();
        let text: String = body.candidates[0]
            .content
            .as_ref()
            .unwrap()
            .parts
            .iter()
            .map(|p| p.text.as_str())
            .collect();
        assert_eq!(text, "hello there");
    }

    #[tokio::test]
    async fn disabled_always_fails() {
        assert!(DisabledCompletion.complete("any", "prompt").await.is_err());
    }
}
