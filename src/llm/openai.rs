use crate::errors::{AgentError, Result};
use crate::llm::Oracle;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI-compatible chat completions.
pub struct OpenAiOracle {
    client: Client,
    api_key: String,
    model: String,
    temperature: f32,
    base_url: String,
}

impl OpenAiOracle {
    pub fn new(client: Client, api_key: String, model: &str, temperature: f32) -> Self {
        Self {
            client,
            api_key,
            model: model.to_string(),
            temperature,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl Oracle for OpenAiOracle {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": self.model,
                "messages": [{"role": "user", "content": prompt}],
                "temperature": self.temperature,
            }))
            .send()
            .await?;

        let status = response.status();
        let body: Value = response.json().await?;
        if !status.is_success() {
            let message = body["error"]["message"]
                .as_str()
                .unwrap_or("unknown API error");
            return Err(AgentError::Oracle(format!(
                "OpenAI API error ({status}): {message}"
            )));
        }

        let content = body["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| AgentError::Oracle(format!("no content in reply: {body}")))?;
        debug!(model = %self.model, chars = content.len(), "oracle replied");
        Ok(content.to_string())
    }

    fn name(&self) -> &str {
        "openai"
    }
}
