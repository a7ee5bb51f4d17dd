use crate::errors::{AgentError, Result};
use crate::llm::Oracle;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

const DEFAULT_BASE_URL: &str = "https://api.cloudflare.com/client/v4";

/// Cloudflare Workers AI text generation.
pub struct CloudflareOracle {
    client: Client,
    api_key: String,
    account_id: String,
    model: String,
    base_url: String,
}

impl CloudflareOracle {
    pub fn new(client: Client, api_key: String, account_id: String, model: &str) -> Self {
        Self {
            client,
            api_key,
            account_id,
            model: model.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/accounts/{}/ai/run/{}",
            self.base_url, self.account_id, self.model
        )
    }
}

fn extract_response(body: &Value) -> Result<String> {
    if body["success"].as_bool() == Some(false) {
        let message = body["errors"][0]["message"]
            .as_str()
            .unwrap_or("unknown Workers AI error");
        return Err(AgentError::Oracle(message.to_string()));
    }
    body["result"]["response"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| AgentError::Oracle(format!("no response text in reply: {body}")))
}

#[async_trait]
impl Oracle for CloudflareOracle {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&json!({
                "messages": [{"role": "user", "content": prompt}],
            }))
            .send()
            .await?;

        let status = response.status();
        let body: Value = response.json().await?;
        if !status.is_success() {
            let message = body["errors"][0]["message"]
                .as_str()
                .unwrap_or("unknown API error");
            return Err(AgentError::Oracle(format!(
                "Workers AI error ({status}): {message}"
            )));
        }

        let text = extract_response(&body)?;
        debug!(model = %self.model, chars = text.len(), "oracle replied");
        Ok(text)
    }

    fn name(&self) -> &str {
        "cloudflare"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_includes_account_and_model() {
        let oracle = CloudflareOracle::new(
            Client::new(),
            "key".into(),
            "acct".into(),
            "@cf/meta/llama-3-70b-instruct",
        );
        assert_eq!(
            oracle.endpoint(),
            "https://api.cloudflare.com/client/v4/accounts/acct/ai/run/@cf/meta/llama-3-70b-instruct"
        );
    }

    #[test]
    fn reads_result_response() {
        let body = json!({"success": true, "result": {"response": "https://github.com"}});
        assert_eq!(extract_response(&body).unwrap(), "https://github.com");

        let failed = json!({"success": false, "errors": [{"message": "quota"}]});
        assert!(matches!(extract_response(&failed), Err(AgentError::Oracle(m)) if m == "quota"));
    }
}
