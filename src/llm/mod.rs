//! Text-generation oracle used for planning and repair.
//!
//! The boundary is plain text in, plain text out. Structure is recovered by
//! the routines in [`parse`].

pub mod cloudflare;
pub mod mock;
pub mod openai;
pub mod parse;

pub use cloudflare::CloudflareOracle;
pub use mock::ScriptedOracle;
pub use openai::OpenAiOracle;

use crate::core::config::{OracleConfig, OracleProvider};
use crate::errors::{AgentError, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

#[async_trait]
pub trait Oracle: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;

    fn name(&self) -> &str;
}

/// Builds the oracle named by the configuration.
pub fn from_config(config: &OracleConfig) -> Result<Arc<dyn Oracle>> {
    let api_key = config
        .api_key
        .clone()
        .ok_or_else(|| AgentError::Configuration("missing oracle API key".to_string()))?;
    let client = reqwest::Client::builder()
        .timeout(Duration::from_millis(config.request_timeout_ms))
        .build()?;

    Ok(match config.provider {
        OracleProvider::Cloudflare => {
            let account_id = config.account_id.clone().ok_or_else(|| {
                AgentError::Configuration("missing Cloudflare account id".to_string())
            })?;
            let mut oracle = CloudflareOracle::new(client, api_key, account_id, &config.model);
            if let Some(base) = &config.base_url {
                oracle = oracle.with_base_url(base);
            }
            Arc::new(oracle)
        }
        OracleProvider::OpenAi => {
            let mut oracle = OpenAiOracle::new(client, api_key, &config.model, config.temperature);
            if let Some(base) = &config.base_url {
                oracle = oracle.with_base_url(base);
            }
            Arc::new(oracle)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_configured_provider() {
        let config = OracleConfig {
            provider: OracleProvider::OpenAi,
            api_key: Some("sk-test".into()),
            model: "gpt-4o-mini".into(),
            ..Default::default()
        };
        let oracle = from_config(&config).unwrap();
        assert_eq!(oracle.name(), "openai");
    }

    #[test]
    fn cloudflare_requires_account_id() {
        let config = OracleConfig {
            api_key: Some("key".into()),
            ..Default::default()
        };
        assert!(matches!(
            from_config(&config),
            Err(AgentError::Configuration(_))
        ));
    }
}
