use crate::errors::{AgentError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub browser: BrowserConfig,
    pub resolver: ResolverConfig,
    pub executor: ExecutorConfig,
    pub translator: TranslatorConfig,
    pub oracle: OracleConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub headless: bool,
    pub viewport: Viewport,
    pub user_agent: Option<String>,
    pub args: Vec<String>,
    pub ignore_certificate_errors: bool,
    /// Default timeout applied to every page operation.
    pub default_timeout_ms: u64,
    pub navigation_timeout_ms: u64,
    pub wait_policy: WaitPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

/// How long `navigate` waits before returning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitPolicy {
    /// Return once the navigation is committed.
    Commit,
    /// Wait for `document.readyState == "complete"`.
    Load,
    /// Wait for the load event and then a quiet network.
    NetworkIdle,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Timeout of a single fallback step.
    pub step_timeout_ms: u64,
    pub poll_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    pub max_repair_attempts: u32,
    pub max_reconnects: u32,
    /// Pause after every successful action.
    pub settle_delay_ms: u64,
    /// Pause before retrying a repaired action.
    pub retry_delay_ms: u64,
    pub snippet_max_length: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslatorConfig {
    pub max_content_length: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OracleProvider {
    Cloudflare,
    OpenAi,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    pub provider: OracleProvider,
    pub model: String,
    pub api_key: Option<String>,
    pub account_id: Option<String>,
    pub base_url: Option<String>,
    pub temperature: f32,
    pub request_timeout_ms: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            viewport: Viewport::default(),
            user_agent: None,
            args: vec![],
            ignore_certificate_errors: true,
            default_timeout_ms: 30000,
            navigation_timeout_ms: 30000,
            wait_policy: WaitPolicy::NetworkIdle,
        }
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            step_timeout_ms: 3000,
            poll_interval_ms: 100,
        }
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_repair_attempts: 2,
            max_reconnects: 3,
            settle_delay_ms: 500,
            retry_delay_ms: 1000,
            snippet_max_length: 5000,
        }
    }
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            max_content_length: 15000,
        }
    }
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            provider: OracleProvider::Cloudflare,
            model: "@cf/meta/llama-3-70b-instruct".to_string(),
            api_key: None,
            account_id: None,
            base_url: None,
            temperature: 0.2,
            request_timeout_ms: 60000,
        }
    }
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        serde_json::from_str(&raw).map_err(|e| {
            AgentError::Configuration(format!("{}: {}", path.as_ref().display(), e))
        })
    }

    /// Overlay credentials and switches from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_vars(|key| std::env::var(key).ok());
    }

    fn apply_vars(&mut self, var: impl Fn(&str) -> Option<String>) {
        match self.oracle.provider {
            OracleProvider::Cloudflare => {
                if let Some(key) = var("CLOUDFLARE_API_KEY") {
                    self.oracle.api_key = Some(key);
                }
                if let Some(account) = var("CLOUDFLARE_ACCOUNT_ID") {
                    self.oracle.account_id = Some(account);
                }
            }
            OracleProvider::OpenAi => {
                if let Some(key) = var("OPENAI_API_KEY") {
                    self.oracle.api_key = Some(key);
                }
            }
        }
        if let Some(model) = var("PILOT_ORACLE_MODEL") {
            self.oracle.model = model;
        }
        if let Some(headless) = var("PILOT_HEADLESS") {
            self.browser.headless = !matches!(headless.as_str(), "0" | "false" | "no");
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.executor.snippet_max_length == 0 || self.translator.max_content_length == 0 {
            return Err(AgentError::Configuration(
                "content length limits must be positive".to_string(),
            ));
        }
        if self.oracle.api_key.is_none() {
            return Err(AgentError::Configuration(
                "missing oracle API key".to_string(),
            ));
        }
        if self.oracle.provider == OracleProvider::Cloudflare && self.oracle.account_id.is_none() {
            return Err(AgentError::Configuration(
                "missing Cloudflare account id".to_string(),
            ));
        }
        Ok(())
    }
}
