use crate::browser::scripts;
use crate::core::config::{BrowserConfig, WaitPolicy};
use crate::core::{BrowserTrait, ElementOp, Target};
use crate::errors::{AgentError, Result};
use crate::types::ElementInfo;
use async_trait::async_trait;
use headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption;
use headless_chrome::protocol::cdp::Runtime;
use headless_chrome::{Browser, LaunchOptions, Tab};
use serde_json::Value;
use std::ffi::OsStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Quiet period used by [`WaitPolicy::NetworkIdle`].
const NETWORK_IDLE_QUIET_MS: u64 = 500;

/// Chrome browser implementation.
///
/// headless_chrome is a blocking client, so every call runs on tokio's
/// blocking pool and never holds up the async workers.
pub struct ChromeBrowser {
    browser: Option<Browser>,
}

impl ChromeBrowser {
    pub fn new() -> Self {
        Self { browser: None }
    }
}

impl Default for ChromeBrowser {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs a blocking browser call on the blocking pool.
async fn blocking<T, F>(task: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| AgentError::from_any_error(format!("browser task aborted: {e}")))?
}

/// Like [`blocking`], but gives up after `timeout_ms`. The call itself keeps
/// running on the pool until headless_chrome's own timeout ends it.
async fn blocking_within<T, F>(timeout_ms: u64, what: &str, task: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    match tokio::time::timeout(Duration::from_millis(timeout_ms), blocking(task)).await {
        Ok(result) => result,
        Err(_) => Err(AgentError::Timeout(format!("{what} exceeded {timeout_ms}ms"))),
    }
}

/// headless_chrome reports a dead transport through its error text only.
fn classify(err: impl std::fmt::Display) -> AgentError {
    let message = err.to_string();
    let lower = message.to_lowercase();
    if lower.contains("connection is closed")
        || lower.contains("connection closed")
        || lower.contains("transport")
        || lower.contains("no such target")
        || lower.contains("target closed")
    {
        AgentError::Disconnected(message)
    } else {
        AgentError::from_any_error(message)
    }
}

/// Evaluates `expression` with the result returned by value, so objects
/// arrive as JSON rather than as remote references.
fn evaluate(tab: &Tab, expression: &str, await_promise: bool) -> Result<Value> {
    let reply = tab
        .call_method(Runtime::Evaluate {
            expression: expression.to_string(),
            return_by_value: Some(true),
            generate_preview: Some(false),
            silent: Some(false),
            await_promise: Some(await_promise),
            include_command_line_api: Some(false),
            user_gesture: Some(false),
            object_group: None,
            context_id: None,
            throw_on_side_effect: None,
            timeout: None,
            disable_breaks: None,
            repl_mode: None,
            allow_unsafe_eval_blocked_by_csp: None,
            unique_context_id: None,
            serialization_options: None,
        })
        .map_err(classify)?;
    let exception = reply
        .exception_details
        .map(|details| details.exception.and_then(|e| e.description).unwrap_or(details.text));
    script_value(reply.result.value, exception)
}

/// A thrown script is an error; a script returning `undefined` yields null.
fn script_value(value: Option<Value>, exception: Option<String>) -> Result<Value> {
    match exception {
        Some(message) => Err(AgentError::JavaScriptFailed(message)),
        None => Ok(value.unwrap_or(Value::Null)),
    }
}

fn decode_elements(result: &Value, target: &Target) -> Result<Vec<ElementInfo>> {
    if !result.get("ok").and_then(Value::as_bool).unwrap_or(false) {
        check_outcome(result, target, 0)?;
    }
    let elements = result.get("elements").cloned().unwrap_or(Value::Array(vec![]));
    Ok(serde_json::from_value(elements)?)
}

fn check_outcome(result: &Value, target: &Target, index: usize) -> Result<()> {
    if result.get("ok").and_then(Value::as_bool).unwrap_or(false) {
        return Ok(());
    }
    let error = result
        .get("error")
        .and_then(Value::as_str)
        .unwrap_or("unknown error")
        .to_string();
    let code = result.get("code").and_then(Value::as_str).unwrap_or("error");
    Err(match code {
        "not_found" => {
            let count = result.get("count").and_then(Value::as_u64).unwrap_or(0);
            AgentError::ElementNotFound(format!(
                "{target} (wanted match #{}, found {count})",
                index + 1
            ))
        }
        "not_interactable" => AgentError::NotInteractable(format!("{target}: {error}")),
        "invalid_selector" => {
            AgentError::InvalidAction(format!("invalid selector {target}: {error}"))
        }
        "invalid" => AgentError::InvalidAction(format!("{target}: {error}")),
        _ => AgentError::JavaScriptFailed(format!("{target}: {error}")),
    })
}

fn launch_blocking(config: BrowserConfig) -> Result<Browser> {
    let mut args: Vec<String> = vec![
        "--no-sandbox".to_string(),
        "--disable-dev-shm-usage".to_string(),
        "--disable-setuid-sandbox".to_string(),
        "--disable-gpu".to_string(),
    ];
    if let Some(ua) = &config.user_agent {
        args.push(format!("--user-agent={ua}"));
    }
    args.extend(config.args.iter().cloned());
    let os_args: Vec<&OsStr> = args.iter().map(OsStr::new).collect();

    let launch_options = LaunchOptions::default_builder()
        .headless(config.headless)
        .window_size(Some((config.viewport.width, config.viewport.height)))
        .ignore_certificate_errors(config.ignore_certificate_errors)
        .idle_browser_timeout(Duration::from_secs(600))
        .args(os_args)
        .build()
        .map_err(|e| AgentError::LaunchFailed(e.to_string()))?;

    Browser::new(launch_options).map_err(|e| AgentError::LaunchFailed(e.to_string()))
}

#[async_trait]
impl BrowserTrait for ChromeBrowser {
    type TabHandle = Arc<Tab>;

    async fn launch(&mut self, config: &BrowserConfig) -> Result<()> {
        let config = config.clone();
        let browser = blocking(move || launch_blocking(config)).await?;
        self.browser = Some(browser);
        Ok(())
    }

    async fn new_tab(&self, config: &BrowserConfig) -> Result<Self::TabHandle> {
        let browser = self
            .browser
            .clone()
            .ok_or(AgentError::BrowserNotLaunched)?;
        let timeout = Duration::from_millis(config.default_timeout_ms);

        blocking(move || {
            let tab = browser
                .new_tab()
                .map_err(|e| AgentError::LaunchFailed(e.to_string()))?;
            tab.set_default_timeout(timeout);
            Ok(tab)
        })
        .await
    }

    async fn navigate(
        &self,
        tab: &Self::TabHandle,
        url: &str,
        wait: WaitPolicy,
        timeout_ms: u64,
    ) -> Result<()> {
        let tab = tab.clone();
        let target = url.to_string();
        // Network idle gets its own budget on top of the load.
        let budget = match wait {
            WaitPolicy::NetworkIdle => timeout_ms.saturating_mul(2),
            _ => timeout_ms,
        };

        blocking_within(budget, &format!("navigation to {url}"), move || {
            tab.navigate_to(&target)
                .map_err(|e| AgentError::NavigationFailed(format!("{target}: {e}")))?;
            if wait == WaitPolicy::Commit {
                return Ok(());
            }

            tab.wait_until_navigated()
                .map_err(|e| AgentError::NavigationFailed(format!("{target}: {e}")))?;

            if wait == WaitPolicy::NetworkIdle {
                let idle = evaluate(
                    &tab,
                    &scripts::network_idle(NETWORK_IDLE_QUIET_MS, timeout_ms),
                    true,
                )
                .ok()
                .and_then(|v| v.as_bool())
                .unwrap_or(false);
                if !idle {
                    debug!(url = %target, "network did not go idle, continuing with loaded page");
                }
            }
            Ok(())
        })
        .await
    }

    async fn execute_script(&self, tab: &Self::TabHandle, script: &str) -> Result<Value> {
        let tab = tab.clone();
        let script = script.to_string();
        blocking(move || evaluate(&tab, &script, false)).await
    }

    async fn content(&self, tab: &Self::TabHandle) -> Result<String> {
        let value = self.execute_script(tab, scripts::CONTENT).await?;
        value.as_str().map(str::to_string).ok_or_else(|| {
            AgentError::JavaScriptFailed("document markup is not a string".to_string())
        })
    }

    async fn body_html(&self, tab: &Self::TabHandle) -> Result<String> {
        let value = self.execute_script(tab, scripts::BODY_HTML).await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn query(&self, tab: &Self::TabHandle, target: &Target) -> Result<Vec<ElementInfo>> {
        let result = self.execute_script(tab, &scripts::query(target)).await?;
        decode_elements(&result, target)
    }

    async fn perform(
        &self,
        tab: &Self::TabHandle,
        target: &Target,
        index: usize,
        op: &ElementOp,
    ) -> Result<()> {
        let result = self
            .execute_script(tab, &scripts::perform(target, index, op))
            .await?;
        check_outcome(&result, target, index)
    }

    async fn press_key(&self, tab: &Self::TabHandle, key: &str) -> Result<()> {
        let tab = tab.clone();
        let key = key.to_string();
        blocking(move || {
            tab.press_key(&key).map_err(classify)?;
            Ok(())
        })
        .await
    }

    async fn take_screenshot(&self, tab: &Self::TabHandle) -> Result<Vec<u8>> {
        let tab = tab.clone();
        blocking(move || {
            tab.capture_screenshot(CaptureScreenshotFormatOption::Png, None, None, true)
                .map_err(|e| AgentError::ScreenshotFailed(e.to_string()))
        })
        .await
    }

    fn is_running(&self) -> bool {
        self.browser.is_some()
    }

    async fn close(&mut self) -> Result<()> {
        // Dropping the last handle kills the child process.
        if let Some(browser) = self.browser.take() {
            blocking(move || {
                drop(browser);
                Ok(())
            })
            .await?;
        }
        Ok(())
    }
}
