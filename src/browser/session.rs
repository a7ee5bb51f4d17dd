use crate::browser::scripts;
use crate::core::config::{BrowserConfig, WaitPolicy};
use crate::core::{BrowserTrait, ElementOp, Target};
use crate::dom::truncate_with_marker;
use crate::errors::{AgentError, Result};
use crate::types::ElementInfo;
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Owns one controlled page surface.
///
/// Creation is lazy: nothing is launched until [`start`](Self::start) or the
/// first operation that needs a page. A session may be torn down and
/// restarted any number of times; [`stop`](Self::stop) is idempotent.
pub struct BrowserSession<B: BrowserTrait> {
    browser: B,
    tab: Option<B::TabHandle>,
    config: BrowserConfig,
    session_id: String,
    current_url: Option<String>,
    launches: u32,
}

impl<B: BrowserTrait> BrowserSession<B> {
    pub fn new(browser: B, config: BrowserConfig) -> Self {
        Self {
            browser,
            tab: None,
            config,
            session_id: uuid::Uuid::new_v4().to_string(),
            current_url: None,
            launches: 0,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn is_started(&self) -> bool {
        self.tab.is_some() && self.browser.is_running()
    }

    /// Number of successful launches over the session's lifetime.
    pub fn launches(&self) -> u32 {
        self.launches
    }

    /// Last URL navigated to, restored after a restart.
    pub fn current_url(&self) -> Option<&str> {
        self.current_url.as_deref()
    }

    pub fn browser(&self) -> &B {
        &self.browser
    }

    /// Launches the browser and opens the working tab. A no-op when already
    /// started. Failures surface as [`AgentError::LaunchFailed`].
    pub async fn start(&mut self, headless: bool) -> Result<()> {
        if self.is_started() {
            return Ok(());
        }
        self.config.headless = headless;

        if let Err(e) = self.browser.launch(&self.config).await {
            self.stop().await;
            return Err(as_launch_failure(e));
        }

        match self.browser.new_tab(&self.config).await {
            Ok(tab) => self.tab = Some(tab),
            Err(e) => {
                self.stop().await;
                return Err(as_launch_failure(e));
            }
        }

        self.launches += 1;
        info!(
            session_id = %self.session_id,
            headless,
            launches = self.launches,
            "browser session started"
        );
        Ok(())
    }

    async fn ensure_started(&mut self) -> Result<()> {
        if !self.is_started() {
            let headless = self.config.headless;
            self.start(headless).await?;
        }
        Ok(())
    }

    /// Releases the tab and the browser. Safe to call at any time; close
    /// failures are logged and the handles are dropped regardless.
    pub async fn stop(&mut self) {
        let had_tab = self.tab.take().is_some();
        if self.browser.is_running() {
            if let Err(e) = self.browser.close().await {
                warn!(session_id = %self.session_id, error = %e, "browser close failed");
            }
        }
        if had_tab {
            info!(session_id = %self.session_id, "browser session stopped");
        }
    }

    /// Trivial evaluation used as a liveness probe.
    pub async fn is_alive(&self) -> bool {
        self.tab.is_some() && self.evaluate_script(scripts::PROBE).await.is_ok()
    }

    /// Tears the session down and starts a fresh one, reloading the last
    /// navigated URL so a retried action sees the same page.
    pub async fn restart(&mut self) -> Result<()> {
        warn!(session_id = %self.session_id, "restarting browser session");
        self.stop().await;
        let headless = self.config.headless;
        self.start(headless).await?;

        if let Some(url) = self.current_url.clone() {
            let wait = self.config.wait_policy;
            if let Err(e) = self.navigate(&url, wait).await {
                warn!(url = %url, error = %e, "could not restore page after restart");
            }
        }
        Ok(())
    }

    /// Starts the session if needed and restarts it when the probe fails.
    /// Returns `true` when a restart happened.
    pub async fn ensure_live(&mut self) -> Result<bool> {
        if !self.is_started() {
            self.ensure_started().await?;
            return Ok(false);
        }
        if self.is_alive().await {
            return Ok(false);
        }
        warn!(session_id = %self.session_id, "browser connection check failed");
        self.restart().await?;
        Ok(true)
    }

    pub async fn navigate(&mut self, url: &str, wait: WaitPolicy) -> Result<()> {
        self.ensure_started().await?;
        let tab = self.tab.as_ref().ok_or(AgentError::BrowserNotLaunched)?;

        info!(url, "navigating");
        self.browser
            .navigate(tab, url, wait, self.config.navigation_timeout_ms)
            .await?;
        self.current_url = Some(url.to_string());
        Ok(())
    }

    pub async fn evaluate_script(&self, script: &str) -> Result<Value> {
        let tab = self.tab()?;
        self.browser.execute_script(tab, script).await
    }

    pub async fn locate(&self, target: &Target) -> Result<Vec<ElementInfo>> {
        let tab = self.tab()?;
        self.browser.query(tab, target).await
    }

    /// Applies `op` to the `index`-th match of `target`, waiting up to
    /// `timeout` for the element to exist and become interactable.
    pub async fn act(
        &self,
        target: &Target,
        index: usize,
        op: &ElementOp,
        timeout: Duration,
        poll: Duration,
    ) -> Result<()> {
        let tab = self.tab()?;
        let started = Instant::now();
        loop {
            match self.browser.perform(tab, target, index, op).await {
                Ok(()) => return Ok(()),
                Err(e @ (AgentError::ElementNotFound(_) | AgentError::NotInteractable(_))) => {
                    if started.elapsed() >= timeout {
                        debug!(%target, index, op = op.name(), error = %e, "gave up waiting for element");
                        return Err(e);
                    }
                }
                Err(e) => return Err(e),
            }
            tokio::time::sleep(poll).await;
        }
    }

    pub async fn content(&self) -> Result<String> {
        let tab = self.tab()?;
        self.browser.content(tab).await
    }

    /// Body markup bounded to `max_length` characters.
    pub async fn snippet(&self, max_length: usize) -> Result<String> {
        let tab = self.tab()?;
        let html = self.browser.body_html(tab).await?;
        Ok(truncate_with_marker(&html, max_length))
    }

    pub async fn screenshot(&self) -> Result<Vec<u8>> {
        let tab = self.tab()?;
        self.browser.take_screenshot(tab).await
    }

    pub async fn keyboard_press(&self, key: &str) -> Result<()> {
        let tab = self.tab()?;
        self.browser.press_key(tab, key).await
    }

    fn tab(&self) -> Result<&B::TabHandle> {
        self.tab.as_ref().ok_or(AgentError::BrowserNotLaunched)
    }
}

fn as_launch_failure(err: AgentError) -> AgentError {
    match err {
        AgentError::LaunchFailed(_) => err,
        other => AgentError::LaunchFailed(other.to_string()),
    }
}
