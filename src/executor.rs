//! Runs an action plan against one session.
//!
//! Actions run strictly in order. A failing action is classified as a
//! connectivity failure (the session is gone) or a logic failure (the
//! action itself is wrong). Connectivity failures recreate the session and
//! retry for free, up to `max_reconnects` per action. Logic failures go to
//! the troubleshooting oracle, up to `max_repair_attempts` per action; once
//! the budget is spent the plan aborts.

use crate::browser::BrowserSession;
use crate::core::config::{Config, ExecutorConfig};
use crate::core::{BrowserTrait, ElementOp, WaitPolicy};
use crate::errors::{AgentError, Result};
use crate::llm::Oracle;
use crate::resolver::LocatorResolver;
use crate::troubleshoot::TroubleshootingClient;
use crate::types::{Action, ActionOutcome, ExecutionResult, StepStatus};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

const DEFAULT_WAIT_MS: u64 = 1000;

pub struct ActionExecutor {
    resolver: LocatorResolver,
    troubleshooter: TroubleshootingClient,
    config: ExecutorConfig,
    wait: WaitPolicy,
}

impl ActionExecutor {
    pub fn new(oracle: Arc<dyn Oracle>, config: &Config) -> Self {
        Self {
            resolver: LocatorResolver::new(&config.resolver),
            troubleshooter: TroubleshootingClient::new(oracle, config.executor.snippet_max_length),
            config: config.executor.clone(),
            wait: config.browser.wait_policy,
        }
    }

    pub async fn execute<B: BrowserTrait>(
        &self,
        session: &mut BrowserSession<B>,
        actions: &[Action],
        request_id: &str,
    ) -> ExecutionResult {
        let mut result = ExecutionResult::new(request_id);
        result.steps = actions
            .iter()
            .enumerate()
            .map(|(index, action)| ActionOutcome {
                index,
                action: action.clone(),
                status: StepStatus::Pending,
                repair_attempts: 0,
                reconnects: 0,
                error: None,
            })
            .collect();

        match session.ensure_live().await {
            Ok(true) => info!(request_id, "browser session recreated before execution"),
            Ok(false) => {}
            Err(e) => {
                error!(request_id, error = %e, "could not start browser");
                result.fail("Failed to start browser", e.to_string());
                self.finish(session, &mut result).await;
                return result;
            }
        }

        let total = actions.len();
        for (index, planned) in actions.iter().enumerate() {
            info!(request_id, step = index + 1, total, action = %planned, "executing action");
            if let Err(e) = self
                .run_step(session, index, planned, &mut result)
                .await
            {
                error!(request_id, step = index + 1, error = %e, "aborting plan");
                let last_error = match &e {
                    AgentError::RepairExhausted { last_error, .. } => last_error.clone(),
                    other => other.to_string(),
                };
                result.fail(
                    format!("Failed to execute action {}: {e}", index + 1),
                    last_error,
                );
                break;
            }
        }

        self.finish(session, &mut result).await;
        result
    }

    /// Drives one action to a terminal state, repairing and reconnecting as
    /// allowed. An error here aborts the plan.
    async fn run_step<B: BrowserTrait>(
        &self,
        session: &mut BrowserSession<B>,
        index: usize,
        planned: &Action,
        result: &mut ExecutionResult,
    ) -> Result<()> {
        let mut action = planned.clone();
        let mut repairs = 0u32;
        let mut reconnects = 0u32;

        loop {
            if session.ensure_live().await? {
                reconnects += 1;
            }

            let outcome = self.perform(session, &action, result).await;
            let step = &mut result.steps[index];
            step.action = action.clone();
            step.repair_attempts = repairs;
            step.reconnects = reconnects;

            let err = match outcome {
                Ok(()) => {
                    step.status = StepStatus::Succeeded;
                    step.error = None;
                    self.pause(self.config.settle_delay_ms).await;
                    return Ok(());
                }
                Err(e) => e,
            };
            step.status = StepStatus::Failed;
            step.error = Some(err.to_string());

            if err.is_connectivity() || !session.is_alive().await {
                if reconnects >= self.config.max_reconnects {
                    return Err(err);
                }
                warn!(step = index + 1, error = %err, "browser connection lost, recreating session");
                session.restart().await?;
                reconnects += 1;
                result.steps[index].reconnects = reconnects;
                continue;
            }

            if repairs >= self.config.max_repair_attempts {
                return Err(AgentError::RepairExhausted {
                    attempts: repairs,
                    last_error: err.to_string(),
                });
            }

            warn!(
                step = index + 1,
                attempt = repairs + 1,
                error = %err,
                "action failed, asking oracle for a repair"
            );
            action = self
                .troubleshooter
                .troubleshoot(session, &action, &err.to_string())
                .await;
            repairs += 1;
            result.steps[index].repair_attempts = repairs;
            self.pause(self.config.retry_delay_ms).await;
        }
    }

    async fn perform<B: BrowserTrait>(
        &self,
        session: &mut BrowserSession<B>,
        action: &Action,
        result: &mut ExecutionResult,
    ) -> Result<()> {
        if let Some(locator) = action.locator() {
            if locator.trim().is_empty() {
                return Err(AgentError::InvalidAction(format!(
                    "locator is required for {} action",
                    action.name()
                )));
            }
        }

        match action {
            Action::Navigate { url } => {
                if url.trim().is_empty() {
                    return Err(AgentError::InvalidAction(
                        "URL is required for navigate action".to_string(),
                    ));
                }
                session.navigate(url, self.wait).await
            }
            Action::Click { locator } => self.resolver.click(session, locator).await,
            Action::Fill { locator, text } => self.resolver.fill(session, locator, text).await,
            Action::Wait { time_ms } => {
                tokio::time::sleep(Duration::from_millis(time_ms.unwrap_or(DEFAULT_WAIT_MS)))
                    .await;
                Ok(())
            }
            Action::Submit { locator } => {
                self.resolver
                    .act(session, locator, ElementOp::SubmitForm)
                    .await
            }
            Action::Press { key } => {
                if key.trim().is_empty() {
                    return Err(AgentError::InvalidAction(
                        "key is required for press action".to_string(),
                    ));
                }
                session.keyboard_press(key).await
            }
            Action::Select { locator, value } => {
                self.resolver
                    .act(session, locator, ElementOp::SelectOption(value.clone()))
                    .await
            }
            Action::Hover { locator } => {
                self.resolver.act(session, locator, ElementOp::Hover).await
            }
            Action::Screenshot => {
                result.screenshot = Some(session.screenshot().await?);
                Ok(())
            }
            Action::Extract => {
                debug!("extract is not implemented yet, skipping");
                Ok(())
            }
        }
    }

    /// Final screenshot, whatever the outcome. Capture problems are only
    /// logged.
    async fn finish<B: BrowserTrait>(
        &self,
        session: &BrowserSession<B>,
        result: &mut ExecutionResult,
    ) {
        if session.is_started() {
            match session.screenshot().await {
                Ok(bytes) => result.screenshot = Some(bytes),
                Err(e) => warn!(error = %e, "failed to capture final screenshot"),
            }
        }
        result.completed_at = Utc::now();
        info!(
            request_id = %result.request_id,
            success = result.success,
            repairs = result.total_repair_attempts(),
            "execution finished"
        );
    }

    async fn pause(&self, ms: u64) {
        if ms > 0 {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
    }
}
