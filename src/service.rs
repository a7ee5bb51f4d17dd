use crate::agent::Agent;
use crate::core::config::Config;
use crate::core::BrowserTrait;
use crate::errors::{AgentError, Result};
use crate::llm::Oracle;
use crate::store::{ExecutionStatus, ExecutionStore, HistoryRecord};
use crate::types::{ActionPlan, ExecutionResult};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

pub const DEFAULT_AGENT: &str = "default";

type BrowserFactory<B> = Box<dyn Fn() -> B + Send + Sync>;

/// Front door for callers: translation, execution with bookkeeping, result
/// lookup, history and shutdown.
///
/// Every agent owns one session and sits behind its own async mutex, so a
/// given session never runs two plans at once. Plans sent to different
/// agents run concurrently.
pub struct AgentService<B: BrowserTrait> {
    agents: Mutex<HashMap<String, Arc<Mutex<Agent<B>>>>>,
    new_browser: BrowserFactory<B>,
    oracle: Arc<dyn Oracle>,
    store: Arc<dyn ExecutionStore>,
    config: Config,
}

impl<B: BrowserTrait + 'static> AgentService<B> {
    pub fn new(
        new_browser: impl Fn() -> B + Send + Sync + 'static,
        oracle: Arc<dyn Oracle>,
        store: Arc<dyn ExecutionStore>,
        config: Config,
    ) -> Self {
        Self {
            agents: Mutex::new(HashMap::new()),
            new_browser: Box::new(new_browser),
            oracle,
            store,
            config,
        }
    }

    /// The named agent, created on first use.
    pub async fn agent(&self, name: &str) -> Arc<Mutex<Agent<B>>> {
        let mut agents = self.agents.lock().await;
        agents
            .entry(name.to_string())
            .or_insert_with(|| {
                info!(agent = name, "creating agent");
                Arc::new(Mutex::new(Agent::new(
                    (self.new_browser)(),
                    self.oracle.clone(),
                    &self.config,
                )))
            })
            .clone()
    }

    pub async fn translate(&self, command: &str, context: Option<&str>) -> ActionPlan {
        let agent = self.agent(DEFAULT_AGENT).await;
        let mut agent = agent.lock().await;
        agent.translate(command, context).await
    }

    /// Executes a ready plan on the default agent and records the outcome.
    pub async fn execute(&self, plan: &ActionPlan, command: &str) -> Result<ExecutionResult> {
        self.execute_on(DEFAULT_AGENT, plan, command, None).await
    }

    /// Translates `command` and executes the plan on the default agent.
    pub async fn submit(&self, command: &str, context: Option<&str>) -> Result<ExecutionResult> {
        self.submit_to(DEFAULT_AGENT, command, context).await
    }

    pub async fn submit_to(
        &self,
        agent_name: &str,
        command: &str,
        context: Option<&str>,
    ) -> Result<ExecutionResult> {
        let agent = self.agent(agent_name).await;
        let mut agent = agent.lock().await;

        let plan = agent.translate(command, context).await;
        if !plan.is_ready() || plan.actions.is_empty() {
            warn!(request_id = %plan.request_id, message = %plan.message, "rejecting plan");
            return Err(AgentError::Translation(plan.message));
        }
        self.record_and_run(&mut agent, &plan, command, context).await
    }

    async fn execute_on(
        &self,
        agent_name: &str,
        plan: &ActionPlan,
        command: &str,
        context: Option<&str>,
    ) -> Result<ExecutionResult> {
        if !plan.is_ready() || plan.actions.is_empty() {
            return Err(AgentError::InvalidAction(format!(
                "plan {} has no executable actions",
                plan.request_id
            )));
        }
        let agent = self.agent(agent_name).await;
        let mut agent = agent.lock().await;
        self.record_and_run(&mut agent, plan, command, context).await
    }

    async fn record_and_run(
        &self,
        agent: &mut Agent<B>,
        plan: &ActionPlan,
        command: &str,
        context: Option<&str>,
    ) -> Result<ExecutionResult> {
        self.store.create(&plan.request_id, command).await?;
        let result = agent.execute(&plan.actions, &plan.request_id).await;
        self.store.update(&plan.request_id, &result).await?;
        self.store
            .append_history(HistoryRecord {
                request_id: plan.request_id.clone(),
                command: command.to_string(),
                context: context.map(str::to_string),
                actions: plan.actions.clone(),
                result: result.clone(),
                recorded_at: Utc::now(),
            })
            .await?;
        Ok(result)
    }

    /// Stored result, or a placeholder while the request is still running.
    pub async fn result(&self, request_id: &str) -> Result<ExecutionResult> {
        let record = self
            .store
            .get(request_id)
            .await?
            .ok_or_else(|| AgentError::UnknownRequest(request_id.to_string()))?;
        match (record.status, record.result) {
            (ExecutionStatus::Pending, _) | (_, None) => {
                let mut pending = ExecutionResult::new(request_id);
                pending.success = false;
                pending.message = "Execution in progress".to_string();
                Ok(pending)
            }
            (_, Some(result)) => Ok(result),
        }
    }

    pub async fn history(&self, skip: usize, limit: usize) -> Result<Vec<HistoryRecord>> {
        self.store.history(skip, limit).await
    }

    /// Releases every session. Agents stay registered and relaunch lazily.
    pub async fn stop_all(&self) {
        let agents: Vec<_> = self.agents.lock().await.values().cloned().collect();
        for agent in agents {
            agent.lock().await.stop().await;
        }
        info!("all browser sessions stopped");
    }
}
