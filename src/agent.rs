use crate::browser::BrowserSession;
use crate::core::config::Config;
use crate::core::BrowserTrait;
use crate::executor::ActionExecutor;
use crate::llm::Oracle;
use crate::translator::CommandTranslator;
use crate::types::{Action, ActionPlan, ExecutionResult};
use std::sync::Arc;

/// One session with the translator and executor that drive it.
///
/// An agent runs one plan at a time; `&mut self` on every operation makes
/// that exclusive.
pub struct Agent<B: BrowserTrait> {
    session: BrowserSession<B>,
    translator: CommandTranslator,
    executor: ActionExecutor,
}

impl<B: BrowserTrait> Agent<B> {
    pub fn new(browser: B, oracle: Arc<dyn Oracle>, config: &Config) -> Self {
        Self {
            session: BrowserSession::new(browser, config.browser.clone()),
            translator: CommandTranslator::new(
                oracle.clone(),
                &config.translator,
                config.browser.wait_policy,
            ),
            executor: ActionExecutor::new(oracle, config),
        }
    }

    pub async fn translate(&mut self, command: &str, context: Option<&str>) -> ActionPlan {
        self.translator
            .translate(&mut self.session, command, context)
            .await
    }

    pub async fn execute(&mut self, actions: &[Action], request_id: &str) -> ExecutionResult {
        self.executor
            .execute(&mut self.session, actions, request_id)
            .await
    }

    /// Translate, then execute a ready plan. Error plans come back with a
    /// failed result and nothing is executed.
    pub async fn run(
        &mut self,
        command: &str,
        context: Option<&str>,
    ) -> (ActionPlan, ExecutionResult) {
        let plan = self.translate(command, context).await;
        if !plan.is_ready() {
            let mut result = ExecutionResult::new(plan.request_id.clone());
            result.fail("Command could not be translated", plan.message.clone());
            return (plan, result);
        }
        let result = self.execute(&plan.actions, &plan.request_id).await;
        (plan, result)
    }

    pub async fn stop(&mut self) {
        self.session.stop().await;
    }

    pub fn session(&self) -> &BrowserSession<B> {
        &self.session
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{ExecutorConfig, ResolverConfig};
    use crate::llm::ScriptedOracle;
    use crate::testing::{FakeBrowser, FakeElement};

    #[tokio::test]
    async fn run_translates_then_executes_on_same_session() {
        let fake = FakeBrowser::new();
        fake.set_html("<html><body><button id='go'>Go</button></body></html>");
        fake.add_element(FakeElement::new("button").css("#go"));
        let oracle = ScriptedOracle::new()
            .with_response("example.com")
            .with_response(r##"[{"action": "click", "locator": "#go"}]"##);
        let config = Config {
            resolver: ResolverConfig {
                step_timeout_ms: 0,
                poll_interval_ms: 0,
            },
            executor: ExecutorConfig {
                settle_delay_ms: 0,
                retry_delay_ms: 0,
                ..Default::default()
            },
            ..Default::default()
        };
        let mut agent = Agent::new(fake.clone(), Arc::new(oracle), &config);

        let (plan, result) = agent.run("click go on example.com", None).await;
        assert!(plan.is_ready());
        assert!(result.success);
        assert_eq!(result.request_id, plan.request_id);
        assert_eq!(fake.launch_count(), 1);

        agent.stop().await;
        assert!(!agent.session().is_started());
    }

    #[tokio::test]
    async fn error_plan_is_not_executed() {
        let fake = FakeBrowser::new();
        let oracle = ScriptedOracle::new()
            .with_response("example.com")
            .with_response("nothing to do here");
        let mut agent = Agent::new(fake.clone(), Arc::new(oracle), &Config::default());

        let (plan, result) = agent.run("hello", None).await;
        assert!(!plan.is_ready());
        assert!(!result.success);
        assert_eq!(fake.events(), vec!["navigate https://example.com"]);
    }
}
