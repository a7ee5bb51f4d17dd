use crate::browser::BrowserSession;
use crate::core::config::TranslatorConfig;
use crate::core::{BrowserTrait, WaitPolicy};
use crate::dom::DomProcessor;
use crate::errors::{AgentError, Result};
use crate::llm::parse::{decode_actions, decode_url};
use crate::llm::Oracle;
use crate::types::{Action, ActionPlan};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Natural language in, [`ActionPlan`] out, via two oracle calls.
pub struct CommandTranslator {
    oracle: Arc<dyn Oracle>,
    processor: DomProcessor,
    wait: WaitPolicy,
}

impl CommandTranslator {
    pub fn new(oracle: Arc<dyn Oracle>, config: &TranslatorConfig, wait: WaitPolicy) -> Self {
        Self {
            oracle,
            processor: DomProcessor::new(config.max_content_length),
            wait,
        }
    }

    /// Never fails: every problem becomes a plan with `status = error`.
    pub async fn translate<B: BrowserTrait>(
        &self,
        session: &mut BrowserSession<B>,
        command: &str,
        context: Option<&str>,
    ) -> ActionPlan {
        let request_id = uuid::Uuid::new_v4().to_string();
        match self.build_plan(session, command, context).await {
            Ok(actions) => {
                info!(%request_id, actions = actions.len(), "command translated");
                ActionPlan::ready(request_id, actions, "Command translated successfully")
            }
            Err(e) => {
                error!(%request_id, error = %e, "command translation failed");
                ActionPlan::error(request_id, format!("Error during translation: {e}"))
            }
        }
    }

    async fn build_plan<B: BrowserTrait>(
        &self,
        session: &mut BrowserSession<B>,
        command: &str,
        context: Option<&str>,
    ) -> Result<Vec<Action>> {
        info!("extracting navigation URL from command");
        let url = decode_url(&self.oracle.generate(&navigation_prompt(command)).await?);
        info!(%url, "extracted URL");

        session
            .navigate(&url, self.wait)
            .await
            .map_err(|e| AgentError::Translation(format!("failed to navigate to {url}: {e}")))?;

        let html = session.content().await?;
        let pruned = self.processor.prune(&html);

        let reply = self
            .oracle
            .generate(&action_prompt(command, context, &pruned))
            .await?;
        let decoded = decode_actions(&reply)?;
        if decoded.dropped > 0 {
            warn!(dropped = decoded.dropped, "oracle returned invalid actions");
        }

        let actions: Vec<Action> = decoded
            .actions
            .into_iter()
            .filter(|action| {
                if action.is_navigate() {
                    warn!(%action, "skipping navigation after the initial page");
                }
                !action.is_navigate()
            })
            .collect();
        if actions.is_empty() {
            return Err(AgentError::Translation(
                "the oracle found no actionable steps for this command".to_string(),
            ));
        }

        let mut plan = Vec::with_capacity(actions.len() + 1);
        plan.push(Action::Navigate { url });
        plan.extend(actions);
        Ok(plan)
    }
}

fn navigation_prompt(command: &str) -> String {
    format!(
        r#"Extract ONLY the URL to navigate to from this command: "{command}"

If the command implies navigation to a website but doesn't specify a full URL,
provide a complete URL including https:// prefix.

For example:
- For "go to github", return "https://github.com"
- For "search for cats on Google", return "https://google.com"
- For "check CNN news", return "https://cnn.com"

Return ONLY the URL, nothing else."#
    )
}

fn action_prompt(command: &str, context: Option<&str>, html: &str) -> String {
    let mut prompt = format!(
        "Based on the current webpage HTML and the user's command, determine the appropriate browser actions to execute.\n\nCommand: {command}\n"
    );
    if let Some(context) = context.filter(|c| !c.trim().is_empty()) {
        prompt.push_str(&format!("Additional context: {context}\n"));
    }
    prompt.push_str(&format!(
        r##"
Current webpage HTML:
```html
{html}
```

Use these action types:
- click(locator: str): Click on an element
- fill(locator: str, text: str): Fill a form field
- wait(time_ms: int): Wait for a specific time
- submit(locator: str): Submit a form
- press(key: str): Press a key
- select(locator: str, value: str): Select an option from a dropdown
- hover(locator: str): Hover over an element
- screenshot(): Take a screenshot

For locators, prioritize using specific selectors like:
- id selectors (e.g., "#login-field")
- input fields with specific attributes (e.g., "input[name='password']")
- role selectors (e.g., "role:textbox[name='Username']")

Return your response as a JSON array of actions. Each action is an object with an "action" field and its parameters.

Example output for filling a login form:
```json
[
  {{"action": "fill", "locator": "input[name='login']", "text": "username"}},
  {{"action": "fill", "locator": "input[name='password']", "text": "password"}},
  {{"action": "click", "locator": "input[type='submit']"}}
]
```

Only respond with valid JSON. Do not include any other text in your response."##
    ));
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::BrowserConfig;
    use crate::llm::ScriptedOracle;
    use crate::testing::FakeBrowser;
    use crate::types::PlanStatus;

    fn translator(oracle: &ScriptedOracle) -> CommandTranslator {
        CommandTranslator::new(
            Arc::new(oracle.clone()),
            &TranslatorConfig::default(),
            WaitPolicy::Load,
        )
    }

    #[tokio::test]
    async fn builds_plan_after_initial_navigation() {
        let fake = FakeBrowser::new();
        fake.set_html("<html><body><form><input name='q'></form></body></html>");
        let oracle = ScriptedOracle::new().with_response("duckduckgo.com").with_response(
            r#"```json
[{"action": "navigate", "url": "https://elsewhere.com"},
 {"action": "fill", "locator": "input[name='q']", "text": "rust"},
 {"action": "press", "key": "Enter"}]
```"#,
        );
        let mut session = BrowserSession::new(fake.clone(), BrowserConfig::default());

        let plan = translator(&oracle)
            .translate(&mut session, "search rust on duckduckgo", Some("be quick"))
            .await;

        assert_eq!(plan.status, PlanStatus::Ready);
        assert_eq!(
            plan.actions,
            vec![
                Action::Navigate {
                    url: "https://duckduckgo.com".into()
                },
                Action::Fill {
                    locator: "input[name='q']".into(),
                    text: "rust".into()
                },
                Action::Press { key: "Enter".into() },
            ]
        );
        assert_eq!(fake.navigations(), vec!["https://duckduckgo.com"]);

        let prompts = oracle.prompts();
        assert!(prompts[0].contains("search rust on duckduckgo"));
        assert!(prompts[1].contains("Additional context: be quick"));
        assert!(prompts[1].contains("<input name=\"q\">"));
    }

    #[tokio::test]
    async fn unparsable_reply_yields_error_plan() {
        let fake = FakeBrowser::new();
        let oracle = ScriptedOracle::new()
            .with_response("https://example.com")
            .with_response("Sorry, I am not sure what you mean.");
        let mut session = BrowserSession::new(fake, BrowserConfig::default());

        let plan = translator(&oracle).translate(&mut session, "do a thing", None).await;
        assert_eq!(plan.status, PlanStatus::Error);
        assert!(plan.actions.is_empty());
        assert!(!plan.message.is_empty());
    }

    #[tokio::test]
    async fn navigation_failure_yields_error_plan() {
        let fake = FakeBrowser::new();
        fake.fail_navigation(true);
        let oracle = ScriptedOracle::new().with_response("nowhere.invalid");
        let mut session = BrowserSession::new(fake, BrowserConfig::default());

        let plan = translator(&oracle).translate(&mut session, "go nowhere", None).await;
        assert!(!plan.is_ready());
        assert!(plan.message.contains("https://nowhere.invalid"));
        assert_eq!(oracle.prompts().len(), 1);
    }

    #[tokio::test]
    async fn plan_with_only_navigation_is_not_actionable() {
        let fake = FakeBrowser::new();
        let oracle = ScriptedOracle::new()
            .with_response("https://example.com")
            .with_response(r#"[{"action": "navigate", "url": "https://example.com"}]"#);
        let mut session = BrowserSession::new(fake, BrowserConfig::default());

        let plan = translator(&oracle).translate(&mut session, "open example", None).await;
        assert_eq!(plan.status, PlanStatus::Error);
        assert!(plan.actions.is_empty());
    }

    #[tokio::test]
    async fn oracle_outage_yields_error_plan() {
        let fake = FakeBrowser::new();
        let oracle = ScriptedOracle::new().with_error("503 Service Unavailable");
        let mut session = BrowserSession::new(fake, BrowserConfig::default());

        let plan = translator(&oracle).translate(&mut session, "anything", None).await;
        assert_eq!(plan.status, PlanStatus::Error);
        assert!(plan.message.contains("503"));
    }

    #[test]
    fn action_prompt_keeps_selector_examples_and_context() {
        let prompt = action_prompt("log in", Some("use the work account"), "<form></form>");
        assert!(prompt.contains(r##"id selectors (e.g., "#login-field")"##));
        assert!(prompt.contains("Additional context: use the work account"));
        assert!(prompt.contains("```html\n<form></form>\n```"));
        assert!(prompt.ends_with("Do not include any other text in your response."));
        assert!(prompt.contains(r#"{"action": "click", "locator": "input[type='submit']"}"#));
    }
}
