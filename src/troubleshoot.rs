use crate::browser::BrowserSession;
use crate::core::BrowserTrait;
use crate::llm::parse::decode_repair;
use crate::llm::Oracle;
use crate::types::Action;
use std::sync::Arc;
use tracing::{info, warn};

/// Asks the oracle to repair a failed action.
pub struct TroubleshootingClient {
    oracle: Arc<dyn Oracle>,
    snippet_max_length: usize,
}

impl TroubleshootingClient {
    pub fn new(oracle: Arc<dyn Oracle>, snippet_max_length: usize) -> Self {
        Self {
            oracle,
            snippet_max_length,
        }
    }

    /// Returns the oracle's replacement for `action`, or `action` itself when
    /// the session is dead or the oracle gives nothing usable.
    pub async fn troubleshoot<B: BrowserTrait>(
        &self,
        session: &BrowserSession<B>,
        action: &Action,
        error: &str,
    ) -> Action {
        if !session.is_alive().await {
            warn!("browser connection lost, cannot troubleshoot; keeping original action");
            return action.clone();
        }

        let snippet = match session.snippet(self.snippet_max_length).await {
            Ok(snippet) => snippet,
            Err(e) => {
                warn!(error = %e, "failed to read page markup for troubleshooting");
                format!("Error getting HTML: {e}")
            }
        };

        let prompt = match troubleshooting_prompt(action, error, &snippet) {
            Ok(prompt) => prompt,
            Err(e) => {
                warn!(error = %e, "could not describe failed action");
                return action.clone();
            }
        };

        let reply = match self.oracle.generate(&prompt).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(error = %e, "troubleshooting oracle call failed");
                return action.clone();
            }
        };

        match decode_repair(&reply, action) {
            Some(repaired) => {
                info!(from = %action, to = %repaired, "oracle suggested repaired action");
                repaired
            }
            None => action.clone(),
        }
    }
}

fn troubleshooting_prompt(
    action: &Action,
    error: &str,
    snippet: &str,
) -> serde_json::Result<String> {
    let action_json = serde_json::to_string_pretty(action)?;
    Ok(format!(
        r#"I'm trying to automate a browser task but encountered an issue. Please help me fix it.

Failed action:
```json
{action_json}
```

Error message:
```
{error}
```

Current page HTML snippet:
```html
{snippet}
```

Please analyze the issue and suggest a better approach. Specifically:
1. Identify the problem with the current locator/action
2. Suggest a better locator or alternative approach
3. Return your suggestion as a JSON object with the same structure as the failed action, but with improved parameters

For example, if a text locator matched multiple elements, suggest a more specific selector like an ID or attribute selector.

Only respond with valid JSON for the fixed action. Do not include any other text in your response."#
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::BrowserConfig;
    use crate::llm::ScriptedOracle;
    use crate::testing::FakeBrowser;

    async fn started(fake: &FakeBrowser) -> BrowserSession<FakeBrowser> {
        let mut session = BrowserSession::new(fake.clone(), BrowserConfig::default());
        session.start(true).await.unwrap();
        session
    }

    #[tokio::test]
    async fn prompt_carries_action_error_and_bounded_snippet() {
        let fake = FakeBrowser::new();
        fake.set_body_html(&"<div>row</div>".repeat(2000));
        let session = started(&fake).await;
        let oracle = ScriptedOracle::new().with_response(r##"{"locator": "#real"}"##);
        let client = TroubleshootingClient::new(Arc::new(oracle.clone()), 5000);

        let action = Action::Click {
            locator: "#fake".into(),
        };
        let repaired = client
            .troubleshoot(&session, &action, "Element not found: #fake")
            .await;
        assert_eq!(
            repaired,
            Action::Click {
                locator: "#real".into()
            }
        );

        let prompt = &oracle.prompts()[0];
        assert!(prompt.contains(r##""locator": "#fake""##));
        assert!(prompt.contains("Element not found: #fake"));
        assert!(prompt.contains("... [truncated]"));
        assert!(prompt.len() < 7000);
    }

    #[tokio::test]
    async fn dead_session_keeps_original_without_asking() {
        let fake = FakeBrowser::new();
        let session = started(&fake).await;
        fake.disconnect();
        let oracle = ScriptedOracle::new().with_response(r##"{"locator": "#real"}"##);
        let client = TroubleshootingClient::new(Arc::new(oracle.clone()), 5000);

        let action = Action::Hover {
            locator: "#menu".into(),
        };
        assert_eq!(client.troubleshoot(&session, &action, "timeout").await, action);
        assert!(oracle.prompts().is_empty());
    }

    #[tokio::test]
    async fn unusable_reply_keeps_original() {
        let fake = FakeBrowser::new();
        let session = started(&fake).await;
        let oracle = ScriptedOracle::new()
            .with_response("I think the button moved.")
            .with_error("rate limited");
        let client = TroubleshootingClient::new(Arc::new(oracle), 5000);

        let action = Action::Click {
            locator: "#go".into(),
        };
        assert_eq!(client.troubleshoot(&session, &action, "x").await, action);
        assert_eq!(client.troubleshoot(&session, &action, "x").await, action);
    }
}
