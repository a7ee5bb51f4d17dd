//! Deterministic oracle for tests.

use crate::errors::{AgentError, Result};
use crate::llm::Oracle;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Returns queued replies in order and records every prompt it was sent.
///
/// ```
/// use browser_pilot::llm::ScriptedOracle;
/// let oracle = ScriptedOracle::new()
///     .with_response("https://example.com")
///     .with_response(r##"[{"action": "click", "locator": "#go"}]"##);
/// assert_eq!(oracle.remaining(), 2);
/// ```
#[derive(Clone, Default)]
pub struct ScriptedOracle {
    replies: Arc<Mutex<VecDeque<std::result::Result<String, String>>>>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(self, text: &str) -> Self {
        self.lock_replies().push_back(Ok(text.to_string()));
        self
    }

    pub fn with_error(self, message: &str) -> Self {
        self.lock_replies().push_back(Err(message.to_string()));
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    pub fn remaining(&self) -> usize {
        self.lock_replies().len()
    }

    fn lock_replies(&self) -> std::sync::MutexGuard<'_, VecDeque<std::result::Result<String, String>>> {
        self.replies.lock().unwrap_or_else(|p| p.into_inner())
    }
}

#[async_trait]
impl Oracle for ScriptedOracle {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(prompt.to_string());
        match self.lock_replies().pop_front() {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(AgentError::Oracle(message)),
            None => Err(AgentError::Oracle("no scripted reply left".to_string())),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn replays_in_order_and_records_prompts() {
        let oracle = ScriptedOracle::new().with_response("one").with_error("boom");
        assert_eq!(oracle.generate("first").await.unwrap(), "one");
        tokio_test::assert_err!(oracle.generate("second").await);
        tokio_test::assert_err!(oracle.generate("third").await);
        assert_eq!(oracle.prompts(), vec!["first", "second", "third"]);
    }
}
