use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Browser launch failed: {0}")]
    LaunchFailed(String),

    #[error("Browser not launched")]
    BrowserNotLaunched,

    #[error("Browser disconnected: {0}")]
    Disconnected(String),

    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Element not interactable: {0}")]
    NotInteractable(String),

    #[error("strict mode violation: {locator} resolved to {count} elements")]
    StrictModeViolation { locator: String, count: usize },

    #[error("Timeout error: {0}")]
    Timeout(String),

    #[error("Invalid action: {0}")]
    InvalidAction(String),

    #[error("JavaScript execution failed: {0}")]
    JavaScriptFailed(String),

    #[error("Screenshot failed: {0}")]
    ScreenshotFailed(String),

    #[error("Oracle error: {0}")]
    Oracle(String),

    #[error("Translation failed: {0}")]
    Translation(String),

    #[error("Repair budget exhausted after {attempts} attempts: {last_error}")]
    RepairExhausted { attempts: u32, last_error: String },

    #[error("Unknown request: {0}")]
    UnknownRequest(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AgentError>;

impl AgentError {
    /// True when the failure means the page surface itself is gone, as opposed
    /// to a problem with the action being attempted.
    pub fn is_connectivity(&self) -> bool {
        matches!(
            self,
            AgentError::Disconnected(_) | AgentError::BrowserNotLaunched
        )
    }

    pub fn from_any_error<E: std::fmt::Display>(err: E) -> Self {
        AgentError::JavaScriptFailed(err.to_string())
    }
}

impl From<reqwest::Error> for AgentError {
    fn from(err: reqwest::Error) -> Self {
        AgentError::Oracle(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connectivity_classification() {
        assert!(AgentError::Disconnected("socket closed".into()).is_connectivity());
        assert!(AgentError::BrowserNotLaunched.is_connectivity());
        assert!(!AgentError::ElementNotFound("#login".into()).is_connectivity());
        assert!(!AgentError::Timeout("3000ms".into()).is_connectivity());
    }

    #[test]
    fn strict_mode_message_mentions_count() {
        let err = AgentError::StrictModeViolation {
            locator: "button".into(),
            count: 3,
        };
        assert_eq!(
            err.to_string(),
            "strict mode violation: button resolved to 3 elements"
        );
    }
}
