use crate::core::config::{BrowserConfig, WaitPolicy};
use crate::errors::Result;
use crate::types::ElementInfo;
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;

/// A concrete element query understood by the page surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Css(String),
    XPath(String),
    /// ARIA role, optionally narrowed by accessible name (case-insensitive substring).
    Role { role: String, name: Option<String> },
    /// Innermost elements whose visible text contains (or equals) `text`.
    Text { text: String, exact: bool },
    /// Anchors whose `href` contains the pattern.
    LinkHref(String),
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Css(selector) => write!(f, "{selector}"),
            Target::XPath(xpath) => write!(f, "xpath={xpath}"),
            Target::Role { role, name: Some(name) } => write!(f, "role={role}[name=\"{name}\"]"),
            Target::Role { role, name: None } => write!(f, "role={role}"),
            Target::Text { text, exact: true } => write!(f, "text=\"{text}\""),
            Target::Text { text, exact: false } => write!(f, "text={text}"),
            Target::LinkHref(pattern) => write!(f, "a[href*=\"{pattern}\"]"),
        }
    }
}

/// Operation applied to one located element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementOp {
    Click,
    Fill(String),
    Hover,
    SelectOption(String),
    SubmitForm,
}

impl ElementOp {
    pub fn name(&self) -> &'static str {
        match self {
            ElementOp::Click => "click",
            ElementOp::Fill(_) => "fill",
            ElementOp::Hover => "hover",
            ElementOp::SelectOption(_) => "select",
            ElementOp::SubmitForm => "submit",
        }
    }
}

/// Primitive operations of a controlled page surface.
///
/// `perform` is a single attempt: it fails right away with
/// `ElementNotFound` when `index` is out of range and with `NotInteractable`
/// when the element is hidden or disabled. Waiting is the session's job.
#[async_trait]
pub trait BrowserTrait: Send + Sync {
    type TabHandle: Send + Sync;

    /// Launch a new browser instance
    async fn launch(&mut self, config: &BrowserConfig) -> Result<()>;

    /// Create a new tab/page
    async fn new_tab(&self, config: &BrowserConfig) -> Result<Self::TabHandle>;

    async fn navigate(
        &self,
        tab: &Self::TabHandle,
        url: &str,
        wait: WaitPolicy,
        timeout_ms: u64,
    ) -> Result<()>;

    /// Execute JavaScript in the browser
    async fn execute_script(&self, tab: &Self::TabHandle, script: &str) -> Result<Value>;

    /// Full markup of the current document.
    async fn content(&self, tab: &Self::TabHandle) -> Result<String>;

    /// Inner markup of `<body>`.
    async fn body_html(&self, tab: &Self::TabHandle) -> Result<String>;

    /// All elements matching `target`, in document order.
    async fn query(&self, tab: &Self::TabHandle, target: &Target) -> Result<Vec<ElementInfo>>;

    async fn perform(
        &self,
        tab: &Self::TabHandle,
        target: &Target,
        index: usize,
        op: &ElementOp,
    ) -> Result<()>;

    async fn press_key(&self, tab: &Self::TabHandle, key: &str) -> Result<()>;

    /// Take a screenshot
    async fn take_screenshot(&self, tab: &Self::TabHandle) -> Result<Vec<u8>>;

    /// Check if browser is still running
    fn is_running(&self) -> bool;

    /// Close the browser
    async fn close(&mut self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_display_is_readable() {
        assert_eq!(Target::Css("#go".into()).to_string(), "#go");
        assert_eq!(
            Target::Role {
                role: "button".into(),
                name: Some("Sign in".into())
            }
            .to_string(),
            "role=button[name=\"Sign in\"]"
        );
        assert_eq!(Target::LinkHref("/pricing".into()).to_string(), "a[href*=\"/pricing\"]");
    }
}
