//! In-memory page surface for tests.
//!
//! [`FakeBrowser`] implements [`BrowserTrait`] without a real browser.
//! Clones share state, so a test keeps one handle for scripting and
//! assertions while a session owns another.

use crate::core::config::{BrowserConfig, WaitPolicy};
use crate::core::{BrowserTrait, ElementOp, Target};
use crate::errors::{AgentError, Result};
use crate::types::{ElementInfo, ElementRect};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Bytes returned by a successful screenshot.
pub const FAKE_PNG: [u8; 4] = [0x89, b'P', b'N', b'G'];

#[derive(Debug, Clone)]
pub struct FakeElement {
    tag: String,
    label: Option<String>,
    selectors: Vec<String>,
    role: Option<String>,
    name: Option<String>,
    text: Option<String>,
    href: Option<String>,
    attributes: HashMap<String, String>,
    options: Vec<String>,
    visible: bool,
    disabled: bool,
    absent_polls: u32,
    value: String,
}

impl FakeElement {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_lowercase(),
            label: None,
            selectors: Vec::new(),
            role: None,
            name: None,
            text: None,
            href: None,
            attributes: HashMap::new(),
            options: Vec::new(),
            visible: true,
            disabled: false,
            absent_polls: 0,
            value: String::new(),
        }
    }

    /// Name used in the event log instead of the target that matched.
    pub fn label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    /// A CSS or XPath string this element answers to.
    pub fn css(mut self, selector: &str) -> Self {
        self.selectors.push(selector.to_string());
        self
    }

    pub fn role(mut self, role: &str, name: &str) -> Self {
        self.role = Some(role.to_lowercase());
        self.name = Some(name.to_string());
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = Some(text.to_string());
        self
    }

    pub fn href(mut self, href: &str) -> Self {
        self.href = Some(href.to_string());
        self.attributes.insert("href".to_string(), href.to_string());
        self
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attributes.insert(name.to_string(), value.to_string());
        self
    }

    pub fn option(mut self, value: &str) -> Self {
        self.options.push(value.to_string());
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }

    /// The element is missing from the first `polls` lookups.
    pub fn appears_after(mut self, polls: u32) -> Self {
        self.absent_polls = polls;
        self
    }

    fn matches(&self, target: &Target) -> bool {
        match target {
            Target::Css(s) | Target::XPath(s) => self.selectors.iter().any(|own| own == s),
            Target::Role { role, name } => {
                self.role.as_deref() == Some(role.to_lowercase().as_str())
                    && name.as_ref().map_or(true, |wanted| {
                        self.name
                            .as_deref()
                            .unwrap_or_default()
                            .to_lowercase()
                            .contains(&wanted.to_lowercase())
                    })
            }
            Target::Text { text, exact } => self.text.as_deref().map_or(false, |own| {
                let own = own.trim().to_lowercase();
                let wanted = text.trim().to_lowercase();
                if *exact {
                    own == wanted
                } else {
                    own.contains(&wanted)
                }
            }),
            Target::LinkHref(pattern) => self
                .href
                .as_deref()
                .map_or(false, |href| href.contains(pattern.as_str())),
        }
    }

    fn info(&self, index: usize) -> ElementInfo {
        ElementInfo {
            index,
            tag_name: self.tag.clone(),
            element_id: self.attributes.get("id").cloned(),
            class_name: self.attributes.get("class").cloned(),
            text_content: self.text.clone(),
            attributes: self.attributes.clone(),
            visible: self.visible,
            rect: Some(ElementRect {
                x: 0.0,
                y: 0.0,
                width: if self.visible { 100.0 } else { 0.0 },
                height: if self.visible { 20.0 } else { 0.0 },
            }),
        }
    }
}

#[derive(Debug, Default)]
struct FakePageState {
    elements: Vec<FakeElement>,
    html: String,
    body_html: Option<String>,
    running: bool,
    connected: bool,
    generation: u32,
    launches: u32,
    fail_launch: bool,
    fail_close: bool,
    fail_screenshot: bool,
    fail_navigation: bool,
    disconnect_on_perform: bool,
    navigations: Vec<String>,
    events: Vec<String>,
}

impl FakePageState {
    fn check_tab(&self, tab: &u32) -> Result<()> {
        if !self.running {
            return Err(AgentError::BrowserNotLaunched);
        }
        if !self.connected || *tab != self.generation {
            return Err(AgentError::Disconnected(
                "connection to the page was closed".to_string(),
            ));
        }
        Ok(())
    }

    /// Indices of matching elements. Each lookup brings late elements one
    /// poll closer to appearing.
    fn present(&mut self, target: &Target) -> Vec<usize> {
        let mut indices = Vec::new();
        for (i, el) in self.elements.iter_mut().enumerate() {
            if el.absent_polls > 0 {
                el.absent_polls -= 1;
                continue;
            }
            if el.matches(target) {
                indices.push(i);
            }
        }
        indices
    }
}

/// Scriptable page surface shared between a test and the code under test.
#[derive(Debug, Clone, Default)]
pub struct FakeBrowser {
    state: Arc<Mutex<FakePageState>>,
}

impl FakeBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, FakePageState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn add_element(&self, element: FakeElement) {
        self.state().elements.push(element);
    }

    pub fn set_html(&self, html: &str) {
        self.state().html = html.to_string();
    }

    pub fn set_body_html(&self, html: &str) {
        self.state().body_html = Some(html.to_string());
    }

    pub fn fail_launch(&self, fail: bool) {
        self.state().fail_launch = fail;
    }

    pub fn fail_close(&self, fail: bool) {
        self.state().fail_close = fail;
    }

    pub fn fail_screenshot(&self, fail: bool) {
        self.state().fail_screenshot = fail;
    }

    pub fn fail_navigation(&self, fail: bool) {
        self.state().fail_navigation = fail;
    }

    /// Drops the connection; every later page call fails until relaunch.
    pub fn disconnect(&self) {
        self.state().connected = false;
    }

    /// The next element operation drops the connection instead of running.
    pub fn disconnect_on_next_action(&self) {
        self.state().disconnect_on_perform = true;
    }

    pub fn launch_count(&self) -> u32 {
        self.state().launches
    }

    pub fn navigations(&self) -> Vec<String> {
        self.state().navigations.clone()
    }

    /// Navigations, element operations and key presses in the order they
    /// were applied.
    pub fn events(&self) -> Vec<String> {
        self.state().events.clone()
    }

    /// Current value of the element labelled or selected by `key`.
    pub fn value_of(&self, key: &str) -> Option<String> {
        self.state()
            .elements
            .iter()
            .find(|el| el.label.as_deref() == Some(key) || el.selectors.iter().any(|s| s == key))
            .map(|el| el.value.clone())
    }
}

#[async_trait]
impl BrowserTrait for FakeBrowser {
    type TabHandle = u32;

    async fn launch(&mut self, _config: &BrowserConfig) -> Result<()> {
        let mut state = self.state();
        if state.fail_launch {
            return Err(AgentError::LaunchFailed("browser binary not found".to_string()));
        }
        state.running = true;
        state.connected = true;
        state.generation += 1;
        state.launches += 1;
        Ok(())
    }

    async fn new_tab(&self, _config: &BrowserConfig) -> Result<Self::TabHandle> {
        let state = self.state();
        if !state.running {
            return Err(AgentError::BrowserNotLaunched);
        }
        Ok(state.generation)
    }

    async fn navigate(
        &self,
        tab: &Self::TabHandle,
        url: &str,
        _wait: WaitPolicy,
        _timeout_ms: u64,
    ) -> Result<()> {
        let mut state = self.state();
        state.check_tab(tab)?;
        if state.fail_navigation {
            return Err(AgentError::NavigationFailed(format!("{url}: net::ERR_NAME_NOT_RESOLVED")));
        }
        state.navigations.push(url.to_string());
        state.events.push(format!("navigate {url}"));
        Ok(())
    }

    async fn execute_script(&self, tab: &Self::TabHandle, script: &str) -> Result<Value> {
        let state = self.state();
        state.check_tab(tab)?;
        if script.trim() == crate::browser::scripts::PROBE {
            return Ok(json!(2));
        }
        Ok(Value::Null)
    }

    async fn content(&self, tab: &Self::TabHandle) -> Result<String> {
        let state = self.state();
        state.check_tab(tab)?;
        Ok(state.html.clone())
    }

    async fn body_html(&self, tab: &Self::TabHandle) -> Result<String> {
        let state = self.state();
        state.check_tab(tab)?;
        Ok(state.body_html.clone().unwrap_or_else(|| state.html.clone()))
    }

    async fn query(&self, tab: &Self::TabHandle, target: &Target) -> Result<Vec<ElementInfo>> {
        let mut state = self.state();
        state.check_tab(tab)?;
        let found = state.present(target);
        Ok(found
            .into_iter()
            .enumerate()
            .map(|(index, i)| state.elements[i].info(index))
            .collect())
    }

    async fn perform(
        &self,
        tab: &Self::TabHandle,
        target: &Target,
        index: usize,
        op: &ElementOp,
    ) -> Result<()> {
        let mut state = self.state();
        state.check_tab(tab)?;
        if state.disconnect_on_perform {
            state.disconnect_on_perform = false;
            state.connected = false;
            return Err(AgentError::Disconnected("target closed".to_string()));
        }

        let found = state.present(target);
        let Some(&i) = found.get(index) else {
            return Err(AgentError::ElementNotFound(format!(
                "{target} (wanted match #{}, found {})",
                index + 1,
                found.len()
            )));
        };

        let el = &mut state.elements[i];
        if !el.visible && *op != ElementOp::SubmitForm {
            return Err(AgentError::NotInteractable(format!("{target}: element is not visible")));
        }
        if el.disabled {
            return Err(AgentError::NotInteractable(format!("{target}: element is disabled")));
        }
        let shown = el.label.clone().unwrap_or_else(|| target.to_string());

        let event = match op {
            ElementOp::Fill(text) => {
                if !matches!(el.tag.as_str(), "input" | "textarea") {
                    return Err(AgentError::NotInteractable(format!(
                        "{target}: element is not an <input>, <textarea> or contenteditable"
                    )));
                }
                el.value = text.clone();
                format!("fill {shown} = {text}")
            }
            ElementOp::SelectOption(value) => {
                if el.tag != "select" {
                    return Err(AgentError::NotInteractable(format!(
                        "{target}: element is not a <select>"
                    )));
                }
                if !el.options.iter().any(|o| o == value) {
                    return Err(AgentError::InvalidAction(format!(
                        "{target}: no option with value or label {value}"
                    )));
                }
                el.value = value.clone();
                format!("select {shown} = {value}")
            }
            other => format!("{} {shown}", other.name()),
        };
        state.events.push(event);
        Ok(())
    }

    async fn press_key(&self, tab: &Self::TabHandle, key: &str) -> Result<()> {
        let mut state = self.state();
        state.check_tab(tab)?;
        state.events.push(format!("press {key}"));
        Ok(())
    }

    async fn take_screenshot(&self, tab: &Self::TabHandle) -> Result<Vec<u8>> {
        let state = self.state();
        state.check_tab(tab)?;
        if state.fail_screenshot {
            return Err(AgentError::ScreenshotFailed("capture timed out".to_string()));
        }
        Ok(FAKE_PNG.to_vec())
    }

    fn is_running(&self) -> bool {
        self.state().running
    }

    async fn close(&mut self) -> Result<()> {
        let mut state = self.state();
        state.running = false;
        state.connected = false;
        if state.fail_close {
            return Err(AgentError::Disconnected("browser process already gone".to_string()));
        }
        Ok(())
    }
}
