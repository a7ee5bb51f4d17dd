use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// A single primitive UI action.
///
/// On the wire an action is a flat JSON object tagged by `"action"`, e.g.
/// `{"action": "fill", "locator": "input[name='q']", "text": "rust"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum Action {
    Navigate {
        url: String,
    },
    Click {
        locator: String,
    },
    Fill {
        locator: String,
        text: String,
    },
    Wait {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        time_ms: Option<u64>,
    },
    Submit {
        locator: String,
    },
    Press {
        key: String,
    },
    Select {
        locator: String,
        value: String,
    },
    Hover {
        locator: String,
    },
    Screenshot,
    /// Reserved; executes as a no-op.
    Extract,
}

impl Action {
    /// Action names accepted from the oracle, in prompt order.
    pub const VOCABULARY: [&'static str; 10] = [
        "navigate",
        "click",
        "fill",
        "wait",
        "submit",
        "press",
        "select",
        "hover",
        "screenshot",
        "extract",
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Action::Navigate { .. } => "navigate",
            Action::Click { .. } => "click",
            Action::Fill { .. } => "fill",
            Action::Wait { .. } => "wait",
            Action::Submit { .. } => "submit",
            Action::Press { .. } => "press",
            Action::Select { .. } => "select",
            Action::Hover { .. } => "hover",
            Action::Screenshot => "screenshot",
            Action::Extract => "extract",
        }
    }

    pub fn locator(&self) -> Option<&str> {
        match self {
            Action::Click { locator }
            | Action::Fill { locator, .. }
            | Action::Submit { locator }
            | Action::Select { locator, .. }
            | Action::Hover { locator } => Some(locator),
            _ => None,
        }
    }

    pub fn is_navigate(&self) -> bool {
        matches!(self, Action::Navigate { .. })
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Navigate { url } => write!(f, "navigate({url})"),
            Action::Fill { locator, .. } => write!(f, "fill({locator})"),
            Action::Wait { time_ms } => write!(f, "wait({}ms)", time_ms.unwrap_or(1000)),
            Action::Press { key } => write!(f, "press({key})"),
            Action::Select { locator, value } => write!(f, "select({locator}, {value})"),
            other => match other.locator() {
                Some(locator) => write!(f, "{}({locator})", other.name()),
                None => write!(f, "{}()", other.name()),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanStatus {
    Ready,
    Error,
}

/// Ordered actions derived from one natural-language command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionPlan {
    pub request_id: String,
    pub actions: Vec<Action>,
    pub status: PlanStatus,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl ActionPlan {
    pub fn ready(request_id: String, actions: Vec<Action>, message: impl Into<String>) -> Self {
        Self {
            request_id,
            actions,
            status: PlanStatus::Ready,
            message: message.into(),
            created_at: Utc::now(),
        }
    }

    pub fn error(request_id: String, message: impl Into<String>) -> Self {
        Self {
            request_id,
            actions: Vec::new(),
            status: PlanStatus::Error,
            message: message.into(),
            created_at: Utc::now(),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.status == PlanStatus::Ready
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Succeeded,
    Failed,
}

/// What happened to one action of a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionOutcome {
    pub index: usize,
    /// The action as last attempted, after any oracle repairs.
    pub action: Action,
    pub status: StepStatus,
    pub repair_attempts: u32,
    pub reconnects: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub request_id: String,
    pub success: bool,
    pub message: String,
    #[serde(default, with = "crate::utils::screenshot::base64_opt")]
    pub screenshot: Option<Vec<u8>>,
    #[serde(default)]
    pub extracted_data: Option<serde_json::Map<String, serde_json::Value>>,
    #[serde(default)]
    pub error: Option<String>,
    pub completed_at: DateTime<Utc>,
    #[serde(default)]
    pub steps: Vec<ActionOutcome>,
}

impl ExecutionResult {
    /// Optimistic starting point; the executor flips it on abort.
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            success: true,
            message: "Actions executed successfully".to_string(),
            screenshot: None,
            extracted_data: None,
            error: None,
            completed_at: Utc::now(),
            steps: Vec::new(),
        }
    }

    pub fn fail(&mut self, message: impl Into<String>, error: impl Into<String>) {
        self.success = false;
        self.message = message.into();
        self.error = Some(error.into());
    }

    pub fn total_repair_attempts(&self) -> u32 {
        self.steps.iter().map(|s| s.repair_attempts).sum()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElementRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// A located element as reported by the page surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElementInfo {
    pub index: usize,
    pub tag_name: String,
    pub element_id: Option<String>,
    pub class_name: Option<String>,
    pub text_content: Option<String>,
    #[serde(default)]
    pub attributes: HashMap<String, String>,
    pub visible: bool,
    pub rect: Option<ElementRect>,
}
