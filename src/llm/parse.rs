//! Lenient decoding of oracle replies, one routine per call site.

use crate::errors::{AgentError, Result};
use crate::types::Action;
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;
use tracing::warn;
use url::Url;

fn fenced_block() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```(?:json)?\s*(.*?)\s*```").expect("static regex"))
}

/// Cleans a URL reply: surrounding quotes and backticks go, and anything
/// without an `http`/`https` scheme gets `https://` in front.
pub fn decode_url(reply: &str) -> String {
    let url = reply
        .trim()
        .trim_matches(|c| c == '"' || c == '\'' || c == '`')
        .trim();
    match Url::parse(url) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => url.to_string(),
        _ => format!("https://{url}"),
    }
}

fn span(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    (end > start).then(|| &text[start..=end])
}

/// Fenced block first, then the outermost `open..close` span, then the
/// whole reply.
fn decode_json(reply: &str, open: char, close: char) -> Option<Value> {
    let mut candidates = Vec::with_capacity(3);
    if let Some(caps) = fenced_block().captures(reply) {
        if let Some(inner) = caps.get(1) {
            candidates.push(inner.as_str());
        }
    }
    if let Some(inner) = span(reply, open, close) {
        candidates.push(inner);
    }
    candidates.push(reply.trim());

    candidates
        .into_iter()
        .find_map(|text| serde_json::from_str::<Value>(text.trim()).ok())
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecodedActions {
    pub actions: Vec<Action>,
    /// Entries that were not valid actions.
    pub dropped: usize,
}

/// Decodes a JSON array of actions. Entries are validated one by one and
/// invalid ones are dropped; only a reply with no JSON at all is an error.
pub fn decode_actions(reply: &str) -> Result<DecodedActions> {
    let value = decode_json(reply, '[', ']').ok_or_else(|| {
        AgentError::Translation("oracle reply contained no JSON action list".to_string())
    })?;

    let entries = match value {
        Value::Array(entries) => entries,
        Value::Object(mut obj) => match obj.remove("actions") {
            Some(Value::Array(entries)) => entries,
            _ if obj.contains_key("action") => vec![Value::Object(obj)],
            _ => {
                return Err(AgentError::Translation(
                    "oracle reply is a JSON object without actions".to_string(),
                ))
            }
        },
        other => {
            return Err(AgentError::Translation(format!(
                "oracle reply is not an action list: {other}"
            )))
        }
    };

    let total = entries.len();
    let actions: Vec<Action> = entries
        .into_iter()
        .filter_map(|entry| match serde_json::from_value::<Action>(entry.clone()) {
            Ok(action) => Some(action),
            Err(e) => {
                warn!(entry = %entry, error = %e, "dropping invalid action");
                None
            }
        })
        .collect();

    Ok(DecodedActions {
        dropped: total - actions.len(),
        actions,
    })
}

/// Decodes a repair suggestion and overlays it on `original`. Fields the
/// oracle leaves out keep their old values; an unknown action name keeps
/// the old action type. `None` when nothing usable came back.
pub fn decode_repair(reply: &str, original: &Action) -> Option<Action> {
    let Some(Value::Object(suggestion)) = decode_json(reply, '{', '}') else {
        warn!("repair reply contained no JSON object");
        return None;
    };
    if suggestion.is_empty() {
        return None;
    }

    let mut merged: Map<String, Value> = match serde_json::to_value(original) {
        Ok(Value::Object(fields)) => fields,
        _ => return None,
    };
    for (key, value) in suggestion {
        if value.is_null() {
            continue;
        }
        if key == "action" {
            let known = value
                .as_str()
                .map(|name| Action::VOCABULARY.contains(&name.to_lowercase().as_str()))
                .unwrap_or(false);
            if !known {
                warn!(suggested = %value, "ignoring unknown action type in repair");
                continue;
            }
            merged.insert(key, Value::String(value.as_str().unwrap_or_default().to_lowercase()));
            continue;
        }
        merged.insert(key, value);
    }

    match serde_json::from_value::<Action>(Value::Object(merged)) {
        Ok(action) => Some(action),
        Err(e) => {
            warn!(error = %e, "repair suggestion is not a valid action");
            None
        }
    }
}
