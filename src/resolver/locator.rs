use crate::core::Target;
use regex::Regex;
use std::sync::OnceLock;

/// The grammar a locator string was written in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocatorKind {
    /// `role:button[name='Sign in']`
    Role { role: String, name: Option<String> },
    /// `text=Pricing` or `text:Pricing`
    Text(String),
    /// Anything else: CSS, or XPath when it starts with `//`, `(` or `xpath=`.
    Selector(Target),
}

/// A locator string parsed once, with the hints the fallback chains need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locator {
    pub raw: String,
    pub kind: LocatorKind,
    /// Text suggests a login / sign-in control.
    pub auth_hint: bool,
    pub username_hint: bool,
    pub password_hint: bool,
    /// Pattern from an `href` attribute selector.
    pub href_pattern: Option<String>,
}

fn role_syntax() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)^role\s*[:=]\s*([a-z]+)\s*(?:\[\s*name\s*=\s*(?:'([^']*)'|"([^"]*)"|([^\]]*))\s*\])?\s*$"#)
            .expect("static regex")
    })
}

fn text_syntax() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)^text\s*[=:]\s*(.+)$").expect("static regex"))
}

fn href_syntax() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"href\s*[*^$~|]?=\s*['"]([^'"]+)['"]"#).expect("static regex")
    })
}

fn unquote(s: &str) -> &str {
    let s = s.trim();
    for q in ['"', '\''] {
        if s.len() >= 2 && s.starts_with(q) && s.ends_with(q) {
            return &s[1..s.len() - 1];
        }
    }
    s
}

impl Locator {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        let kind = if let Some(caps) = role_syntax().captures(trimmed) {
            let name = caps
                .get(2)
                .or_else(|| caps.get(3))
                .or_else(|| caps.get(4))
                .map(|m| m.as_str().trim().to_string())
                .filter(|n| !n.is_empty());
            LocatorKind::Role {
                role: caps[1].to_lowercase(),
                name,
            }
        } else if let Some(caps) = text_syntax().captures(trimmed) {
            LocatorKind::Text(unquote(&caps[1]).to_string())
        } else if let Some(xpath) = trimmed.strip_prefix("xpath=") {
            LocatorKind::Selector(Target::XPath(xpath.to_string()))
        } else if trimmed.starts_with("//") || trimmed.starts_with('(') {
            LocatorKind::Selector(Target::XPath(trimmed.to_string()))
        } else {
            LocatorKind::Selector(Target::Css(trimmed.to_string()))
        };

        let lower = trimmed.to_lowercase();
        Self {
            raw: raw.to_string(),
            kind,
            auth_hint: lower.contains("login") || lower.contains("sign in"),
            username_hint: lower.contains("username")
                || lower.contains("login")
                || lower.contains("email"),
            password_hint: lower.contains("password"),
            href_pattern: href_syntax()
                .captures(trimmed)
                .map(|caps| caps[1].to_string()),
        }
    }

    /// The target the locator names directly, before any fallback.
    pub fn target(&self) -> Target {
        match &self.kind {
            LocatorKind::Role { role, name } => Target::Role {
                role: role.clone(),
                name: name.clone(),
            },
            LocatorKind::Text(text) => Target::Text {
                text: text.clone(),
                exact: false,
            },
            LocatorKind::Selector(target) => target.clone(),
        }
    }

    /// Words a matching `<label>` might carry.
    pub fn label_text(&self) -> Option<&str> {
        match &self.kind {
            LocatorKind::Text(text) => Some(text),
            LocatorKind::Role { name, .. } => name.as_deref(),
            LocatorKind::Selector(_) => None,
        }
    }
}
