//! Turns oracle-suggested locators into concrete element operations.
//!
//! A locator is a hint. Both chains below walk from the literal reading of
//! the locator to progressively more generic strategies, and give up only
//! after every step has failed. Each step has its own short timeout.
//! Connectivity errors end the chain at once so the executor can recover
//! the session.

pub mod locator;

pub use locator::{Locator, LocatorKind};

use crate::browser::BrowserSession;
use crate::core::config::ResolverConfig;
use crate::core::{BrowserTrait, ElementOp, Target};
use crate::errors::{AgentError, Result};
use std::time::Duration;
use tracing::{debug, info};

const AUTH_SUBMIT_SELECTORS: [&str; 5] = [
    "input[type='submit']",
    "button[type='submit']",
    "button.btn-primary",
    ".btn-login",
    ".btn-signin",
];

const USERNAME_SELECTORS: [&str; 5] = [
    "input[name='login']",
    "input[name='username']",
    "input[name='email']",
    "input[id='login_field']",
    "#login_field",
];

const PASSWORD_SELECTORS: [&str; 3] = [
    "input[name='password']",
    "input[type='password']",
    "#password",
];

/// Outcome of one fallback step.
enum Step {
    Done,
    Next,
}

pub struct LocatorResolver {
    step_timeout: Duration,
    poll_interval: Duration,
}

impl LocatorResolver {
    pub fn new(config: &ResolverConfig) -> Self {
        Self {
            step_timeout: Duration::from_millis(config.step_timeout_ms),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
        }
    }

    pub async fn click<B: BrowserTrait>(
        &self,
        session: &BrowserSession<B>,
        raw: &str,
    ) -> Result<()> {
        let locator = Locator::parse(raw);
        let natural = locator.target();
        let op = ElementOp::Click;

        // 1. The locator as written, first match.
        let original = match self.strict_attempt(session, &natural, &op).await {
            Ok(()) => return Ok(()),
            Err(e) if e.is_connectivity() => return Err(e),
            Err(e) => e,
        };
        debug!(locator = raw, error = %original, "direct click failed, trying fallbacks");

        // 2. Ambiguous locator: first visible match.
        if let Step::Done = self.each_visible(session, &natural, &op).await? {
            return Ok(());
        }

        match &locator.kind {
            // 3. Role and accessible name.
            LocatorKind::Role { role, name } => {
                let target = Target::Role {
                    role: role.clone(),
                    name: name.clone(),
                };
                if let Step::Done = self.first_visible(session, &target, &op).await? {
                    return Ok(());
                }
            }
            // 4. Visible text.
            LocatorKind::Text(text) => {
                let target = Target::Text {
                    text: text.clone(),
                    exact: false,
                };
                if let Step::Done = self.first_visible(session, &target, &op).await? {
                    return Ok(());
                }
            }
            LocatorKind::Selector(_) => {}
        }

        // 5. Link by href.
        if let Some(pattern) = &locator.href_pattern {
            let target = Target::LinkHref(pattern.clone());
            if let Step::Done = self.first_visible(session, &target, &op).await? {
                return Ok(());
            }
        }

        // 6. Canonical submit buttons for login flows.
        if locator.auth_hint {
            if let Step::Done = self.any_of(session, &AUTH_SUBMIT_SELECTORS, &op).await? {
                return Ok(());
            }
        }

        // 7. Every match by position.
        let count = self.count(session, &natural).await?;
        for index in 0..count {
            if let Step::Done = self.step(session, &natural, index, &op).await? {
                info!(locator = raw, index, "clicked by position");
                return Ok(());
            }
        }

        Err(original)
    }

    pub async fn fill<B: BrowserTrait>(
        &self,
        session: &BrowserSession<B>,
        raw: &str,
        text: &str,
    ) -> Result<()> {
        let locator = Locator::parse(raw);
        let natural = locator.target();
        let op = ElementOp::Fill(text.to_string());

        match self.strict_attempt(session, &natural, &op).await {
            Ok(()) => return Ok(()),
            Err(e) if e.is_connectivity() => return Err(e),
            Err(e) => debug!(locator = raw, error = %e, "direct fill failed, trying fallbacks"),
        }

        if locator.username_hint {
            if let Step::Done = self.any_of(session, &USERNAME_SELECTORS, &op).await? {
                return Ok(());
            }
        }

        if locator.password_hint {
            if let Step::Done = self.any_of(session, &PASSWORD_SELECTORS, &op).await? {
                return Ok(());
            }
        }

        if let LocatorKind::Role { role, name } = &locator.kind {
            let target = Target::Role {
                role: role.clone(),
                name: name.clone(),
            };
            if let Step::Done = self.first_visible(session, &target, &op).await? {
                return Ok(());
            }
        }

        if let Some(label) = locator.label_text() {
            if let Step::Done = self.via_label(session, label, &op).await? {
                return Ok(());
            }
        }

        self.attempt(session, &natural, 0, &op).await
    }

    /// Applies `op` to a locator used for submit, select and hover: the
    /// locator as written, then its first visible match.
    pub async fn act<B: BrowserTrait>(
        &self,
        session: &BrowserSession<B>,
        raw: &str,
        op: ElementOp,
    ) -> Result<()> {
        let natural = Locator::parse(raw).target();
        match self.attempt(session, &natural, 0, &op).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_connectivity() => Err(e),
            Err(e) => match self.each_visible(session, &natural, &op).await? {
                Step::Done => Ok(()),
                Step::Next => Err(e),
            },
        }
    }

    async fn attempt<B: BrowserTrait>(
        &self,
        session: &BrowserSession<B>,
        target: &Target,
        index: usize,
        op: &ElementOp,
    ) -> Result<()> {
        session
            .act(target, index, op, self.step_timeout, self.poll_interval)
            .await
    }

    /// First match, refusing to guess when the target is ambiguous.
    async fn strict_attempt<B: BrowserTrait>(
        &self,
        session: &BrowserSession<B>,
        target: &Target,
        op: &ElementOp,
    ) -> Result<()> {
        let count = session.locate(target).await?.len();
        if count > 1 {
            return Err(AgentError::StrictModeViolation {
                locator: target.to_string(),
                count,
            });
        }
        self.attempt(session, target, 0, op).await
    }

    /// Swallows logic failures so the chain moves on.
    async fn step<B: BrowserTrait>(
        &self,
        session: &BrowserSession<B>,
        target: &Target,
        index: usize,
        op: &ElementOp,
    ) -> Result<Step> {
        match self.attempt(session, target, index, op).await {
            Ok(()) => Ok(Step::Done),
            Err(e) if e.is_connectivity() => Err(e),
            Err(e) => {
                debug!(%target, index, error = %e, "fallback step failed");
                Ok(Step::Next)
            }
        }
    }

    async fn count<B: BrowserTrait>(
        &self,
        session: &BrowserSession<B>,
        target: &Target,
    ) -> Result<usize> {
        match session.locate(target).await {
            Ok(found) => Ok(found.len()),
            Err(e) if e.is_connectivity() => Err(e),
            Err(_) => Ok(0),
        }
    }

    async fn visible_indices<B: BrowserTrait>(
        &self,
        session: &BrowserSession<B>,
        target: &Target,
    ) -> Result<Vec<usize>> {
        match session.locate(target).await {
            Ok(found) => Ok(found
                .iter()
                .enumerate()
                .filter(|(_, el)| el.visible)
                .map(|(i, _)| i)
                .collect()),
            Err(e) if e.is_connectivity() => Err(e),
            Err(_) => Ok(Vec::new()),
        }
    }

    async fn each_visible<B: BrowserTrait>(
        &self,
        session: &BrowserSession<B>,
        target: &Target,
        op: &ElementOp,
    ) -> Result<Step> {
        let visible = self.visible_indices(session, target).await?;
        for index in visible {
            if let Step::Done = self.step(session, target, index, op).await? {
                info!(%target, index, "used visible match");
                return Ok(Step::Done);
            }
        }
        Ok(Step::Next)
    }

    async fn first_visible<B: BrowserTrait>(
        &self,
        session: &BrowserSession<B>,
        target: &Target,
        op: &ElementOp,
    ) -> Result<Step> {
        match self.visible_indices(session, target).await?.first() {
            Some(&index) => self.step(session, target, index, op).await,
            None => Ok(Step::Next),
        }
    }

    async fn any_of<B: BrowserTrait>(
        &self,
        session: &BrowserSession<B>,
        selectors: &[&str],
        op: &ElementOp,
    ) -> Result<Step> {
        for selector in selectors {
            let target = Target::Css(selector.to_string());
            if self.count(session, &target).await? == 0 {
                continue;
            }
            if let Step::Done = self.step(session, &target, 0, op).await? {
                info!(selector, op = op.name(), "used canonical selector");
                return Ok(Step::Done);
            }
        }
        Ok(Step::Next)
    }

    async fn via_label<B: BrowserTrait>(
        &self,
        session: &BrowserSession<B>,
        label: &str,
        op: &ElementOp,
    ) -> Result<Step> {
        // Compared against the label's whole text, which may sit in nested
        // elements that a text lookup would prefer over the label itself.
        let wanted = normalize(label);
        let labels = match session.locate(&Target::Css("label[for]".to_string())).await {
            Ok(found) => found,
            Err(e) if e.is_connectivity() => return Err(e),
            Err(_) => return Ok(Step::Next),
        };
        let field_id = labels
            .iter()
            .filter(|el| {
                el.text_content.as_deref().map(normalize).as_deref() == Some(wanted.as_str())
            })
            .find_map(|el| el.attributes.get("for").cloned())
            .filter(|id| !id.is_empty());
        match field_id {
            Some(id) => self.step(session, &Target::Css(format!("#{id}")), 0, op).await,
            None => Ok(Step::Next),
        }
    }
}

fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::BrowserConfig;
    use crate::testing::{FakeBrowser, FakeElement};

    fn resolver() -> LocatorResolver {
        LocatorResolver::new(&ResolverConfig {
            step_timeout_ms: 0,
            poll_interval_ms: 0,
        })
    }

    async fn started(fake: &FakeBrowser) -> BrowserSession<FakeBrowser> {
        let mut session = BrowserSession::new(fake.clone(), BrowserConfig::default());
        session.start(true).await.unwrap();
        session
    }

    #[tokio::test]
    async fn click_picks_the_only_visible_match() {
        let fake = FakeBrowser::new();
        fake.add_element(FakeElement::new("button").css(".buy").label("first").hidden());
        fake.add_element(FakeElement::new("button").css(".buy").label("second"));
        fake.add_element(FakeElement::new("button").css(".buy").label("third").hidden());
        let session = started(&fake).await;

        resolver().click(&session, ".buy").await.unwrap();
        assert_eq!(fake.events(), vec!["click second"]);
    }

    #[tokio::test]
    async fn click_fails_when_no_match_is_visible() {
        let fake = FakeBrowser::new();
        for _ in 0..3 {
            fake.add_element(FakeElement::new("button").css(".buy").hidden());
        }
        let session = started(&fake).await;

        let err = resolver().click(&session, ".buy").await.unwrap_err();
        assert!(matches!(err, AgentError::StrictModeViolation { count: 3, .. }));
        assert!(fake.events().is_empty());
    }

    #[tokio::test]
    async fn click_missing_element_propagates_not_found() {
        let fake = FakeBrowser::new();
        let session = started(&fake).await;
        let err = resolver().click(&session, "#nope").await.unwrap_err();
        assert!(matches!(err, AgentError::ElementNotFound(_)));
    }

    #[tokio::test]
    async fn click_resolves_role_and_text() {
        let fake = FakeBrowser::new();
        fake.add_element(FakeElement::new("button").role("button", "Sign in").label("signin"));
        fake.add_element(FakeElement::new("a").text("Pricing").label("pricing"));
        let session = started(&fake).await;

        resolver().click(&session, "role:button[name='sign in']").await.unwrap();
        resolver().click(&session, "text=pricing").await.unwrap();
        assert_eq!(fake.events(), vec!["click signin", "click pricing"]);
    }

    #[tokio::test]
    async fn click_follows_href_pattern() {
        let fake = FakeBrowser::new();
        fake.add_element(FakeElement::new("a").href("/en/pricing").label("pricing-link"));
        let session = started(&fake).await;

        resolver().click(&session, "a.nav[href*='/pricing']").await.unwrap();
        assert_eq!(fake.events(), vec!["click pricing-link"]);
    }

    #[tokio::test]
    async fn login_click_falls_back_to_submit_button() {
        let fake = FakeBrowser::new();
        fake.add_element(FakeElement::new("input").css("input[type='submit']").label("submit"));
        let session = started(&fake).await;

        resolver().click(&session, "#login-button").await.unwrap();
        assert_eq!(fake.events(), vec!["click submit"]);
    }

    #[tokio::test]
    async fn fill_uses_canonical_username_and_password_fields() {
        let fake = FakeBrowser::new();
        fake.add_element(FakeElement::new("input").css("input[name='login']").label("user"));
        fake.add_element(FakeElement::new("input").css("#password").label("pass"));
        let session = started(&fake).await;

        resolver().fill(&session, "#username", "octocat").await.unwrap();
        resolver().fill(&session, "input.password", "hunter2").await.unwrap();
        assert_eq!(fake.value_of("user").as_deref(), Some("octocat"));
        assert_eq!(fake.value_of("pass").as_deref(), Some("hunter2"));
    }

    #[tokio::test]
    async fn fill_resolves_through_label() {
        let fake = FakeBrowser::new();
        fake.add_element(
            FakeElement::new("label")
                .css("label[for]")
                .text("Search")
                .attr("for", "q"),
        );
        fake.add_element(FakeElement::new("input").css("#q").label("query"));
        let session = started(&fake).await;

        resolver().fill(&session, "text=Search", "rust").await.unwrap();
        assert_eq!(fake.value_of("query").as_deref(), Some("rust"));
    }

    #[tokio::test]
    async fn fill_matches_label_by_whole_text() {
        let fake = FakeBrowser::new();
        // Markup: <label for="email"><span>Email</span>  address</label>
        fake.add_element(FakeElement::new("span").text("Email"));
        fake.add_element(
            FakeElement::new("label")
                .css("label[for]")
                .text("Email\n  Address")
                .attr("for", "email"),
        );
        fake.add_element(
            FakeElement::new("label")
                .css("label[for]")
                .text("Email address (work)")
                .attr("for", "work"),
        );
        fake.add_element(FakeElement::new("input").css("#email").label("email"));
        fake.add_element(FakeElement::new("input").css("#work").label("work"));
        let session = started(&fake).await;

        resolver().fill(&session, "text=email address", "a@b.c").await.unwrap();
        assert_eq!(fake.value_of("email").as_deref(), Some("a@b.c"));
        assert!(fake.value_of("work").unwrap_or_default().is_empty());
    }

    #[tokio::test]
    async fn fill_propagates_final_error() {
        let fake = FakeBrowser::new();
        fake.add_element(FakeElement::new("div").css("#box"));
        let session = started(&fake).await;

        let err = resolver().fill(&session, "#box", "x").await.unwrap_err();
        assert!(matches!(err, AgentError::NotInteractable(_)));
    }

    #[tokio::test]
    async fn connectivity_errors_short_circuit() {
        let fake = FakeBrowser::new();
        fake.add_element(FakeElement::new("button").css("#go"));
        let session = started(&fake).await;
        fake.disconnect();

        let err = resolver().click(&session, "#go").await.unwrap_err();
        assert!(err.is_connectivity());
    }
}
