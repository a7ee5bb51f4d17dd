use browser_pilot::core::config::{ExecutorConfig, ResolverConfig};
use browser_pilot::llm::ScriptedOracle;
use browser_pilot::testing::{FakeBrowser, FakeElement, FAKE_PNG};
use browser_pilot::{Action, Agent, AgentService, Config, MemoryStore, PlanStatus, StepStatus};
use std::sync::Arc;

fn fast_config() -> Config {
    Config {
        resolver: ResolverConfig {
            step_timeout_ms: 0,
            poll_interval_ms: 0,
        },
        executor: ExecutorConfig {
            settle_delay_ms: 0,
            retry_delay_ms: 0,
            ..Default::default()
        },
        ..Default::default()
    }
}

const LOGIN_PAGE: &str = r#"<!DOCTYPE html>
<html><head><script>var x = 1;</script><style>.a{}</style></head>
<body>
  <form action="/session" method="post">
    <label for="login_field">Username or email address</label>
    <input id="login_field" name="login" type="text">
    <input id="password" name="password" type="password">
    <input type="submit" name="commit" value="Sign in">
  </form>
  <footer>© 2024</footer>
</body></html>"#;

fn login_page() -> FakeBrowser {
    let fake = FakeBrowser::new();
    fake.set_html(LOGIN_PAGE);
    fake.add_element(
        FakeElement::new("input")
            .label("login")
            .css("#login_field")
            .css("input[name='login']")
            .role("textbox", "Username or email address"),
    );
    fake.add_element(
        FakeElement::new("input")
            .label("password")
            .css("#password")
            .css("input[name='password']"),
    );
    fake.add_element(
        FakeElement::new("input")
            .label("submit")
            .css("input[type='submit']")
            .role("button", "Sign in"),
    );
    fake
}

#[tokio::test]
async fn login_command_runs_end_to_end_in_order() {
    let fake = login_page();
    let oracle = ScriptedOracle::new().with_response("github.com/login").with_response(
        r#"```json
[
  {"action": "fill", "locator": "input[name='login']", "text": "octocat"},
  {"action": "fill", "locator": "input[name='password']", "text": "hunter2"},
  {"action": "click", "locator": "input[type='submit']"}
]
```"#,
    );
    let mut agent = Agent::new(fake.clone(), Arc::new(oracle.clone()), &fast_config());

    let (plan, result) = agent.run("log into github as octocat", None).await;

    assert_eq!(plan.status, PlanStatus::Ready);
    assert!(result.success, "{:?}", result.error);
    assert_eq!(
        fake.events(),
        vec![
            "navigate https://github.com/login",
            "navigate https://github.com/login",
            "fill login = octocat",
            "fill password = hunter2",
            "click submit",
        ]
    );
    assert_eq!(result.total_repair_attempts(), 0);

    let action_prompt = &oracle.prompts()[1];
    assert!(action_prompt.contains("name=\"login\""));
    assert!(!action_prompt.contains("<script"));
    assert!(!action_prompt.contains("footer"));
}

#[tokio::test]
async fn two_failed_clicks_then_repaired_locator_succeeds() {
    let fake = login_page();
    let oracle = ScriptedOracle::new()
        .with_response(r##"{"locator": "#signin-button"}"##)
        .with_response("```json\n{\"action\": \"click\", \"locator\": \"role:button[name='Sign in']\"}\n```");
    let mut agent = Agent::new(fake.clone(), Arc::new(oracle.clone()), &fast_config());

    let result = agent
        .execute(
            &[Action::Click {
                locator: "#commit-btn".into(),
            }],
            "req-repair",
        )
        .await;

    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.screenshot.as_deref(), Some(&FAKE_PNG[..]));
    assert_eq!(result.total_repair_attempts(), 2);
    assert_eq!(result.steps[0].status, StepStatus::Succeeded);
    assert_eq!(
        result.steps[0].action,
        Action::Click {
            locator: "role:button[name='Sign in']".into()
        }
    );
    assert_eq!(fake.events(), vec!["click submit"]);
    assert!(oracle.prompts()[0].contains("#commit-btn"));
}

#[tokio::test]
async fn repair_counter_never_exceeds_budget() {
    let fake = login_page();
    let mut oracle = ScriptedOracle::new();
    for i in 0..5 {
        oracle = oracle.with_response(&format!(r##"{{"locator": "#wrong-{i}"}}"##));
    }
    let mut agent = Agent::new(fake.clone(), Arc::new(oracle.clone()), &fast_config());

    let result = agent
        .execute(
            &[
                Action::Click {
                    locator: "#nothing".into(),
                },
                Action::Fill {
                    locator: "#password".into(),
                    text: "never typed".into(),
                },
            ],
            "req-budget",
        )
        .await;

    assert!(!result.success);
    assert!(result.steps.iter().all(|s| s.repair_attempts <= 2));
    assert_eq!(result.steps[0].repair_attempts, 2);
    assert_eq!(result.steps[1].status, StepStatus::Pending);
    assert_eq!(oracle.prompts().len(), 2);
    assert!(fake.value_of("password").unwrap_or_default().is_empty());
    assert!(result.screenshot.is_some());
}

#[tokio::test]
async fn disconnect_mid_plan_recovers_without_repair() {
    let fake = login_page();
    let oracle = ScriptedOracle::new();
    let mut agent = Agent::new(fake.clone(), Arc::new(oracle.clone()), &fast_config());

    let actions = vec![
        Action::Navigate {
            url: "https://github.com/login".into(),
        },
        Action::Fill {
            locator: "#login_field".into(),
            text: "octocat".into(),
        },
        Action::Click {
            locator: "input[type='submit']".into(),
        },
    ];

    let first = agent.execute(&actions[..2], "warmup").await;
    assert!(first.success);

    fake.disconnect();
    let result = agent.execute(&actions[2..], "req-disconnect").await;

    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.total_repair_attempts(), 0);
    assert!(oracle.prompts().is_empty());
    assert_eq!(fake.launch_count(), 2);
    assert_eq!(fake.events().last().map(String::as_str), Some("click submit"));
}

#[tokio::test]
async fn ambiguous_locator_clicks_only_visible_match() {
    let fake = FakeBrowser::new();
    fake.add_element(FakeElement::new("button").css("button.cta").label("hidden-1").hidden());
    fake.add_element(FakeElement::new("button").css("button.cta").label("visible"));
    fake.add_element(FakeElement::new("button").css("button.cta").label("hidden-2").hidden());
    let mut agent = Agent::new(fake.clone(), Arc::new(ScriptedOracle::new()), &fast_config());

    let result = agent
        .execute(&[Action::Click { locator: "button.cta".into() }], "req")
        .await;
    assert!(result.success);
    assert_eq!(fake.events(), vec!["click visible"]);
}

#[tokio::test]
async fn unparsable_plan_is_reported_not_raised() {
    let fake = login_page();
    let oracle = ScriptedOracle::new()
        .with_response("https://github.com/login")
        .with_response("I would click the green button, then celebrate.");
    let service = AgentService::new(
        move || fake.clone(),
        Arc::new(oracle),
        Arc::new(MemoryStore::new()),
        fast_config(),
    );

    let plan = service.translate("log in", None).await;
    assert_eq!(plan.status, PlanStatus::Error);
    assert!(plan.actions.is_empty());
    assert!(!plan.message.is_empty());
}

#[tokio::test]
async fn plan_survives_wire_round_trip() {
    let fake = login_page();
    let oracle = ScriptedOracle::new().with_response("github.com/login").with_response(
        r##"[{"action": "fill", "locator": "#login_field", "text": "octocat"},
            {"action": "wait", "time_ms": 5},
            {"action": "select", "locator": "#plan", "value": "pro"},
            {"action": "screenshot"}]"##,
    );
    let mut agent = Agent::new(fake, Arc::new(oracle), &fast_config());

    let plan = agent.translate("sign up for pro", None).await;
    let wire = serde_json::to_string(&plan).unwrap();
    let back: browser_pilot::ActionPlan = serde_json::from_str(&wire).unwrap();
    assert_eq!(back, plan);
    assert_eq!(back.actions.len(), 5);
}
