use anyhow::{bail, Context};
use browser_pilot::utils::ScreenshotManager;
use browser_pilot::{llm, ActionPlan, Agent, ChromeBrowser, Config, ExecutionResult};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "browser-pilot", version, about = "Drive a browser with natural-language commands")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Translate a command and execute the resulting plan
    Run {
        command: String,
        #[arg(long)]
        context: Option<String>,
        #[command(flatten)]
        common: CommonArgs,
    },
    /// Print the action plan for a command without executing it
    Translate {
        command: String,
        #[arg(long)]
        context: Option<String>,
        #[command(flatten)]
        common: CommonArgs,
    },
    /// Execute a plan previously written by `translate`
    Execute {
        plan: PathBuf,
        #[command(flatten)]
        common: CommonArgs,
    },
}

#[derive(Args)]
struct CommonArgs {
    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Show the browser window
    #[arg(long)]
    headed: bool,
    /// Write the final screenshot here
    #[arg(long)]
    screenshot: Option<PathBuf>,
}

impl CommonArgs {
    fn load_config(&self) -> anyhow::Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => Config::default(),
        };
        config.apply_env();
        if self.headed {
            config.browser.headless = false;
        }
        config.validate()?;
        Ok(config)
    }
}

fn new_agent(config: &Config) -> anyhow::Result<Agent<ChromeBrowser>> {
    let oracle = llm::from_config(&config.oracle)?;
    info!(oracle = oracle.name(), model = %config.oracle.model, "oracle ready");
    Ok(Agent::new(ChromeBrowser::new(), oracle, config))
}

async fn report(result: &ExecutionResult, screenshot: Option<&PathBuf>) -> anyhow::Result<()> {
    if let (Some(path), Some(bytes)) = (screenshot, result.screenshot.as_ref()) {
        ScreenshotManager::save_to_file(bytes, path).await?;
        info!(path = %path.display(), "screenshot saved");
    }
    println!("{}", serde_json::to_string_pretty(result)?);
    if !result.success {
        bail!(
            "execution failed: {}",
            result.error.as_deref().unwrap_or(&result.message)
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            command,
            context,
            common,
        } => {
            let config = common.load_config()?;
            let mut agent = new_agent(&config)?;
            let (plan, result) = agent.run(&command, context.as_deref()).await;
            agent.stop().await;
            if !plan.is_ready() {
                warn!(message = %plan.message, "command could not be translated");
            }
            report(&result, common.screenshot.as_ref()).await
        }
        Command::Translate {
            command,
            context,
            common,
        } => {
            let config = common.load_config()?;
            let mut agent = new_agent(&config)?;
            let plan = agent.translate(&command, context.as_deref()).await;
            agent.stop().await;
            println!("{}", serde_json::to_string_pretty(&plan)?);
            if !plan.is_ready() {
                bail!("translation failed: {}", plan.message);
            }
            Ok(())
        }
        Command::Execute { plan, common } => {
            let raw = tokio::fs::read_to_string(&plan)
                .await
                .with_context(|| format!("reading {}", plan.display()))?;
            let plan: ActionPlan = serde_json::from_str(&raw).context("parsing action plan")?;
            if !plan.is_ready() || plan.actions.is_empty() {
                bail!("plan {} has no executable actions", plan.request_id);
            }
            let config = common.load_config()?;
            let mut agent = new_agent(&config)?;
            let result = agent.execute(&plan.actions, &plan.request_id).await;
            agent.stop().await;
            report(&result, common.screenshot.as_ref()).await
        }
    }
}
