pub mod agent;
pub mod browser;
pub mod core;
pub mod dom;
pub mod errors;
pub mod executor;
pub mod llm;
pub mod resolver;
pub mod service;
pub mod store;
pub mod testing;
pub mod translator;
pub mod troubleshoot;
pub mod types;
pub mod utils;

pub use agent::Agent;
pub use browser::{BrowserSession, ChromeBrowser};
pub use crate::core::config::{BrowserConfig, Config, ExecutorConfig, OracleConfig, Viewport};
pub use crate::core::{BrowserTrait, ElementOp, Target, WaitPolicy};
pub use dom::DomProcessor;
pub use errors::{AgentError, Result};
pub use executor::ActionExecutor;
pub use llm::Oracle;
pub use resolver::LocatorResolver;
pub use service::AgentService;
pub use store::{ExecutionStore, MemoryStore};
pub use translator::CommandTranslator;
pub use troubleshoot::TroubleshootingClient;
pub use types::*;
