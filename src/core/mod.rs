pub mod browser;
pub mod config;

pub use browser::{BrowserTrait, ElementOp, Target};
pub use config::{Config, WaitPolicy};
