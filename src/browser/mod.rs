pub mod chrome;
pub mod scripts;
pub mod session;

pub use chrome::ChromeBrowser;
pub use session::BrowserSession;
