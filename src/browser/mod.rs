//! Finding, launching and talking to a local Chromium-family browser.

mod discovery;
mod launcher;
pub mod page;
mod session;

pub use discovery::{discover_all_browsers, discover_browser, BrowserInfo, BrowserType};
pub use launcher::BrowserLauncher;
pub use page::PageConnection;
pub use session::{CdpEndpoint, SessionManager, SessionState, SessionStatus, TargetInfo};
