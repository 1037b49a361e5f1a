use std::path::{Path, PathBuf};
use std::process::Command;

use serde::Serialize;

use crate::error::{FplabError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BrowserType {
    Chrome,
    Brave,
    Edge,
    Chromium,
}

impl BrowserType {
    pub fn name(&self) -> &'static str {
        match self {
            BrowserType::Chrome => "Google Chrome",
            BrowserType::Brave => "Brave",
            BrowserType::Edge => "Microsoft Edge",
            BrowserType::Chromium => "Chromium",
        }
    }

    /// Executable names looked up on `PATH` after the fixed install locations.
    fn binary_names(&self) -> &'static [&'static str] {
        match self {
            BrowserType::Chrome => &["google-chrome", "google-chrome-stable", "chrome"],
            BrowserType::Brave => &["brave-browser", "brave"],
            BrowserType::Edge => &["microsoft-edge", "msedge"],
            BrowserType::Chromium => &["chromium", "chromium-browser"],
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BrowserInfo {
    pub browser_type: BrowserType,
    pub path: PathBuf,
    pub version: Option<String>,
}

impl BrowserInfo {
    pub fn new(browser_type: BrowserType, path: PathBuf) -> Self {
        Self {
            browser_type,
            path,
            version: None,
        }
    }

    pub fn with_version(mut self) -> Self {
        self.version = detect_version(&self.path);
        self
    }
}

/// The highest-priority browser installed on this machine
pub fn discover_browser() -> Result<BrowserInfo> {
    discover_all_browsers()
        .into_iter()
        .next()
        .ok_or(FplabError::BrowserNotFound)
}

/// One entry per installed browser type, in priority order
pub fn discover_all_browsers() -> Vec<BrowserInfo> {
    install_locations()
        .into_iter()
        .filter_map(|(browser_type, paths)| {
            locate(browser_type, &paths).map(|path| BrowserInfo::new(browser_type, path).with_version())
        })
        .collect()
}

fn locate(browser_type: BrowserType, paths: &[&str]) -> Option<PathBuf> {
    paths
        .iter()
        .map(|p| PathBuf::from(shellexpand::tilde(p).to_string()))
        .find(|p| p.exists())
        .or_else(|| {
            browser_type
                .binary_names()
                .iter()
                .find_map(|name| which::which(name).ok())
        })
}

fn install_locations() -> Vec<(BrowserType, Vec<&'static str>)> {
    #[cfg(target_os = "macos")]
    {
        vec![
            (
                BrowserType::Chrome,
                vec![
                    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
                    "~/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
                ],
            ),
            (
                BrowserType::Brave,
                vec!["/Applications/Brave Browser.app/Contents/MacOS/Brave Browser"],
            ),
            (
                BrowserType::Edge,
                vec!["/Applications/Microsoft Edge.app/Contents/MacOS/Microsoft Edge"],
            ),
            (
                BrowserType::Chromium,
                vec!["/Applications/Chromium.app/Contents/MacOS/Chromium"],
            ),
        ]
    }

    #[cfg(target_os = "linux")]
    {
        vec![
            (
                BrowserType::Chrome,
                vec!["/usr/bin/google-chrome", "/usr/bin/google-chrome-stable"],
            ),
            (
                BrowserType::Brave,
                vec!["/usr/bin/brave-browser", "/usr/bin/brave"],
            ),
            (
                BrowserType::Edge,
                vec!["/usr/bin/microsoft-edge", "/usr/bin/microsoft-edge-stable"],
            ),
            (
                BrowserType::Chromium,
                vec![
                    "/usr/bin/chromium",
                    "/usr/bin/chromium-browser",
                    "/snap/bin/chromium",
                ],
            ),
        ]
    }

    #[cfg(target_os = "windows")]
    {
        vec![
            (
                BrowserType::Chrome,
                vec![
                    r"C:\Program Files\Google\Chrome\Application\chrome.exe",
                    r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
                ],
            ),
            (
                BrowserType::Brave,
                vec![r"C:\Program Files\BraveSoftware\Brave-Browser\Application\brave.exe"],
            ),
            (
                BrowserType::Edge,
                vec![
                    r"C:\Program Files\Microsoft\Edge\Application\msedge.exe",
                    r"C:\Program Files (x86)\Microsoft\Edge\Application\msedge.exe",
                ],
            ),
        ]
    }

    #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
    {
        vec![]
    }
}

fn detect_version(path: &Path) -> Option<String> {
    let output = Command::new(path).arg("--version").output().ok()?;
    if !output.status.success() {
        return None;
    }
    parse_version(&String::from_utf8_lossy(&output.stdout))
}

/// Pulls `120.0.6099.109` out of `Google Chrome 120.0.6099.109 unknown`.
fn parse_version(output: &str) -> Option<String> {
    output
        .split_whitespace()
        .find(|word| word.split('.').count() >= 2 && word.split('.').all(|p| p.parse::<u32>().is_ok()))
        .map(str::to_string)
}
