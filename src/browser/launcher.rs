use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use tokio::time::sleep;

use super::discovery::{discover_browser, BrowserInfo, BrowserType};
use crate::config::ProfileConfig;
use crate::error::{FplabError, Result};

/// Number of `/json/version` polls before giving up on a fresh browser.
const CDP_READY_ATTEMPTS: u32 = 20;

/// Starts a local browser with remote debugging enabled
pub struct BrowserLauncher {
    browser_info: BrowserInfo,
    cdp_port: u16,
    headless: bool,
    user_data_dir: PathBuf,
    extra_args: Vec<String>,
}

impl BrowserLauncher {
    pub fn from_profile(profile_name: &str, profile: &ProfileConfig) -> Result<Self> {
        let browser_info = match profile.browser_path {
            Some(ref path) => {
                let path = PathBuf::from(shellexpand::tilde(path).to_string());
                if !path.exists() {
                    return Err(FplabError::BrowserLaunchFailed(format!(
                        "Browser not found at: {}",
                        path.display()
                    )));
                }
                // Any explicit executable is driven as a Chromium-family browser.
                BrowserInfo::new(BrowserType::Chromium, path)
            }
            None => discover_browser()?,
        };

        let user_data_dir = match profile.user_data_dir {
            Some(ref dir) => PathBuf::from(shellexpand::tilde(dir).to_string()),
            None => default_user_data_dir(profile_name),
        };

        Ok(Self {
            browser_info,
            cdp_port: profile.cdp_port,
            headless: profile.headless,
            user_data_dir,
            extra_args: profile.extra_args.clone(),
        })
    }

    fn build_args(&self) -> Vec<String> {
        let mut args = vec![
            format!("--remote-debugging-port={}", self.cdp_port),
            format!("--user-data-dir={}", self.user_data_dir.display()),
            "--no-first-run".to_string(),
            "--no-default-browser-check".to_string(),
        ];

        if self.headless {
            args.push("--headless=new".to_string());
        }

        args.extend(self.extra_args.iter().cloned());
        args
    }

    pub fn launch(&self) -> Result<Child> {
        std::fs::create_dir_all(&self.user_data_dir)?;

        let args = self.build_args();
        tracing::debug!(
            "Launching browser: {:?} with args: {:?}",
            self.browser_info.path,
            args
        );

        Command::new(&self.browser_info.path)
            .args(&args)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                FplabError::BrowserLaunchFailed(format!(
                    "Failed to launch {}: {}",
                    self.browser_info.browser_type.name(),
                    e
                ))
            })
    }

    /// Launches the browser and waits until its CDP endpoint answers.
    /// Returns the child process and the browser WebSocket URL.
    pub async fn launch_and_wait(&self) -> Result<(Child, String)> {
        let child = self.launch()?;
        let cdp_url = self.wait_for_cdp().await?;
        Ok((child, cdp_url))
    }

    async fn wait_for_cdp(&self) -> Result<String> {
        let url = format!("http://127.0.0.1:{}/json/version", self.cdp_port);
        let client = reqwest::Client::builder()
            .no_proxy()
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        for attempt in 1..=CDP_READY_ATTEMPTS {
            sleep(Duration::from_millis(500)).await;

            match client.get(&url).send().await {
                Ok(response) if response.status().is_success() => {
                    let json: serde_json::Value = response.json().await.map_err(|e| {
                        FplabError::CdpConnectionFailed(format!(
                            "Failed to parse CDP response: {}",
                            e
                        ))
                    })?;

                    if let Some(ws_url) = json.get("webSocketDebuggerUrl").and_then(|v| v.as_str())
                    {
                        tracing::info!("CDP ready at: {}", ws_url);
                        return Ok(ws_url.to_string());
                    }
                }
                Ok(_) => tracing::debug!("CDP not ready yet (attempt {})", attempt),
                Err(e) => tracing::debug!("CDP connection attempt {} failed: {}", attempt, e),
            }
        }

        Err(FplabError::CdpConnectionFailed(
            "Timeout waiting for CDP to be ready".to_string(),
        ))
    }

    pub fn browser_info(&self) -> &BrowserInfo {
        &self.browser_info
    }

    pub fn cdp_port(&self) -> u16 {
        self.cdp_port
    }
}

fn default_user_data_dir(profile_name: &str) -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("fplab")
        .join("profiles")
        .join(profile_name)
}
