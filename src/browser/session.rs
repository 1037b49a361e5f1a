use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use chromiumoxide::browser::Browser;
use futures::StreamExt;
use serde::{Deserialize, Serialize};

use super::launcher::BrowserLauncher;
use crate::config::Config;
use crate::error::{FplabError, Result};

/// A target from the CDP `/json/list` or `/json/new` endpoints
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetInfo {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(rename = "type")]
    pub target_type: String,
    pub web_socket_debugger_url: Option<String>,
}

/// Connection details persisted between invocations. Never holds collected data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionState {
    pub profile_name: String,
    #[serde(default = "default_cdp_host")]
    pub cdp_host: String,
    pub cdp_port: u16,
    /// The DevTools HTTP endpoints are served over TLS.
    #[serde(default)]
    pub cdp_secure: bool,
    pub pid: Option<u32>,
    pub cdp_url: String,
}

impl SessionState {
    /// URL of a DevTools HTTP endpoint such as `/json/list`.
    pub fn http_url(&self, path: &str) -> String {
        http_url(self.cdp_secure, &self.cdp_host, self.cdp_port, path)
    }
}

const LOCAL_HOST: &str = "127.0.0.1";

fn default_cdp_host() -> String {
    LOCAL_HOST.to_string()
}

fn http_url(secure: bool, host: &str, port: u16, path: &str) -> String {
    let scheme = if secure { "https" } else { "http" };
    format!("{}://{}:{}{}", scheme, host, port, path)
}

/// A CDP endpoint given as a port, an `http://host:port` address or a
/// browser WebSocket URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CdpEndpoint {
    pub host: String,
    pub port: u16,
    pub secure: bool,
    pub ws_url: Option<String>,
}

impl CdpEndpoint {
    /// A browser listening on this machine.
    pub fn local(port: u16) -> Self {
        Self {
            host: default_cdp_host(),
            port,
            secure: false,
            ws_url: None,
        }
    }

    pub fn parse(endpoint: &str) -> Result<Self> {
        let endpoint = endpoint.trim();

        if let Ok(port) = endpoint.parse::<u16>() {
            return Ok(Self::local(port));
        }

        let (scheme, rest) = endpoint.split_once("://").ok_or_else(invalid_endpoint)?;
        let (host, port) = rest
            .split('/')
            .next()
            .and_then(|host_port| host_port.rsplit_once(':'))
            .and_then(|(host, port)| Some((host, port.parse::<u16>().ok()?)))
            .filter(|(host, _)| !host.is_empty())
            .ok_or_else(invalid_endpoint)?;

        let (secure, ws_url) = match scheme {
            "ws" => (false, Some(endpoint.to_string())),
            "wss" => (true, Some(endpoint.to_string())),
            "http" => (false, None),
            "https" => (true, None),
            _ => return Err(invalid_endpoint()),
        };

        Ok(Self {
            host: host.to_string(),
            port,
            secure,
            ws_url,
        })
    }

    pub fn http_url(&self, path: &str) -> String {
        http_url(self.secure, &self.host, self.port, path)
    }
}

fn invalid_endpoint() -> FplabError {
    FplabError::CdpConnectionFailed(
        "Invalid endpoint. Use a port number, http://host:port or a WebSocket URL (ws://...)."
            .to_string(),
    )
}

/// `/json/new` takes the target as the raw query, which Chrome unescapes.
fn new_page_url(state: &SessionState, url: &str) -> String {
    state.http_url(&format!("/json/new?{}", urlencoding::encode(url)))
}

fn local_client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// Manages browser sessions across CLI invocations
pub struct SessionManager {
    config: Config,
    sessions_dir: PathBuf,
}

impl SessionManager {
    pub fn new(config: Config) -> Self {
        let sessions_dir = dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".fplab")
            .join("sessions");

        Self {
            config,
            sessions_dir,
        }
    }

    pub fn resolve_profile_name(&self, profile_name: Option<&str>) -> String {
        match profile_name.map(str::trim).filter(|s| !s.is_empty()) {
            Some(name) => name.to_string(),
            None => self.config.effective_default_profile_name(),
        }
    }

    fn session_file(&self, profile_name: &str) -> PathBuf {
        self.sessions_dir.join(format!("{}.json", profile_name))
    }

    fn load_session_state(&self, profile_name: &str) -> Option<SessionState> {
        let content = fs::read_to_string(self.session_file(profile_name)).ok()?;
        serde_json::from_str(&content).ok()
    }

    fn save_session_state(&self, state: &SessionState) -> Result<()> {
        fs::create_dir_all(&self.sessions_dir)?;
        let content = serde_json::to_string_pretty(state)?;
        fs::write(self.session_file(&state.profile_name), content)?;
        Ok(())
    }

    fn remove_session_state(&self, profile_name: &str) -> Result<()> {
        let path = self.session_file(profile_name);
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    /// Records a browser fplab did not launch so later runs reuse it.
    pub fn save_external_session(
        &self,
        profile_name: &str,
        endpoint: &CdpEndpoint,
        cdp_url: &str,
    ) -> Result<SessionState> {
        let state = SessionState {
            profile_name: profile_name.to_string(),
            cdp_host: endpoint.host.clone(),
            cdp_port: endpoint.port,
            cdp_secure: endpoint.secure,
            pid: None,
            cdp_url: cdp_url.to_string(),
        };
        self.save_session_state(&state)?;
        Ok(state)
    }

    async fn is_session_alive(&self, state: &SessionState) -> bool {
        local_client()
            .get(state.http_url("/json/version"))
            .send()
            .await
            .is_ok()
    }

    /// `None` if the endpoint is unreachable or the response is malformed.
    async fn fetch_browser_ws_url(&self, version_url: &str) -> Option<String> {
        let resp = local_client().get(version_url).send().await.ok()?;
        let info: serde_json::Value = resp.json().await.ok()?;
        info.get("webSocketDebuggerUrl")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
    }

    /// Attaches to an already running browser and records it for `profile_name`.
    pub async fn attach(&self, profile_name: Option<&str>, endpoint: &str) -> Result<SessionState> {
        let profile_name = self.resolve_profile_name(profile_name);
        let endpoint = CdpEndpoint::parse(endpoint)?;

        let cdp_url = match endpoint.ws_url.clone() {
            Some(url) => url,
            None => self
                .fetch_browser_ws_url(&endpoint.http_url("/json/version"))
                .await
                .ok_or_else(|| {
                    FplabError::CdpConnectionFailed(format!(
                        "Cannot reach CDP at {}:{}. Is the browser running with --remote-debugging-port={}?",
                        endpoint.host, endpoint.port, endpoint.port
                    ))
                })?,
        };

        tracing::debug!(
            "Attaching profile {} to {}:{} url={}",
            profile_name,
            endpoint.host,
            endpoint.port,
            cdp_url
        );
        self.save_external_session(&profile_name, &endpoint, &cdp_url)
    }

    /// Reuses the profile's live browser, or launches a new one.
    pub async fn get_or_create_session(&self, profile_name: Option<&str>) -> Result<SessionState> {
        let profile_name = self.resolve_profile_name(profile_name);
        let profile = self.config.get_profile(&profile_name)?;

        if let Some(mut state) = self.load_session_state(&profile_name) {
            if self.is_session_alive(&state).await {
                // A browser restarted on the same port has a new browser id.
                if let Some(fresh_url) = self
                    .fetch_browser_ws_url(&state.http_url("/json/version"))
                    .await {
                    if fresh_url != state.cdp_url {
                        tracing::debug!("CDP WebSocket URL changed, updating session");
                        state.cdp_url = fresh_url;
                        self.save_session_state(&state)?;
                    }
                }
                tracing::debug!("Reusing existing session for profile: {}", profile_name);
                return Ok(state);
            }

            tracing::debug!("Session for profile {} is dead, removing", profile_name);
            self.remove_session_state(&profile_name)?;
        }

        if let Some(ref cdp_url) = profile.cdp_url {
            return self.attach(Some(&profile_name), cdp_url).await;
        }

        tracing::debug!("Launching a browser for profile: {}", profile_name);
        let launcher = BrowserLauncher::from_profile(&profile_name, &profile)?;
        let (child, cdp_url) = launcher.launch_and_wait().await?;

        let state = SessionState {
            profile_name,
            cdp_host: default_cdp_host(),
            cdp_port: launcher.cdp_port(),
            cdp_secure: false,
            pid: Some(child.id()),
            cdp_url,
        };
        self.save_session_state(&state)?;
        Ok(state)
    }

    /// Opens a new tab on `url`.
    pub async fn open_page(&self, state: &SessionState, url: &str) -> Result<TargetInfo> {
        let endpoint = new_page_url(state, url);
        let response = local_client().put(&endpoint).send().await.map_err(|e| {
            FplabError::CdpConnectionFailed(format!("Failed to open page: {}", e))
        })?;

        if !response.status().is_success() {
            return Err(FplabError::CdpConnectionFailed(format!(
                "Failed to open page: HTTP {}",
                response.status()
            )));
        }

        response.json().await.map_err(|e| {
            FplabError::CdpConnectionFailed(format!("Failed to parse new target: {}", e))
        })
    }

    pub async fn close_page(&self, state: &SessionState, target_id: &str) -> Result<()> {
        let endpoint = state.http_url(&format!("/json/close/{}", target_id));
        local_client().get(&endpoint).send().await.map_err(|e| {
            FplabError::CdpConnectionFailed(format!("Failed to close page: {}", e))
        })?;
        Ok(())
    }

    /// Closes the profile's browser and forgets its session.
    pub async fn close_session(&self, profile_name: Option<&str>) -> Result<bool> {
        let profile_name = self.resolve_profile_name(profile_name);

        let Some(state) = self.load_session_state(&profile_name) else {
            return Ok(false);
        };

        match Browser::connect(&state.cdp_url).await {
            Ok((mut browser, mut handler)) => {
                tokio::spawn(async move { while handler.next().await.is_some() {} });
                if let Err(e) = browser.close().await {
                    tracing::debug!("Browser close failed: {}", e);
                }
            }
            Err(e) => tracing::debug!("Browser already unreachable: {}", e),
        }

        self.remove_session_state(&profile_name)?;
        Ok(true)
    }

    /// Page targets only, no workers or extensions.
    pub async fn get_pages(&self, profile_name: Option<&str>) -> Result<Vec<TargetInfo>> {
        let profile_name = self.resolve_profile_name(profile_name);
        let state = self
            .load_session_state(&profile_name)
            .ok_or(FplabError::BrowserNotRunning)?;

        let response = local_client()
            .get(state.http_url("/json/list")).send().await.map_err(|e| {
            FplabError::CdpConnectionFailed(format!("Failed to get pages: {}", e))
        })?;

        let targets: Vec<TargetInfo> = response.json().await.map_err(|e| {
            FplabError::CdpConnectionFailed(format!("Failed to parse pages: {}", e))
        })?;

        Ok(targets
            .into_iter()
            .filter(|t| t.target_type == "page")
            .collect())
    }

    pub async fn get_status(&self, profile_name: Option<&str>) -> SessionStatus {
        let profile_name = self.resolve_profile_name(profile_name);

        match self.load_session_state(&profile_name) {
            Some(state) if self.is_session_alive(&state).await => SessionStatus::Running {
                profile: profile_name,
                cdp_port: state.cdp_port,
                cdp_url: state.cdp_url,
            },
            Some(_) => SessionStatus::Stale {
                profile: profile_name,
            },
            None => SessionStatus::NotRunning {
                profile: profile_name,
            },
        }
    }
}

#[derive(Debug)]
pub enum SessionStatus {
    Running {
        profile: String,
        cdp_port: u16,
        cdp_url: String,
    },
    Stale {
        profile: String,
    },
    NotRunning {
        profile: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_session_manager(dir: &std::path::Path) -> SessionManager {
        SessionManager {
            config: Config::default(),
            sessions_dir: dir.to_path_buf(),
        }
    }

    #[test]
    fn save_and_load_external_session() {
        let dir = tempfile::tempdir().unwrap();
        let sm = test_session_manager(dir.path());

        sm.save_external_session(
            "lab",
            &CdpEndpoint::local(9222),
            "ws://127.0.0.1:9222/devtools/browser/abc",
        )
        .unwrap();

        let state = sm.load_session_state("lab").unwrap();
        assert_eq!(state.profile_name, "lab");
        assert_eq!(state.cdp_port, 9222);
        assert_eq!(state.cdp_url, "ws://127.0.0.1:9222/devtools/browser/abc");
        assert!(state.pid.is_none());
    }

    #[test]
    fn save_creates_sessions_dir() {
        let dir = tempfile::tempdir().unwrap();
        let sessions_dir = dir.path().join("nested").join("sessions");
        let sm = test_session_manager(&sessions_dir);

        sm.save_external_session("fplab", &CdpEndpoint::local(9222), "ws://localhost:9222")
            .unwrap();
        assert!(sessions_dir.join("fplab.json").exists());
    }

    #[test]
    fn remove_session_state_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let sm = test_session_manager(dir.path());

        sm.save_external_session("gone", &CdpEndpoint::local(9222), "ws://localhost:9222")
            .unwrap();
        sm.remove_session_state("gone").unwrap();
        assert!(!sm.session_file("gone").exists());
        sm.remove_session_state("gone").unwrap();
    }

    #[test]
    fn profiles_are_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let sm = test_session_manager(dir.path());

        sm.save_external_session("desktop", &CdpEndpoint::local(9222), "ws://desktop")
            .unwrap();
        sm.save_external_session("mobile", &CdpEndpoint::local(9333), "ws://mobile")
            .unwrap();

        assert_eq!(sm.load_session_state("desktop").unwrap().cdp_port, 9222);
        assert_eq!(sm.load_session_state("mobile").unwrap().cdp_url, "ws://mobile");
    }

    #[test]
    fn endpoints_parse_ports_and_urls() {
        assert_eq!(CdpEndpoint::parse("9333").unwrap(), CdpEndpoint::local(9333));
        assert_eq!(
            CdpEndpoint::parse("http://127.0.0.1:9444").unwrap(),
            CdpEndpoint::local(9444)
        );
        assert_eq!(
            CdpEndpoint::parse("ws://127.0.0.1:9222/devtools/browser/abc").unwrap(),
            CdpEndpoint {
                host: "127.0.0.1".to_string(),
                port: 9222,
                secure: false,
                ws_url: Some("ws://127.0.0.1:9222/devtools/browser/abc".to_string())
            }
        );
        assert!(CdpEndpoint::parse("chrome").is_err());
        assert!(CdpEndpoint::parse("http://:9222").is_err());
        assert!(CdpEndpoint::parse("ftp://127.0.0.1:21").is_err());
    }

    #[test]
    fn remote_endpoints_keep_their_host() {
        let endpoint = CdpEndpoint::parse("http://10.1.2.3:9222").unwrap();
        assert_eq!(endpoint.host, "10.1.2.3");
        assert_eq!(endpoint.port, 9222);
        assert_eq!(endpoint.http_url("/json/version"), "http://10.1.2.3:9222/json/version");

        let endpoint = CdpEndpoint::parse("https://devtools.lab:443").unwrap();
        assert!(endpoint.secure);
        assert_eq!(endpoint.http_url("/json/list"), "https://devtools.lab:443/json/list");

        let endpoint = CdpEndpoint::parse("wss://devtools.lab:9229/devtools/browser/x").unwrap();
        assert_eq!(endpoint.host, "devtools.lab");
        assert!(endpoint.secure);
    }

    #[test]
    fn saved_sessions_address_the_recorded_host() {
        let dir = tempfile::tempdir().unwrap();
        let sm = test_session_manager(dir.path());
        let endpoint = CdpEndpoint::parse("http://10.1.2.3:9222").unwrap();

        sm.save_external_session("remote", &endpoint, "ws://10.1.2.3:9222/devtools/browser/r")
            .unwrap();

        let state = sm.load_session_state("remote").unwrap();
        assert_eq!(state.http_url("/json/list"), "http://10.1.2.3:9222/json/list");
        assert_eq!(
            state.http_url("/json/close/T1"),
            "http://10.1.2.3:9222/json/close/T1"
        );
    }

    #[test]
    fn older_session_files_default_to_localhost() {
        let state: SessionState = serde_json::from_str(
            r#"{"profile_name":"old","cdp_port":9222,"pid":null,"cdp_url":"ws://x"}"#,
        )
        .unwrap();
        assert_eq!(state.http_url("/json/version"), "http://127.0.0.1:9222/json/version");
    }

    #[test]
    fn new_page_target_is_escaped() {
        let state = SessionState {
            profile_name: "lab".to_string(),
            cdp_host: "127.0.0.1".to_string(),
            cdp_port: 9222,
            cdp_secure: false,
            pid: None,
            cdp_url: "ws://x".to_string(),
        };

        assert_eq!(
            new_page_url(&state, "https://example.com/fp?a=1&b=2#slots"),
            "http://127.0.0.1:9222/json/new?https%3A%2F%2Fexample.com%2Ffp%3Fa%3D1%26b%3D2%23slots"
        );
    }

    #[tokio::test]
    async fn dead_session_reports_stale() {
        let dir = tempfile::tempdir().unwrap();
        let sm = test_session_manager(dir.path());

        sm.save_external_session("dead", &CdpEndpoint::local(19999), "ws://127.0.0.1:19999")
            .unwrap();

        assert!(matches!(
            sm.get_status(Some("dead")).await,
            SessionStatus::Stale { .. }
        ));
    }

    #[tokio::test]
    async fn no_session_reports_not_running() {
        let dir = tempfile::tempdir().unwrap();
        let sm = test_session_manager(dir.path());

        assert!(matches!(
            sm.get_status(Some("nonexistent")).await,
            SessionStatus::NotRunning { .. }
        ));
    }

    #[tokio::test]
    async fn attach_to_unreachable_port_fails() {
        let dir = tempfile::tempdir().unwrap();
        let sm = test_session_manager(dir.path());

        let result = sm.attach(Some("lab"), "19998").await;
        assert!(matches!(result, Err(FplabError::CdpConnectionFailed(_))));
        assert!(sm.load_session_state("lab").is_none());
    }

    #[tokio::test]
    async fn attach_with_ws_url_records_session() {
        let dir = tempfile::tempdir().unwrap();
        let sm = test_session_manager(dir.path());

        let state = sm
            .attach(None, "ws://127.0.0.1:19997/devtools/browser/xyz")
            .await
            .unwrap();
        assert_eq!(state.profile_name, "fplab");
        assert_eq!(state.cdp_port, 19997);
        assert!(sm.load_session_state("fplab").is_some());
    }

    #[tokio::test]
    async fn close_without_session_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let sm = test_session_manager(dir.path());

        assert!(!sm.close_session(Some("idle")).await.unwrap());
    }

    #[tokio::test]
    async fn none_profile_uses_configured_default_profile() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.browser.default_profile = "lab-default".to_string();
        let sm = SessionManager {
            config,
            sessions_dir: dir.path().to_path_buf(),
        };

        assert!(matches!(
            sm.get_status(None).await,
            SessionStatus::NotRunning { profile } if profile == "lab-default"
        ));
    }
}
