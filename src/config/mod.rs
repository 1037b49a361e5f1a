use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::collect::CollectSettings;
use crate::error::{FplabError, Result};

/// Keys accepted by `fplab config get/set`.
pub const KEYS: &[&str] = &[
    "browser.executable",
    "browser.default_profile",
    "browser.headless",
    "collect.page_url",
    "collect.audio_timeout_ms",
    "collect.probe_timeout_ms",
    "collect.canvas_image",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub browser: BrowserConfig,

    #[serde(default)]
    pub collect: CollectConfig,

    /// Named browser profiles
    #[serde(default)]
    pub profiles: HashMap<String, ProfileConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Browser executable path (overrides auto-discovery)
    pub executable: Option<String>,

    #[serde(default = "default_profile_name")]
    pub default_profile: String,

    #[serde(default)]
    pub headless: bool,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            executable: None,
            default_profile: default_profile_name(),
            headless: false,
        }
    }
}

fn default_profile_name() -> String {
    "fplab".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectConfig {
    /// Page the collectors run in when a browser is used
    #[serde(default = "default_page_url")]
    pub page_url: String,

    #[serde(default = "default_audio_timeout_ms")]
    pub audio_timeout_ms: u64,

    /// Upper bound for every single page evaluation
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,

    #[serde(default)]
    pub canvas_image: bool,
}

impl Default for CollectConfig {
    fn default() -> Self {
        Self {
            page_url: default_page_url(),
            audio_timeout_ms: default_audio_timeout_ms(),
            probe_timeout_ms: default_probe_timeout_ms(),
            canvas_image: false,
        }
    }
}

fn default_page_url() -> String {
    "about:blank".to_string()
}

fn default_audio_timeout_ms() -> u64 {
    10_000
}

fn default_probe_timeout_ms() -> u64 {
    5_000
}

impl CollectConfig {
    pub fn settings(&self) -> CollectSettings {
        CollectSettings {
            audio_timeout: Duration::from_millis(self.audio_timeout_ms),
        }
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

/// How to reach or launch one browser.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileConfig {
    #[serde(default = "default_cdp_port")]
    pub cdp_port: u16,

    pub user_data_dir: Option<String>,

    /// Profile-specific executable, wins over `browser.executable`
    pub browser_path: Option<String>,

    #[serde(default)]
    pub headless: bool,

    /// Existing browser to attach to instead of launching one
    pub cdp_url: Option<String>,

    #[serde(default)]
    pub extra_args: Vec<String>,
}

fn default_cdp_port() -> u16 {
    9222
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            cdp_port: default_cdp_port(),
            user_data_dir: None,
            browser_path: None,
            headless: false,
            cdp_url: None,
            extra_args: Vec::new(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let mut profiles = HashMap::new();
        profiles.insert(default_profile_name(), ProfileConfig::default());

        Self {
            browser: BrowserConfig::default(),
            collect: CollectConfig::default(),
            profiles,
        }
    }
}

impl Config {
    pub fn effective_default_profile_name(&self) -> String {
        let trimmed = self.browser.default_profile.trim();
        if trimmed.is_empty() {
            default_profile_name()
        } else {
            trimmed.to_string()
        }
    }

    /// Load configuration from defaults, the config file and `FPLAB_*` env vars
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            // FPLAB_COLLECT__AUDIO_TIMEOUT_MS -> collect.audio_timeout_ms
            .merge(Env::prefixed("FPLAB_").split("__"))
            .extract()
            .map_err(|e| FplabError::ConfigError(e.to_string()))
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("fplab")
            .join("config.toml")
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content =
            toml::to_string_pretty(self).map_err(|e| FplabError::ConfigError(e.to_string()))?;

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get a profile by name. The configured default profile always exists.
    ///
    /// `[browser]` fills in what the profile leaves unset: `executable` when
    /// the profile has no `browser_path`, and `headless` when it is on.
    pub fn get_profile(&self, name: &str) -> Result<ProfileConfig> {
        let name = name.trim();

        let mut profile = match self.profiles.get(name) {
            Some(profile) => profile.clone(),
            None if name == self.effective_default_profile_name() => ProfileConfig::default(),
            None => return Err(FplabError::ProfileNotFound(name.to_string())),
        };

        if profile.browser_path.is_none() {
            profile.browser_path = self.browser.executable.clone();
        }
        profile.headless |= self.browser.headless;

        Ok(profile)
    }

    /// Reads a dotted key. `Ok(None)` means the key exists but is unset.
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(match key {
            "browser.executable" => self.browser.executable.clone(),
            "browser.default_profile" => Some(self.browser.default_profile.clone()),
            "browser.headless" => Some(self.browser.headless.to_string()),
            "collect.page_url" => Some(self.collect.page_url.clone()),
            "collect.audio_timeout_ms" => Some(self.collect.audio_timeout_ms.to_string()),
            "collect.probe_timeout_ms" => Some(self.collect.probe_timeout_ms.to_string()),
            "collect.canvas_image" => Some(self.collect.canvas_image.to_string()),
            _ => return Err(unknown_key(key)),
        })
    }

    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "browser.executable" => self.browser.executable = Some(value.to_string()),
            "browser.default_profile" => self.browser.default_profile = value.to_string(),
            "browser.headless" => self.browser.headless = parse_value(key, value)?,
            "collect.page_url" => self.collect.page_url = value.to_string(),
            "collect.audio_timeout_ms" => self.collect.audio_timeout_ms = parse_value(key, value)?,
            "collect.probe_timeout_ms" => self.collect.probe_timeout_ms = parse_value(key, value)?,
            "collect.canvas_image" => self.collect.canvas_image = parse_value(key, value)?,
            _ => return Err(unknown_key(key)),
        }
        Ok(())
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| FplabError::ConfigError(format!("Invalid value for {}: {}", key, value)))
}

fn unknown_key(key: &str) -> FplabError {
    FplabError::ConfigError(format!(
        "Unknown config key: {} (expected one of: {})",
        key,
        KEYS.join(", ")
    ))
}
