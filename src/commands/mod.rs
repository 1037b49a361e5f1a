pub mod browser;
pub mod collect;
pub mod config;

use crate::cli::Cli;
use crate::config::Config;
use crate::error::Result;

/// Loads the configuration with `--browser-path` and `--headless` folded into
/// the selected profile.
pub(crate) fn effective_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load()?;

    let name = match cli.profile.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(name) => name.to_string(),
        None => config.effective_default_profile_name(),
    };

    let mut profile = config.get_profile(&name)?;
    if let Some(ref path) = cli.browser_path {
        profile.browser_path = Some(path.clone());
    }
    if cli.headless {
        profile.headless = true;
    }
    config.profiles.insert(name, profile);

    Ok(config)
}
