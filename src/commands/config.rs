use colored::Colorize;

use crate::cli::{Cli, ConfigCommands};
use crate::config::Config;
use crate::error::{FplabError, Result};

pub async fn run(cli: &Cli, command: &ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Show => show(cli),
        ConfigCommands::Get { key } => get(cli, key),
        ConfigCommands::Set { key, value } => set(cli, key, value),
        ConfigCommands::Path => path(cli),
    }
}

fn show(cli: &Cli) -> Result<()> {
    let config = Config::load()?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&config)?);
    } else {
        let toml_str =
            toml::to_string_pretty(&config).map_err(|e| FplabError::ConfigError(e.to_string()))?;
        println!("{}", toml_str);
    }

    Ok(())
}

fn get(cli: &Cli, key: &str) -> Result<()> {
    let value = Config::load()?.get(key)?;

    if cli.json {
        println!("{}", serde_json::json!({ "key": key, "value": value }));
    } else {
        match value {
            Some(v) => println!("{}", v),
            None => println!("{}", "(not set)".dimmed()),
        }
    }

    Ok(())
}

fn set(cli: &Cli, key: &str, value: &str) -> Result<()> {
    let mut config = Config::load()?;
    config.set(key, value)?;
    config.save()?;

    if cli.json {
        println!("{}", serde_json::json!({ "key": key, "value": value }));
    } else {
        println!("{} Set {} = {}", "✓".green(), key, value);
    }

    Ok(())
}

fn path(cli: &Cli) -> Result<()> {
    let path = Config::config_path();

    if cli.json {
        println!(
            "{}",
            serde_json::json!({ "path": path.display().to_string(), "exists": path.exists() })
        );
    } else {
        println!("{}", path.display());
    }

    Ok(())
}
