use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::collect::CollectorKind;
use crate::commands;
use crate::error::Result;

/// fplab - Browser and device fingerprint collection
#[derive(Parser)]
#[command(name = "fplab")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Browser executable path (overrides auto-discovery)
    #[arg(long, env = "FPLAB_BROWSER_PATH", global = true)]
    pub browser_path: Option<String>,

    /// CDP port or WebSocket URL of an already running browser
    #[arg(long, env = "FPLAB_CDP", global = true)]
    pub cdp: Option<String>,

    /// Profile name to use
    #[arg(short = 'P', long, env = "FPLAB_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Run the browser headless
    #[arg(long, env = "FPLAB_HEADLESS", global = true)]
    pub headless: bool,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the collectors and show what they found
    Collect {
        /// Collect from a simulated device instead of a browser
        #[arg(long)]
        simulate: bool,

        /// Device profile (JSON) for the simulated device
        #[arg(long, value_name = "FILE", requires = "simulate")]
        device: Option<PathBuf>,

        /// Generate a random but plausible simulated device from this seed
        #[arg(long, requires = "simulate", conflicts_with = "device")]
        seed: Option<u64>,

        /// Only run these collectors (comma separated)
        #[arg(long, value_enum, value_delimiter = ',')]
        only: Vec<CollectorKind>,

        /// Page to collect in (defaults to collect.page_url)
        #[arg(long)]
        url: Option<String>,

        /// Write results into the page's slot elements instead of the terminal
        #[arg(long, conflicts_with = "simulate")]
        inject: bool,

        /// Show the canvas result as an <img> element
        #[arg(long)]
        canvas_image: bool,
    },

    /// List the collectors and their slots
    Collectors,

    /// Print the candidate font families probed by the fonts collector
    Fonts,

    /// Browser session management
    Browser {
        #[command(subcommand)]
        command: BrowserCommands,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum BrowserCommands {
    /// Show detected browsers and session status
    Status,

    /// Close the profile's browser
    Close,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show,

    /// Get a configuration value
    Get {
        /// Dotted key (e.g., collect.audio_timeout_ms)
        key: String,
    },

    /// Set a configuration value
    Set {
        /// Dotted key (e.g., collect.page_url)
        key: String,
        /// New value
        value: String,
    },

    /// Print the configuration file path
    Path,
}

impl Cli {
    pub async fn run(&self) -> Result<()> {
        match &self.command {
            Commands::Collect {
                simulate,
                device,
                seed,
                only,
                url,
                inject,
                canvas_image,
            } => {
                commands::collect::run(
                    self,
                    &commands::collect::CollectArgs {
                        simulate: *simulate,
                        device: device.clone(),
                        seed: *seed,
                        only: only.clone(),
                        url: url.clone(),
                        inject: *inject,
                        canvas_image: *canvas_image,
                    },
                )
                .await
            }
            Commands::Collectors => commands::collect::list_collectors(self),
            Commands::Fonts => commands::collect::list_fonts(self),
            Commands::Browser { command } => commands::browser::run(self, command).await,
            Commands::Config { command } => commands::config::run(self, command).await,
        }
    }
}
