use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use crate::browser::{PageConnection, SessionManager};
use crate::cli::Cli;
use crate::collect::fonts::CANDIDATES;
use crate::collect::CollectorKind;
use crate::config::Config;
use crate::error::{FplabError, Result};
use crate::host::cdp::CdpHost;
use crate::host::simulated::{DeviceGenerator, DeviceProfile, SimulatedHost};
use crate::orchestrator::{Orchestrator, Report};
use crate::surface::{PageSurface, TerminalSurface};

const PAGE_LOAD_TIMEOUT: Duration = Duration::from_secs(30);

pub struct CollectArgs {
    pub simulate: bool,
    pub device: Option<PathBuf>,
    pub seed: Option<u64>,
    pub only: Vec<CollectorKind>,
    pub url: Option<String>,
    pub inject: bool,
    pub canvas_image: bool,
}

pub async fn run(cli: &Cli, args: &CollectArgs) -> Result<()> {
    let config = super::effective_config(cli)?;
    let orchestrator = Orchestrator::new(config.collect.settings())
        .only(&args.only)
        .canvas_image(args.canvas_image || config.collect.canvas_image);

    if args.simulate {
        run_simulated(cli, args, &orchestrator).await
    } else {
        run_in_browser(cli, args, &config, &orchestrator).await
    }
}

async fn run_simulated(cli: &Cli, args: &CollectArgs, orchestrator: &Orchestrator) -> Result<()> {
    let profile = match (&args.device, args.seed) {
        (Some(path), _) => DeviceProfile::load(path)?,
        (None, Some(seed)) => DeviceGenerator::with_seed(seed).generate(),
        (None, None) => DeviceProfile::default(),
    };
    tracing::debug!("Simulating device: {}", profile.name);

    let host = SimulatedHost::new(profile);
    let report = with_spinner(cli, "Collecting from simulated device", orchestrator.collect(&host)).await;

    present(cli, orchestrator, &report).await
}

async fn run_in_browser(
    cli: &Cli,
    args: &CollectArgs,
    config: &Config,
    orchestrator: &Orchestrator,
) -> Result<()> {
    let manager = SessionManager::new(config.clone());
    let session = match cli.cdp {
        Some(ref endpoint) => manager.attach(cli.profile.as_deref(), endpoint).await?,
        None => manager.get_or_create_session(cli.profile.as_deref()).await?,
    };

    let url = args
        .url
        .clone()
        .unwrap_or_else(|| config.collect.page_url.clone());
    let target = manager.open_page(&session, &url).await?;
    let ws_url = target.web_socket_debugger_url.clone().ok_or_else(|| {
        FplabError::CdpConnectionFailed("New page has no WebSocket URL".to_string())
    })?;

    let page = Arc::new(PageConnection::connect(&ws_url).await?);
    page.wait_until_loaded(PAGE_LOAD_TIMEOUT).await?;

    let host = CdpHost::new(Arc::clone(&page), config.collect.probe_timeout());
    let report = with_spinner(cli, &format!("Collecting in {}", url), orchestrator.collect(&host)).await;

    if args.inject {
        let written = orchestrator
            .render(&report, &mut PageSurface::new(page))
            .await;
        if cli.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            println!(
                "{} Wrote {} of {} slots into {}",
                "✓".green(),
                written,
                report.entries.len(),
                url
            );
        }
        return Ok(());
    }

    present(cli, orchestrator, &report).await?;

    if let Err(e) = manager.close_page(&session, &target.id).await {
        tracing::debug!("Failed to close collection page: {}", e);
    }
    Ok(())
}

async fn present(cli: &Cli, orchestrator: &Orchestrator, report: &Report) -> Result<()> {
    if cli.json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        orchestrator
            .render(report, &mut TerminalSurface::stdout())
            .await;
    }
    Ok(())
}

async fn with_spinner<F: Future<Output = Report>>(cli: &Cli, message: &str, work: F) -> Report {
    let spinner = create_spinner(cli.json, message);
    let report = work.await;

    if let Some(pb) = spinner {
        let failures = report.failures();
        let summary = if failures == 0 {
            format!("{} Collected {} findings", "✓".green(), report.entries.len())
        } else {
            format!(
                "{} Collected {} findings ({} failed)",
                "!".yellow(),
                report.entries.len(),
                failures
            )
        };
        pb.finish_with_message(summary);
    }
    report
}

/// `None` in JSON mode so stdout stays machine readable.
fn create_spinner(json: bool, message: &str) -> Option<ProgressBar> {
    if json {
        return None;
    }
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("  {spinner} {msg}") {
        pb.set_style(style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]));
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    Some(pb)
}

pub fn list_collectors(cli: &Cli) -> Result<()> {
    if cli.json {
        let entries: Vec<_> = CollectorKind::ALL
            .iter()
            .map(|kind| {
                serde_json::json!({
                    "collector": kind,
                    "slot": kind.slot(),
                    "title": kind.title(),
                    "async": kind.is_async(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    println!("{}", "Collectors (run order):".bold());
    for (i, kind) in CollectorKind::ALL.iter().enumerate() {
        println!(
            "  {}. {:<10} {:<16} {}{}",
            (i + 1).to_string().cyan(),
            kind.to_string(),
            format!("#{}", kind.slot()).dimmed(),
            kind.title(),
            if kind.is_async() { " (async)".dimmed().to_string() } else { String::new() }
        );
    }
    Ok(())
}

pub fn list_fonts(cli: &Cli) -> Result<()> {
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&CANDIDATES[..])?);
    } else {
        for family in CANDIDATES {
            println!("{}", family);
        }
    }
    Ok(())
}
