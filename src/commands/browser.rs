use colored::Colorize;

use crate::browser::{discover_all_browsers, SessionManager, SessionStatus};
use crate::cli::{BrowserCommands, Cli};
use crate::error::Result;

pub async fn run(cli: &Cli, command: &BrowserCommands) -> Result<()> {
    let config = super::effective_config(cli)?;
    let session_manager = SessionManager::new(config);

    match command {
        BrowserCommands::Status => status(cli, &session_manager).await,
        BrowserCommands::Close => close(cli, &session_manager).await,
    }
}

async fn status(cli: &Cli, session_manager: &SessionManager) -> Result<()> {
    let browsers = discover_all_browsers();
    let status = session_manager.get_status(cli.profile.as_deref()).await;

    if cli.json {
        let session = match &status {
            SessionStatus::Running {
                profile,
                cdp_port,
                cdp_url,
            } => serde_json::json!({
                "profile": profile,
                "state": "running",
                "cdp_port": cdp_port,
                "cdp_url": cdp_url,
            }),
            SessionStatus::Stale { profile } => {
                serde_json::json!({ "profile": profile, "state": "stale" })
            }
            SessionStatus::NotRunning { profile } => {
                serde_json::json!({ "profile": profile, "state": "not_running" })
            }
        };
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "browsers": browsers,
                "session": session,
            }))?
        );
        return Ok(());
    }

    println!("{}", "Detected Browsers:".bold());
    if browsers.is_empty() {
        println!("  {} No browsers found", "!".yellow());
    } else {
        for browser in browsers {
            println!(
                "  {} {} {}",
                "✓".green(),
                browser.browser_type.name(),
                browser
                    .version
                    .map(|v| format!("(v{})", v))
                    .unwrap_or_default()
                    .dimmed()
            );
            println!("    {}", browser.path.display().to_string().dimmed());
        }
    }
    println!();

    println!("{}", "Session Status:".bold());
    match status {
        SessionStatus::Running {
            profile,
            cdp_port,
            cdp_url,
        } => {
            println!("  {} Profile: {}", "✓".green(), profile.cyan());
            println!("  {} CDP Port: {}", "✓".green(), cdp_port);
            println!("  {} CDP URL: {}", "✓".green(), cdp_url.dimmed());

            if let Ok(pages) = session_manager.get_pages(Some(&profile)).await {
                println!();
                println!("{}", "Open Pages:".bold());
                for (i, page) in pages.iter().enumerate() {
                    println!(
                        "  {}. {} {}",
                        (i + 1).to_string().cyan(),
                        page.title.bold(),
                        format!("({})", page.id).dimmed()
                    );
                    println!("     {}", page.url.dimmed());
                }
            }
        }
        SessionStatus::Stale { profile } => {
            println!(
                "  {} Profile: {} (stale session)",
                "!".yellow(),
                profile.cyan()
            );
        }
        SessionStatus::NotRunning { profile } => {
            println!(
                "  {} Profile: {} (not running)",
                "○".dimmed(),
                profile.cyan()
            );
        }
    }

    Ok(())
}

async fn close(cli: &Cli, session_manager: &SessionManager) -> Result<()> {
    let profile = session_manager.resolve_profile_name(cli.profile.as_deref());
    let closed = session_manager.close_session(Some(&profile)).await?;

    if cli.json {
        println!(
            "{}",
            serde_json::json!({ "profile": profile, "closed": closed })
        );
    } else if closed {
        println!("{} Browser closed for profile {}", "✓".green(), profile.cyan());
    } else {
        println!("{} No session for profile {}", "○".dimmed(), profile.cyan());
    }

    Ok(())
}
