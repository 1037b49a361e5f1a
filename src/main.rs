use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use fplab::cli::Cli;
use fplab::error::Result;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // chromiumoxide logs every CDP event it does not recognize.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = if cli.verbose { "debug" } else { "info" };
        let mut filter = EnvFilter::new(level);
        for directive in ["chromiumoxide::conn=warn", "chromiumoxide::handler=warn"] {
            if let Ok(directive) = directive.parse() {
                filter = filter.add_directive(directive);
            }
        }
        filter
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    cli.run().await
}
