//! devops-rewind - record terminal sessions, then replay, rewind, branch and diff them.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use devops_rewind::cli::{execute, Cli};

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so exports on stdout stay clean.
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(false),
        )
        .init();

    let cli = Cli::parse();
    execute(cli).await
}
