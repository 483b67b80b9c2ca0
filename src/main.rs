mod cache;
mod cli;
mod config;
mod detect;
mod errors;
mod history;
mod model;
mod pipeline;
mod render;
mod source;
mod spool;
mod store;
mod util;

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cardpress=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = cli::parse_command(&args)?;
    cli::handle(command).await
}
