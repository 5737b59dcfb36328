// File: cmdgate-server/src/main.rs

use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

mod context;
mod demo_commands;
mod players;
mod server;

use server::run_server;

#[derive(Parser, Debug, Clone)]
#[command(name = "cmdgate")]
#[command(author, version, about = "cmdgate - command gating with cooldowns, costs and warmups")]
pub struct Args {
    /// Path to the JSON command config. Created with defaults if missing.
    #[arg(long, default_value = "cmdgate.json")]
    pub config: PathBuf,

    /// Show causes of unexpected command failures to players and in the log.
    #[arg(long, default_value = "false")]
    pub debug: bool,

    /// Log filter used when RUST_LOG is not set.
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let sub = fmt().with_env_filter(filter).finish();
    if let Err(e) = tracing::subscriber::set_global_default(sub) {
        eprintln!("Failed to set global subscriber: {}", e);
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_tracing(&args.log_level);
    info!("cmdgate starting. config={}, debug={}", args.config.display(), args.debug);

    if let Err(e) = run_server(args).await {
        error!("Server error: {:?}", e);
        return Err(e.into());
    }
    Ok(())
}
