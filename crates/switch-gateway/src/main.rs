//! Switch gateway daemon

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use switch_gateway::config::Config;
use switch_gateway::error::Result;
use switch_gateway::server::GatewayServer;

/// Switch gateway - recipe and sustainability Q&A over OpenAI and Anthropic
#[derive(Parser)]
#[command(name = "switch-gateway")]
#[command(about = "HTTP gateway answering recipe questions through an LLM provider")]
#[command(version)]
pub struct Cli {
    /// Path to config file
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    /// Include internal error detail in 500 responses
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the gateway server (default command)
    #[command(name = "serve")]
    Serve,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    init_logging();

    let cli = Cli::parse();

    match cli.command {
        None | Some(Command::Serve) => serve(cli.config, cli.debug).await,
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,switch_gateway=debug"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn serve(config_path: Option<PathBuf>, debug: bool) -> Result<()> {
    tracing::info!("Starting Switch gateway");

    let mut config = Config::load(config_path.as_deref())?;
    if debug {
        config.server.debug = true;
    }
    tracing::debug!(
        listen_addr = %config.server.listen_addr,
        debug = config.server.debug,
        "Config loaded"
    );

    GatewayServer::new(config).serve().await
}
