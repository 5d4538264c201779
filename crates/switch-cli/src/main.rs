use std::path::PathBuf;

use clap::{Parser, Subcommand};
use switch_cli::commands::{AskCommand, ConfigCommand};
use switch_cli::error::CliResult;
use switch_cli::output::OutputFormat;

#[derive(Parser)]
#[command(name = "switch-cli")]
#[command(about = "Switch CLI - ask a running gateway and inspect its configuration")]
#[command(version)]
pub struct Cli {
    #[clap(long, short, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[clap(long, short = 'c', global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    #[clap(about = "Ask a question through a running gateway")]
    Ask(AskCommand),

    #[clap(about = "Configuration commands")]
    Config(ConfigCommand),
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> CliResult<()> {
    let cli = Cli::parse();

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Table
    };

    match &cli.command {
        Command::Ask(cmd) => cmd.execute(format).await,
        Command::Config(cmd) => cmd.execute(cli.config.as_deref(), format).await,
    }
}
