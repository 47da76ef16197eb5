mod commands;
mod logging;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use modelrelay_common::Error;

#[derive(Parser)]
#[command(name = "modelrelay", version, about = "Chat with many LLM backends over MCP")]
struct Cli {
    /// Path to config.yaml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the configured httpPort
    #[arg(long, global = true)]
    port: Option<u16>,

    /// Only log errors
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP MCP server in the foreground
    Serve,
    /// Make sure a background server is running, then print its MCP endpoint
    Launch,
    /// Serve MCP over stdin/stdout
    Stdio,
    /// Report whether a server answers on the port
    Status,
    /// Kill whatever is listening on the port
    Restart,
    /// List configured models
    Models,
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    logging::init(cli.quiet, cli.json_logs);

    let opts = commands::GlobalOpts {
        config: cli.config,
        port: cli.port,
    };
    let result = match cli.command {
        Command::Serve => commands::serve(&opts).await,
        Command::Launch => commands::launch(&opts).await,
        Command::Stdio => commands::stdio(&opts).await,
        Command::Status => commands::status(&opts).await,
        Command::Restart => commands::restart(&opts).await,
        Command::Models => commands::models(&opts),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            // Printed directly so failures surface even under --quiet.
            eprintln!("modelrelay: {e:#}");
            ExitCode::from(exit_code_for(&e))
        }
    }
}

fn exit_code_for(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<Error>() {
        Some(Error::Config(_)) => 2,
        Some(Error::StartupTimeout { .. }) => 3,
        _ => 1,
    }
}
