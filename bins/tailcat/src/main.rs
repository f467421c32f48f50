mod cmd;

use clap::{Parser, Subcommand};
use cmd::config::{ConnectArgs, StreamArgs, load_config};
use cmd::error::TailcatError;

#[derive(Parser)]
#[command(name = "tailcat", version, about = "Print messages from a Kafka topic as a JSON array")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    connect: ConnectArgs,

    #[command(flatten)]
    stream: StreamArgs,
}

#[derive(Subcommand)]
enum Command {
    /// List all topics on the cluster
    Topics,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), TailcatError> {
    if cli.command.is_none() {
        cli.stream.topic()?;
    }

    let path = cli.connect.config_path()?;
    let config = load_config(&path)?;
    init_tracing(&config.log_level);
    tracing::debug!(config = %path.display(), broker = %config.broker, "config loaded");

    match cli.command {
        Some(Command::Topics) => cmd::topics::run(&config).await,
        None => cmd::stream::run(&config, &cli.stream).await.map(|_| ()),
    }
}

/// Logs go to stderr; stdout carries only the JSON document.
/// `RUST_LOG` takes precedence over the config's `logLevel`.
fn init_tracing(level: &str) {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| level.into()),
        )
        .init();
}
