use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;

use agent_relay::inference::config::{find_config_path, load_models_config};
use agent_relay::{default_log_dir, init_tracing, ChatRequest, ChatService, Orchestrator};

#[derive(Parser, Debug)]
#[command(name = "agent-relay", version, about = "Route a message through the Relay agent pipeline")]
struct Cli {
    #[arg(long, help = "Path to models.yaml (defaults to AGENT_RELAY_CONFIG or ./config/models.yaml)")]
    config: Option<PathBuf>,
    #[arg(long, help = "Write JSON logs to this directory instead of stderr")]
    log_dir: Option<PathBuf>,
    #[arg(long, conflicts_with = "log_dir", help = "Write JSON logs to the platform data directory")]
    log_file: bool,
    #[arg(long, help = "Session id echoed in the response; history does not outlive the process")]
    session: Option<String>,
    #[arg(long, help = "Print the full response envelope as JSON")]
    json: bool,
    #[arg(help = "Message to send; read from stdin when omitted")]
    utterance: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_dir = cli.log_dir.or_else(|| cli.log_file.then(default_log_dir));
    init_tracing(log_dir.as_deref()).context("failed to initialise logging")?;

    let config_path = match cli.config {
        Some(path) => path,
        None => {
            let cwd = std::env::current_dir().context("failed to read current directory")?;
            find_config_path(&cwd)?
        }
    };
    let config = load_models_config(&config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;
    tracing::info!(config = %config_path.display(), "configuration loaded");

    let message = if cli.utterance.is_empty() {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read message from stdin")?;
        buf
    } else {
        cli.utterance.join(" ")
    };
    if message.trim().is_empty() {
        bail!("no message given");
    }

    // One turn per process, so no history store is attached.
    let orchestrator = Orchestrator::from_config(&config)?;
    let service = ChatService::new(Arc::new(orchestrator), config.pipeline.max_message_length);

    let response = service
        .process(ChatRequest {
            message,
            session_id: cli.session,
        })
        .await?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        println!("{}", response.response);
    }
    Ok(())
}
