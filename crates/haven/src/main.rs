#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};
#[cfg(feature = "cli")]
use haven::{config::Config, server, session::Disposition};

#[cfg(feature = "cli")]
#[derive(Parser)]
#[command(name = "haven", version, about = "Safety-gated conversational support service")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[cfg(feature = "cli")]
#[derive(Subcommand)]
enum Command {
    /// Serve the session API over HTTP.
    Serve,
    /// Talk to the pipeline from the terminal.
    Chat {
        /// Resume this session instead of starting a new one.
        #[arg(long)]
        session: Option<String>,
    },
}

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    haven::telemetry::init_tracing();
    haven::metrics::init_metrics();

    let cfg = Config::from_env()?;
    match cli.command {
        Command::Serve => server::run_server(cfg).await,
        Command::Chat { session } => chat(cfg, session).await,
    }
}

#[cfg(feature = "cli")]
async fn chat(cfg: Config, session: Option<String>) -> anyhow::Result<()> {
    use tokio::io::{AsyncBufReadExt, BufReader};

    let runtime = server::Runtime::from_config(&cfg)?;
    let session_id = session.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    println!("Session {} (empty line or Ctrl-D to leave)", session_id);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            break;
        }
        let outcome = runtime.manager.submit(&session_id, line).await?.outcome().await?;
        println!("\n{}\n", outcome.response);
        if outcome.disposition == Disposition::Blocked && outcome.flagged_for_review {
            println!("[this conversation has been flagged for follow-up]\n");
        }
    }

    runtime.manager.close(&session_id).await?;
    Ok(())
}

#[cfg(not(feature = "cli"))]
fn main() {
    println!("CLI feature not enabled. Enable with --features cli");
}
