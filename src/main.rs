use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use wachat_gateway::channels::{Channel, OutgoingMessage, WhatsAppChannel};
use wachat_gateway::config::CheckStatus;
use wachat_gateway::{ApiServerBuilder, Config};

/// `WaChat` - `WhatsApp` Cloud API relay for an `OpenAI` assistant
#[derive(Parser)]
#[command(name = "wachat", version, about)]
struct Cli {
    /// Port to listen on (overrides `PORT`)
    #[arg(long)]
    port: Option<u16>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Report which required environment variables are set
    CheckConfig,
    /// Send a text message without starting the server
    SendTest {
        /// Recipient phone number, international format without `+`
        to: String,
        /// Message text
        #[arg(default_value = wachat_gateway::api::manual::DEFAULT_TEST_MESSAGE)]
        message: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env file is fine; the environment may be set directly
    let dotenv = dotenvy::dotenv();

    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "info,wachat_gateway=info",
        1 => "info,wachat_gateway=debug",
        2 => "debug",
        _ => "trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    if let Ok(path) = dotenv {
        tracing::debug!(path = %path.display(), "loaded .env file");
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Some(Command::CheckConfig) => return check_config(),
        Some(Command::SendTest { to, message }) => return send_test(&to, &message).await,
        None => {}
    }

    let mut config = Config::from_env()?;
    if let Some(port) = cli.port {
        config.api_server.port = port;
    }

    tracing::info!(
        port = config.api_server.port,
        environment = %config.environment,
        model = %config.openai.model,
        "starting WaChat gateway"
    );

    ApiServerBuilder::new(config).build()?.run().await?;
    Ok(())
}

fn check_config() -> anyhow::Result<()> {
    let config = Config::from_env_lenient()?;
    let checks = config.environment_checks();

    for (var, status) in checks.entries() {
        println!("{var:<20} {}", if status == CheckStatus::Ok { "ok" } else { "missing" });
    }
    println!("{:<20} {}", "ENVIRONMENT", config.environment);
    println!(
        "{:<20} {}",
        "KNOWLEDGE BASE",
        config.openai.vector_store_id.as_deref().unwrap_or("none")
    );

    let missing = checks.missing();
    anyhow::ensure!(
        missing.is_empty(),
        "missing required environment variables: {}",
        missing.join(", ")
    );
    Ok(())
}

async fn send_test(to: &str, message: &str) -> anyhow::Result<()> {
    let config = Config::from_env()?;
    let channel = WhatsAppChannel::new(&config.whatsapp, config.http_timeout)?;

    channel.send(OutgoingMessage::text(to, message)).await?;
    println!("sent to {to} via {}", channel.messages_url());
    Ok(())
}
