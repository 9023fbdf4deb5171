use std::time::Duration;

use chat_server::logging::init_logging;
use chat_server::{run_server, ServerConfig};
use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(name = "chat-server")]
#[command(about = "Support chat proxy and conversation metrics server")]
#[command(version)]
struct Cli {
    /// Enable debug mode
    #[arg(long, env = "DEBUG", default_value = "false")]
    debug: bool,

    /// Address to bind
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: String,

    /// Server port
    #[arg(long, env = "PORT", default_value = "3000")]
    port: u16,

    /// Bot backend base URL
    #[arg(long, env = "BOT_URL", default_value = "http://localhost:5005")]
    bot_url: String,

    /// Bot backend request timeout in seconds
    #[arg(long, env = "BOT_TIMEOUT_SECS", default_value = "30")]
    bot_timeout_secs: u64,

    /// HTTP worker count (defaults to one per core)
    #[arg(long, env = "WORKERS")]
    workers: Option<usize>,

    /// Log level (overrides debug flag)
    #[arg(long, env = "RUST_LOG")]
    log_level: Option<String>,
}

impl From<Cli> for ServerConfig {
    fn from(cli: Cli) -> Self {
        Self {
            host: cli.host,
            port: cli.port,
            bot_url: cli.bot_url,
            bot_timeout: Duration::from_secs(cli.bot_timeout_secs),
            workers: cli.workers,
        }
    }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.log_level.is_some() {
        env_logger::init();
    } else {
        init_logging(cli.debug);
    }

    log::info!("Starting chat server on {}:{}", cli.host, cli.port);
    log::info!("  Bot backend: {}", cli.bot_url);
    if cli.debug {
        log::debug!("Debug mode enabled");
        log::debug!("  Bot timeout: {}s", cli.bot_timeout_secs);
        log::debug!("  Workers: {:?}", cli.workers);
    }

    run_server(cli.into()).await?;
    Ok(())
}
