// src/main.rs
// Entry point: configuration, logging, transport selection

use clap::Parser;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use mcp_hubspot::config::{Settings, Transport};
use mcp_hubspot::error::ServerError;
use mcp_hubspot::server;

#[tokio::main]
async fn main() {
    // Optional .env for local development; real deployments set env vars
    let _ = dotenvy::dotenv();

    let settings = Settings::parse();

    // Logs go to stderr: stdout belongs to the stdio transport. Quiet by
    // default on stdio so framing is never polluted by chatty output.
    let default_level = match settings.transport {
        Transport::Stdio => Level::WARN,
        Transport::Sse => Level::INFO,
    };
    let level = std::env::var("RUST_LOG")
        .ok()
        .and_then(|value| value.parse::<Level>().ok())
        .unwrap_or(default_level);
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    if let Err(err) = settings.validate() {
        eprintln!("configuration error: {err}");
        std::process::exit(2);
    }

    match server::run(settings).await {
        Ok(()) => {}
        Err(ServerError::Config(message)) => {
            eprintln!("configuration error: {message}");
            std::process::exit(2);
        }
        Err(err) => {
            eprintln!("fatal: {err}");
            std::process::exit(1);
        }
    }
}
