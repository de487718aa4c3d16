//! netchat - a multi-room, line-oriented TCP chat server

use anyhow::Result;
use clap::Parser;
use netchat::config::Config;
use netchat::server::ChatServer;

#[derive(Parser)]
#[command(name = "netchat")]
#[command(about = "A multi-room TCP chat server with buffered group switching")]
#[command(version)]
struct Cli {
    /// TCP port to listen on
    #[arg(default_value_t = 8989)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    // Rejects a second positional argument with a usage line and a
    // non-zero exit.
    let cli = Cli::parse();

    let config = Config::load()?;
    ChatServer::new(cli.port, &config).run().await
}
