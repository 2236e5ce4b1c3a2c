//! mcp-connect: operator CLI over the dynamic MCP connection registry.
//!
//! - `mcp-connect run --config registry.yaml` registers every configured
//!   connection, reports status and tools, and keeps retrying until Ctrl-C.
//! - `mcp-connect test --name catalog --url http://catalog.local` performs a
//!   one-off handshake against a single server.

mod args;
mod commands;
mod logging;

use clap::Parser;

use crate::args::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(&cli.log_level, cli.json_logs)?;

    match cli.command {
        Commands::Run { config } => commands::run(&config).await,
        Commands::Test {
            name,
            url,
            endpoint,
            headers,
            config,
        } => commands::test(name, url, endpoint, headers, config.as_deref()).await,
    }
}
