//! CLI argument definitions using clap

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "mcp-connect")]
#[command(about = "Supervise dynamic connections to remote MCP tool servers")]
#[command(version)]
pub struct Cli {
    /// Log level used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info", env = "MCP_CONNECT_LOG_LEVEL")]
    pub log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Register every configured connection and keep them alive until Ctrl-C
    Run {
        /// YAML registry configuration
        #[arg(long, short, env = "MCP_CONNECT_CONFIG")]
        config: PathBuf,
    },

    /// Probe a single MCP endpoint and exit
    Test {
        /// Connection name
        #[arg(long)]
        name: String,

        /// Base URL of the server
        #[arg(long)]
        url: String,

        /// Request sub-path (defaults to /api/mcp)
        #[arg(long)]
        endpoint: Option<String>,

        /// Extra request header, as KEY=VALUE (repeatable)
        #[arg(long = "header", value_parser = parse_header)]
        headers: Vec<(String, String)>,

        /// Optional YAML configuration for client settings
        #[arg(long, short)]
        config: Option<PathBuf>,
    },
}

fn parse_header(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", raw))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty header name in '{}'", raw));
    }
    Ok((key.to_string(), value.to_string()))
}
