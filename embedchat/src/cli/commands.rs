//! CLI command execution.

use anyhow::Result;

use crate::config::ServerConfig;
use crate::server;

use super::args::{Cli, Commands};

/// Execute the parsed CLI command.
pub async fn execute(cli: Cli) -> Result<()> {
    match cli.command {
        Some(Commands::Serve { port }) => serve(port.or(cli.port)).await,
        Some(Commands::Config) => {
            print_config(&ServerConfig::from_env());
            Ok(())
        }
        // Bare `embedchat` starts the server.
        None => serve(cli.port).await,
    }
}

async fn serve(port_override: Option<u16>) -> Result<()> {
    let mut config = ServerConfig::from_env();
    if let Some(port) = port_override {
        config.port = port;
    }
    server::start_server(config).await
}

fn print_config(config: &ServerConfig) {
    println!("port:                    {}", config.port);
    println!("environment:             {}", config.env);
    println!(
        "api key:                 {}",
        if config.api_key.is_some() {
            "configured"
        } else {
            "not configured (fallback-only mode)"
        }
    );
    println!("rate limit window (ms):  {}", config.rate_limit_window_ms);
    println!("rate limit max requests: {}", config.rate_limit_max_requests);
}
