//! CLI argument definitions.

use clap::{Parser, Subcommand};

/// Embedchat - embeddable website chat widget service
#[derive(Parser, Debug)]
#[command(name = "embedchat")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Port to listen on (overrides the PORT environment variable)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the chat widget server (default when no subcommand is given)
    Serve {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Print the resolved configuration and exit
    Config,
}
