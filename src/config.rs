//! Configuration and CLI argument handling

use std::path::PathBuf;

use clap::Parser;

use crate::tasks::MIN_SESSION_SECS;

/// CLI argument parsing structure
#[derive(Parser, Debug)]
#[command(name = "study-smart")]
#[command(about = "A local study tracker with a background study-session timer")]
#[command(version = "1.0.0")]
pub struct Config {
    /// Port to bind the server to
    #[arg(short, long, default_value = "20554")]
    pub port: u16,

    /// Host address to bind to
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// SQLite database file
    #[arg(short, long, default_value = "studysmart.db")]
    pub database: PathBuf,

    /// Shortest session, in seconds, that is saved on finish
    #[arg(long, default_value_t = MIN_SESSION_SECS)]
    pub min_session_secs: u64,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Config {
    /// Parse configuration from command line arguments
    pub fn parse() -> Self {
        Parser::parse()
    }

    /// Get the server address as a formatted string
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Get the appropriate log level based on verbose flag
    pub fn log_level(&self) -> &'static str {
        if self.verbose { "debug" } else { "info" }
    }
}
