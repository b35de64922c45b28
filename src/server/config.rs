//! Server configuration module
//!
//! Provides CLI argument parsing and validation for the reference server.

use crate::client::constants::{CHUNK_SIZE, DEFAULT_PORT};
use crate::protocol::{ServerInfo, NO_CANONICAL_NAME};
use crate::server::session::SessionSettings;
use clap::Parser;
use std::time::Duration;
use tracing::debug;

#[derive(Parser, Debug, Clone)]
#[command(name = "sparkyfish-server")]
#[command(about = "Minimal sparkyfish-compatible server for local testing")]
pub struct ServerConfig {
    /// Bind address
    #[arg(long, default_value = "0.0.0.0")]
    pub bind: String,

    /// Bind port
    #[arg(long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Canonical name announced to clients ("none" lets clients use the dialed address)
    #[arg(long, default_value = NO_CANONICAL_NAME)]
    pub cname: String,

    /// Location announced to clients
    #[arg(long, default_value = "")]
    pub location: String,

    /// How long to stream data after SND, in seconds
    #[arg(long, default_value_t = 10)]
    pub send_secs: u64,

    /// Monitor update interval in milliseconds
    #[arg(long, default_value_t = 100)]
    pub update_interval: u64,

    /// Disable terminal UI (useful for Docker/systemd/non-interactive environments)
    #[arg(long)]
    pub quiet: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Log format (text or json)
    #[arg(long, default_value = "text", value_parser = ["text", "json"])]
    pub log_format: String,
}

impl ServerConfig {
    /// Returns the full bind address as a string (bind:port)
    pub fn address(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    /// Per-connection behavior derived from the options
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            info: ServerInfo {
                canonical_name: self.cname.clone(),
                location: self.location.clone(),
            },
            send_duration: Duration::from_secs(self.send_secs),
            chunk_size: CHUNK_SIZE,
        }
    }

    /// Validates the configuration values
    pub fn validate(&self) -> Result<(), String> {
        debug!("Validating server configuration");

        if self.port == 0 {
            return Err("port must be > 0".into());
        }

        if self.update_interval == 0 {
            return Err("update_interval must be > 0".into());
        }

        if self.send_secs == 0 {
            return Err("send_secs must be > 0".into());
        }

        if self.cname.contains('\n') || self.location.contains('\n') {
            return Err("cname and location must be single lines".into());
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(format!(
                "log_level must be one of: {}",
                valid_levels.join(", ")
            ));
        }

        debug!("Server configuration validated successfully");
        Ok(())
    }

    /// Returns true if JSON format logging is enabled
    pub fn is_json_format(&self) -> bool {
        self.log_format.to_lowercase() == "json"
    }
}
