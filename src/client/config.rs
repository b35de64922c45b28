use crate::client::connection::Target;
use crate::client::constants::{DEFAULT_PORT, DEFAULT_TIMEOUT_MS};
use crate::client::error::{ClientError, Result};
use crate::client::scheduler::Schedule;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

#[derive(Parser, Debug, Clone)]
#[command(name = "continuous-spark")]
#[command(about = "Periodic latency and throughput tests against a sparkyfish server")]
#[command(version)]
pub struct Config {
    /// Hostname / IP of the sparkyfish server
    #[arg(long)]
    pub hostname: String,

    /// Port the sparkyfish server is running on
    #[arg(long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Local network interface to bind outbound connections to
    #[arg(long)]
    pub interface: Option<String>,

    /// Interval between test runs in seconds
    #[arg(long, default_value_t = 900)]
    pub interval_secs: u64,

    /// Run a single test and exit
    #[arg(long)]
    pub once: bool,

    /// File to append results to
    #[arg(long, default_value = "measures.tsv")]
    pub tsv_file: PathBuf,

    /// Do not write results to the TSV file
    #[arg(long)]
    pub no_tsv: bool,

    /// Socket read/write timeout in milliseconds
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_MS)]
    pub timeout_ms: u64,

    /// StatHat EZ key; when set, averages are posted to StatHat
    #[arg(long)]
    pub stathat_ezkey: Option<String>,

    /// InfluxDB base URL (e.g. http://localhost:8086); when set, results are written there
    #[arg(long)]
    pub influx_url: Option<String>,

    /// InfluxDB database name
    #[arg(long, default_value = "continuous_spark")]
    pub influx_db: String,

    /// InfluxDB user
    #[arg(long, requires = "influx_pass")]
    pub influx_user: Option<String>,

    /// InfluxDB password
    #[arg(long, requires = "influx_user")]
    pub influx_pass: Option<String>,

    /// Disable the progress spinner and console summary
    #[arg(long)]
    pub quiet: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Log format (text or json)
    #[arg(long, default_value = "text", value_parser = ["text", "json"])]
    pub log_format: String,
}

impl Config {
    /// Returns the configured timeout as a Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// The server the core should test against
    pub fn target(&self) -> Target {
        let target = Target::new(self.hostname.clone(), self.port).with_timeout(self.timeout());
        match &self.interface {
            Some(name) => target.with_interface(name.clone()),
            None => target,
        }
    }

    pub fn schedule(&self) -> Schedule {
        if self.once {
            Schedule::Once
        } else {
            Schedule::Every(Duration::from_secs(self.interval_secs))
        }
    }

    /// Returns true if JSON format logging is enabled
    pub fn is_json_format(&self) -> bool {
        self.log_format.to_lowercase() == "json"
    }

    /// Validates the configuration values
    pub fn validate(&self) -> Result<()> {
        debug!("Validating configuration");
        if self.hostname.trim().is_empty() {
            return Err(ClientError::Config("hostname must not be empty".into()));
        }
        if self.port == 0 {
            return Err(ClientError::Config("port must be > 0".into()));
        }
        if self.timeout_ms == 0 {
            return Err(ClientError::Config("timeout must be > 0".into()));
        }
        if !self.once && self.interval_secs == 0 {
            return Err(ClientError::Config("interval must be > 0".into()));
        }
        if matches!(&self.interface, Some(name) if name.trim().is_empty()) {
            return Err(ClientError::Config("interface name must not be empty".into()));
        }
        if matches!(&self.stathat_ezkey, Some(key) if key.trim().is_empty()) {
            return Err(ClientError::Config("stathat ezkey must not be empty".into()));
        }
        if let Some(url) = &self.influx_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ClientError::Config(
                    "influx url must start with http:// or https://".into(),
                ));
            }
            if self.influx_db.trim().is_empty() {
                return Err(ClientError::Config("influx database must not be empty".into()));
            }
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ClientError::Config(format!(
                "log_level must be one of: {}",
                valid_levels.join(", ")
            )));
        }
        debug!("Configuration validated successfully");
        Ok(())
    }
}
