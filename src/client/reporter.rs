use crate::client::constants::{MBPS, SLOW_PING_MS};
use crate::client::result::TestResult;
use chrono::{DateTime, Local, SecondsFormat, TimeZone};
use colored::*;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Header line written to a new TSV file
pub const TSV_HEADER: &str = "Date\tPing Min (ms)\tPing Avg (ms)\tPing Max (ms)\tPing StdDev (ms)\tRX Avg (bps)\tTX Avg (bps)\n";

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("writing {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("posting to {sink}: {source}")]
    Http {
        sink: &'static str,
        #[source]
        source: reqwest::Error,
    },
}

/// Consumer of finished test results
pub trait ResultSink {
    fn record(&mut self, result: &TestResult) -> Result<(), ReportError>;
}

/// Appends one tab-separated line per result to a file
#[derive(Debug, Clone)]
pub struct TsvSink {
    path: PathBuf,
}

impl TsvSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// One data line: timestamp, ping min/avg/max/stddev, then RX and TX averages
    pub fn format_row<Tz: TimeZone>(timestamp: &DateTime<Tz>, result: &TestResult) -> String
    where
        Tz::Offset: std::fmt::Display,
    {
        format!(
            "{}\t{:.2}\t{:.2}\t{:.2}\t{:.2}\t{:.0}\t{:.0}\n",
            timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            result.ping.min,
            result.ping.avg,
            result.ping.max,
            result.ping.stddev,
            result.receive.avg,
            result.send.avg,
        )
    }

    fn append(&self, result: &TestResult) -> std::io::Result<()> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "Creating TSV file");
            std::fs::write(&self.path, TSV_HEADER)?;
        }

        let mut file = OpenOptions::new().append(true).open(&self.path)?;
        file.write_all(Self::format_row(&Local::now(), result).as_bytes())
    }
}

impl ResultSink for TsvSink {
    fn record(&mut self, result: &TestResult) -> Result<(), ReportError> {
        self.append(result).map_err(|source| ReportError::Io {
            path: self.path.clone(),
            source,
        })?;
        debug!(path = %self.path.display(), "Result appended to TSV file");
        Ok(())
    }
}

/// Colored human-readable summary on stdout
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleReporter;

impl ConsoleReporter {
    pub fn render(result: &TestResult) -> String {
        let mut lines = vec![
            format!("{}", "┌─────────────────────────────┐".cyan()),
            format!("{}", "│  Sparkyfish Results         │".cyan()),
            format!("{}", "└─────────────────────────────┘".cyan()),
            String::new(),
            "Ping (round-trip time):".to_string(),
        ];

        if result.ping.has_data() {
            let avg = format!("{:>8.2} ms", result.ping.avg);
            let avg = if result.ping.avg > SLOW_PING_MS {
                avg.yellow()
            } else {
                avg.green()
            };
            lines.push(format!("  Avg:    {}", avg));
            lines.push(format!("  Min:    {:>8.2} ms", result.ping.min));
            lines.push(format!("  Max:    {:>8.2} ms", result.ping.max));
            lines.push(format!("  StdDev: {:>8.2} ms", result.ping.stddev));
        } else {
            lines.push(format!("  {}", "no data".red()));
        }

        for (label, summary) in [("Upload", &result.send), ("Download", &result.receive)] {
            lines.push(String::new());
            lines.push(format!("{} ({} chunks):", label, summary.samples));
            if summary.has_data() {
                lines.push(format!(
                    "  Avg:    {}",
                    format!("{:>8.2} Mbps", summary.avg / MBPS).green()
                ));
                lines.push(format!("  Min:    {:>8.2} Mbps", summary.min / MBPS));
                lines.push(format!("  Max:    {:>8.2} Mbps", summary.max / MBPS));
            } else {
                lines.push(format!("  {}", "no data".red()));
            }
        }

        lines.join("\n")
    }
}

impl ResultSink for ConsoleReporter {
    fn record(&mut self, result: &TestResult) -> Result<(), ReportError> {
        println!("{}\n", Self::render(result));
        info!(result = %result, "Results reported");
        Ok(())
    }
}
