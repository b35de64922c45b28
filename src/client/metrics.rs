//! Sinks that push finished results to external metrics services

use crate::client::reporter::{ReportError, ResultSink};
use crate::client::result::TestResult;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::blocking::Client;
use std::time::Duration;
use tracing::debug;

/// StatHat EZ API endpoint
pub const STATHAT_EZ_ENDPOINT: &str = "https://api.stathat.com/ez";

pub const METRIC_PING: &str = "[CS] Ping";
pub const METRIC_THRESHOLD_RX: &str = "[CS] Threshold RX";
pub const METRIC_THRESHOLD_TX: &str = "[CS] Threshold TX";

/// Measurement name used for InfluxDB points
pub const INFLUX_MEASUREMENT: &str = "sparkyfish";

/// Request timeout for every metrics push
const HTTP_TIMEOUT: Duration = Duration::from_secs(2);

fn http_client(sink: &'static str) -> Result<Client, ReportError> {
    Client::builder()
        .timeout(HTTP_TIMEOUT)
        .user_agent(concat!("continuous-spark/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|source| ReportError::Http { sink, source })
}

/// Posts ping and throughput averages as StatHat EZ values
#[derive(Debug, Clone)]
pub struct StatHatSink {
    client: Client,
    endpoint: String,
    ezkey: String,
}

impl StatHatSink {
    pub fn new(ezkey: impl Into<String>) -> Result<Self, ReportError> {
        Ok(Self {
            client: http_client("StatHat")?,
            endpoint: STATHAT_EZ_ENDPOINT.to_string(),
            ezkey: ezkey.into(),
        })
    }

    /// Post to a different EZ endpoint
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Stat names and values posted for one result
    pub fn values(result: &TestResult) -> [(&'static str, f64); 3] {
        [
            (METRIC_PING, result.ping.avg),
            (METRIC_THRESHOLD_RX, result.receive.avg),
            (METRIC_THRESHOLD_TX, result.send.avg),
        ]
    }
}

impl ResultSink for StatHatSink {
    fn record(&mut self, result: &TestResult) -> Result<(), ReportError> {
        for (stat, value) in Self::values(result) {
            let value = value.to_string();
            self.client
                .post(&self.endpoint)
                .form(&[
                    ("ezkey", self.ezkey.as_str()),
                    ("stat", stat),
                    ("value", value.as_str()),
                ])
                .send()
                .and_then(|response| response.error_for_status())
                .map_err(|source| ReportError::Http {
                    sink: "StatHat",
                    source,
                })?;
            debug!(stat = stat, value = %value, "Posted StatHat value");
        }
        Ok(())
    }
}

/// Writes one InfluxDB point per result over the HTTP line protocol API
#[derive(Debug, Clone)]
pub struct InfluxSink {
    client: Client,
    url: String,
    database: String,
    credentials: Option<(String, String)>,
    server: String,
}

impl InfluxSink {
    /// `server` is stored as a tag on every point
    pub fn new(
        url: impl Into<String>,
        database: impl Into<String>,
        server: impl Into<String>,
    ) -> Result<Self, ReportError> {
        Ok(Self {
            client: http_client("InfluxDB")?,
            url: url.into(),
            database: database.into(),
            credentials: None,
            server: server.into(),
        })
    }

    pub fn with_credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some((user.into(), password.into()));
        self
    }

    /// Format one point with second precision
    ///
    /// Ping fields are left out when no round trip was recorded so the point
    /// never carries an infinite sentinel.
    pub fn line_protocol<Tz: TimeZone>(
        timestamp: &DateTime<Tz>,
        server: &str,
        result: &TestResult,
    ) -> String {
        let mut fields = Vec::new();
        if result.ping.has_data() {
            fields.push(format!("ping_min={}", result.ping.min));
            fields.push(format!("ping_avg={}", result.ping.avg));
            fields.push(format!("ping_max={}", result.ping.max));
            fields.push(format!("ping_stddev={}", result.ping.stddev));
        }
        fields.push(format!("rx_avg={}", result.receive.avg));
        fields.push(format!("tx_avg={}", result.send.avg));

        format!(
            "{},server={} {} {}",
            INFLUX_MEASUREMENT,
            escape_tag(server),
            fields.join(","),
            timestamp.timestamp()
        )
    }
}

fn escape_tag(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, ',' | ' ' | '=') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

impl ResultSink for InfluxSink {
    fn record(&mut self, result: &TestResult) -> Result<(), ReportError> {
        let line = Self::line_protocol(&Utc::now(), &self.server, result);
        let mut request = self
            .client
            .post(format!("{}/write", self.url.trim_end_matches('/')))
            .query(&[("db", self.database.as_str()), ("precision", "s")])
            .body(line.clone());
        if let Some((user, password)) = &self.credentials {
            request = request.basic_auth(user, Some(password));
        }

        request
            .send()
            .and_then(|response| response.error_for_status())
            .map_err(|source| ReportError::Http {
                sink: "InfluxDB",
                source,
            })?;
        debug!(point = %line, "Wrote InfluxDB point");
        Ok(())
    }
}
