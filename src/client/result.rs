use crate::client::constants::MBPS;
use std::fmt;

/// Round-trip latency summary, in milliseconds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatencySummary {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    pub stddev: f64,
    pub samples: usize,
}

impl LatencySummary {
    /// True once at least one round trip was recorded
    pub fn has_data(&self) -> bool {
        self.samples > 0
    }
}

impl Default for LatencySummary {
    fn default() -> Self {
        Self {
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            avg: 0.0,
            stddev: 0.0,
            samples: 0,
        }
    }
}

/// Directional throughput summary, in bits per second
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThroughputSummary {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    /// Number of completed chunks
    pub samples: usize,
}

impl ThroughputSummary {
    /// True once at least one chunk was transferred completely
    pub fn has_data(&self) -> bool {
        self.samples > 0
    }
}

impl Default for ThroughputSummary {
    fn default() -> Self {
        Self {
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            avg: 0.0,
            samples: 0,
        }
    }
}

/// Outcome of one full run: ping, then send, then receive
///
/// Bounds start at `+inf`/`-inf`; a summary that never saw a sample keeps them,
/// which callers must read as "no data".
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TestResult {
    pub ping: LatencySummary,
    pub send: ThroughputSummary,
    pub receive: ThroughputSummary,
}

impl TestResult {
    pub fn new() -> Self {
        Self::default()
    }
}

impl fmt::Display for TestResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Ping(ms): min={:.2} max={:.2} avg={:.2} stddev={:.2} | Download(Mbps): min={:.2} max={:.2} avg={:.2} | Upload(Mbps): min={:.2} max={:.2} avg={:.2}",
            self.ping.min,
            self.ping.max,
            self.ping.avg,
            self.ping.stddev,
            self.receive.min / MBPS,
            self.receive.max / MBPS,
            self.receive.avg / MBPS,
            self.send.min / MBPS,
            self.send.max / MBPS,
            self.send.avg / MBPS,
        )
    }
}
