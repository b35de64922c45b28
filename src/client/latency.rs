use crate::client::clock::Clock;
use crate::client::connection::ProtocolClient;
use crate::client::constants::NUM_PINGS;
use crate::client::error::{ClientError, Result};
use crate::client::result::LatencySummary;
use crate::client::statistics;
use crate::protocol::{Command, PING_BYTE};
use std::io::{Read, Write};
use std::time::Duration;
use tracing::{debug, info};

/// Measure one echo round trip: write the ping byte, block for the reply
pub fn measure_round_trip<S, C>(stream: &mut S, clock: &C) -> Result<Duration>
where
    S: Read + Write,
    C: Clock,
{
    let mut buf = [0u8; 1];
    let start = clock.now();

    stream
        .write_all(&[PING_BYTE])
        .map_err(|e| ClientError::connection("writing ping byte", e))?;
    stream
        .read_exact(&mut buf)
        .map_err(|e| ClientError::connection("reading ping response", e))?;

    Ok(clock.now().saturating_sub(start))
}

/// Round-trip latency probe over an echo-mode connection
#[derive(Debug)]
pub struct LatencyProbe<C: Clock> {
    clock: C,
    count: usize,
}

impl<C: Clock> LatencyProbe<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            count: NUM_PINGS,
        }
    }

    /// Override the number of round trips (defaults to [`NUM_PINGS`])
    pub fn with_count(mut self, count: usize) -> Self {
        self.count = count;
        self
    }

    /// Run the probe on a fresh connection, consuming it
    ///
    /// Any I/O failure aborts the probe; samples gathered so far are dropped.
    pub fn run<S: Read + Write>(&self, mut client: ProtocolClient<S>) -> Result<LatencySummary> {
        let samples = self.collect(&mut client)?;
        drop(client);

        let millis = to_millis(&samples);
        let summary = summarize(&millis)
            .ok_or_else(|| ClientError::Config("ping count must be > 0".into()))?;

        let exact: Vec<f64> = samples.iter().map(|d| d.as_secs_f64() * 1000.0).collect();
        info!(
            min_ms = summary.min,
            max_ms = summary.max,
            avg_ms = summary.avg,
            stddev_ms = summary.stddev,
            exact_avg_ms = statistics::mean(&exact).unwrap_or_default(),
            "Ping test finished"
        );
        Ok(summary)
    }

    /// Switch the server to echo mode and record `count` round trips
    pub fn collect<S: Read + Write>(&self, client: &mut ProtocolClient<S>) -> Result<Vec<Duration>> {
        if self.count == 0 {
            return Err(ClientError::Config("ping count must be > 0".into()));
        }

        client.write_command(Command::Echo)?;

        let mut samples = Vec::with_capacity(self.count);
        for i in 0..self.count {
            let rtt = measure_round_trip(client, &self.clock)?;
            debug!(ping_num = i + 1, rtt_us = rtt.as_micros() as u64, "Ping completed");
            samples.push(rtt);
        }
        Ok(samples)
    }
}

/// Whole milliseconds, truncated
pub fn to_millis(samples: &[Duration]) -> Vec<u64> {
    samples.iter().map(|d| d.as_millis() as u64).collect()
}

/// Reduce whole-millisecond samples to a summary
///
/// The mean is integer division truncated before widening to `f64`, and the
/// standard deviation is taken about that truncated mean. A 1.5 ms true
/// average therefore reports as 1.0.
pub fn summarize(samples_ms: &[u64]) -> Option<LatencySummary> {
    let values: Vec<f64> = samples_ms.iter().map(|&v| v as f64).collect();
    let (min, max) = statistics::min_max(&values)?;

    let sum: u64 = samples_ms.iter().sum();
    let avg = (sum / samples_ms.len() as u64) as f64;
    let stddev = statistics::variance_about(&values, avg)?.sqrt();

    Some(LatencySummary {
        min,
        max,
        avg,
        stddev,
        samples: samples_ms.len(),
    })
}
