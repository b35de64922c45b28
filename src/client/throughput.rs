use crate::client::clock::Clock;
use crate::client::connection::ProtocolClient;
use crate::client::constants::{CHUNK_SIZE, THROUGHPUT_TEST_LENGTH};
use crate::client::error::{ClientError, Phase, Result};
use crate::client::result::ThroughputSummary;
use crate::client::statistics;
use crate::protocol::Command;
use rand::rngs::OsRng;
use rand::RngCore;
use std::io::{self, Read, Write};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Whether an I/O error during a transfer just means the server ended the test
///
/// End of stream, a closed pipe (zero-byte write), a broken pipe and a
/// connection reset all stop the loop without failing the run.
pub fn is_graceful_transfer_end(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::UnexpectedEof
            | io::ErrorKind::WriteZero
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
    )
}

/// Transfer direction, seen from the client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Client uploads, server receives (`RCV`)
    Send,
    /// Server uploads, client receives (`SND`)
    Receive,
}

impl Direction {
    /// Command that puts the server in the matching mode
    pub fn command(self) -> Command {
        match self {
            Direction::Send => Command::Receive,
            Direction::Receive => Command::Send,
        }
    }

    pub fn phase(self) -> Phase {
        match self {
            Direction::Send => Phase::Send,
            Direction::Receive => Phase::Receive,
        }
    }
}

/// Completed chunks of one transfer, in order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ThroughputSeries {
    chunks: Vec<(u64, Duration)>,
}

impl ThroughputSeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, bytes: u64, elapsed: Duration) {
        self.chunks.push((bytes, elapsed));
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn total_bytes(&self) -> u64 {
        self.chunks.iter().map(|(bytes, _)| bytes).sum()
    }

    pub fn total_elapsed(&self) -> Duration {
        self.chunks.iter().map(|(_, elapsed)| *elapsed).sum()
    }

    /// Bit rate of every chunk that took measurable time
    pub fn rates(&self) -> Vec<f64> {
        self.chunks
            .iter()
            .filter_map(|&(bytes, elapsed)| bits_per_second(bytes, elapsed))
            .collect()
    }

    /// Per-chunk rates for min/max; the average is taken once over the whole run
    ///
    /// The run is the sum of completed chunk durations. Time spent on a chunk
    /// that never completed is not part of it.
    pub fn summary(&self) -> ThroughputSummary {
        let rates = self.rates();
        let avg = bits_per_second(self.total_bytes(), self.total_elapsed()).unwrap_or(0.0);
        match statistics::min_max(&rates) {
            Some((min, max)) => ThroughputSummary {
                min,
                max,
                avg,
                samples: rates.len(),
            },
            None => ThroughputSummary {
                avg,
                ..ThroughputSummary::default()
            },
        }
    }
}

fn bits_per_second(bytes: u64, elapsed: Duration) -> Option<f64> {
    let secs = elapsed.as_secs_f64();
    (secs > 0.0).then(|| (bytes * 8) as f64 / secs)
}

/// Fill a buffer from the operating system's CSPRNG
pub fn random_payload(size: usize) -> Result<Vec<u8>> {
    let mut data = vec![0u8; size];
    OsRng.try_fill_bytes(&mut data).map_err(|e| {
        ClientError::Transfer(io::Error::new(
            io::ErrorKind::Other,
            format!("gathering random data: {}", e),
        ))
    })?;
    Ok(data)
}

/// Read exactly `size` bytes and throw them away
fn discard_chunk<R: Read>(reader: &mut R, size: usize) -> io::Result<()> {
    let copied = io::copy(&mut reader.by_ref().take(size as u64), &mut io::sink())?;
    if copied < size as u64 {
        return Err(io::ErrorKind::UnexpectedEof.into());
    }
    Ok(())
}

/// Sustained one-directional bit-rate probe
#[derive(Debug)]
pub struct ThroughputProbe<C: Clock> {
    clock: C,
    budget: Duration,
    chunk_size: usize,
}

impl<C: Clock> ThroughputProbe<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            budget: THROUGHPUT_TEST_LENGTH,
            chunk_size: CHUNK_SIZE,
        }
    }

    /// Override the wall-clock budget per direction
    pub fn with_budget(mut self, budget: Duration) -> Self {
        self.budget = budget;
        self
    }

    /// Override the chunk size in bytes
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Run one direction on a fresh connection, consuming it
    pub fn run<S: Read + Write>(
        &self,
        mut client: ProtocolClient<S>,
        direction: Direction,
    ) -> Result<ThroughputSummary> {
        let series = self.collect(&mut client, direction)?;
        drop(client);

        let summary = series.summary();
        info!(
            direction = ?direction,
            chunks = summary.samples,
            min_bps = summary.min,
            max_bps = summary.max,
            avg_bps = summary.avg,
            stddev_bps = statistics::standard_deviation(&series.rates()).unwrap_or_default(),
            "Throughput test finished"
        );
        Ok(summary)
    }

    /// Transfer chunks until the budget is spent or the server ends the test
    pub fn collect<S: Read + Write>(
        &self,
        client: &mut ProtocolClient<S>,
        direction: Direction,
    ) -> Result<ThroughputSeries> {
        if self.chunk_size == 0 {
            return Err(ClientError::Config("chunk size must be > 0".into()));
        }

        let payload = match direction {
            Direction::Send => random_payload(self.chunk_size)?,
            Direction::Receive => Vec::new(),
        };

        client.write_command(direction.command())?;

        let mut series = ThroughputSeries::new();
        let run_start = self.clock.now();

        loop {
            let start = self.clock.now();

            let outcome = match direction {
                Direction::Send => client.write_all(&payload),
                Direction::Receive => discard_chunk(client, self.chunk_size),
            };

            if let Err(e) = outcome {
                if is_graceful_transfer_end(&e) {
                    debug!(direction = ?direction, reason = %e, "Server ended the test");
                    break;
                }
                warn!(direction = ?direction, error = %e, "Transfer failed");
                return Err(ClientError::Transfer(e));
            }

            let end = self.clock.now();
            series.record(self.chunk_size as u64, end.saturating_sub(start));
            debug!(
                direction = ?direction,
                chunk = series.len(),
                elapsed_us = end.saturating_sub(start).as_micros() as u64,
                "Chunk transferred"
            );

            if end.saturating_sub(run_start) > self.budget {
                break;
            }
        }

        Ok(series)
    }
}
