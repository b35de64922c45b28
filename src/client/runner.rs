use crate::client::clock::{Clock, MonotonicClock};
use crate::client::connection::{Dialer, Target, TcpDialer};
use crate::client::constants::{CHUNK_SIZE, NUM_PINGS, THROUGHPUT_TEST_LENGTH};
use crate::client::error::{Phase, Result};
use crate::client::latency::LatencyProbe;
use crate::client::result::{LatencySummary, TestResult, ThroughputSummary};
use crate::client::throughput::{Direction, ThroughputProbe};
use std::time::Duration;
use tracing::{debug, info};

/// Hooks called as a run moves through its sub-tests
pub trait RunObserver {
    fn phase_started(&mut self, _phase: Phase) {}

    /// `result` holds everything measured so far
    fn phase_finished(&mut self, _phase: Phase, _result: &TestResult) {}
}

/// Observer that ignores every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl RunObserver for NoopObserver {}

/// Sequences one full test: ping, then send, then receive
///
/// Each sub-test dials its own connection, which is closed before the next one
/// starts. The first failure aborts the run.
#[derive(Debug)]
pub struct TestRunner<D: Dialer, C: Clock> {
    dialer: D,
    clock: C,
    ping_count: usize,
    budget: Duration,
    chunk_size: usize,
}

impl TestRunner<TcpDialer, MonotonicClock> {
    /// Runner for real TCP connections and wall-clock timing
    pub fn for_target(target: Target) -> Self {
        Self::new(TcpDialer::new(target), MonotonicClock::new())
    }
}

impl<D: Dialer, C: Clock> TestRunner<D, C> {
    pub fn new(dialer: D, clock: C) -> Self {
        Self {
            dialer,
            clock,
            ping_count: NUM_PINGS,
            budget: THROUGHPUT_TEST_LENGTH,
            chunk_size: CHUNK_SIZE,
        }
    }

    pub fn with_ping_count(mut self, count: usize) -> Self {
        self.ping_count = count;
        self
    }

    pub fn with_budget(mut self, budget: Duration) -> Self {
        self.budget = budget;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Run one full test
    pub fn run(&self) -> Result<TestResult> {
        self.run_observed(&mut NoopObserver)
    }

    /// Run one full test, reporting progress to `observer`
    pub fn run_observed(&self, observer: &mut dyn RunObserver) -> Result<TestResult> {
        let mut result = TestResult::new();

        observer.phase_started(Phase::Ping);
        result.ping = self.ping().map_err(|e| e.in_phase(Phase::Ping))?;
        observer.phase_finished(Phase::Ping, &result);

        for direction in [Direction::Send, Direction::Receive] {
            let phase = direction.phase();
            observer.phase_started(phase);
            let summary = self
                .throughput(direction)
                .map_err(|e| e.in_phase(phase))?;
            match direction {
                Direction::Send => result.send = summary,
                Direction::Receive => result.receive = summary,
            }
            observer.phase_finished(phase, &result);
        }

        info!(result = %result, "Test run finished");
        Ok(result)
    }

    fn ping(&self) -> Result<LatencySummary> {
        let client = self.dialer.dial()?;
        debug!(remote = client.remote(), "Starting ping test");
        LatencyProbe::new(&self.clock)
            .with_count(self.ping_count)
            .run(client)
    }

    fn throughput(&self, direction: Direction) -> Result<ThroughputSummary> {
        let client = self.dialer.dial()?;
        debug!(remote = client.remote(), direction = ?direction, "Starting throughput test");
        ThroughputProbe::new(&self.clock)
            .with_budget(self.budget)
            .with_chunk_size(self.chunk_size)
            .run(client, direction)
    }
}

/// Run one full test against `target` with default probe settings
pub fn run_once(target: &Target) -> Result<TestResult> {
    TestRunner::for_target(target.clone()).run()
}
