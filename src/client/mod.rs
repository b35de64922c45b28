//! Client module: sparkyfish protocol client and measurement engine

pub mod clock;
pub mod config;
pub mod connection;
pub mod constants;
pub mod error;
pub mod interface;
pub mod latency;
pub mod logging;
pub mod metrics;
pub mod progress;
pub mod reporter;
pub mod result;
pub mod runner;
pub mod scheduler;
pub mod statistics;
pub mod throughput;

#[cfg(test)]
pub(crate) mod test_support;

pub use clock::{Clock, MonotonicClock, StepClock};
pub use config::Config;
pub use connection::{dial, ConnectionState, Dialer, ProtocolClient, Target, TcpDialer};
pub use constants::*;
pub use error::{ClientError, Phase, Result};
pub use latency::{measure_round_trip, LatencyProbe};
pub use logging::{init_logging, init_logging_with_config};
pub use metrics::{InfluxSink, StatHatSink};
pub use progress::ProgressTracker;
pub use reporter::{ConsoleReporter, ReportError, ResultSink, TsvSink};
pub use result::{LatencySummary, TestResult, ThroughputSummary};
pub use runner::{run_once, NoopObserver, RunObserver, TestRunner};
pub use scheduler::{run_scheduled, Schedule, Stopper};
pub use throughput::{is_graceful_transfer_end, Direction, ThroughputProbe, ThroughputSeries};
