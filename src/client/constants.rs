//! Constants used throughout the client

use std::time::Duration;

/// Size in KiB of each block of data copied to or from the server
pub const BLOCK_SIZE_KB: usize = 200;

/// Size in bytes of one throughput chunk
pub const CHUNK_SIZE: usize = 1024 * BLOCK_SIZE_KB;

/// Number of bits in one throughput chunk
pub const CHUNK_BITS: f64 = (CHUNK_SIZE * 8) as f64;

/// Wall-clock budget for each throughput direction
pub const THROUGHPUT_TEST_LENGTH: Duration = Duration::from_secs(10);

/// Number of round trips performed by the latency probe
pub const NUM_PINGS: usize = 30;

/// Default sparkyfish server port
pub const DEFAULT_PORT: u16 = 7121;

/// Default socket read/write timeout in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Bits per second in one kbps, for display
pub const KBPS: f64 = 1024.0;

/// Bits per second in one Mbps, for display
pub const MBPS: f64 = 1024.0 * KBPS;

/// Progress spinner tick interval in milliseconds
pub const PROGRESS_TICK_INTERVAL_MS: u64 = 100;

/// Ping average above which the console report flags latency, in milliseconds
pub const SLOW_PING_MS: f64 = 100.0;
