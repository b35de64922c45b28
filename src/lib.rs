//! continuous-spark - sparkyfish latency and throughput tester
//!
//! This library implements the client side of the sparkyfish protocol: the
//! connection handshake, a round-trip latency probe and a bidirectional
//! throughput probe, plus the statistics reduced from their samples. A minimal
//! reference server used for local testing lives in [`server`].

pub mod client;
pub mod protocol;
pub mod server;
