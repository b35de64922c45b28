//! Server module: minimal sparkyfish-compatible reference server

pub mod config;
pub mod monitor;
pub mod session;

pub use config::ServerConfig;
pub use monitor::{ServerCounters, ServerMonitor, ServerStats};
pub use session::{handle_session, SessionError, SessionSettings};
