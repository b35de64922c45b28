//! Server monitoring and statistics display

use colored::*;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Time without traffic before the status line reports IDLE (milliseconds)
const IDLE_THRESHOLD_MS: u64 = 500;

/// Blink interval for the activity indicator (milliseconds)
const BLINK_INTERVAL_MS: u64 = 200;

/// Tracks connection and byte counts across all client threads.
///
/// Counters are lock-free atomics; the optional status line is redrawn from a
/// background thread so client sessions never wait on the terminal.
pub struct ServerMonitor {
    counters: Arc<ServerCounters>,
    start_time: Instant,
    update_interval: Duration,
}

impl ServerMonitor {
    /// Create a new server monitor with the specified update interval.
    pub fn new(update_interval_ms: u64) -> Self {
        Self {
            counters: Arc::new(ServerCounters::default()),
            start_time: Instant::now(),
            update_interval: Duration::from_millis(update_interval_ms),
        }
    }

    /// Shared handle for client threads to update.
    pub fn counters(&self) -> Arc<ServerCounters> {
        Arc::clone(&self.counters)
    }

    /// Start the background status line thread.
    pub fn start_display(&self) {
        let counters = Arc::clone(&self.counters);
        let update_interval = self.update_interval;

        thread::spawn(move || {
            let mut last_traffic = 0u64;
            let mut last_traffic_time = Instant::now();
            let mut blink_state = false;
            let mut last_blink_time = Instant::now();

            loop {
                thread::sleep(update_interval);

                let snapshot = counters.snapshot();
                let now = Instant::now();

                let traffic = snapshot.bytes_received + snapshot.bytes_sent;
                if traffic > last_traffic {
                    last_traffic_time = now;
                }
                last_traffic = traffic;

                let is_idle = now.duration_since(last_traffic_time)
                    >= Duration::from_millis(IDLE_THRESHOLD_MS);

                if is_idle {
                    blink_state = false;
                } else if now.duration_since(last_blink_time)
                    >= Duration::from_millis(BLINK_INTERVAL_MS)
                {
                    blink_state = !blink_state;
                    last_blink_time = now;
                }

                let indicator = Self::render_indicator(is_idle, blink_state);
                Self::display_status_line(&indicator, is_idle, &snapshot);
            }
        });
    }

    fn render_indicator(is_idle: bool, blink_state: bool) -> String {
        if is_idle {
            "░".normal().to_string()
        } else if blink_state {
            "█".green().bold().to_string()
        } else {
            "░".green().to_string()
        }
    }

    fn display_status_line(indicator: &str, is_idle: bool, stats: &ServerStats) {
        let status = if is_idle { "IDLE" } else { "ACTIVE" };
        print!(
            "\r{} [{}] Connections: {} ({} open) | In: {} | Out: {} | Errors: {}",
            indicator,
            status,
            stats.connections,
            stats.active,
            format_bytes(stats.bytes_received),
            format_bytes(stats.bytes_sent),
            stats.errors
        );
        std::io::Write::flush(&mut std::io::stdout()).ok();
    }

    /// Get final statistics.
    pub fn stats(&self) -> ServerStats {
        ServerStats {
            elapsed: self.start_time.elapsed(),
            ..self.counters.snapshot()
        }
    }
}

/// Atomic counters updated by client threads.
#[derive(Debug, Default)]
pub struct ServerCounters {
    connections: AtomicU64,
    active: AtomicU64,
    bytes_received: AtomicU64,
    bytes_sent: AtomicU64,
    errors: AtomicU64,
}

impl ServerCounters {
    /// A client was accepted; counts it in total and as live
    #[inline]
    pub fn connection_opened(&self) {
        self.connections.fetch_add(1, Ordering::Relaxed);
        self.active.fetch_add(1, Ordering::Relaxed);
    }

    /// The session for a client ended and its socket was dropped
    #[inline]
    pub fn connection_closed(&self) {
        self.active.fetch_sub(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn add_received(&self, bytes: u64) {
        self.bytes_received.fetch_add(bytes, Ordering::Relaxed);
    }

    #[inline]
    pub fn add_sent(&self, bytes: u64) {
        self.bytes_sent.fetch_add(bytes, Ordering::Relaxed);
    }

    #[inline]
    pub fn increment_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ServerStats {
        ServerStats {
            connections: self.connections.load(Ordering::Relaxed),
            active: self.active.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            elapsed: Duration::ZERO,
        }
    }
}

/// Server statistics at a point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerStats {
    pub connections: u64,
    /// Connections currently open
    pub active: u64,
    pub bytes_received: u64,
    pub bytes_sent: u64,
    pub errors: u64,
    pub elapsed: Duration,
}

fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}
