use crate::client::constants::{MBPS, PROGRESS_TICK_INTERVAL_MS};
use crate::client::error::Phase;
use crate::client::result::TestResult;
use crate::client::runner::RunObserver;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Spinner showing which sub-test is running, with results as they land
pub struct ProgressTracker {
    pb: ProgressBar,
}

impl ProgressTracker {
    pub fn new() -> Self {
        let pb = ProgressBar::new_spinner();
        // the template is static; fall back to the default style if it ever fails to parse
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg} [{elapsed}]") {
            pb.set_style(style.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏✓"));
        }
        pb.enable_steady_tick(Duration::from_millis(PROGRESS_TICK_INTERVAL_MS));
        Self { pb }
    }

    /// Line printed above the spinner once a sub-test completes
    fn finished_line(phase: Phase, result: &TestResult) -> String {
        match phase {
            Phase::Ping => format!(
                "{} avg {:.2} ms (min {:.2}, max {:.2}, stddev {:.2})",
                "Ping".bold(),
                result.ping.avg,
                result.ping.min,
                result.ping.max,
                result.ping.stddev
            ),
            Phase::Send => format!(
                "{} avg {:.2} Mbps",
                "Upload".bold(),
                result.send.avg / MBPS
            ),
            Phase::Receive => format!(
                "{} avg {:.2} Mbps",
                "Download".bold(),
                result.receive.avg / MBPS
            ),
        }
    }

    pub fn finish(&self) {
        self.pb.finish_and_clear();
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl RunObserver for ProgressTracker {
    fn phase_started(&mut self, phase: Phase) {
        self.pb.reset_elapsed();
        self.pb.set_message(format!("Running {} test", phase));
    }

    fn phase_finished(&mut self, phase: Phase, result: &TestResult) {
        self.pb.println(format!("{} {}", "✓".green(), Self::finished_line(phase, result)));
    }
}

impl Drop for ProgressTracker {
    fn drop(&mut self) {
        self.finish();
    }
}
