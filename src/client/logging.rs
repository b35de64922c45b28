use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize structured logging with configurable log levels
///
/// Log level can be controlled via the `RUST_LOG` environment variable.
/// Examples:
/// - `RUST_LOG=info` - Info level and above
/// - `RUST_LOG=debug` - Debug level and above
/// - `RUST_LOG=continuous_spark=debug` - Debug level for this crate only
pub fn init_logging() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_target(false).with_line_number(true))
        .init();
}

/// Initialize logging from command-line options
///
/// `RUST_LOG` still wins when set; otherwise `level` is used. With `json` the
/// events are written as one JSON object per line.
pub fn init_logging_with_config(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(fmt::layer().json().with_current_span(false).with_target(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(true)
                    .with_line_number(true)
                    .with_file(true),
            )
            .init();
    }
}
