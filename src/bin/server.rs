use anyhow::Result;
use clap::Parser;
use continuous_spark::client::init_logging_with_config;
use continuous_spark::server::{handle_session, ServerConfig, ServerMonitor};
use std::net::TcpListener;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

fn main() {
    let config = ServerConfig::parse();

    init_logging_with_config(&config.log_level, config.is_json_format());

    if let Err(e) = config.validate() {
        error!(error = %e, "Invalid configuration");
        eprintln!("Configuration error: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = run(config) {
        error!(error = %e, "Server failed");
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(config: ServerConfig) -> Result<()> {
    let addr = config.address();

    let listener = TcpListener::bind(&addr).map_err(|e| {
        if e.kind() == std::io::ErrorKind::AddrInUse {
            anyhow::anyhow!(
                "Failed to bind to {}: Address already in use. Try a different port or ensure no other process is using it.",
                addr
            )
        } else {
            anyhow::Error::new(e).context(format!("Failed to bind to {}", addr))
        }
    })?;

    let settings = Arc::new(config.session_settings());

    info!(
        address = %addr,
        cname = %settings.info.canonical_name,
        location = %settings.info.location,
        send_secs = config.send_secs,
        quiet_mode = config.quiet,
        "sparkyfish server listening"
    );

    let monitor = ServerMonitor::new(config.update_interval);
    let counters = monitor.counters();

    if !config.quiet {
        monitor.start_display();
    } else {
        info!("Running in quiet mode (terminal UI disabled)");
    }

    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                let peer_addr = stream.peer_addr().ok();
                debug!(peer = ?peer_addr, "New client connected");
                counters.connection_opened();

                let counters = Arc::clone(&counters);
                let settings = Arc::clone(&settings);

                std::thread::spawn(move || {
                    match handle_session(stream, &settings, &counters) {
                        Ok(mode) => debug!(peer = ?peer_addr, mode = %mode, "Client finished"),
                        Err(e) => {
                            counters.increment_error();
                            warn!(error = %e, peer = ?peer_addr, "Client session failed");
                        }
                    }
                    counters.connection_closed();
                });
            }
            Err(e) => {
                counters.increment_error();
                error!(error = %e, "Failed to accept connection");
            }
        }
    }

    let stats = monitor.stats();
    info!(
        connections = stats.connections,
        bytes_received = stats.bytes_received,
        bytes_sent = stats.bytes_sent,
        errors = stats.errors,
        "Server stopped"
    );
    Ok(())
}
