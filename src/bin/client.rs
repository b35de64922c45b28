use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use continuous_spark::client::{
    init_logging_with_config, run_scheduled, Config, ConsoleReporter, InfluxSink, NoopObserver,
    ProgressTracker, ResultSink, StatHatSink, Stopper, TestRunner, TsvSink,
};
use tracing::{error, info, warn};

fn main() {
    let config = Config::parse();

    init_logging_with_config(&config.log_level, config.is_json_format());

    if let Err(e) = config.validate() {
        error!(error = %e, "Invalid configuration");
        eprintln!("{} {}", "Configuration error:".red().bold(), e);
        std::process::exit(1);
    }

    if let Err(e) = run(config) {
        error!(error = %e, "Client failed");
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn run(config: Config) -> Result<()> {
    let stopper = Stopper::new();
    let handler_stopper = stopper.clone();
    ctrlc::set_handler(move || {
        info!("Interrupt received, stopping after the current run");
        handler_stopper.stop();
    })
    .context("installing Ctrl-C handler")?;

    let mut sinks: Vec<Box<dyn ResultSink>> = Vec::new();
    if !config.quiet {
        sinks.push(Box::new(ConsoleReporter));
    }
    if !config.no_tsv {
        sinks.push(Box::new(TsvSink::new(config.tsv_file.clone())));
    }
    if let Some(key) = &config.stathat_ezkey {
        sinks.push(Box::new(StatHatSink::new(key.clone())?));
    }

    let target = config.target();
    if let Some(url) = &config.influx_url {
        let sink = InfluxSink::new(url.clone(), config.influx_db.clone(), target.remote())?;
        let sink = match (&config.influx_user, &config.influx_pass) {
            (Some(user), Some(pass)) => sink.with_credentials(user.clone(), pass.clone()),
            _ => sink,
        };
        sinks.push(Box::new(sink));
    }

    info!(
        server = %target.remote(),
        interface = ?target.interface,
        schedule = ?config.schedule(),
        "Starting sparkyfish tests"
    );

    let runner = TestRunner::for_target(target);
    let schedule = config.schedule();

    let succeeded = run_scheduled(schedule, &stopper, || {
        let outcome = if config.quiet {
            runner.run_observed(&mut NoopObserver)
        } else {
            let mut tracker = ProgressTracker::new();
            let outcome = runner.run_observed(&mut tracker);
            tracker.finish();
            outcome
        };
        let result = outcome?;

        for sink in sinks.iter_mut() {
            if let Err(e) = sink.record(&result) {
                warn!(error = %e, "Failed to record result");
            }
        }
        Ok::<(), continuous_spark::client::ClientError>(())
    });

    info!(successful_runs = succeeded, "Finished");

    if config.once && succeeded == 0 {
        anyhow::bail!("test run failed");
    }
    Ok(())
}
