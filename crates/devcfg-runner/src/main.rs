//! devcfg: device configuration console.

use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use clap::Parser;
use devcfg_runner::{Cli, DeviceConfig, Runner, RunnerResult};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log)),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "devcfg stopped");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> RunnerResult<()> {
    let mut config = match &cli.config {
        Some(path) => DeviceConfig::load(path)?,
        None => DeviceConfig::default(),
    };
    config.apply_cli(&cli);

    devcfg_metrics::describe_metrics();
    #[cfg(feature = "prometheus")]
    if let Some(addr) = cli.metrics {
        devcfg_metrics::install_prometheus(addr)
            .map_err(|e| devcfg_runner::RunnerError::InvalidConfig(e.to_string()))?;
        info!(%addr, "prometheus exporter listening");
    }

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = running.clone();
        if let Err(e) = ctrlc::set_handler(move || running.store(false, Ordering::SeqCst)) {
            error!(error = %e, "cannot install Ctrl-C handler");
        }
    }

    let mut runner = Runner::from_config(&config)?;
    runner.start()?;
    runner.print_server_table();

    let interval = config.poll_interval();
    while running.load(Ordering::SeqCst) {
        runner.poll();
        thread::sleep(interval);
    }

    info!("shutting down");
    runner.stop();
    Ok(())
}
