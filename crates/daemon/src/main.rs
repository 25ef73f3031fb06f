// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace Reconciler Daemon (krecd)
//!
//! Background process that keeps terraform workspaces converged.
//!
//! Architecture:
//! - Controller: worker pool reconciling queued workspaces
//! - Sync task: re-reads the manifests directory on every poll interval
//! - Main loop: waits for SIGTERM/SIGINT and cancels the controller

use std::sync::Arc;

use krec_daemon::lifecycle::{self, DaemonState, LifecycleError};
use krec_daemon::Config;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;
use tracing::{error, info};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Handle info flags before any config/lock acquisition
    if let Some(arg) = std::env::args().nth(1) {
        match arg.as_str() {
            "--version" | "-V" | "-v" => {
                println!("krecd {VERSION}");
                return Ok(());
            }
            "--help" | "-h" | "help" => {
                println!("krecd {VERSION}");
                println!("Workspace reconciler daemon - converges terraform workspaces declared as manifests");
                println!();
                println!("USAGE:");
                println!("    krecd");
                println!();
                println!("Configuration is read from $KREC_CONFIG or <state dir>/config.toml,");
                println!("then overridden by KREC_* environment variables. Logs go to");
                println!("<state dir>/daemon.log; RUST_LOG controls verbosity.");
                println!();
                println!("OPTIONS:");
                println!("    -h, --help       Print help information");
                println!("    -v, --version    Print version information");
                return Ok(());
            }
            _ => {
                eprintln!("error: unexpected argument '{arg}'");
                eprintln!("Usage: krecd [--help | --version]");
                std::process::exit(1);
            }
        }
    }

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    };
    let log_guard = setup_logging(&config)?;
    info!(version = VERSION, "starting daemon");

    let daemon = match lifecycle::startup(&config).await {
        Ok(daemon) => daemon,
        Err(LifecycleError::LockFailed(_)) => {
            let pid = std::fs::read_to_string(&config.lock_path)
                .unwrap_or_default()
                .trim()
                .to_string();
            eprintln!("krecd is already running");
            if !pid.is_empty() {
                eprintln!("  pid: {pid}");
            }
            std::process::exit(1);
        }
        Err(e) => {
            // Write error synchronously (tracing is non-blocking and may not flush in time)
            write_startup_error(&config, &e);
            error!(error = %e, "failed to start daemon");
            drop(log_guard);
            return Err(e.into());
        }
    };

    let (stop, shutdown) = watch::channel(false);
    let controller = tokio::spawn(daemon.controller.clone().run(shutdown.clone()));
    let daemon = Arc::new(daemon);
    let sync = tokio::spawn(run_manifest_sync(Arc::clone(&daemon), shutdown));

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    info!(
        manifests = %config.manifests_path.display(),
        "daemon ready"
    );
    println!("READY");

    tokio::select! {
        _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
        _ = sigint.recv() => info!("received SIGINT, shutting down"),
    }

    let _ = stop.send(true);
    if let Err(e) = controller.await {
        error!(error = %e, "controller task failed");
    }
    let _ = sync.await;

    daemon.shutdown()?;
    info!("daemon stopped");
    Ok(())
}

/// Re-read the manifests directory every poll interval until shutdown.
async fn run_manifest_sync(daemon: Arc<DaemonState>, mut shutdown: watch::Receiver<bool>) {
    let mut interval = tokio::time::interval(daemon.config.poll_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // Startup already synced once
    interval.tick().await;

    loop {
        tokio::select! {
            _ = stopped(&mut shutdown) => break,
            _ = interval.tick() => {
                if let Err(e) = daemon.sync_manifests().await {
                    error!(error = %e, "manifest sync failed");
                }
            }
        }
    }
}

async fn stopped(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

/// Write startup error synchronously to the log file.
fn write_startup_error(config: &Config, error: &LifecycleError) {
    use std::io::Write;

    let Ok(mut file) = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.log_path)
    else {
        return;
    };
    let _ = writeln!(file, "ERROR failed to start daemon: {error}");
}

fn setup_logging(
    config: &Config,
) -> Result<tracing_appender::non_blocking::WorkerGuard, std::io::Error> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let file_name = config
        .log_path
        .file_name()
        .ok_or_else(|| std::io::Error::other("log path has no file name"))?;
    let dir = config
        .log_path
        .parent()
        .ok_or_else(|| std::io::Error::other("log path has no parent"))?;
    std::fs::create_dir_all(dir)?;
    let file_appender = tracing_appender::rolling::never(dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking))
        .init();

    Ok(guard)
}
