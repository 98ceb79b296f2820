mod activity;
mod backend;
mod cli;
mod config;
mod error;
mod export;
mod supervisor;
mod ui;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use console::Style;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use activity::ActivityLog;
use backend::BackendClient;
use cli::{Cli, Command};
use config::TelexportConfig;
use error::TelexportError;
use export::{ExportOptions, JobCoordinator, JobPhase, ReadinessProbe};
use supervisor::{StartSpec, Supervisor};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = TelexportConfig::load(cli.config.as_deref())
        .map_err(|e| TelexportError::Config(e.to_string()))?;

    // The backend must be ready before any command is served.
    let supervisor = Arc::new(Supervisor::new());
    if let Err(err) = supervisor.start(start_spec(&config)).await {
        let red = Style::new().red().bold();
        eprintln!(
            "{} Failed to start the export backend: {err}",
            red.apply_to("✗")
        );
        eprintln!("  Check that the backend and its dependencies are installed.");
        supervisor.terminate();
        supervisor.wait_for_exit().await;
        std::process::exit(1);
    }

    let client = Arc::new(BackendClient::new(config.backend_url.clone()));
    let result = match cli.command {
        Command::Run { force } => {
            run_export(&config, Arc::clone(&supervisor), Arc::clone(&client), force).await
        }
        Command::Stats => show_stats(&client).await,
        Command::Check => check(&supervisor),
    };

    // Single teardown path; terminate() is idempotent, so a racing Ctrl-C
    // shutdown cannot kill the worker twice.
    supervisor.terminate();
    supervisor.wait_for_exit().await;

    result.map_err(Into::into)
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn start_spec(config: &TelexportConfig) -> StartSpec {
    StartSpec {
        command: config.backend_command.clone(),
        args: config.backend_args.clone(),
        working_dir: PathBuf::from(&config.backend_dir),
        readiness_patterns: config.readiness_patterns.clone(),
        timeout: config.readiness_timeout(),
    }
}

/// Drives one export job to completion, rendering progress until the job
/// leaves the running phase.
async fn run_export(
    config: &TelexportConfig,
    supervisor: Arc<Supervisor>,
    client: Arc<BackendClient>,
    force: bool,
) -> Result<(), TelexportError> {
    let mut activity = ActivityLog::new(config.activity_log_cap);
    activity.info("application started");

    // Summary refresh on load is best-effort.
    match client.stats().await {
        Ok(stats) => {
            ui::print_stats(&stats);
            activity.info(format!("stats loaded: {} messages", stats.total_messages));
        }
        Err(err) => {
            warn!(error = %err, "stats fetch failed");
            activity.warning(format!("failed to fetch stats: {err}"));
        }
    }

    let coordinator = JobCoordinator::new(
        Arc::clone(&client),
        Arc::clone(&supervisor) as Arc<dyn ReadinessProbe>,
        config.poll_interval(),
    );

    let run_id = coordinator.start_job(ExportOptions {
        force_reexport: force,
    })?;
    activity.info(format!("export {run_id} started (force_reexport={force})"));

    let progress = ui::ExportProgress::start();
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    let mut ticker = tokio::time::interval(config.poll_interval());
    let snapshot = loop {
        tokio::select! {
            _ = ticker.tick() => {
                let snap = coordinator.snapshot();
                progress.update(&snap);
                if snap.phase != JobPhase::Running {
                    break snap;
                }
                activity.info(format!("progress: {}% - {}", snap.progress, snap.message));
            }
            _ = &mut shutdown => {
                activity.warning("interrupted, shutting down");
                ui::print_activity(&activity);
                return Ok(());
            }
        }
    };

    progress.complete(&snapshot);
    match snapshot.phase {
        JobPhase::Failed => {
            let detail = snapshot.error.as_deref().unwrap_or("unknown error");
            activity.error(format!("export failed: {detail}"));
        }
        _ => {
            activity.success("export completed successfully");
            // Summary refresh after completion, also best-effort.
            match client.stats().await {
                Ok(stats) => ui::print_stats(&stats),
                Err(err) => warn!(error = %err, "stats refresh failed"),
            }
        }
    }

    ui::print_activity(&activity);
    Ok(())
}

async fn show_stats(client: &BackendClient) -> Result<(), TelexportError> {
    let stats = client.stats().await?;
    ui::print_stats(&stats);
    Ok(())
}

fn check(supervisor: &Supervisor) -> Result<(), TelexportError> {
    let green = Style::new().green().bold();
    println!(
        "{} Backend is {}",
        green.apply_to("✓"),
        supervisor.state()
    );
    Ok(())
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(_) => {
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
