use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use lookout_types::ControlCommand;
use tokio::signal;

mod console;
mod controller;
mod events;
mod input;
mod logging;
mod profile;
mod safety;
mod state;

use self::controller::AppController;
use self::state::AppState;

#[derive(Debug, Parser)]
#[command(name = "lookout", version, about = "Screen question monitor")]
struct Cli {
    /// JSON config file; defaults to ./config.json when present
    #[arg(long)]
    config: Option<PathBuf>,

    /// Named profile from the profiles directory, used when --config is absent
    #[arg(long)]
    profile: Option<String>,

    /// Verbose logging; RUST_LOG is honoured when set
    #[arg(long)]
    debug: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    /// Start monitoring immediately instead of waiting for `start`
    #[arg(long)]
    autostart: bool,

    /// Log planned input instead of sending it to the OS
    #[arg(long)]
    dry_run: bool,

    /// Store the resolved config as a named profile and exit
    #[arg(long, value_name = "NAME")]
    save_profile: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // .env is optional
    let _ = dotenvy::dotenv();
    logging::init(cli.debug, cli.json_logs);

    let config = profile::resolve_config(cli.config.as_deref(), cli.profile.as_deref())?;
    config.validate().context("Invalid configuration")?;

    if let Some(name) = cli.save_profile.as_deref() {
        let path = profile::save_profile(Path::new(profile::PROFILES_DIR), name, &config)
            .with_context(|| format!("Failed to save profile '{name}'"))?;
        println!("Profile saved to {}", path.display());
        return Ok(());
    }

    let (state, session) = AppState::build(config, cli.dry_run)?;
    let state = Arc::new(state);

    let controller = AppController::new(state.clone());
    let safety = controller.arm_safety()?;
    let mut tasks = controller.spawn_tasks(session);

    if cli.autostart {
        controller.send(ControlCommand::Start).await?;
    }

    tracing::info!("lookout ready; type `start`, `stop`, `reset`, `status` or `quit`");

    tokio::select! {
        result = signal::ctrl_c() => {
            if let Err(e) = result {
                tracing::error!("failed to listen for ctrl+c: {e}");
            }
            state.machine.emergency_stop();
            tracing::info!("Shutdown requested");
        }
        _ = controller.cancelled() => {
            tracing::info!("Quit requested");
        }
        Some(result) = tasks.join_next() => {
            match result {
                Ok(Ok(())) => tracing::warn!("task exited"),
                Ok(Err(e)) => tracing::error!("task failed: {e:#}"),
                Err(e) => tracing::error!("task panicked: {e}"),
            }
            state.machine.emergency_stop();
        }
    }

    controller.shutdown();
    while let Some(result) = tasks.join_next().await {
        if let Ok(Err(e)) = result {
            tracing::warn!("task ended with error: {e:#}");
        }
    }

    if safety.join().is_err() {
        tracing::error!("safety monitor thread panicked");
    }

    let snapshot = state.machine.snapshot();
    tracing::info!(
        phase = %snapshot.phase,
        answered = snapshot.stats.answered,
        "lookout stopped"
    );

    Ok(())
}
