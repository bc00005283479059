use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::Context;
use kanal::{AsyncReceiver, AsyncSender};
use lookout_core::safety::SafetyMonitor;
use lookout_core::session::Session;
use lookout_types::ControlCommand;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::console;
use crate::events::{command_loop, report_phases};
use crate::safety::HotkeyInterrupt;
use crate::state::AppState;

/// Centralized channel management
pub struct ChannelSet {
    pub commands: (AsyncSender<ControlCommand>, AsyncReceiver<ControlCommand>),
}

impl ChannelSet {
    pub fn new() -> Self {
        Self {
            commands: kanal::bounded_async(32),
        }
    }
}

/// Application controller for task spawning and lifecycle
pub struct AppController {
    channels: ChannelSet,
    state: Arc<AppState>,
    cancel_token: CancellationToken,
}

impl AppController {
    pub fn new(state: Arc<AppState>) -> Self {
        Self {
            channels: ChannelSet::new(),
            state,
            cancel_token: CancellationToken::new(),
        }
    }

    /// Register the abort hotkey on its own thread. Fails if it cannot be
    /// armed; the session never runs without it.
    pub fn arm_safety(&self) -> anyhow::Result<JoinHandle<()>> {
        let safety = &self.state.config.safety;
        let spec = safety.abort_hotkey.clone();
        let monitor = SafetyMonitor::new(
            self.state.machine.clone(),
            Duration::from_millis(safety.poll_ms),
        );

        monitor
            .spawn(
                move || HotkeyInterrupt::register(&spec),
                self.cancel_token.child_token(),
            )
            .context("Failed to arm the abort hotkey")
    }

    pub fn spawn_tasks(&self, session: Session) -> JoinSet<anyhow::Result<()>> {
        let mut tasks = JoinSet::new();

        // Session runner
        let token = self.cancel_token.child_token();
        tasks.spawn(async move {
            session.run(token).await;
            Ok(())
        });

        // Control commands
        tasks.spawn(command_loop(
            self.state.clone(),
            self.channels.commands.1.clone(),
            self.cancel_token.clone(),
        ));

        // Phase reporting
        tasks.spawn(report_phases(
            self.state.clone(),
            self.cancel_token.child_token(),
        ));

        // Console input lives on a plain thread and is left to die with the process
        if let Err(e) = console::spawn_reader(self.channels.commands.0.clone().to_sync()) {
            tracing::warn!("console unavailable: {e}");
        }

        tasks
    }

    pub async fn send(&self, command: ControlCommand) -> anyhow::Result<()> {
        self.channels.commands.0.send(command).await?;
        Ok(())
    }

    /// Resolves once a `quit` command has been handled
    pub async fn cancelled(&self) {
        self.cancel_token.cancelled().await
    }

    pub fn shutdown(&self) {
        self.cancel_token.cancel();
    }
}
