use std::sync::Arc;

use kanal::AsyncReceiver;
use lookout_core::session::SessionMachine;
use lookout_types::ControlCommand;
use tokio_util::sync::CancellationToken;

use crate::console::render_status;
use crate::state::AppState;

/// Applies control commands to the session until shutdown or `quit`
pub async fn command_loop(
    state: Arc<AppState>,
    commands: AsyncReceiver<ControlCommand>,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    loop {
        let command = tokio::select! {
            _ = shutdown.cancelled() => return Ok(()),
            command = commands.recv() => command?,
        };

        tracing::debug!(?command, "control command");
        if !handle_command(&state.machine, command) {
            shutdown.cancel();
            return Ok(());
        }
    }
}

/// False once the app should exit
pub fn handle_command(machine: &SessionMachine, command: ControlCommand) -> bool {
    match command {
        ControlCommand::Start => {
            if let Err(e) = machine.start() {
                tracing::warn!("cannot start: {e}");
            }
        }
        ControlCommand::Stop => {
            let phase = machine.stop();
            tracing::info!(phase = %phase, "stop requested");
        }
        ControlCommand::Reset => {
            if let Err(e) = machine.reset() {
                tracing::warn!("cannot reset: {e}");
            }
        }
        ControlCommand::EmergencyStop => {
            machine.emergency_stop();
        }
        ControlCommand::Status => {
            println!("{}", render_status(&machine.snapshot()));
        }
        ControlCommand::Quit => {
            machine.emergency_stop();
            return false;
        }
    }
    true
}

/// Log each phase change as it is published
pub async fn report_phases(state: Arc<AppState>, shutdown: CancellationToken) -> anyhow::Result<()> {
    let mut updates = state.machine.subscribe();
    let mut last = updates.borrow().phase;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => return Ok(()),
            changed = updates.changed() => changed?,
        }

        let snapshot = updates.borrow_and_update().clone();
        if snapshot.phase != last {
            tracing::info!(from = %last, to = %snapshot.phase, "session phase changed");
            last = snapshot.phase;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use lookout_types::SessionPhase;

    use super::*;

    fn machine() -> SessionMachine {
        SessionMachine::new("Quiz", Duration::from_secs(60))
    }

    #[test]
    fn test_start_stop_commands() {
        let machine = machine();
        assert!(handle_command(&machine, ControlCommand::Start));
        assert_eq!(machine.phase(), SessionPhase::Monitoring);
        assert!(handle_command(&machine, ControlCommand::Stop));
        assert_eq!(machine.phase(), SessionPhase::Idle);
    }

    #[test]
    fn test_emergency_stop_then_reset() {
        let machine = machine();
        handle_command(&machine, ControlCommand::Start);
        handle_command(&machine, ControlCommand::EmergencyStop);
        assert_eq!(machine.phase(), SessionPhase::Halted);

        // Start is refused while halted
        handle_command(&machine, ControlCommand::Start);
        assert_eq!(machine.phase(), SessionPhase::Halted);

        handle_command(&machine, ControlCommand::Reset);
        assert_eq!(machine.phase(), SessionPhase::Idle);
    }

    #[test]
    fn test_quit_halts_and_exits() {
        let machine = machine();
        handle_command(&machine, ControlCommand::Start);
        assert!(!handle_command(&machine, ControlCommand::Quit));
        assert_eq!(machine.phase(), SessionPhase::Halted);
    }
}
