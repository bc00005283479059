use std::io::{self, BufRead};
use std::thread::{self, JoinHandle};
use std::time::SystemTime;

use kanal::Sender;
use lookout_types::{ControlCommand, SessionSnapshot};

/// Map one console line to a command
pub fn parse_command(line: &str) -> Option<ControlCommand> {
    let command = match line.trim().to_ascii_lowercase().as_str() {
        "start" | "go" => ControlCommand::Start,
        "stop" => ControlCommand::Stop,
        "reset" => ControlCommand::Reset,
        "halt" | "abort" | "panic" => ControlCommand::EmergencyStop,
        "status" | "st" => ControlCommand::Status,
        "quit" | "exit" | "q" => ControlCommand::Quit,
        _ => return None,
    };
    Some(command)
}

/// Read commands from stdin on a dedicated thread. Blocking stdin reads
/// would otherwise hold the runtime open at shutdown.
pub fn spawn_reader(commands: Sender<ControlCommand>) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("lookout-console".into())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if line.trim().is_empty() {
                    continue;
                }
                match parse_command(&line) {
                    Some(command) => {
                        if commands.send(command).is_err() {
                            break;
                        }
                    }
                    None => tracing::warn!(input = %line.trim(), "unknown command"),
                }
            }
            tracing::debug!("console reader stopped");
        })
}

/// One-line human summary of a snapshot
pub fn render_status(snapshot: &SessionSnapshot) -> String {
    let stats = &snapshot.stats;
    let mut line = format!(
        "{} | frames {} (failed {}) | candidates {} | suppressed {} | research {} (failed {}) | answered {} | rejected {} | cancelled {}",
        snapshot.phase,
        stats.frames_captured,
        stats.capture_failures,
        stats.candidates_detected,
        stats.suppressed,
        stats.research_requests,
        stats.research_failures,
        stats.answered,
        stats.answers_rejected,
        stats.responses_cancelled,
    );

    if let Some(deadline) = snapshot.deadline_at
        && let Ok(left) = deadline.duration_since(SystemTime::now())
    {
        line.push_str(&format!(" | {}s left", left.as_secs()));
    }
    if let Some(failure) = &snapshot.last_failure {
        line.push_str(&format!(" | last failure: {failure}"));
    }
    line
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use lookout_types::SessionPhase;

    use super::*;

    #[test]
    fn test_parse_known_commands() {
        assert_eq!(parse_command("start"), Some(ControlCommand::Start));
        assert_eq!(parse_command("  STOP \n"), Some(ControlCommand::Stop));
        assert_eq!(parse_command("reset"), Some(ControlCommand::Reset));
        assert_eq!(parse_command("abort"), Some(ControlCommand::EmergencyStop));
        assert_eq!(parse_command("status"), Some(ControlCommand::Status));
        assert_eq!(parse_command("q"), Some(ControlCommand::Quit));
    }

    #[test]
    fn test_parse_rejects_unknown() {
        assert_eq!(parse_command("launch"), None);
        assert_eq!(parse_command(""), None);
    }

    #[test]
    fn test_status_line_mentions_phase_and_failure() {
        let mut snapshot = SessionSnapshot::idle("Quiz");
        snapshot.phase = SessionPhase::Cooldown;
        snapshot.stats.answered = 4;
        snapshot.last_failure = Some("request rejected: bad model".into());
        snapshot.deadline_at = Some(SystemTime::now() + Duration::from_secs(600));

        let line = render_status(&snapshot);
        assert!(line.starts_with("cooldown |"));
        assert!(line.contains("answered 4"));
        assert!(line.contains("s left"));
        assert!(line.ends_with("last failure: request rejected: bad model"));
    }
}
