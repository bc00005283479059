use std::fmt::Display;
use std::sync::Arc;
use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use lookout_types::SessionPhase;
use tokio_util::sync::CancellationToken;

use crate::error::SessionError;
use crate::session::SessionMachine;

/// Reports whether the abort signal fired since the last poll
pub trait InterruptSource {
    fn poll(&mut self) -> bool;
}

impl<F: FnMut() -> bool> InterruptSource for F {
    fn poll(&mut self) -> bool {
        self()
    }
}

/// Always-armed listener that halts the session on the abort signal.
///
/// Runs on its own OS thread so a stalled runtime cannot delay it.
pub struct SafetyMonitor {
    machine: Arc<SessionMachine>,
    poll: Duration,
}

impl SafetyMonitor {
    pub fn new(machine: Arc<SessionMachine>, poll: Duration) -> Self {
        Self {
            machine,
            poll: poll.max(Duration::from_millis(1)),
        }
    }

    /// Halt right now, from whichever thread calls this
    pub fn trigger(&self) -> SessionPhase {
        self.machine.emergency_stop()
    }

    /// Start listening. `make_source` runs on the listener thread because
    /// hotkey registrations belong to the thread that made them; this
    /// returns once the source is armed, or with the reason it could not be.
    pub fn spawn<S, F, E>(
        self,
        make_source: F,
        shutdown: CancellationToken,
    ) -> Result<JoinHandle<()>, SessionError>
    where
        F: FnOnce() -> Result<S, E> + Send + 'static,
        S: InterruptSource + 'static,
        E: Display,
    {
        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<(), String>>(1);

        let handle = thread::Builder::new()
            .name("lookout-safety".into())
            .spawn(move || {
                let mut source = match make_source() {
                    Ok(source) => {
                        let _ = ready_tx.send(Ok(()));
                        source
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e.to_string()));
                        return;
                    }
                };

                tracing::info!(poll_ms = self.poll.as_millis() as u64, "safety monitor armed");

                while !shutdown.is_cancelled() {
                    if source.poll() {
                        tracing::warn!("abort signal received");
                        self.trigger();
                    }
                    thread::sleep(self.poll);
                }

                tracing::debug!("safety monitor stopped");
            })
            .map_err(|e| SessionError::Safety(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(handle),
            Ok(Err(reason)) => {
                let _ = handle.join();
                Err(SessionError::Safety(reason))
            }
            Err(_) => Err(SessionError::Safety(
                "listener thread exited before arming".into(),
            )),
        }
    }
}
