use std::time::{Duration, Instant};

use lookout_types::{DelayBounds, InputAction, ResponsePlan};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio_util::sync::CancellationToken;

use crate::error::InputError;

/// Emits one primitive input event on the host
pub trait InputDriver: Send {
    fn perform(&mut self, action: &InputAction) -> Result<(), InputError>;

    /// Whether `perform` could express this action, without emitting anything
    fn check(&self, _action: &InputAction) -> Result<(), InputError> {
        Ok(())
    }
}

/// Counts are actions that reached the driver; waits are not included
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    Completed { actions: usize },
    Cancelled { executed: usize },
    Failed { executed: usize, reason: String },
}

/// Executes response plans one at a time with randomized pacing.
///
/// Blocking: run it on a blocking thread. The cancellation token is checked
/// before every action and at least every `poll` while pausing.
pub struct ResponseController {
    driver: Box<dyn InputDriver>,
    rng: StdRng,
    poll: Duration,
}

impl ResponseController {
    pub fn new(driver: Box<dyn InputDriver>, poll: Duration, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            driver,
            rng,
            poll: poll.max(Duration::from_millis(1)),
        }
    }

    /// Takes `&mut self`, so two plans can never run on one controller at once.
    ///
    /// The whole plan is checked against the driver first; a plan it cannot
    /// express fails before any input reaches the host.
    pub fn execute(&mut self, plan: &ResponsePlan, cancel: &CancellationToken) -> ExecutionOutcome {
        if let Err(e) = self.validate(plan) {
            return ExecutionOutcome::Failed {
                executed: 0,
                reason: e.to_string(),
            };
        }

        let mut executed = 0;
        for step in &plan.actions {
            if cancel.is_cancelled() {
                return ExecutionOutcome::Cancelled { executed };
            }

            let pause = self.sample(step.delay);
            if !self.pause(pause, cancel) {
                return ExecutionOutcome::Cancelled { executed };
            }

            if matches!(step.action, InputAction::Wait) {
                continue;
            }

            if let Err(e) = self.driver.perform(&step.action) {
                return ExecutionOutcome::Failed {
                    executed,
                    reason: e.to_string(),
                };
            }
            executed += 1;
        }

        ExecutionOutcome::Completed { actions: executed }
    }

    fn validate(&self, plan: &ResponsePlan) -> Result<(), InputError> {
        plan.actions
            .iter()
            .filter(|step| !matches!(step.action, InputAction::Wait))
            .try_for_each(|step| self.driver.check(&step.action))
    }

    fn sample(&mut self, delay: DelayBounds) -> Duration {
        if delay.is_zero() {
            return Duration::ZERO;
        }
        Duration::from_millis(self.rng.gen_range(delay.min_ms..=delay.max_ms))
    }

    /// Sleep in `poll` slices; false once cancellation is seen
    fn pause(&self, total: Duration, cancel: &CancellationToken) -> bool {
        let deadline = Instant::now() + total;
        loop {
            if cancel.is_cancelled() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            std::thread::sleep(self.poll.min(deadline - now));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use lookout_types::{Key, Modifier, MouseButton, PlannedAction};

    use super::*;

    #[derive(Clone, Default)]
    struct Recorder {
        actions: Arc<Mutex<Vec<InputAction>>>,
        fail_on: Option<usize>,
    }

    impl InputDriver for Recorder {
        fn perform(&mut self, action: &InputAction) -> Result<(), InputError> {
            let mut actions = self.actions.lock().unwrap();
            if Some(actions.len()) == self.fail_on {
                return Err(InputError::Rejected("device gone".into()));
            }
            actions.push(action.clone());
            Ok(())
        }

        // Mirrors a US keyboard: nothing outside ASCII can be typed
        fn check(&self, action: &InputAction) -> Result<(), InputError> {
            match action {
                InputAction::TypeChar(c) if !c.is_ascii() => Err(InputError::UnsupportedChar(*c)),
                _ => Ok(()),
            }
        }
    }

    fn plan(n: usize, delay: DelayBounds) -> ResponsePlan {
        ResponsePlan {
            actions: (0..n as i32)
                .map(|i| PlannedAction {
                    action: InputAction::MoveTo { x: i, y: i },
                    delay,
                })
                .collect(),
        }
    }

    #[test]
    fn completes_every_action() {
        let recorder = Recorder::default();
        let mut controller =
            ResponseController::new(Box::new(recorder.clone()), Duration::from_millis(1), Some(1));

        let mut p = plan(3, DelayBounds::fixed(0));
        p.push(InputAction::Wait, DelayBounds::fixed(1));
        p.push(
            InputAction::Click {
                button: MouseButton::Left,
            },
            DelayBounds::fixed(0),
        );

        let outcome = controller.execute(&p, &CancellationToken::new());
        // Waits never reach the driver and are not counted
        assert_eq!(outcome, ExecutionOutcome::Completed { actions: 4 });
        assert_eq!(recorder.actions.lock().unwrap().len(), 4);
    }

    #[test]
    fn pre_cancelled_emits_nothing() {
        let recorder = Recorder::default();
        let mut controller =
            ResponseController::new(Box::new(recorder.clone()), Duration::from_millis(1), Some(1));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = controller.execute(&plan(5, DelayBounds::fixed(0)), &cancel);
        assert_eq!(outcome, ExecutionOutcome::Cancelled { executed: 0 });
        assert!(recorder.actions.lock().unwrap().is_empty());
    }

    #[test]
    fn cancel_during_pause_stops_promptly() {
        let recorder = Recorder::default();
        let mut controller =
            ResponseController::new(Box::new(recorder.clone()), Duration::from_millis(2), Some(1));
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(30));
            trigger.cancel();
        });

        let started = Instant::now();
        let outcome = controller.execute(&plan(3, DelayBounds::fixed(10_000)), &cancel);
        handle.join().unwrap();

        assert_eq!(outcome, ExecutionOutcome::Cancelled { executed: 0 });
        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(recorder.actions.lock().unwrap().is_empty());
    }

    #[test]
    fn driver_error_fails_plan() {
        let recorder = Recorder {
            fail_on: Some(2),
            ..Recorder::default()
        };
        let mut controller =
            ResponseController::new(Box::new(recorder.clone()), Duration::from_millis(1), Some(1));

        let mut p = plan(1, DelayBounds::fixed(0));
        p.push(InputAction::Wait, DelayBounds::fixed(0));
        p.push(InputAction::MoveTo { x: 5, y: 5 }, DelayBounds::fixed(0));
        p.push(InputAction::MoveTo { x: 6, y: 6 }, DelayBounds::fixed(0));

        let outcome = controller.execute(&p, &CancellationToken::new());
        assert!(matches!(outcome, ExecutionOutcome::Failed { executed: 2, .. }));
        assert_eq!(recorder.actions.lock().unwrap().len(), 2);
    }

    #[test]
    fn untypeable_plan_fails_before_any_input() {
        let recorder = Recorder::default();
        let mut controller =
            ResponseController::new(Box::new(recorder.clone()), Duration::from_millis(1), Some(1));

        let mut p = plan(3, DelayBounds::fixed(0));
        p.push(
            InputAction::Click {
                button: MouseButton::Left,
            },
            DelayBounds::fixed(0),
        );
        p.push(
            InputAction::KeyPress {
                key: Key::Char('a'),
                modifiers: vec![Modifier::Control],
            },
            DelayBounds::fixed(0),
        );
        for c in "a café".chars() {
            p.push(InputAction::TypeChar(c), DelayBounds::fixed(0));
        }

        let outcome = controller.execute(&p, &CancellationToken::new());
        assert_eq!(
            outcome,
            ExecutionOutcome::Failed {
                executed: 0,
                reason: "character 'é' cannot be typed".into(),
            }
        );
        // The answer field is never clicked or cleared
        assert!(recorder.actions.lock().unwrap().is_empty());
    }

    #[test]
    fn delays_fall_within_bounds() {
        let mut controller =
            ResponseController::new(Box::new(Recorder::default()), Duration::from_millis(1), Some(9));
        for _ in 0..100 {
            let d = controller.sample(DelayBounds::new(5, 15));
            assert!(d >= Duration::from_millis(5) && d <= Duration::from_millis(15));
        }
        assert_eq!(controller.sample(DelayBounds::fixed(0)), Duration::ZERO);
    }
}
