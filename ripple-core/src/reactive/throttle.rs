//! Throttled Effects
//!
//! A throttled effect runs at most once per cooldown window. A trigger that
//! lands inside the window only marks a change as pending and arms a timer
//! for the end of the window; when the timer fires, a pending change re-runs
//! the computation. The last state before the window closes is always
//! reflected eventually.

use std::rc::Rc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::trace;

use crate::error::Result;
use crate::graph::ComputationId;

use super::effect::{Computation, EffectFn, Policy, Scope};
use super::runtime::Runtime;
use super::signal::Signal;

#[derive(Debug)]
pub(crate) struct ThrottleState {
    window: Duration,
    last_run: Option<Instant>,
    pending: bool,
    armed: bool,
}

enum Action {
    Run,
    Hold,
    Arm(Instant),
}

impl Runtime {
    /// Create an effect that runs at most once per `window`.
    pub fn throttled_effect<T, F>(&self, f: F, window: Duration) -> Result<Signal<Option<T>>>
    where
        T: Clone + PartialEq + 'static,
        F: FnMut(&Scope<'_>) -> Result<T> + 'static,
    {
        let state = ThrottleState {
            window,
            last_run: Some(Instant::now()),
            pending: false,
            armed: false,
        };
        self.spawn(EffectFn::new(f), Policy::Throttled(state))
    }

    /// [`Runtime::throttled_effect`] with the configured default window.
    pub fn throttled_effect_default<T, F>(&self, f: F) -> Result<Signal<Option<T>>>
    where
        T: Clone + PartialEq + 'static,
        F: FnMut(&Scope<'_>) -> Result<T> + 'static,
    {
        let window = Duration::from_millis(self.config().default_throttle_ms);
        self.throttled_effect(f, window)
    }

    pub(crate) fn throttle_trigger(&self, computation: &Rc<Computation>) -> Result<()> {
        let now = Instant::now();
        let action = match &mut *computation.policy.borrow_mut() {
            Policy::Throttled(state) => match state.last_run {
                Some(last) if now < last + state.window => {
                    state.pending = true;
                    if state.armed {
                        Action::Hold
                    } else {
                        state.armed = true;
                        Action::Arm(last + state.window)
                    }
                }
                _ => {
                    state.last_run = Some(now);
                    state.pending = false;
                    Action::Run
                }
            },
            _ => Action::Run,
        };

        match action {
            Action::Run => self.run(computation),
            Action::Hold => {
                computation.hold();
                Ok(())
            }
            Action::Arm(deadline) => {
                computation.hold();
                let id = computation.id;
                trace!(computation = ?id, "throttled; re-run deferred to end of window");
                self.schedule_at(
                    deadline,
                    Box::new(move |rt: &Runtime| rt.throttle_expired(id)),
                );
                Ok(())
            }
        }
    }

    /// Timer callback for the end of a window.
    ///
    /// A run that happened after the timer was armed opens a new window, so
    /// the deadline is checked again against the latest run.
    fn throttle_expired(&self, id: ComputationId) -> Result<()> {
        let Some(computation) = self.computation(id) else {
            return Ok(());
        };

        let now = Instant::now();
        let action = match &mut *computation.policy.borrow_mut() {
            Policy::Throttled(state) => match state.last_run {
                _ if !state.pending => {
                    state.armed = false;
                    Action::Hold
                }
                Some(last) if now < last + state.window => Action::Arm(last + state.window),
                _ => {
                    state.armed = false;
                    state.pending = false;
                    state.last_run = Some(now);
                    Action::Run
                }
            },
            _ => Action::Hold,
        };

        match action {
            Action::Run => self.run(&computation),
            Action::Hold => Ok(()),
            Action::Arm(deadline) => {
                trace!(computation = ?id, "window reopened; trailing run moved");
                self.schedule_at(
                    deadline,
                    Box::new(move |rt: &Runtime| rt.throttle_expired(id)),
                );
                Ok(())
            }
        }
    }
}
