//! Clock-Gated Effects
//!
//! A clock-gated effect is quantized to an external tick counter. It re-runs
//! only when the tick has advanced since its last run *and* some dependency
//! other than the tick changed in the meantime. Changes arriving between
//! ticks are held until the next tick; a tick with nothing pending only
//! moves the bookkeeping forward.
//!
//! Because the tick is the only re-entry guard, a clock-gated effect may
//! write to its own dependencies, and two clock-gated effects may feed each
//! other. Such loops advance one step per tick instead of failing.

use std::rc::Rc;

use tracing::trace;

use crate::error::Result;
use crate::graph::Key;

use super::effect::{Computation, EffectFn, Policy, Scope};
use super::runtime::Runtime;
use super::signal::Signal;

/// The value behind an external tick signal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tick {
    pub time: u64,
}

impl Signal<Tick> {
    /// Tracked read of the current tick.
    pub fn time(&self) -> u64 {
        self.read(Key::name("time"), |tick| tick.time)
    }

    /// Move the clock forward by one. Returns the new tick.
    pub fn advance(&self) -> Result<u64> {
        let next = self.peek(|tick| tick.time) + 1;
        self.set_time(next)?;
        Ok(next)
    }

    /// Jump the clock to `time`.
    pub fn set_time(&self, time: u64) -> Result<bool> {
        self.write(Key::name("time"), |tick| &mut tick.time, time)
    }
}

pub(crate) struct ClockState {
    tick: Signal<Tick>,
    last_time: u64,
}

impl Runtime {
    /// A fresh tick signal starting at zero.
    pub fn tick(&self) -> Signal<Tick> {
        self.signal(Tick::default())
    }

    /// Create an effect gated by `tick`.
    ///
    /// # Example
    ///
    /// ```rust
    /// use ripple_core::{Runtime, Record};
    ///
    /// let rt = Runtime::new();
    /// let tick = rt.tick();
    /// let s = rt.signal(Record::from([("v".to_string(), 1)]));
    ///
    /// let reader = s.clone();
    /// let r = rt.clock_effect(move |_| Ok(reader.get("v")), &tick).unwrap();
    ///
    /// s.insert("v", 2).unwrap();
    /// assert_eq!(r.value(), Some(Some(1)));
    ///
    /// tick.advance().unwrap();
    /// assert_eq!(r.value(), Some(Some(2)));
    /// ```
    pub fn clock_effect<T, F>(&self, mut f: F, tick: &Signal<Tick>) -> Result<Signal<Option<T>>>
    where
        T: Clone + PartialEq + 'static,
        F: FnMut(&Scope<'_>) -> Result<T> + 'static,
    {
        let clock = tick.clone();
        let gated = EffectFn::new(move |scope| {
            clock.time();
            f(scope)
        });
        let state = ClockState {
            tick: tick.clone(),
            last_time: tick.peek(|t| t.time),
        };
        self.spawn(gated, Policy::Clock(state))
    }

    pub(crate) fn clock_trigger(&self, computation: &Rc<Computation>) -> Result<()> {
        let gate = match &mut *computation.policy.borrow_mut() {
            Policy::Clock(state) => {
                let now = state.tick.peek(|t| t.time);
                if now == state.last_time {
                    Gate::Wait
                } else {
                    state.last_time = now;
                    let tick = state.tick.id();
                    if computation.has_changes(|change| change.signal != tick) {
                        Gate::Open
                    } else {
                        Gate::Idle
                    }
                }
            }
            _ => Gate::Open,
        };

        match gate {
            Gate::Open => self.run(computation),
            Gate::Wait => {
                trace!(computation = ?computation.id, "holding change until next tick");
                computation.hold();
                Ok(())
            }
            Gate::Idle => {
                computation.discard();
                Ok(())
            }
        }
    }
}

enum Gate {
    Open,
    Wait,
    Idle,
}
