//! Timers and Deferred Completions
//!
//! Execution is single-threaded and cooperative. Work that must happen
//! later (throttle windows expiring, asynchronous effect results settling)
//! is parked on the runtime's agenda and runs only when the caller drives
//! it:
//!
//! - [`Runtime::fire_due_timers`] runs every timer whose deadline has passed
//! - [`Runtime::settle`] awaits deferred results and sleeps until the next
//!   timer deadline, until nothing is left
//!
//! Deadlines use `tokio::time::Instant`, so tests running with a paused
//! tokio clock advance deterministically.

use std::collections::BTreeMap;

use futures_util::future::{join_all, LocalBoxFuture};
use tokio::time::Instant;
use tracing::trace;

use crate::error::Result;

use super::runtime::Runtime;

pub(crate) type TimerCallback = Box<dyn FnOnce(&Runtime) -> Result<()>>;

#[derive(Default)]
pub(crate) struct Agenda {
    /// Ordered by deadline, then by scheduling order.
    timers: BTreeMap<(Instant, u64), TimerCallback>,
    next_seq: u64,
    deferred: Vec<LocalBoxFuture<'static, Result<()>>>,
}

impl Runtime {
    /// Run `callback` once `deadline` has passed.
    pub(crate) fn schedule_at(&self, deadline: Instant, callback: TimerCallback) {
        let mut agenda = self.inner().agenda.borrow_mut();
        let seq = agenda.next_seq;
        agenda.next_seq += 1;
        agenda.timers.insert((deadline, seq), callback);
        trace!(seq, "scheduled timer");
    }

    /// Queue a deferred completion.
    pub(crate) fn defer(&self, task: LocalBoxFuture<'static, Result<()>>) {
        self.inner().agenda.borrow_mut().deferred.push(task);
    }

    /// Number of timers waiting for their deadline.
    pub fn pending_timers(&self) -> usize {
        self.inner().agenda.borrow().timers.len()
    }

    /// Number of deferred results that have not settled yet.
    pub fn pending_tasks(&self) -> usize {
        self.inner().agenda.borrow().deferred.len()
    }

    /// Deadline of the earliest pending timer.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.inner()
            .agenda
            .borrow()
            .timers
            .keys()
            .next()
            .map(|(deadline, _)| *deadline)
    }

    /// Run every timer whose deadline has passed. Returns how many fired.
    pub fn fire_due_timers(&self) -> Result<usize> {
        let now = Instant::now();
        let mut fired = 0;

        loop {
            let due = {
                let mut agenda = self.inner().agenda.borrow_mut();
                let next = agenda.timers.keys().next().copied();
                match next {
                    Some((deadline, _)) if deadline <= now => agenda.timers.pop_first(),
                    _ => None,
                }
            };
            let Some((_, callback)) = due else {
                break;
            };
            callback(self)?;
            fired += 1;
        }

        if fired > 0 {
            trace!(fired, "fired due timers");
        }
        Ok(fired)
    }

    /// Drive deferred results and timers until none are left.
    ///
    /// Returns the first error raised by a completion or a timer.
    pub async fn settle(&self) -> Result<()> {
        loop {
            let tasks = std::mem::take(&mut self.inner().agenda.borrow_mut().deferred);
            if !tasks.is_empty() {
                trace!(tasks = tasks.len(), "awaiting deferred results");
                for outcome in join_all(tasks).await {
                    outcome?;
                }
                continue;
            }

            self.fire_due_timers()?;
            if self.pending_tasks() > 0 {
                continue;
            }

            match self.next_deadline() {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => return Ok(()),
            }
        }
    }
}
