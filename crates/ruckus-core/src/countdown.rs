//! Named, restartable countdowns built on the variable channel of the scheduler.
//!
//! A running countdown is a single pending step action that reschedules
//! itself every tick until the remaining time reaches zero.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::RoundError;
use crate::scheduler::{Action, SchedulerHost, Token};
use crate::time::Channel;

/// The independent countdowns that exist in a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CountdownSlot {
    /// Transition countdown before a round starts.
    Main,
    /// Round duration.
    Game,
}

impl fmt::Display for CountdownSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CountdownSlot::Main => write!(f, "main"),
            CountdownSlot::Game => write!(f, "game"),
        }
    }
}

/// Implemented by the context that owns a [`Countdowns`] table.
pub trait CountdownHost: SchedulerHost {
    fn countdowns(&mut self) -> &mut Countdowns<Self>;

    /// Display hook, called on every step with the ceiling of the
    /// remaining seconds.
    fn countdown_display(&mut self, slot: CountdownSlot, remaining: u32);

    /// Called when a fresh run starts on `slot`, before its first step.
    fn countdown_started(&mut self, _slot: CountdownSlot) {}

    /// Called right before the completion callback runs.
    fn countdown_finished(&mut self, _slot: CountdownSlot) {}
}

struct Run<C> {
    serial: u64,
    duration: f32,
    started_at: f64,
    remaining: f32,
    step: Token,
    on_complete: Action<C>,
}

enum Step<C> {
    Stale,
    Running { show: u32 },
    Finished { show: u32, on_complete: Action<C> },
}

/// Table of running countdowns, one per [`CountdownSlot`].
pub struct Countdowns<C> {
    runs: HashMap<CountdownSlot, Run<C>>,
    next_serial: u64,
}

impl<C> Default for Countdowns<C> {
    fn default() -> Self {
        Self {
            runs: HashMap::new(),
            next_serial: 0,
        }
    }
}

impl<C> fmt::Debug for Countdowns<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (slot, run) in &self.runs {
            map.entry(slot, &run.remaining);
        }
        map.finish()
    }
}

impl<C> Countdowns<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self, slot: CountdownSlot) -> bool {
        self.runs.contains_key(&slot)
    }

    /// Seconds left on `slot` as of its last step.
    pub fn remaining(&self, slot: CountdownSlot) -> Option<f32> {
        self.runs.get(&slot).map(|r| r.remaining)
    }
}

impl<C: CountdownHost + 'static> Countdowns<C> {
    /// Start `slot` counting down from `duration` seconds.
    ///
    /// A countdown already running on `slot` is replaced; its completion is
    /// dropped without running. `on_complete` runs exactly once, on the
    /// first step where the remaining time is at or below zero, and never
    /// synchronously inside this call.
    pub fn start<F>(host: &mut C, slot: CountdownSlot, duration: f32, on_complete: F)
    where
        F: FnOnce(&mut C) -> Result<(), RoundError> + 'static,
    {
        if Self::stop(host, slot) {
            tracing::debug!(%slot, "restarting countdown");
        }
        let duration = if duration.is_finite() { duration } else { 0.0 };
        let serial = {
            let table = host.countdowns();
            table.next_serial += 1;
            table.next_serial
        };
        let started_at = host.scheduler().now(Channel::Variable);
        let step = Self::schedule_step(host, slot, serial);
        host.countdowns().runs.insert(
            slot,
            Run {
                serial,
                duration,
                started_at,
                remaining: duration.max(0.0),
                step,
                on_complete: Box::new(on_complete),
            },
        );
        host.countdown_started(slot);
        tracing::debug!(%slot, duration, "countdown started");
    }

    /// Cancel `slot` without running its completion. Returns whether a
    /// countdown was running.
    pub fn stop(host: &mut C, slot: CountdownSlot) -> bool {
        let Some(run) = host.countdowns().runs.remove(&slot) else {
            return false;
        };
        host.scheduler().cancel(run.step);
        true
    }

    fn schedule_step(host: &mut C, slot: CountdownSlot, serial: u64) -> Token {
        host.scheduler()
            .delay_invoke(0.0, move |h: &mut C| Self::step(h, slot, serial))
    }

    fn step(host: &mut C, slot: CountdownSlot, serial: u64) -> Result<(), RoundError> {
        let now = host.scheduler().now(Channel::Variable);
        let outcome = {
            let table = host.countdowns();
            match table.runs.get_mut(&slot) {
                Some(run) if run.serial == serial => {
                    let remaining = run.duration - (now - run.started_at) as f32;
                    run.remaining = remaining.max(0.0);
                    let show = run.remaining.ceil() as u32;
                    if remaining <= 0.0 {
                        match table.runs.remove(&slot) {
                            Some(run) => Step::Finished {
                                show,
                                on_complete: run.on_complete,
                            },
                            None => Step::Stale,
                        }
                    } else {
                        Step::Running { show }
                    }
                },
                _ => Step::Stale,
            }
        };

        match outcome {
            Step::Stale => Ok(()),
            Step::Running { show } => {
                let next = Self::schedule_step(host, slot, serial);
                if let Some(run) = host.countdowns().runs.get_mut(&slot) {
                    run.step = next;
                }
                host.countdown_display(slot, show);
                Ok(())
            },
            Step::Finished { show, on_complete } => {
                host.countdown_display(slot, show);
                tracing::debug!(%slot, "countdown finished");
                host.countdown_finished(slot);
                on_complete(host)
            },
        }
    }
}
