//! Frame-driven delayed-action scheduler.
//!
//! Actions are boxed closures that receive the owning context (`C`) when they
//! fire, so a callback can reach any other service on the context, including
//! the scheduler itself. Pending actions live in one slot arena per channel;
//! a [`Token`] is a slot index plus a generation counter, so a token that has
//! fired or been cancelled can never match the slot's next occupant.

use std::fmt;

use crate::error::RoundError;
use crate::time::Channel;

/// A deferred callback. Receives the context that owns the scheduler.
pub type Action<C> = Box<dyn FnOnce(&mut C) -> Result<(), RoundError>>;

/// Implemented by the context object that owns a [`Scheduler`].
pub trait SchedulerHost: Sized {
    fn scheduler(&mut self) -> &mut Scheduler<Self>;
}

/// Opaque handle to a pending action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Token {
    channel: Channel,
    index: u32,
    generation: u32,
}

impl Token {
    /// The channel this token's action was registered on.
    pub fn channel(&self) -> Channel {
        self.channel
    }
}

/// Result of a single channel sweep.
#[derive(Debug, Default)]
pub struct TickSummary {
    /// Callbacks invoked this sweep, including failed ones.
    pub fired: usize,
    /// Errors returned by callbacks. Each failure is isolated to its own callback.
    pub failed: Vec<RoundError>,
}

impl TickSummary {
    pub fn merge(&mut self, other: TickSummary) {
        self.fired += other.fired;
        self.failed.extend(other.failed);
    }
}

struct Pending<C> {
    fire_at: f64,
    action: Action<C>,
}

struct Slot<C> {
    generation: u32,
    pending: Option<Pending<C>>,
}

/// Pending actions for one channel.
struct Lane<C> {
    slots: Vec<Slot<C>>,
    free: Vec<u32>,
    len: usize,
    now: f64,
}

impl<C> Lane<C> {
    fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
            now: 0.0,
        }
    }

    fn insert(&mut self, fire_at: f64, action: Action<C>) -> (u32, u32) {
        let pending = Some(Pending { fire_at, action });
        self.len += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.pending = pending;
            return (index, slot.generation);
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            pending,
        });
        (index, 0)
    }

    fn contains(&self, index: u32, generation: u32) -> bool {
        self.slots
            .get(index as usize)
            .is_some_and(|s| s.generation == generation && s.pending.is_some())
    }

    /// Remove the action at `index` if the generation still matches.
    fn take(&mut self, index: u32, generation: u32) -> Option<Pending<C>> {
        let slot = self.slots.get_mut(index as usize)?;
        if slot.generation != generation {
            return None;
        }
        let pending = slot.pending.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(index);
        self.len -= 1;
        Some(pending)
    }

    /// Snapshot of every (index, generation) due at `now`.
    fn due(&self, now: f64) -> Vec<(u32, u32)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| match &s.pending {
                Some(p) if p.fire_at <= now => Some((i as u32, s.generation)),
                _ => None,
            })
            .collect()
    }

    fn clear(&mut self) {
        for (i, slot) in self.slots.iter_mut().enumerate() {
            if slot.pending.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(i as u32);
            }
        }
        self.len = 0;
    }
}

/// Two independent collections of delayed actions, one per [`Channel`].
pub struct Scheduler<C> {
    lanes: [Lane<C>; 2],
}

impl<C> Default for Scheduler<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> fmt::Debug for Scheduler<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("variable_pending", &self.pending(Channel::Variable))
            .field("fixed_pending", &self.pending(Channel::Fixed))
            .field("variable_now", &self.now(Channel::Variable))
            .field("fixed_now", &self.now(Channel::Fixed))
            .finish()
    }
}

impl<C> Scheduler<C> {
    pub fn new() -> Self {
        Self {
            lanes: [Lane::new(), Lane::new()],
        }
    }

    /// Register `action` on `channel`, due `delay` seconds after the channel's
    /// last tick. The action never runs synchronously, even with a zero delay.
    pub fn schedule<F>(&mut self, channel: Channel, delay: f32, action: F) -> Token
    where
        F: FnOnce(&mut C) -> Result<(), RoundError> + 'static,
    {
        let delay = if delay.is_finite() { delay.max(0.0) } else { 0.0 };
        let lane = &mut self.lanes[channel.index()];
        let fire_at = lane.now + f64::from(delay);
        let (index, generation) = lane.insert(fire_at, Box::new(action));
        tracing::trace!(%channel, index, generation, fire_at, "scheduled action");
        Token {
            channel,
            index,
            generation,
        }
    }

    /// Register `action` on the variable (per-frame) channel.
    pub fn delay_invoke<F>(&mut self, delay: f32, action: F) -> Token
    where
        F: FnOnce(&mut C) -> Result<(), RoundError> + 'static,
    {
        self.schedule(Channel::Variable, delay, action)
    }

    /// Register `action` on the fixed (physics-rate) channel.
    pub fn fixed_delay_invoke<F>(&mut self, delay: f32, action: F) -> Token
    where
        F: FnOnce(&mut C) -> Result<(), RoundError> + 'static,
    {
        self.schedule(Channel::Fixed, delay, action)
    }

    /// Drop a pending action without running it. Returns false if the token
    /// already fired, was already cancelled, or never existed.
    pub fn cancel(&mut self, token: Token) -> bool {
        self.lanes[token.channel.index()]
            .take(token.index, token.generation)
            .is_some()
    }

    pub fn is_pending(&self, token: Token) -> bool {
        self.lanes[token.channel.index()].contains(token.index, token.generation)
    }

    /// Number of actions waiting on `channel`.
    pub fn pending(&self, channel: Channel) -> usize {
        self.lanes[channel.index()].len
    }

    /// Time of the most recent tick on `channel`.
    pub fn now(&self, channel: Channel) -> f64 {
        self.lanes[channel.index()].now
    }

    /// Drop every pending action on both channels without running any.
    pub fn clear(&mut self) {
        for lane in &mut self.lanes {
            lane.clear();
        }
    }
}

impl<C: SchedulerHost> Scheduler<C> {
    /// Run and remove every action on `channel` with `fire_at <= now`.
    ///
    /// Due actions are snapshotted before the first callback runs. Actions
    /// registered by a callback wait for a later tick; actions cancelled by
    /// a callback before they are reached are skipped. A failing callback
    /// is logged and does not affect the rest of the sweep. No order is
    /// guaranteed among actions due in the same sweep.
    pub fn tick(host: &mut C, channel: Channel, now: f64) -> TickSummary {
        let due = {
            let lane = &mut host.scheduler().lanes[channel.index()];
            if now > lane.now {
                lane.now = now;
            }
            lane.due(lane.now)
        };

        let mut summary = TickSummary::default();
        for (index, generation) in due {
            let Some(pending) = host.scheduler().lanes[channel.index()].take(index, generation)
            else {
                continue;
            };
            summary.fired += 1;
            if let Err(e) = (pending.action)(host) {
                tracing::error!(%channel, error = %e, "scheduled action failed");
                summary.failed.push(e);
            }
        }
        summary
    }

    /// Run a pending action immediately and remove it.
    ///
    /// Returns `Ok(false)` if the token is no longer pending. An error from
    /// the callback is returned to the caller.
    pub fn invoke_now(host: &mut C, token: Token) -> Result<bool, RoundError> {
        let Some(pending) =
            host.scheduler().lanes[token.channel.index()].take(token.index, token.generation)
        else {
            return Ok(false);
        };
        (pending.action)(host)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal host: a scheduler plus a log of fired labels.
    #[derive(Default)]
    struct Host {
        scheduler: Scheduler<Host>,
        fired: Vec<&'static str>,
        tokens: Vec<Token>,
    }

    impl SchedulerHost for Host {
        fn scheduler(&mut self) -> &mut Scheduler<Self> {
            &mut self.scheduler
        }
    }

    fn record(label: &'static str) -> impl FnOnce(&mut Host) -> Result<(), RoundError> {
        move |h: &mut Host| {
            h.fired.push(label);
            Ok(())
        }
    }

    fn tick(host: &mut Host, channel: Channel, now: f64) -> TickSummary {
        Scheduler::tick(host, channel, now)
    }

    #[test]
    fn zero_delay_fires_on_next_tick_not_synchronously() {
        let mut host = Host::default();
        host.scheduler.delay_invoke(0.0, record("a"));
        assert!(host.fired.is_empty());

        tick(&mut host, Channel::Variable, 0.0);
        assert_eq!(host.fired, vec!["a"]);
    }

    #[test]
    fn fires_once_at_first_tick_past_deadline() {
        let mut host = Host::default();
        host.scheduler.delay_invoke(1.0, record("a"));

        tick(&mut host, Channel::Variable, 0.5);
        assert!(host.fired.is_empty());
        tick(&mut host, Channel::Variable, 1.0);
        assert_eq!(host.fired, vec!["a"]);
        tick(&mut host, Channel::Variable, 2.0);
        tick(&mut host, Channel::Variable, 3.0);
        assert_eq!(host.fired, vec!["a"], "must not double-fire");
    }

    #[test]
    fn cancel_before_deadline_suppresses_callback() {
        let mut host = Host::default();
        let token = host.scheduler.delay_invoke(5.0, record("a"));

        tick(&mut host, Channel::Variable, 3.0);
        assert!(host.scheduler.cancel(token));
        tick(&mut host, Channel::Variable, 10.0);

        assert!(host.fired.is_empty());
        assert!(!host.scheduler.cancel(token), "second cancel is a no-op");
    }

    #[test]
    fn cancel_after_fire_returns_false() {
        let mut host = Host::default();
        let token = host.scheduler.delay_invoke(0.0, record("a"));
        tick(&mut host, Channel::Variable, 0.1);
        assert!(!host.scheduler.cancel(token));
        assert!(!host.scheduler.is_pending(token));
    }

    #[test]
    fn simultaneous_deadlines_both_fire_once() {
        let mut host = Host::default();
        host.scheduler.delay_invoke(2.0, record("a"));
        host.scheduler.delay_invoke(2.0, record("b"));

        let summary = tick(&mut host, Channel::Variable, 2.0);
        assert_eq!(summary.fired, 2);
        let mut fired = host.fired.clone();
        fired.sort_unstable();
        assert_eq!(fired, vec!["a", "b"]);

        tick(&mut host, Channel::Variable, 4.0);
        assert_eq!(host.fired.len(), 2);
    }

    #[test]
    fn channels_are_independent() {
        let mut host = Host::default();
        host.scheduler.delay_invoke(1.0, record("variable"));
        host.scheduler.fixed_delay_invoke(1.0, record("fixed"));

        tick(&mut host, Channel::Fixed, 1.0);
        assert_eq!(host.fired, vec!["fixed"]);
        assert_eq!(host.scheduler.pending(Channel::Variable), 1);

        tick(&mut host, Channel::Variable, 1.0);
        assert_eq!(host.fired, vec!["fixed", "variable"]);
    }

    #[test]
    fn delay_is_relative_to_channel_time() {
        let mut host = Host::default();
        tick(&mut host, Channel::Variable, 10.0);
        host.scheduler.delay_invoke(1.0, record("a"));

        tick(&mut host, Channel::Variable, 10.5);
        assert!(host.fired.is_empty());
        tick(&mut host, Channel::Variable, 11.0);
        assert_eq!(host.fired, vec!["a"]);
    }

    #[test]
    fn invoke_now_runs_and_removes() {
        let mut host = Host::default();
        let token = host.scheduler.delay_invoke(30.0, record("flush"));

        assert_eq!(Scheduler::invoke_now(&mut host, token), Ok(true));
        assert_eq!(host.fired, vec!["flush"]);
        assert_eq!(Scheduler::invoke_now(&mut host, token), Ok(false));

        tick(&mut host, Channel::Variable, 60.0);
        assert_eq!(host.fired, vec!["flush"]);
    }

    #[test]
    fn invoke_now_propagates_callback_error() {
        let mut host = Host::default();
        let token = host
            .scheduler
            .delay_invoke(1.0, |_: &mut Host| Err(RoundError::NoActiveMode));
        assert_eq!(
            Scheduler::invoke_now(&mut host, token),
            Err(RoundError::NoActiveMode)
        );
        assert!(!host.scheduler.is_pending(token));
    }

    #[test]
    fn stale_token_does_not_touch_reused_slot() {
        let mut host = Host::default();
        let old = host.scheduler.delay_invoke(0.0, record("old"));
        tick(&mut host, Channel::Variable, 0.0);

        let new = host.scheduler.delay_invoke(1.0, record("new"));
        assert_eq!(old.index, new.index, "slot should be reused");
        assert!(!host.scheduler.cancel(old));
        assert!(host.scheduler.is_pending(new));

        tick(&mut host, Channel::Variable, 1.0);
        assert_eq!(host.fired, vec!["old", "new"]);
    }

    #[test]
    fn failing_callback_does_not_block_others() {
        let mut host = Host::default();
        host.scheduler.delay_invoke(1.0, record("a"));
        host.scheduler
            .delay_invoke(1.0, |_: &mut Host| Err(RoundError::NoActiveMode));
        host.scheduler.delay_invoke(1.0, record("b"));

        let summary = tick(&mut host, Channel::Variable, 1.0);
        assert_eq!(summary.fired, 3);
        assert_eq!(summary.failed, vec![RoundError::NoActiveMode]);
        assert_eq!(host.fired.len(), 2);
        assert_eq!(host.scheduler.pending(Channel::Variable), 0);
    }

    // Actions registered during a sweep are deferred to the next tick, even
    // when already due.
    #[test]
    fn reentrant_registration_waits_for_next_tick() {
        let mut host = Host::default();
        host.scheduler.delay_invoke(0.0, |h: &mut Host| {
            h.fired.push("outer");
            h.scheduler.delay_invoke(0.0, record("inner"));
            Ok(())
        });

        tick(&mut host, Channel::Variable, 1.0);
        assert_eq!(host.fired, vec!["outer"]);
        tick(&mut host, Channel::Variable, 1.0);
        assert_eq!(host.fired, vec!["outer", "inner"]);
    }

    #[test]
    fn reentrant_cancel_skips_unvisited_entry() {
        let mut host = Host::default();
        // Each callback cancels the other; whichever runs first wins.
        let a = host.scheduler.delay_invoke(1.0, |h: &mut Host| {
            h.fired.push("a");
            let other = h.tokens[1];
            h.scheduler.cancel(other);
            Ok(())
        });
        let b = host.scheduler.delay_invoke(1.0, |h: &mut Host| {
            h.fired.push("b");
            let other = h.tokens[0];
            h.scheduler.cancel(other);
            Ok(())
        });
        host.tokens = vec![a, b];
        host.scheduler.delay_invoke(1.0, record("bystander"));

        let summary = tick(&mut host, Channel::Variable, 1.0);
        assert_eq!(summary.fired, 2);
        assert!(host.fired.contains(&"bystander"));
        assert_eq!(host.fired.iter().filter(|l| **l != "bystander").count(), 1);
        assert_eq!(host.scheduler.pending(Channel::Variable), 0);
    }

    #[test]
    fn clear_drops_everything_without_firing() {
        let mut host = Host::default();
        let token = host.scheduler.delay_invoke(0.0, record("a"));
        host.scheduler.fixed_delay_invoke(0.0, record("b"));
        host.scheduler.clear();

        assert!(!host.scheduler.is_pending(token));
        tick(&mut host, Channel::Variable, 1.0);
        tick(&mut host, Channel::Fixed, 1.0);
        assert!(host.fired.is_empty());
        assert_eq!(host.scheduler.pending(Channel::Fixed), 0);
    }

    #[test]
    fn time_does_not_move_backwards() {
        let mut host = Host::default();
        tick(&mut host, Channel::Variable, 5.0);
        tick(&mut host, Channel::Variable, 2.0);
        assert_eq!(host.scheduler.now(Channel::Variable), 5.0);
    }

    mod props {
        use proptest::prelude::*;

        use super::*;

        proptest! {
            #[test]
            fn every_uncancelled_action_fires_exactly_once(
                delays in proptest::collection::vec(0.0f32..10.0, 1..40),
                cancel_mask in proptest::collection::vec(any::<bool>(), 40),
                step in 0.05f64..1.5,
            ) {
                let mut host = Host::default();
                let mut expected = 0usize;
                for (i, delay) in delays.iter().enumerate() {
                    let token = host.scheduler.delay_invoke(*delay, record("x"));
                    if cancel_mask[i] {
                        prop_assert!(host.scheduler.cancel(token));
                    } else {
                        expected += 1;
                    }
                }

                let mut now = 0.0;
                while now <= 11.0 {
                    tick(&mut host, Channel::Variable, now);
                    now += step;
                }
                tick(&mut host, Channel::Variable, 11.0);

                prop_assert_eq!(host.fired.len(), expected);
                prop_assert_eq!(host.scheduler.pending(Channel::Variable), 0);
            }
        }
    }
}
