use std::fmt;

use serde::{Deserialize, Serialize};

/// One of the two independent tick streams a scheduled action is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Channel {
    /// Once per rendered frame.
    Variable,
    /// Once per fixed-rate physics step.
    Fixed,
}

impl Channel {
    pub const ALL: [Channel; 2] = [Channel::Variable, Channel::Fixed];

    pub(crate) fn index(self) -> usize {
        match self {
            Channel::Variable => 0,
            Channel::Fixed => 1,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Variable => write!(f, "variable"),
            Channel::Fixed => write!(f, "fixed"),
        }
    }
}

/// Monotonic time source with a separate timeline per channel.
///
/// The frame pump advances each channel independently; nothing here assumes
/// a relationship between the variable and fixed cadences.
#[derive(Debug, Clone, Default)]
pub struct Clock {
    now: [f64; 2],
    delta: [f32; 2],
    ticks: [u64; 2],
}

impl Clock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance `channel` by `dt` seconds and return its new current time.
    /// Negative or non-finite deltas are treated as zero so time never runs backwards.
    pub fn advance(&mut self, channel: Channel, dt: f32) -> f64 {
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        let i = channel.index();
        self.now[i] += f64::from(dt);
        self.delta[i] = dt;
        self.ticks[i] += 1;
        self.now[i]
    }

    pub fn now(&self, channel: Channel) -> f64 {
        self.now[channel.index()]
    }

    /// Delta of the most recent tick on `channel`.
    pub fn delta(&self, channel: Channel) -> f32 {
        self.delta[channel.index()]
    }

    pub fn ticks(&self, channel: Channel) -> u64 {
        self.ticks[channel.index()]
    }
}
