//! Fixed-timestep frame pump.
//!
//! Each rendered frame runs as many fixed steps as the accumulated time
//! allows (up to a cap), then one variable tick with the real frame delta.

use ruckus_core::scheduler::TickSummary;
use ruckus_core::session::Session;
use ruckus_core::time::Channel;

use crate::config::PumpConfig;

/// What one call to [`FramePump::frame`] did.
#[derive(Debug, Default)]
pub struct FrameReport {
    pub fixed_steps: u32,
    /// Fixed-channel time discarded because the step cap was hit.
    pub dropped_secs: f32,
    pub summary: TickSummary,
}

pub struct FramePump {
    fixed_dt: f32,
    max_fixed_steps: u32,
    accumulator: f32,
}

impl FramePump {
    pub fn new(config: &PumpConfig) -> Self {
        Self {
            fixed_dt: config.fixed_dt(),
            max_fixed_steps: config.max_fixed_steps_per_frame.max(1),
            accumulator: 0.0,
        }
    }

    pub fn fixed_dt(&self) -> f32 {
        self.fixed_dt
    }

    /// Unconsumed fixed-channel time carried into the next frame.
    pub fn accumulated(&self) -> f32 {
        self.accumulator
    }

    /// Advance the session by one frame of `dt` seconds.
    pub fn frame(&mut self, session: &mut Session, dt: f32) -> FrameReport {
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        let mut report = FrameReport::default();

        self.accumulator += dt;
        while self.accumulator >= self.fixed_dt && report.fixed_steps < self.max_fixed_steps {
            let summary = session.tick(Channel::Fixed, self.fixed_dt);
            report.summary.merge(summary);
            self.accumulator -= self.fixed_dt;
            report.fixed_steps += 1;
        }
        if self.accumulator >= self.fixed_dt {
            let kept = self.accumulator % self.fixed_dt;
            report.dropped_secs = self.accumulator - kept;
            self.accumulator = kept;
            tracing::warn!(
                dropped_secs = report.dropped_secs,
                steps = report.fixed_steps,
                "frame too long, dropping fixed steps"
            );
        }

        let summary = session.tick(Channel::Variable, dt);
        report.summary.merge(summary);
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ruckus_core::test_helpers::session_with;

    fn pump(max_fixed_steps_per_frame: u32) -> FramePump {
        FramePump::new(&PumpConfig {
            frame_rate_hz: 8.0,
            fixed_rate_hz: 4.0,
            max_fixed_steps_per_frame,
        })
    }

    #[test]
    fn short_frames_accumulate_before_stepping() {
        let mut session = session_with(1, 2);
        let mut pump = pump(5);

        let report = pump.frame(&mut session, 0.125);
        assert_eq!(report.fixed_steps, 0);
        assert_eq!(session.clock().ticks(Channel::Fixed), 0);
        assert_eq!(session.clock().ticks(Channel::Variable), 1);

        let report = pump.frame(&mut session, 0.125);
        assert_eq!(report.fixed_steps, 1);
        assert_eq!(pump.accumulated(), 0.0);
    }

    #[test]
    fn long_frame_runs_several_steps() {
        let mut session = session_with(1, 2);
        let mut pump = pump(5);

        let report = pump.frame(&mut session, 0.875);
        assert_eq!(report.fixed_steps, 3);
        assert_eq!(pump.accumulated(), 0.125);
        assert_eq!(session.clock().now(Channel::Fixed), 0.75);
        assert_eq!(session.clock().now(Channel::Variable), 0.875);
    }

    #[test]
    fn step_cap_drops_excess_time() {
        let mut session = session_with(1, 2);
        let mut pump = pump(2);

        let report = pump.frame(&mut session, 2.125);
        assert_eq!(report.fixed_steps, 2);
        assert_eq!(report.dropped_secs, 1.5);
        assert_eq!(pump.accumulated(), 0.125);
    }

    #[test]
    fn fixed_actions_fire_inside_the_frame() {
        let mut session = session_with(1, 2);
        let mut pump = pump(5);
        let token = session.fixed_delay_invoke(0.5, |_| Ok(()));

        let report = pump.frame(&mut session, 0.25);
        assert_eq!(report.summary.fired, 0);
        let report = pump.frame(&mut session, 0.25);
        assert_eq!(report.summary.fired, 1);
        assert!(!session.is_pending(token));
    }

    #[test]
    fn bad_delta_is_ignored() {
        let mut session = session_with(1, 2);
        let mut pump = pump(5);
        pump.frame(&mut session, f32::NAN);
        pump.frame(&mut session, -1.0);
        assert_eq!(session.clock().now(Channel::Variable), 0.0);
        assert_eq!(pump.accumulated(), 0.0);
    }
}
