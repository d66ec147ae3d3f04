use crate::channel::ChannelId;
use std::time::Duration;

pub const FADE_TICK: Duration = Duration::from_millis(20);
pub const DEFAULT_FADE: Duration = Duration::from_millis(600);

/// Number of ticks a fade of `duration` takes. Never zero.
pub fn fade_steps(duration: Duration) -> u32 {
    let tick_ms = FADE_TICK.as_millis();
    let ms = duration.as_millis();
    let steps = ms.div_ceil(tick_ms).max(1);
    u32::try_from(steps).unwrap_or(u32::MAX)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FadeStep {
    pub incoming: f32,
    pub outgoing: f32,
    pub finished: bool,
}

/// Linear two-channel ramp advanced one tick at a time.
#[derive(Debug, Clone, PartialEq)]
pub struct FadeState {
    from: ChannelId,
    to: ChannelId,
    track: String,
    target: f32,
    step_in: f32,
    step_out: f32,
    steps: u32,
    done: u32,
}

impl FadeState {
    pub fn new(
        from: ChannelId,
        to: ChannelId,
        track: impl Into<String>,
        target: f32,
        duration: Duration,
    ) -> Self {
        let steps = fade_steps(duration);
        let delta = target / steps as f32;
        Self {
            from,
            to,
            track: track.into(),
            target,
            step_in: delta,
            step_out: delta,
            steps,
            done: 0,
        }
    }

    pub fn from(&self) -> ChannelId {
        self.from
    }

    pub fn to(&self) -> ChannelId {
        self.to
    }

    pub fn track(&self) -> &str {
        &self.track
    }

    pub fn target(&self) -> f32 {
        self.target
    }

    pub fn steps(&self) -> u32 {
        self.steps
    }

    pub fn remaining(&self) -> u32 {
        self.steps.saturating_sub(self.done)
    }

    pub fn progress(&self) -> f32 {
        self.done as f32 / self.steps as f32
    }

    /// Points the incoming ramp at `target`, spreading the difference over the
    /// ticks that are left. The outgoing ramp is unchanged.
    pub fn retarget(&mut self, target: f32, incoming_volume: f32) {
        self.target = target;
        let left = self.remaining().max(1) as f32;
        self.step_in = (target - incoming_volume) / left;
    }

    pub fn step(&mut self, incoming: f32, outgoing: f32) -> FadeStep {
        self.done = (self.done + 1).min(self.steps);
        let finished = self.done >= self.steps;
        if finished {
            return FadeStep {
                incoming: self.target,
                outgoing: 0.0,
                finished,
            };
        }
        let incoming = if self.step_in >= 0.0 {
            (incoming + self.step_in).min(self.target)
        } else {
            (incoming + self.step_in).max(self.target)
        };
        FadeStep {
            incoming: incoming.clamp(0.0, 1.0),
            outgoing: (outgoing - self.step_out).clamp(0.0, 1.0),
            finished,
        }
    }
}
