//! Timed playback of narrations.
//!
//! Playback runs on the caller's task: each step is yielded, then the
//! player sleeps for `base_delay / speed` before yielding the next one. The
//! stream ends only after the last step's hold, so awaiting the end of the
//! stream is the completion signal for the operation.
//!
//! There is no cancellation. Once a narration starts playing it runs to the
//! end.

use std::fmt;
use std::time::Duration;

use futures::Stream;
use futures::stream;

use crate::narration::steps::{Narration, Steps, VisualizationStep};

/// Playback speed multiplier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Speed(f64);

impl Speed {
    pub const NORMAL: Self = Self(1.0);
    /// Slowest accepted multiplier.
    pub const MIN: f64 = 0.1;
    /// Fastest accepted multiplier.
    pub const MAX: f64 = 100.0;

    /// Validate a multiplier. Returns `None` outside `[MIN, MAX]` or for NaN.
    #[must_use]
    pub fn new(multiplier: f64) -> Option<Self> {
        (Self::MIN..=Self::MAX)
            .contains(&multiplier)
            .then_some(Self(multiplier))
    }

    #[must_use]
    pub const fn get(self) -> f64 {
        self.0
    }

    /// Scale a base delay by this speed.
    #[must_use]
    pub fn scale(self, base: Duration) -> Duration {
        base.div_f64(self.0)
    }
}

impl Default for Speed {
    fn default() -> Self {
        Self::NORMAL
    }
}

impl fmt::Display for Speed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x", self.0)
    }
}

/// Paces narration steps with timed pauses.
#[derive(Debug, Clone, Copy, Default)]
pub struct Player {
    speed: Speed,
    skip_delays: bool,
}

impl Player {
    #[must_use]
    pub const fn new(speed: Speed) -> Self {
        Self {
            speed,
            skip_delays: false,
        }
    }

    /// Play every step without pausing.
    #[must_use]
    pub const fn without_delays(mut self) -> Self {
        self.skip_delays = true;
        self
    }

    #[must_use]
    pub const fn speed(&self) -> Speed {
        self.speed
    }

    pub const fn set_speed(&mut self, speed: Speed) {
        self.speed = speed;
    }

    /// Pause that follows a step with the given base delay.
    #[must_use]
    pub fn delay_for(&self, base: Duration) -> Duration {
        if self.skip_delays {
            Duration::ZERO
        } else {
            self.speed.scale(base)
        }
    }

    /// Sleep for a scaled base delay.
    pub async fn pause(&self, base: Duration) {
        let delay = self.delay_for(base);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    /// Stream the steps of `narration` with pauses in between.
    pub fn play(self, narration: &Narration) -> impl Stream<Item = VisualizationStep> + '_ {
        struct State<'a> {
            player: Player,
            steps: Steps<'a>,
            pending: Duration,
        }

        let state = State {
            player: self,
            steps: narration.steps(),
            pending: Duration::ZERO,
        };

        // The pause before each poll holds the previously yielded step, so
        // the last step is held before the stream reports its end.
        stream::unfold(state, |mut state| async move {
            state.player.pause(state.pending).await;
            let step = state.steps.next()?;
            state.pending = step.base_delay;
            Some((step, state))
        })
    }
}
