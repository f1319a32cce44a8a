use crate::math::Transform;
use std::time::{Duration, Instant};

/// An in-flight transition between two transforms.
#[derive(Debug, Clone, Copy)]
pub struct AnimationState {
    pub start: Instant,
    pub from: Transform,
    pub to: Transform,
    pub duration: Duration,
}

/// Result of advancing the animation to a given instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnimationTick {
    pub transform: Transform,
    pub finished: bool,
}

/// Drives the refresh-synchronized interpolation loop.
///
/// The host calls [`Animator::tick`] once per display refresh while
/// [`Animator::is_active`] holds; the state clears itself on the final tick.
#[derive(Debug, Default)]
pub struct Animator {
    state: Option<AnimationState>,
}

impl Animator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a transition, replacing whatever was running.
    pub fn start(&mut self, from: Transform, to: Transform, duration: Duration, now: Instant) {
        if self.state.is_some() {
            tracing::trace!("replacing in-flight animation");
        }
        tracing::debug!(
            from_scale = from.scale(),
            to_scale = to.scale(),
            duration_ms = duration.as_millis() as u64,
            "animation started"
        );
        self.state = Some(AnimationState {
            start: now,
            from,
            to,
            duration,
        });
    }

    /// Moves the destination of the running animation without restarting
    /// its clock. Returns false when nothing is running.
    pub fn retarget(&mut self, to: Transform) -> bool {
        match self.state.as_mut() {
            Some(state) => {
                state.to = to;
                true
            }
            None => false,
        }
    }

    pub fn cancel(&mut self) {
        if self.state.take().is_some() {
            tracing::trace!("animation cancelled");
        }
    }

    pub fn is_active(&self) -> bool {
        self.state.is_some()
    }

    pub fn state(&self) -> Option<&AnimationState> {
        self.state.as_ref()
    }

    pub fn target(&self) -> Option<Transform> {
        self.state.map(|s| s.to)
    }

    pub fn tick(&mut self, now: Instant) -> Option<AnimationTick> {
        let state = self.state?;
        let elapsed = now.saturating_duration_since(state.start);

        if elapsed >= state.duration {
            self.state = None;
            tracing::trace!(scale = state.to.scale(), "animation finished");
            return Some(AnimationTick {
                transform: state.to,
                finished: true,
            });
        }

        // Progress is clamped inside the curve, so a late frame cannot overshoot.
        let transform = state.from.interpolate(
            &state.to,
            elapsed.as_secs_f32(),
            state.duration.as_secs_f32(),
        );
        Some(AnimationTick {
            transform,
            finished: false,
        })
    }
}
