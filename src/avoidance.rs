use anyhow::Result;
use dronesim_common::{AgentId, SimParams, Vec3};
use crate::agent::Agent;

/// A predicted close encounter between the primary and one other agent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PredictedEncounter {
    pub other_id: AgentId,
    /// The primary's extrapolated position at the offending lookahead step.
    pub point: Vec3,
}

/// Look-ahead collision predictor with a pause timer.
///
/// Each call extrapolates every agent along its current heading at a handful
/// of future instants and freezes the primary for `pause_duration` when any
/// predicted separation drops below `threshold`. The extrapolation is
/// straight-line: waypoint turns inside the lookahead window are ignored,
/// which keeps each check O(others * lookahead_steps). The horizon is short
/// relative to typical waypoint legs.
#[derive(Debug, Clone)]
pub struct CollisionPredictor {
    threshold: f32,
    lookahead_steps: u32,
    pause_duration: f32,
    pause_remaining: f32,
}

impl CollisionPredictor {
    pub fn new(threshold: f32, lookahead_steps: u32, pause_duration: f32) -> Result<Self> {
        if threshold <= 0.0 {
            anyhow::bail!("Collision threshold must be positive.");
        }
        if lookahead_steps == 0 {
            anyhow::bail!("Lookahead must cover at least one step.");
        }
        if pause_duration <= 0.0 {
            anyhow::bail!("Pause duration must be positive.");
        }
        Ok(Self { threshold, lookahead_steps, pause_duration, pause_remaining: 0.0 })
    }

    pub fn from_params(params: &SimParams) -> Result<Self> {
        Self::new(params.threshold, params.lookahead_steps, params.pause_duration)
    }

    /// Whether an earlier trigger is still holding the primary in place.
    pub fn is_pausing(&self) -> bool {
        self.pause_remaining > 0.0
    }

    /// Decides whether the primary should stay frozen this frame.
    ///
    /// An ongoing pause counts down by `dt` and reports no new trigger
    /// information, regardless of current distances. Otherwise others are
    /// checked in their given order, each across lookahead steps
    /// `1..=lookahead_steps` ascending; the first pair whose extrapolated
    /// separation falls strictly below the threshold starts a new pause and is
    /// reported immediately.
    pub fn should_pause(
        &mut self,
        primary: &Agent,
        others: &[Agent],
        dt: f32,
    ) -> (bool, Option<PredictedEncounter>) {
        // Continue an existing pause.
        if self.pause_remaining > 0.0 {
            self.pause_remaining -= dt;
            return (true, None);
        }

        for other in others {
            for step in 1..=self.lookahead_steps {
                let t = dt * step as f32;
                let primary_future = primary
                    .position()
                    .add(primary.direction().scale(primary.velocity() * t));
                let other_future = other
                    .position()
                    .add(other.direction().scale(other.velocity() * t));
                if primary_future.distance(other_future) < self.threshold {
                    self.pause_remaining = self.pause_duration;
                    return (
                        true,
                        Some(PredictedEncounter { other_id: other.id(), point: primary_future }),
                    );
                }
            }
        }
        (false, None)
    }
}
