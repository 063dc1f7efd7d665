use serde::{Deserialize, Serialize};

/// Simulation parameters derived from the configuration, used frequently during simulation steps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimParams {
    // Time
    pub dt: f32,
    /// Abort bound for scenarios that cannot terminate. Not reached by well-formed input.
    pub max_frames: u32,

    /// Arrival deadline for the primary agent. Soft: shapes velocity, never enforced as a cutoff.
    pub deadline: f32,

    // Look-ahead avoidance
    pub threshold: f32,
    pub lookahead_steps: u32,
    pub pause_duration: f32,
}
