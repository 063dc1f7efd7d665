use serde::{Serialize, Deserialize};
use std::collections::BTreeMap;
use crate::vecmath::Vec3;

/// Unique identifier of an agent within a scenario.
pub type AgentId = u32;

/// A single pause trigger: the instant the primary agent was first frozen.
///
/// One entry is recorded per pause episode, not per frame spent paused.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PauseEvent {
    /// Simulated time at which the pause was triggered.
    pub time: f32,
    /// The agent whose predicted future position caused the pause.
    pub other_id: AgentId,
    /// Frame index of the trigger.
    pub frame: u32,
}

/// Per-agent time series with one entry per frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentTrack {
    pub id: AgentId,
    pub positions: Vec<Vec3>,
    /// Realized velocity per frame; 0.0 for frames where the agent was frozen.
    pub velocities: Vec<f32>,
}

/// The complete recorded dataset of one simulation run.
///
/// Append-only while the run is stepping; afterwards it is handed to the
/// visualizer as an immutable, already-complete dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationRecord {
    /// Step size the run was recorded at.
    pub dt: f32,
    /// One track per agent, primary first. Tracks are kept equal-length.
    pub tracks: Vec<AgentTrack>,
    /// Predicted collision points, keyed by the frame of the trigger.
    pub collisions: BTreeMap<u32, Vec<Vec3>>,
    /// Pause triggers in simulation order.
    pub pauses: Vec<PauseEvent>,
}

impl SimulationRecord {
    pub fn new(dt: f32, agent_ids: &[AgentId]) -> Self {
        Self {
            dt,
            tracks: agent_ids
                .iter()
                .map(|&id| AgentTrack { id, positions: Vec::new(), velocities: Vec::new() })
                .collect(),
            collisions: BTreeMap::new(),
            pauses: Vec::new(),
        }
    }

    /// Number of recorded frames.
    pub fn frame_count(&self) -> usize {
        self.tracks.first().map_or(0, |t| t.positions.len())
    }

    pub fn track(&self, id: AgentId) -> Option<&AgentTrack> {
        self.tracks.iter().find(|t| t.id == id)
    }
}
