use serde::{Deserialize, Serialize};
use anyhow::Result;
use crate::record::AgentId;
use crate::sim_params::SimParams; // Use crate::sim_params
use std::path::Path;

// Configuration for the primary agent (deadline-controlled)
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct PrimaryConfig {
    pub id: AgentId,
    /// Ordered waypoints; the agent starts on the first one.
    pub waypoints: Vec<[f32; 3]>,
    /// Arrival deadline in simulated seconds.
    pub deadline: f32,
}

// Configuration for a fixed-velocity agent
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct OtherAgentConfig {
    pub id: AgentId,
    pub waypoints: Vec<[f32; 3]>,
    pub velocity: f32,
}

// Configuration for timing
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct TimingConfig {
    #[serde(default = "default_dt")]
    pub dt: f32,
    #[serde(default = "default_max_frames")]
    pub max_frames: u32,
}

// Look-ahead collision avoidance parameters
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct AvoidanceConfig {
    /// Minimum allowed predicted separation distance.
    #[serde(default = "default_threshold")]
    pub threshold: f32,
    /// Number of discrete future steps checked per frame.
    #[serde(default = "default_lookahead_steps")]
    pub lookahead_steps: u32,
    /// Duration of a pause once triggered.
    #[serde(default = "default_pause_duration")]
    pub pause_duration: f32,
}

// Configuration for output settings, loaded from config.toml
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct OutputConfig {
    pub base_filename: String,
    #[serde(default = "default_true")]
    pub save_record: bool,
    #[serde(default = "default_true")]
    pub save_pauses: bool,
    #[serde(default)]
    pub save_positions: bool,
    pub format: Option<String>, // Output format: "json", "bincode", "messagepack"
}

fn default_dt() -> f32 {
    0.1
}

fn default_max_frames() -> u32 {
    1_000_000
}

fn default_threshold() -> f32 {
    1.5
}

fn default_lookahead_steps() -> u32 {
    5
}

fn default_pause_duration() -> f32 {
    2.0
}

fn default_true() -> bool {
    true
}

impl Default for TimingConfig {
    fn default() -> Self {
        TimingConfig { dt: default_dt(), max_frames: default_max_frames() }
    }
}

impl Default for AvoidanceConfig {
    fn default() -> Self {
        AvoidanceConfig {
            threshold: default_threshold(),
            lookahead_steps: default_lookahead_steps(),
            pause_duration: default_pause_duration(),
        }
    }
}

// Main simulation configuration structure, loaded from config.toml.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct SimulationConfig {
    pub primary: PrimaryConfig,
    #[serde(default)]
    pub others: Vec<OtherAgentConfig>,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub avoidance: AvoidanceConfig,
    pub output: OutputConfig,
}

impl SimulationConfig {
    /// Loads the simulation configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();

        let config_str = std::fs::read_to_string(path_ref)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path_ref.display(), e))?;
        let config: SimulationConfig = toml::from_str(&config_str)
            .map_err(|e| anyhow::anyhow!("Failed to parse TOML from '{}': {}", path_ref.display(), e))?;

        config.validate()?;
        Ok(config)
    }

    /// Rejects malformed scenarios up front rather than tolerating them mid-simulation.
    pub fn validate(&self) -> Result<()> {
        if self.timing.dt <= 0.0 {
            anyhow::bail!("timing.dt must be positive.");
        }
        if self.timing.max_frames == 0 {
            anyhow::bail!("timing.max_frames must be greater than 0.");
        }
        if self.primary.waypoints.is_empty() {
            anyhow::bail!("primary.waypoints must contain at least one waypoint.");
        }
        if self.primary.deadline <= 0.0 {
            anyhow::bail!("primary.deadline must be positive.");
        }
        for other in &self.others {
            if other.waypoints.is_empty() {
                anyhow::bail!("others: agent {} has an empty waypoint list.", other.id);
            }
            if other.velocity < 0.0 {
                anyhow::bail!("others: agent {} has a negative velocity.", other.id);
            }
        }
        let mut seen = std::collections::HashSet::new();
        for id in std::iter::once(self.primary.id).chain(self.others.iter().map(|o| o.id)) {
            if !seen.insert(id) {
                anyhow::bail!("Agent id {} is not unique.", id);
            }
        }
        if self.avoidance.threshold <= 0.0 {
            anyhow::bail!("avoidance.threshold must be positive.");
        }
        if self.avoidance.lookahead_steps == 0 {
            anyhow::bail!("avoidance.lookahead_steps must be greater than 0.");
        }
        if self.avoidance.pause_duration <= 0.0 {
            anyhow::bail!("avoidance.pause_duration must be positive.");
        }
        Ok(())
    }

    /// Converts the configuration into simulation parameters used at runtime.
    pub fn get_sim_params(&self) -> SimParams {
        SimParams {
            dt: self.timing.dt,
            max_frames: self.timing.max_frames,
            deadline: self.primary.deadline,
            threshold: self.avoidance.threshold,
            lookahead_steps: self.avoidance.lookahead_steps,
            pause_duration: self.avoidance.pause_duration,
        }
    }
}
