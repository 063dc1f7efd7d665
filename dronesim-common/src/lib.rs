pub mod config;
pub mod record;
pub mod sim_params;
pub mod vecmath;

// Re-export key types for easier use by dependent crates
pub use config::{SimulationConfig, PrimaryConfig, OtherAgentConfig, TimingConfig, AvoidanceConfig, OutputConfig};
pub use record::{AgentId, AgentTrack, PauseEvent, SimulationRecord};
pub use sim_params::SimParams;
pub use vecmath::Vec3;
