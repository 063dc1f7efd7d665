use anyhow::{Context, Result};
use log::info;
use dronesim_common::{PauseEvent, SimParams, SimulationConfig, SimulationRecord, Vec3};
use crate::agent::Agent;
use crate::avoidance::CollisionPredictor;

/// Manages the state and execution of the multi-agent waypoint simulation.
///
/// The agent at index 0 is the primary: its velocity is rewritten every frame
/// to meet its deadline and it is frozen while the predictor reports a pause.
/// The others keep their configured velocity and never pause.
pub struct Simulation {
    /// Flat runtime parameters derived from the configuration.
    params: SimParams,
    /// All agents, primary first.
    agents: Vec<Agent>,
    /// Look-ahead predictor owning the pause-timer state.
    predictor: CollisionPredictor,
    /// Time series and event logs, grown by one entry per agent per frame.
    record: SimulationRecord,
    /// The current frame number.
    frame: u32,
}

impl Simulation {
    /// Creates a new `Simulation` instance, building agents from the scenario.
    pub fn new(config: &SimulationConfig) -> Result<Self> {
        config.validate()?;
        let params = config.get_sim_params();

        let mut agents = Vec::with_capacity(1 + config.others.len());
        // The primary's initial velocity is provisional; the speed controller
        // rewrites it on the first frame.
        agents.push(Agent::new(
            config.primary.id,
            config.primary.waypoints.iter().map(|&wp| Vec3::from(wp)).collect(),
            1.0,
        )?);
        for other in &config.others {
            agents.push(Agent::new(
                other.id,
                other.waypoints.iter().map(|&wp| Vec3::from(wp)).collect(),
                other.velocity,
            )?);
        }

        let predictor = CollisionPredictor::from_params(&params)?;
        let ids: Vec<_> = agents.iter().map(|a| a.id()).collect();
        let record = SimulationRecord::new(params.dt, &ids);

        Ok(Self { params, agents, predictor, record, frame: 0 })
    }

    /// Simulated time at the start of the current frame.
    pub fn sim_time(&self) -> f32 {
        self.frame as f32 * self.params.dt
    }

    pub fn frame(&self) -> u32 {
        self.frame
    }

    /// True once every agent has attained its final waypoint.
    pub fn is_complete(&self) -> bool {
        self.agents.iter().all(|a| a.reached())
    }

    /// Whether a pause episode is currently holding the primary in place.
    pub fn is_paused(&self) -> bool {
        self.predictor.is_pausing()
    }

    pub fn params(&self) -> &SimParams {
        &self.params
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn record(&self) -> &SimulationRecord {
        &self.record
    }

    /// Consumes the simulation, handing the recorded dataset to the caller.
    pub fn into_record(self) -> SimulationRecord {
        self.record
    }

    /// Advances the whole simulation by one frame.
    pub fn step(&mut self) -> Result<()> {
        let dt = self.params.dt;
        let sim_time = self.sim_time();

        // --- 1. Dynamic speed control (primary only) ---
        // Once the deadline has passed the previous velocity is kept; deriving
        // a new one would divide by a non-positive duration.
        let time_left = self.params.deadline - sim_time;
        if time_left > 0.0 {
            let dist_left = self.agents[0].remaining_path_distance();
            self.agents[0].set_velocity(dist_left / time_left);
        }

        // --- 2. Collision check for the primary ---
        let (primary, others) = self
            .agents
            .split_first_mut()
            .context("Simulation requires at least the primary agent")?;
        let (pausing, encounter) = self.predictor.should_pause(primary, others, dt);

        // --- 3. Log a fresh trigger ---
        if let Some(encounter) = encounter {
            info!(
                "[t={:.2}s] Pausing agent {} due to predicted encounter with agent {}",
                sim_time,
                primary.id(),
                encounter.other_id
            );
            self.record.pauses.push(PauseEvent {
                time: sim_time,
                other_id: encounter.other_id,
                frame: self.frame,
            });
            self.record
                .collisions
                .entry(self.frame)
                .or_default()
                .push(encounter.point);
        }

        // --- 4. Advance agents and extend the time series ---
        // The paused primary is not advanced and its realized velocity for the
        // frame is 0; its (unchanged) position is still appended.
        for (idx, agent) in self.agents.iter_mut().enumerate() {
            let realized_velocity = if idx == 0 && pausing {
                0.0
            } else {
                agent.advance(dt);
                agent.velocity()
            };
            let track = &mut self.record.tracks[idx];
            track.positions.push(agent.position());
            track.velocities.push(realized_velocity);
        }

        self.frame += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use dronesim_common::{
        AvoidanceConfig, OtherAgentConfig, OutputConfig, PrimaryConfig, TimingConfig,
    };

    fn scenario(
        primary_waypoints: Vec<[f32; 3]>,
        deadline: f32,
        others: Vec<OtherAgentConfig>,
    ) -> SimulationConfig {
        SimulationConfig {
            primary: PrimaryConfig { id: 1, waypoints: primary_waypoints, deadline },
            others,
            timing: TimingConfig::default(),
            avoidance: AvoidanceConfig::default(),
            output: OutputConfig {
                base_filename: "test".to_string(),
                save_record: false,
                save_pauses: false,
                save_positions: false,
                format: None,
            },
        }
    }

    fn run_to_completion(sim: &mut Simulation) {
        while !sim.is_complete() {
            sim.step().unwrap();
            assert!(sim.frame() < 100_000, "simulation failed to terminate");
        }
    }

    #[test]
    fn unobstructed_primary_meets_its_deadline() {
        // Two waypoints 10 units apart, deadline 10, dt 0.1, no others:
        // 100 frames at a steady speed of ~1.0.
        let config = scenario(vec![[0.0, 0.0, 0.0], [10.0, 0.0, 0.0]], 10.0, Vec::new());
        let mut sim = Simulation::new(&config).unwrap();

        let mut previous_remaining = sim.agents()[0].remaining_path_distance();
        while !sim.is_complete() {
            sim.step().unwrap();
            assert!(sim.frame() < 1_000, "simulation failed to terminate");
            let remaining = sim.agents()[0].remaining_path_distance();
            assert!(remaining < previous_remaining, "remaining distance must shrink every frame");
            previous_remaining = remaining;
        }

        assert_eq!(sim.frame(), 100);
        let record = sim.into_record();
        assert_eq!(record.frame_count(), 100);
        assert!(record.pauses.is_empty());
        assert!(record.collisions.is_empty());

        let track = record.track(1).unwrap();
        assert_eq!(track.positions.len(), track.velocities.len());
        for &v in &track.velocities {
            assert_relative_eq!(v, 1.0, epsilon = 1e-3);
        }
        // Snap-to-waypoint leaves the final position exact.
        assert_eq!(*track.positions.last().unwrap(), Vec3::new(10.0, 0.0, 0.0));
    }

    #[test]
    fn head_on_other_pauses_the_primary() {
        // The other agent approaches head-on from 2 units away; at frame 0 the
        // extrapolated separation first drops below 1.5 at lookahead step 3
        // (2.0 - 0.2 * 3 = 1.4), so the pause triggers immediately.
        let other = OtherAgentConfig {
            id: 2,
            waypoints: vec![[2.0, 0.0, 0.0], [-10.0, 0.0, 0.0]],
            velocity: 1.0,
        };
        let config = scenario(vec![[0.0, 0.0, 0.0], [10.0, 0.0, 0.0]], 10.0, vec![other]);
        let mut sim = Simulation::new(&config).unwrap();
        run_to_completion(&mut sim);

        let record = sim.into_record();

        // The other agent stays inside the threshold while it passes the
        // frozen primary, so the first episode is followed by exactly one
        // re-trigger before it clears out of range.
        assert_eq!(record.pauses.len(), 2);
        let first = record.pauses[0];
        assert_eq!(first.frame, 0);
        assert_eq!(first.other_id, 2);
        assert_eq!(first.time, 0.0);
        assert!(record.pauses[1].frame >= 21 && record.pauses[1].frame <= 23);

        // One collision point per trigger, keyed by the trigger frame.
        assert_eq!(record.collisions.len(), 2);
        let points = record.collisions.get(&0).unwrap();
        assert_eq!(points.len(), 1);
        assert_relative_eq!(points[0].x, 0.3, epsilon = 1e-5);

        // The primary is frozen for the pause duration (2.0s = 20 frames)...
        let primary_track = record.track(1).unwrap();
        for frame in 0..20 {
            assert_eq!(primary_track.velocities[frame], 0.0);
            assert_eq!(primary_track.positions[frame], Vec3::new(0.0, 0.0, 0.0));
        }
        // ...while the other keeps moving normally.
        let other_track = record.track(2).unwrap();
        for frame in 1..20 {
            assert!(other_track.positions[frame].x < other_track.positions[frame - 1].x);
            assert_relative_eq!(other_track.velocities[frame], 1.0, epsilon = 1e-6);
        }

        // Both complete their paths; snap leaves the endpoints exact.
        assert_eq!(*primary_track.positions.last().unwrap(), Vec3::new(10.0, 0.0, 0.0));
        assert_eq!(*other_track.positions.last().unwrap(), Vec3::new(-10.0, 0.0, 0.0));
        assert_eq!(primary_track.positions.len(), other_track.positions.len());
        assert_eq!(record.frame_count(), sim_frames(&record));
    }

    fn sim_frames(record: &SimulationRecord) -> usize {
        record.tracks.iter().map(|t| t.positions.len()).max().unwrap_or(0)
    }

    #[test]
    fn elapsed_deadline_freezes_velocity_rederivation() {
        // Deadline shorter than a single frame: the speed controller runs once
        // and the stale velocity carries the primary through the rest.
        let config = scenario(
            vec![[0.0, 0.0, 0.0], [10.0, 0.0, 0.0], [20.0, 0.0, 0.0]],
            0.05,
            Vec::new(),
        );
        let mut sim = Simulation::new(&config).unwrap();
        run_to_completion(&mut sim);

        // Frame 0 derives v = 20 / 0.05 = 400 and snaps onto the first target;
        // frame 1 skips re-derivation and snaps onto the last.
        assert_eq!(sim.frame(), 2);
        let record = sim.into_record();
        let track = record.track(1).unwrap();
        assert_relative_eq!(track.velocities[0], 400.0, epsilon = 1e-3);
        assert_relative_eq!(track.velocities[1], 400.0, epsilon = 1e-3);
        assert_eq!(*track.positions.last().unwrap(), Vec3::new(20.0, 0.0, 0.0));
    }

    #[test]
    fn parked_primary_still_triggers_pause_logging() {
        // A single-waypoint primary is reached from construction, but the
        // predictor keeps checking while the others finish their paths.
        let other = OtherAgentConfig {
            id: 2,
            waypoints: vec![[5.0, 0.0, 0.0], [-5.0, 0.0, 0.0]],
            velocity: 1.0,
        };
        let config = scenario(vec![[0.0, 0.0, 0.0]], 10.0, vec![other]);
        let mut sim = Simulation::new(&config).unwrap();
        run_to_completion(&mut sim);

        let record = sim.into_record();
        // The other passes straight over the parked primary.
        assert!(!record.pauses.is_empty());
        let track = record.track(1).unwrap();
        for position in &track.positions {
            assert_eq!(*position, Vec3::new(0.0, 0.0, 0.0));
        }
        // 10 units at 0.1 per frame; accumulated rounding may add one frame.
        assert!((100..=101).contains(&record.frame_count()));
    }
}
