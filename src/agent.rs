use anyhow::Result;
use dronesim_common::{AgentId, Vec3};

/// A single drone following its ordered waypoints at a scalar speed.
///
/// "Primary" and "other" agents share this type; the distinction is purely a
/// role assigned by the simulation loop (the primary's velocity is rewritten
/// each frame, the others keep their configured one).
#[derive(Debug, Clone)]
pub struct Agent {
    id: AgentId,
    waypoints: Vec<Vec3>,
    velocity: f32,
    position: Vec3,
    direction: Vec3,
    target_idx: usize,
    reached: bool,
}

impl Agent {
    /// Creates an agent positioned on its first waypoint.
    ///
    /// An agent with a single waypoint already occupies its destination and is
    /// constructed in the reached state.
    pub fn new(id: AgentId, waypoints: Vec<Vec3>, velocity: f32) -> Result<Self> {
        if waypoints.is_empty() {
            anyhow::bail!("Agent {} must have at least one waypoint.", id);
        }
        if velocity < 0.0 {
            anyhow::bail!("Agent {} must have a non-negative velocity.", id);
        }

        let position = waypoints[0];
        let reached = waypoints.len() == 1;
        let direction = if reached {
            Vec3::zero()
        } else {
            waypoints[1].sub(position).normalize_or_zero()
        };

        Ok(Self {
            id,
            waypoints,
            velocity,
            position,
            direction,
            target_idx: 1,
            reached,
        })
    }

    /// Advances the agent by one timestep of length `dt`.
    ///
    /// When the step would carry the agent past its current target waypoint,
    /// the position snaps exactly onto the waypoint and the remainder of the
    /// step is discarded; no leftover motion spills into the next segment.
    pub fn advance(&mut self, dt: f32) {
        if self.reached {
            return;
        }

        let target = self.waypoints[self.target_idx];
        let dist_to_wp = self.position.distance(target);
        let move_dist = self.velocity * dt;

        if move_dist >= dist_to_wp {
            self.position = target;
            self.target_idx += 1;
            if self.target_idx >= self.waypoints.len() {
                self.reached = true;
                self.direction = Vec3::zero();
            } else {
                // A coincident next waypoint degenerates to a zero direction;
                // the snap rule above moves past it on the following step.
                self.direction = self.waypoints[self.target_idx]
                    .sub(self.position)
                    .normalize_or_zero();
            }
        } else {
            self.position = self.position.add(self.direction.scale(move_dist));
        }
    }

    /// Euclidean distance from the current position through all remaining waypoints.
    pub fn remaining_path_distance(&self) -> f32 {
        if self.reached {
            return 0.0;
        }
        let mut dist = self.position.distance(self.waypoints[self.target_idx]);
        for pair in self.waypoints[self.target_idx..].windows(2) {
            dist += pair[0].distance(pair[1]);
        }
        dist
    }

    pub fn id(&self) -> AgentId {
        self.id
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn direction(&self) -> Vec3 {
        self.direction
    }

    pub fn velocity(&self) -> f32 {
        self.velocity
    }

    pub fn set_velocity(&mut self, velocity: f32) {
        self.velocity = velocity;
    }

    pub fn reached(&self) -> bool {
        self.reached
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn wp(x: f32, y: f32, z: f32) -> Vec3 {
        Vec3::new(x, y, z)
    }

    #[test]
    fn moves_along_segment_at_velocity() {
        let mut agent =
            Agent::new(1, vec![wp(0.0, 0.0, 0.0), wp(10.0, 0.0, 0.0)], 2.0).unwrap();
        agent.advance(0.1);
        assert_relative_eq!(agent.position().x, 0.2, epsilon = 1e-6);
        assert_eq!(agent.position().y, 0.0);
        assert!(!agent.reached());
    }

    #[test]
    fn snaps_exactly_onto_waypoint_without_overshoot() {
        let mut agent =
            Agent::new(1, vec![wp(0.0, 0.0, 0.0), wp(1.0, 0.0, 0.0)], 100.0).unwrap();
        // One step covers far more than the remaining distance.
        agent.advance(0.1);
        assert_eq!(agent.position(), wp(1.0, 0.0, 0.0));
        assert!(agent.reached());
        assert_eq!(agent.direction(), Vec3::zero());
    }

    #[test]
    fn leftover_step_distance_is_not_carried_to_next_segment() {
        let mut agent = Agent::new(
            1,
            vec![wp(0.0, 0.0, 0.0), wp(1.0, 0.0, 0.0), wp(1.0, 5.0, 0.0)],
            100.0,
        )
        .unwrap();
        // Would travel 10 units this step, but must stop on the first target.
        agent.advance(0.1);
        assert_eq!(agent.position(), wp(1.0, 0.0, 0.0));
        assert!(!agent.reached());
        // Direction now points at the second segment.
        assert_relative_eq!(agent.direction().y, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn single_waypoint_agent_is_reached_from_construction() {
        let mut agent = Agent::new(1, vec![wp(3.0, 4.0, 5.0)], 1.0).unwrap();
        assert!(agent.reached());
        assert_eq!(agent.direction(), Vec3::zero());
        agent.advance(0.1);
        assert_eq!(agent.position(), wp(3.0, 4.0, 5.0));
    }

    #[test]
    fn advance_on_reached_agent_is_a_no_op() {
        let mut agent =
            Agent::new(1, vec![wp(0.0, 0.0, 0.0), wp(1.0, 0.0, 0.0)], 10.0).unwrap();
        agent.advance(1.0);
        assert!(agent.reached());
        let frozen = agent.position();
        agent.advance(1.0);
        agent.advance(1.0);
        assert_eq!(agent.position(), frozen);
    }

    #[test]
    fn coincident_waypoints_are_passed_by_the_snap_rule() {
        let mut agent = Agent::new(
            1,
            vec![wp(0.0, 0.0, 0.0), wp(1.0, 0.0, 0.0), wp(1.0, 0.0, 0.0), wp(2.0, 0.0, 0.0)],
            1.0,
        )
        .unwrap();
        agent.advance(1.0); // snap onto first target
        assert_eq!(agent.position(), wp(1.0, 0.0, 0.0));
        // The duplicated waypoint yields a zero direction, then snaps through.
        assert_eq!(agent.direction(), Vec3::zero());
        agent.advance(1.0);
        assert_eq!(agent.position(), wp(1.0, 0.0, 0.0));
        assert!(!agent.reached());
        agent.advance(1.0);
        assert_eq!(agent.position(), wp(2.0, 0.0, 0.0));
        assert!(agent.reached());
    }

    #[test]
    fn remaining_path_distance_sums_all_segments() {
        let mut agent = Agent::new(
            1,
            vec![wp(0.0, 0.0, 0.0), wp(3.0, 0.0, 0.0), wp(3.0, 4.0, 0.0)],
            1.0,
        )
        .unwrap();
        assert_relative_eq!(agent.remaining_path_distance(), 7.0, epsilon = 1e-6);
        agent.advance(1.0);
        assert_relative_eq!(agent.remaining_path_distance(), 6.0, epsilon = 1e-5);
        agent.advance(10.0);
        agent.advance(10.0);
        assert!(agent.reached());
        assert_eq!(agent.remaining_path_distance(), 0.0);
    }

    #[test]
    fn rejects_empty_waypoint_list() {
        assert!(Agent::new(1, Vec::new(), 1.0).is_err());
    }
}
