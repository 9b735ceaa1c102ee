use super::AngleRepresentation;
use crate::aviary::Aviary;
use crate::physics::PhysicsEngine;
use nalgebra::{UnitQuaternion, Vector4};
use std::collections::BTreeMap;

/// A value stored in an agent's info map.
#[derive(Clone, Debug, PartialEq)]
pub enum InfoValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl From<bool> for InfoValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for InfoValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for InfoValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<String> for InfoValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for InfoValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

pub type Info = BTreeMap<String, InfoValue>;

/// What happened to one agent over one physics-level substep.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Outcome {
    pub terminated: bool,
    pub truncated: bool,
    pub reward: f64,
    pub info: Info,
}

impl Outcome {
    pub fn terminated(reward: f64) -> Self {
        Self {
            terminated: true,
            reward,
            ..Default::default()
        }
    }

    pub fn with_info(mut self, key: impl Into<String>, value: impl Into<InfoValue>) -> Self {
        self.info.insert(key.into(), value.into());
        self
    }
}

/// Read-only view of the environment handed to task hooks.
pub struct StepContext<'a, E> {
    pub aviary: &'a Aviary<E>,
    pub step_count: u64,
    pub max_steps: u64,
    pub flight_dome_size: f64,
    pub angle_representation: AngleRepresentation,
    pub current_actions: &'a [Vector4<f64>],
    pub past_actions: &'a [Vector4<f64>],
}

impl<'a, E: PhysicsEngine> StepContext<'a, E> {
    /// The agent's state flattened as angular velocity, attitude, linear
    /// velocity and linear position, with the attitude as Euler angles or
    /// an `(x, y, z, w)` quaternion.
    pub fn attitude(&self, agent_id: usize) -> Vec<f64> {
        let Some(drone) = self.aviary.drones().get(agent_id) else {
            return Vec::new();
        };
        let state = drone.state();
        let ang_pos = state.ang_pos();

        let mut attitude = Vec::with_capacity(self.angle_representation.attitude_size());
        attitude.extend(state.ang_vel().iter());
        match self.angle_representation {
            AngleRepresentation::Euler => attitude.extend(ang_pos.iter()),
            AngleRepresentation::Quaternion => {
                let quaternion = UnitQuaternion::from_euler_angles(ang_pos.x, ang_pos.y, ang_pos.z);
                attitude.extend(quaternion.coords.iter());
            }
        }
        attitude.extend(state.lin_vel().iter());
        attitude.extend(state.lin_pos().iter());
        attitude
    }

    /// Motor speeds normalized by the speed at full pulse-width.
    pub fn auxiliary(&self, agent_id: usize) -> Vector4<f64> {
        self.aviary
            .drones()
            .get(agent_id)
            .map_or_else(Vector4::zeros, |drone| {
                drone.motor_speed() / drone.params().max_speed()
            })
    }

    /// Whether the agent has left the flight dome centred on the origin.
    pub fn out_of_bounds(&self, agent_id: usize) -> bool {
        self.aviary
            .drones()
            .get(agent_id)
            .is_some_and(|drone| drone.state().lin_pos().norm() > self.flight_dome_size)
    }

    pub fn timed_out(&self) -> bool {
        self.step_count >= self.max_steps
    }
}

/// Observation and reward hooks a concrete task supplies to
/// [`MultiAgentEnv`](super::MultiAgentEnv).
pub trait AgentTask<E> {
    type Observation;

    /// Called once at the end of every reset, before the first observations
    /// are taken.
    fn reset(&mut self, _ctx: &StepContext<'_, E>) {}

    fn observation(&mut self, ctx: &StepContext<'_, E>, agent_id: usize) -> Self::Observation;

    fn outcome(&mut self, ctx: &StepContext<'_, E>, agent_id: usize) -> Outcome;
}
