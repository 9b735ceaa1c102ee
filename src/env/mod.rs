//! Parallel multi-agent stepping over an [`Aviary`].
//!
//! Every vehicle is an agent named `uav_<index>`. An episode starts with a
//! two-phase reset, after which each [`step`](MultiAgentEnv::step) holds the
//! submitted setpoints for a fixed number of control periods while a
//! concrete [`AgentTask`] scores every live agent.

use crate::aviary::{Aviary, AviaryConfig};
use crate::copter::{DroneOptions, FlightMode};
use crate::physics::PhysicsEngine;
use crate::scheduler::step_ratio;
use crate::{Error, Result};
use embedded_time::rate::Hertz;
use nalgebra::{Vector3, Vector4};
use std::collections::BTreeMap;
use std::str::FromStr;

mod geometry;
pub use geometry::compute_rotation_forward;

mod task;
pub use task::{AgentTask, Info, InfoValue, Outcome, StepContext};

/// Control rate every agent rate must divide.
pub const CONTROL_HZ: Hertz = Hertz(120);

/// Control periods run after a reset to let contacts settle.
pub const WARMUP_STEPS: usize = 10;

pub const ACTION_SIZE: usize = 4;

/// Normalized motor speeds.
pub const AUXILIARY_SIZE: usize = 4;

/// How attitude is encoded in observations.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AngleRepresentation {
    #[default]
    Euler,
    Quaternion,
}

impl AngleRepresentation {
    /// Length of the flattened attitude state.
    pub fn attitude_size(self) -> usize {
        match self {
            AngleRepresentation::Euler => 12,
            AngleRepresentation::Quaternion => 13,
        }
    }
}

impl FromStr for AngleRepresentation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "euler" => Ok(AngleRepresentation::Euler),
            "quaternion" => Ok(AngleRepresentation::Quaternion),
            other => Err(Error::InvalidAngleRepresentation(other.to_owned())),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct EnvConfig {
    pub start_pos: Vec<Vector3<f64>>,
    pub start_orn: Vec<Vector3<f64>>,
    /// Radius of the allowed flight volume in m
    pub flight_dome_size: f64,
    pub max_duration_seconds: f64,
    pub angle_representation: AngleRepresentation,
    /// Decision rate, must divide [`CONTROL_HZ`]
    pub agent_hz: Hertz,
    pub physics_hz: Hertz,
    /// Flight mode every vehicle enters at the end of a reset
    pub baseline_mode: FlightMode,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            start_pos: vec![Vector3::new(0., 0., 1.)],
            start_orn: vec![Vector3::zeros()],
            flight_dome_size: 150.,
            max_duration_seconds: 60.,
            angle_representation: AngleRepresentation::Euler,
            agent_hz: Hertz(30),
            physics_hz: Hertz(240),
            baseline_mode: FlightMode::RateThrust,
        }
    }
}

/// Per-episode options passed to [`MultiAgentEnv::reset`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResetOptions {
    /// Empty for defaults, one entry shared by every agent, or one per agent
    pub drone_options: Vec<DroneOptions>,
}

/// Per-agent results of one [`MultiAgentEnv::step`].
#[derive(Clone, Debug, PartialEq)]
pub struct StepResult<O> {
    pub observations: BTreeMap<String, O>,
    pub rewards: BTreeMap<String, f64>,
    pub terminations: BTreeMap<String, bool>,
    pub truncations: BTreeMap<String, bool>,
    pub infos: BTreeMap<String, Info>,
}

pub struct MultiAgentEnv<E, T> {
    config: EnvConfig,
    task: T,
    env_step_ratio: u32,
    max_steps: u64,

    possible_agents: Vec<String>,
    agent_name_mapping: BTreeMap<String, usize>,
    agents: Vec<String>,

    current_actions: Vec<Vector4<f64>>,
    past_actions: Vec<Vector4<f64>>,

    aviary: Option<Aviary<E>>,
    /// Set once both halves of a reset have run
    ready: bool,
    step_count: u64,
}

impl<E: PhysicsEngine, T: AgentTask<E>> MultiAgentEnv<E, T> {
    pub fn new(config: EnvConfig, task: T) -> Result<Self> {
        if config.start_pos.is_empty() {
            return Err(Error::NoVehicles);
        }
        if config.start_pos.len() != config.start_orn.len() {
            return Err(Error::StartShapeMismatch {
                positions: config.start_pos.len(),
                orientations: config.start_orn.len(),
            });
        }
        if config.flight_dome_size.is_nan() || config.flight_dome_size <= 0. {
            return Err(Error::invalid("flight_dome_size", "must be positive"));
        }
        if config.max_duration_seconds.is_nan() || config.max_duration_seconds <= 0. {
            return Err(Error::invalid("max_duration_seconds", "must be positive"));
        }

        let env_step_ratio = step_ratio(CONTROL_HZ, config.agent_hz)?;
        let max_steps = (config.agent_hz.0 as f64 * config.max_duration_seconds) as u64;

        let possible_agents: Vec<String> = (0..config.start_pos.len())
            .map(|idx| format!("uav_{idx}"))
            .collect();
        let agent_name_mapping = possible_agents
            .iter()
            .enumerate()
            .map(|(idx, name)| (name.clone(), idx))
            .collect();
        let num_agents = possible_agents.len();

        Ok(Self {
            config,
            task,
            env_step_ratio,
            max_steps,
            possible_agents,
            agent_name_mapping,
            agents: Vec::new(),
            current_actions: vec![Vector4::zeros(); num_agents],
            past_actions: vec![Vector4::zeros(); num_agents],
            aviary: None,
            ready: false,
            step_count: 0,
        })
    }

    /// Tear down any running simulation and build fresh vehicles.
    pub fn begin_reset(&mut self, seed: Option<u64>, options: ResetOptions) -> Result<()> {
        self.close();
        self.step_count = 0;
        self.agents = self.possible_agents.clone();
        self.current_actions.fill(Vector4::zeros());
        self.past_actions.fill(Vector4::zeros());

        log::info!(
            "resetting {} agents, seed {:?}",
            self.possible_agents.len(),
            seed
        );

        self.aviary = Some(Aviary::new(AviaryConfig {
            start_pos: self.config.start_pos.clone(),
            start_orn: self.config.start_orn.clone(),
            physics_hz: self.config.physics_hz,
            ctrl_hz: CONTROL_HZ,
            drone_options: options.drone_options,
            seed,
        })?);

        Ok(())
    }

    /// Register collision bodies, enter the baseline flight mode and let the
    /// vehicles settle.
    pub fn end_reset(&mut self) -> Result<()> {
        let aviary = self.aviary.as_mut().ok_or(Error::ResetIncomplete)?;

        aviary.register_all_new_bodies();
        aviary.set_mode(self.config.baseline_mode);
        for _ in 0..WARMUP_STEPS {
            aviary.step();
        }

        let ctx = StepContext {
            aviary: &*aviary,
            step_count: self.step_count,
            max_steps: self.max_steps,
            flight_dome_size: self.config.flight_dome_size,
            angle_representation: self.config.angle_representation,
            current_actions: &self.current_actions,
            past_actions: &self.past_actions,
        };
        self.task.reset(&ctx);
        self.ready = true;

        log::info!("reset complete after {} warm-up steps", WARMUP_STEPS);
        Ok(())
    }

    /// Start a new episode and return every agent's first observation and
    /// an empty info map per agent.
    #[allow(clippy::type_complexity)]
    pub fn reset(
        &mut self,
        seed: Option<u64>,
        options: ResetOptions,
    ) -> Result<(BTreeMap<String, T::Observation>, BTreeMap<String, Info>)> {
        self.begin_reset(seed, options)?;
        self.end_reset()?;

        let aviary = self.aviary.as_ref().ok_or(Error::ResetIncomplete)?;
        let ctx = StepContext {
            aviary,
            step_count: self.step_count,
            max_steps: self.max_steps,
            flight_dome_size: self.config.flight_dome_size,
            angle_representation: self.config.angle_representation,
            current_actions: &self.current_actions,
            past_actions: &self.past_actions,
        };

        let mut observations = BTreeMap::new();
        let mut infos = BTreeMap::new();
        for agent in &self.agents {
            let id = self.agent_name_mapping[agent];
            observations.insert(agent.clone(), self.task.observation(&ctx, id));
            infos.insert(agent.clone(), Info::new());
        }

        Ok((observations, infos))
    }

    /// Apply one action per listed agent and advance one decision step.
    ///
    /// Agents missing from `actions` keep their previous action. The whole
    /// input is validated before any state changes. Results cover every
    /// agent live at the start of the call, including those culled by it.
    pub fn step<I, K, A>(&mut self, actions: I) -> Result<StepResult<T::Observation>>
    where
        I: IntoIterator<Item = (K, A)>,
        K: AsRef<str>,
        A: AsRef<[f64]>,
    {
        let aviary = match (self.aviary.as_mut(), self.ready) {
            (Some(aviary), true) => aviary,
            _ => return Err(Error::ResetIncomplete),
        };

        let mut staged = Vec::new();
        for (name, action) in actions {
            let name = name.as_ref();
            let idx = *self
                .agent_name_mapping
                .get(name)
                .ok_or_else(|| Error::UnknownAgent(name.to_owned()))?;
            let action = action.as_ref();
            if action.len() != ACTION_SIZE {
                return Err(Error::ActionSize {
                    agent: name.to_owned(),
                    expected: ACTION_SIZE,
                    actual: action.len(),
                });
            }
            staged.push((idx, Vector4::from_column_slice(action)));
        }

        self.past_actions.clone_from(&self.current_actions);
        for (idx, action) in staged {
            self.current_actions[idx] = action;
        }
        aviary.set_all_setpoints(&self.current_actions);

        let mut result = StepResult {
            observations: BTreeMap::new(),
            rewards: self.agents.iter().map(|a| (a.clone(), 0.)).collect(),
            terminations: self.agents.iter().map(|a| (a.clone(), false)).collect(),
            truncations: self.agents.iter().map(|a| (a.clone(), false)).collect(),
            infos: self.agents.iter().map(|a| (a.clone(), Info::new())).collect(),
        };

        for _ in 0..self.env_step_ratio {
            aviary.step();

            let ctx = StepContext {
                aviary: &*aviary,
                step_count: self.step_count,
                max_steps: self.max_steps,
                flight_dome_size: self.config.flight_dome_size,
                angle_representation: self.config.angle_representation,
                current_actions: &self.current_actions,
                past_actions: &self.past_actions,
            };

            for agent in &self.agents {
                let id = self.agent_name_mapping[agent];
                let outcome = self.task.outcome(&ctx, id);

                if let Some(terminated) = result.terminations.get_mut(agent) {
                    *terminated |= outcome.terminated;
                }
                if let Some(truncated) = result.truncations.get_mut(agent) {
                    *truncated |= outcome.truncated;
                }
                if let Some(reward) = result.rewards.get_mut(agent) {
                    *reward += outcome.reward;
                }
                result
                    .infos
                    .entry(agent.clone())
                    .or_default()
                    .extend(outcome.info);

                result
                    .observations
                    .insert(agent.clone(), self.task.observation(&ctx, id));
            }
        }

        self.step_count += 1;

        let (live, culled): (Vec<String>, Vec<String>) =
            self.agents.drain(..).partition(|agent| {
                !(result.terminations.get(agent).copied().unwrap_or(false)
                    || result.truncations.get(agent).copied().unwrap_or(false))
            });
        if !culled.is_empty() {
            log::debug!("step {}: culled {:?}", self.step_count, culled);
        }
        self.agents = live;

        Ok(result)
    }

    /// Drop the running simulation. Stepping fails until the next reset.
    pub fn close(&mut self) {
        self.aviary = None;
        self.ready = false;
    }

    pub fn possible_agents(&self) -> &[String] {
        &self.possible_agents
    }

    /// Agents that have neither terminated nor been truncated.
    pub fn agents(&self) -> &[String] {
        &self.agents
    }

    pub fn agent_index(&self, name: &str) -> Result<usize> {
        self.agent_name_mapping
            .get(name)
            .copied()
            .ok_or_else(|| Error::UnknownAgent(name.to_owned()))
    }

    /// Attitude, auxiliary state and previous action.
    pub fn observation_size(&self) -> usize {
        self.config.angle_representation.attitude_size() + AUXILIARY_SIZE + ACTION_SIZE
    }

    /// Lower and upper bounds of an action.
    pub fn action_bounds(&self) -> (Vector4<f64>, Vector4<f64>) {
        (Vector4::new(-1., -1., -1., 0.), Vector4::repeat(1.))
    }

    pub fn max_steps(&self) -> u64 {
        self.max_steps
    }

    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    /// Control periods per decision step.
    pub fn env_step_ratio(&self) -> u32 {
        self.env_step_ratio
    }

    pub fn config(&self) -> &EnvConfig {
        &self.config
    }

    pub fn aviary(&self) -> Option<&Aviary<E>> {
        self.aviary.as_ref()
    }

    pub fn current_actions(&self) -> &[Vector4<f64>] {
        &self.current_actions
    }

    pub fn past_actions(&self) -> &[Vector4<f64>] {
        &self.past_actions
    }

    pub fn task(&self) -> &T {
        &self.task
    }

    pub fn task_mut(&mut self) -> &mut T {
        &mut self.task
    }
}

#[cfg(test)]
mod tests {
    use super::AngleRepresentation;
    use crate::Error;

    #[test]
    fn parses_angle_representation() {
        assert_eq!(
            "euler".parse::<AngleRepresentation>().unwrap(),
            AngleRepresentation::Euler
        );
        assert_eq!(
            "quaternion".parse::<AngleRepresentation>().unwrap(),
            AngleRepresentation::Quaternion
        );
        assert!(matches!(
            "matrix".parse::<AngleRepresentation>(),
            Err(Error::InvalidAngleRepresentation(s)) if s == "matrix"
        ));
    }

    #[test]
    fn attitude_sizes() {
        assert_eq!(AngleRepresentation::Euler.attitude_size(), 12);
        assert_eq!(AngleRepresentation::Quaternion.attitude_size(), 13);
    }
}
