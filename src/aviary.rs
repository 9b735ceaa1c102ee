//! A physics world hosting one or more vehicles stepped in lockstep.

use crate::copter::{Drone, DroneOptions, FlightMode, State};
use crate::params::GRAVITY;
use crate::physics::{BodyId, PhysicsEngine, WorldSettings};
use crate::scheduler::Schedule;
use crate::{Error, Result};
use embedded_time::rate::Hertz;
use nalgebra::{Vector3, Vector4};
use rand::{rngs::StdRng, SeedableRng};
use std::collections::BTreeMap;

/// Construction parameters for an [`Aviary`].
#[derive(Clone, Debug, PartialEq)]
pub struct AviaryConfig {
    /// Start position of each vehicle
    pub start_pos: Vec<Vector3<f64>>,
    /// Start orientation of each vehicle as roll, pitch and yaw
    pub start_orn: Vec<Vector3<f64>>,
    pub physics_hz: Hertz,
    pub ctrl_hz: Hertz,
    /// Empty for defaults, one entry shared by every vehicle, or one entry
    /// per vehicle
    pub drone_options: Vec<DroneOptions>,
    /// Seed for actuator noise, drawn from entropy when `None`
    pub seed: Option<u64>,
}

impl Default for AviaryConfig {
    fn default() -> Self {
        Self {
            start_pos: vec![Vector3::new(0., 0., 1.)],
            start_orn: vec![Vector3::zeros()],
            physics_hz: Hertz(240),
            ctrl_hz: Hertz(120),
            drone_options: Vec::new(),
            seed: None,
        }
    }
}

/// A [`PhysicsEngine`] and the vehicles living in it.
pub struct Aviary<E> {
    engine: E,
    drones: Vec<Drone>,
    schedule: Schedule,
    rng: StdRng,

    /// Bodies tracked for contact reporting, mapped to their vehicle index
    registered: BTreeMap<BodyId, usize>,

    physics_steps: u64,
    elapsed_time: f64,
}

impl<E: PhysicsEngine> Aviary<E> {
    pub fn new(config: AviaryConfig) -> Result<Self> {
        if config.start_pos.is_empty() {
            return Err(Error::NoVehicles);
        }
        if config.start_pos.len() != config.start_orn.len() {
            return Err(Error::StartShapeMismatch {
                positions: config.start_pos.len(),
                orientations: config.start_orn.len(),
            });
        }

        let count = config.start_pos.len();
        let default_options = [DroneOptions::default()];
        let options: &[DroneOptions] = match config.drone_options.len() {
            0 => &default_options,
            1 => &config.drone_options,
            n if n == count => &config.drone_options,
            n => {
                return Err(Error::DroneOptionsCount {
                    expected: count,
                    actual: n,
                })
            }
        };

        let schedule = Schedule::new(config.physics_hz, config.ctrl_hz)?;
        let mut engine = E::connect(&WorldSettings {
            dt: schedule.physics_dt(),
            gravity: GRAVITY,
        });

        let drones = config
            .start_pos
            .iter()
            .zip(&config.start_orn)
            .enumerate()
            .map(|(idx, (pos, orn))| {
                let options = &options[idx.min(options.len() - 1)];
                Drone::spawn(&mut engine, *pos, *orn, options, &schedule)
            })
            .collect::<Result<Vec<_>>>()?;

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        log::info!(
            "aviary ready with {} vehicles, physics {} Hz, control {} Hz",
            drones.len(),
            schedule.physics_hz.0,
            schedule.ctrl_hz.0
        );

        let mut aviary = Self {
            engine,
            drones,
            schedule,
            rng,
            registered: BTreeMap::new(),
            physics_steps: 0,
            elapsed_time: 0.,
        };
        aviary.register_all_new_bodies();

        Ok(aviary)
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    pub fn drones(&self) -> &[Drone] {
        &self.drones
    }

    pub fn num_drones(&self) -> usize {
        self.drones.len()
    }

    pub fn drone(&self, index: usize) -> Result<&Drone> {
        self.drones.get(index).ok_or(Error::VehicleIndex {
            index,
            count: self.drones.len(),
        })
    }

    fn drone_mut(&mut self, index: usize) -> Result<&mut Drone> {
        let count = self.drones.len();
        self.drones
            .get_mut(index)
            .ok_or(Error::VehicleIndex { index, count })
    }

    pub fn state(&self, index: usize) -> Result<&State> {
        self.drone(index).map(Drone::state)
    }

    /// Put every vehicle into `mode`.
    pub fn set_mode(&mut self, mode: FlightMode) {
        for drone in &mut self.drones {
            drone.set_mode(mode);
        }
    }

    pub fn set_mode_of(&mut self, index: usize, mode: FlightMode) -> Result<()> {
        self.drone_mut(index)?.set_mode(mode);
        Ok(())
    }

    pub fn set_setpoint(&mut self, index: usize, setpoint: Vector4<f64>) -> Result<()> {
        self.drone_mut(index)?.set_setpoint(setpoint);
        Ok(())
    }

    /// Set one setpoint per vehicle, in vehicle order.
    pub fn set_all_setpoints(&mut self, setpoints: &[Vector4<f64>]) {
        for (drone, setpoint) in self.drones.iter_mut().zip(setpoints) {
            drone.set_setpoint(*setpoint);
        }
    }

    /// Reset the world clock and return every vehicle to its start pose.
    pub fn reset(&mut self) {
        for drone in &mut self.drones {
            drone.reset(&mut self.engine);
        }
        self.physics_steps = 0;
        self.elapsed_time = 0.;
    }

    /// Track every vehicle body not yet registered for contact reporting.
    pub fn register_all_new_bodies(&mut self) {
        for (idx, drone) in self.drones.iter().enumerate() {
            if self.registered.insert(drone.body(), idx).is_none() {
                log::trace!("registered body {} for vehicle {}", drone.body().0, idx);
            }
        }
    }

    /// Contact count of each registered vehicle, in vehicle order.
    pub fn contact_array(&self) -> Vec<usize> {
        let mut contacts = vec![0; self.drones.len()];
        for (body, idx) in &self.registered {
            contacts[*idx] = self.engine.contact_count(*body);
        }
        contacts
    }

    /// Advance one control period: apply actuation and step the engine for
    /// every physics tick in the period, then run each vehicle's control
    /// update.
    pub fn step(&mut self) {
        let dt = self.schedule.physics_dt();

        for _ in 0..self.schedule.ticks_per_control() {
            for drone in &mut self.drones {
                drone.update_physics(&mut self.engine, &mut self.rng);
            }
            self.engine.step();
            self.physics_steps += 1;
            self.elapsed_time += dt;
        }

        for drone in &mut self.drones {
            drone.update(&mut self.engine);
        }
    }

    /// Simulated seconds since construction or the last reset.
    pub fn elapsed_time(&self) -> f64 {
        self.elapsed_time
    }

    /// Physics ticks simulated since construction or the last reset.
    pub fn physics_steps(&self) -> u64 {
        self.physics_steps
    }
}
