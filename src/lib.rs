//! # multirotor-sim
//! Flight-mode control and multi-agent stepping for simulated quadrotors.
//!
//! # Vehicle components
//! [`Drone`] runs one of eight [`FlightMode`]s, each a cascade of [`PID`]
//! controllers ending in a [`MotorMatrix`](motor::MotorMatrix) that mixes
//! rate and thrust commands into motor pulse-widths.
//!
//! [`motor`] contains the first-order motor model and pseudo drag.
//!
//! [`physics`] defines the [`PhysicsEngine`] a vehicle is hosted in, along
//! with the bundled [`RigidBodyWorld`](physics::RigidBodyWorld).
//!
//! # Simulation
//! [`Aviary`] steps a group of vehicles in one engine at fixed physics and
//! control rates (see [`scheduler`]).
//!
//! [`MultiAgentEnv`](env::MultiAgentEnv) wraps an aviary in a parallel
//! multi-agent reset/step loop driven by an [`AgentTask`](env::AgentTask).
//!
//! ```
//! use multirotor_sim::{physics::RigidBodyWorld, Aviary, AviaryConfig, FlightMode};
//! use nalgebra::Vector4;
//!
//! let mut aviary = Aviary::<RigidBodyWorld>::new(AviaryConfig {
//!     seed: Some(0),
//!     ..Default::default()
//! })?;
//!
//! // Hold the current height
//! aviary.set_mode(FlightMode::AttitudeHeight);
//! aviary.set_setpoint(0, Vector4::new(0., 0., 0., 1.))?;
//! aviary.step();
//! # Ok::<(), multirotor_sim::Error>(())
//! ```

pub mod aviary;
pub use aviary::{Aviary, AviaryConfig};

pub mod copter;
pub use copter::{Drone, DroneOptions, FlightMode, State};

pub mod env;

mod error;
pub use error::{Error, Result};

pub mod motor;

pub mod params;
pub use params::VehicleParams;

pub mod physics;
pub use physics::PhysicsEngine;

pub mod pid;
pub use pid::{PidGains, PID};

pub mod scheduler;
