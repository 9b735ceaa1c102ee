//! Static per-vehicle parameters loaded once at construction.

use crate::{pid::PidGains, Error, Result};
use nalgebra::Vector3;
use serde::Deserialize;
use std::path::Path;

/// Standard gravity in m/s^2.
pub const GRAVITY: f64 = 9.81;

/// Time constant (in seconds) of the first-order motor model.
pub const MOTOR_TAU: f64 = 0.01;

const QUADX: &str = include_str!("../models/quadx.yaml");

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct MotorParams {
    pub thrust_to_weight: f64,
    pub thrust_const: f64,
    pub torque_const: f64,
    pub motor_noise_ratio: f64,
}

/// Pseudo drag coefficients for the quadratic drag approximation.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct DragParams {
    pub drag_const_xyz: f64,
    pub drag_const_pqr: f64,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct BodyParams {
    /// Mass in kg
    pub mass: f64,

    /// Diagonal of the inertia tensor in kg*m^2
    pub inertia: Vector3<f64>,

    /// Motor attachment points in the body frame (in meters)
    pub motor_positions: [Vector3<f64>; 4],
}

/// Gains for every stage of every flight-mode cascade.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ControlParams {
    pub ang_vel: PidGains<3>,
    pub ang_pos: PidGains<3>,
    pub lin_vel: PidGains<2>,
    pub lin_pos: PidGains<2>,
    pub z_pos: PidGains<1>,
    pub z_vel: PidGains<1>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct VehicleParams {
    pub motor_params: MotorParams,
    pub drag_params: DragParams,
    pub body_params: BodyParams,
    pub control_params: ControlParams,
}

impl VehicleParams {
    /// The bundled 1 kg X-configuration quadrotor.
    pub fn quadx() -> Result<Self> {
        Self::from_yaml_str(QUADX)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let params: Self = serde_yaml::from_str(yaml)?;
        params.validate()?;
        Ok(params)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&yaml)
    }

    /// Check every constant is physically meaningful.
    pub fn validate(&self) -> Result<()> {
        let motor = &self.motor_params;
        positive("motor_params.thrust_to_weight", motor.thrust_to_weight)?;
        positive("motor_params.thrust_const", motor.thrust_const)?;
        positive("motor_params.torque_const", motor.torque_const)?;
        non_negative("motor_params.motor_noise_ratio", motor.motor_noise_ratio)?;

        non_negative("drag_params.drag_const_xyz", self.drag_params.drag_const_xyz)?;
        non_negative("drag_params.drag_const_pqr", self.drag_params.drag_const_pqr)?;

        positive("body_params.mass", self.body_params.mass)?;
        for &i in self.body_params.inertia.iter() {
            positive("body_params.inertia", i)?;
        }

        let ctrl = &self.control_params;
        limits("control_params.ang_vel.lim", ctrl.ang_vel.lim.iter())?;
        limits("control_params.ang_pos.lim", ctrl.ang_pos.lim.iter())?;
        limits("control_params.lin_vel.lim", ctrl.lin_vel.lim.iter())?;
        limits("control_params.lin_pos.lim", ctrl.lin_pos.lim.iter())?;
        limits("control_params.z_pos.lim", ctrl.z_pos.lim.iter())?;
        limits("control_params.z_vel.lim", ctrl.z_vel.lim.iter())
    }

    /// Motor speed at full pulse-width, chosen so that all four motors at
    /// full throttle produce `thrust_to_weight` times the vehicle weight.
    pub fn max_speed(&self) -> f64 {
        let motor = &self.motor_params;
        (motor.thrust_to_weight * GRAVITY * self.body_params.mass / (4. * motor.thrust_const))
            .sqrt()
    }

    /// Steady-state pulse-width at which thrust cancels gravity.
    pub fn hover_pwm(&self) -> f64 {
        1. / self.motor_params.thrust_to_weight.sqrt()
    }
}

fn positive(name: &'static str, value: f64) -> Result<()> {
    if value > 0. && value.is_finite() {
        Ok(())
    } else {
        Err(Error::invalid(name, format!("must be positive, got {value}")))
    }
}

fn non_negative(name: &'static str, value: f64) -> Result<()> {
    if value >= 0. && value.is_finite() {
        Ok(())
    } else {
        Err(Error::invalid(name, format!("must not be negative, got {value}")))
    }
}

fn limits<'a>(name: &'static str, lim: impl Iterator<Item = &'a f64>) -> Result<()> {
    lim.copied().try_for_each(|l| positive(name, l))
}
