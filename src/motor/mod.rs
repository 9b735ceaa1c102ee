//! Actuation model: command mixing, first-order motor dynamics,
//! speed-to-force mapping with actuator noise, and pseudo drag.
//!
//! The model is an approximation tuned for plausible, controllable
//! dynamics rather than fidelity to real hardware.

use crate::params::{DragParams, VehicleParams, MOTOR_TAU};
use nalgebra::{Vector3, Vector4};
use rand::Rng;
use rand_distr::StandardNormal;

mod matrix;
pub use matrix::{MotorMatrix, MAX_PWM, MIN_PWM};

/// Reaction torque direction of each motor about the body z-axis.
pub const SPIN_DIRECTIONS: [f64; 4] = [1., 1., -1., -1.];

/// Per-motor thrust and torque along the body z-axis.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MotorForces {
    /// Thrust in N
    pub thrust: Vector4<f64>,
    /// Torque in N*m, signed by spin direction
    pub torque: Vector4<f64>,
}

/// Four motors modelled as first-order lags from pulse-width to speed.
#[derive(Clone, Debug)]
pub struct Motors {
    pub matrix: MotorMatrix,
    pub thrust_const: f64,
    pub torque_const: f64,
    pub noise_ratio: f64,
    pub max_speed: f64,

    /// Physics timestep in seconds
    pub dt: f64,

    speed: Vector4<f64>,
}

impl Motors {
    pub fn new(params: &VehicleParams, dt: f64) -> Self {
        let motor = &params.motor_params;
        Self {
            matrix: MotorMatrix::quad(),
            thrust_const: motor.thrust_const,
            torque_const: motor.torque_const,
            noise_ratio: motor.motor_noise_ratio,
            max_speed: params.max_speed(),
            dt,
            speed: Vector4::zeros(),
        }
    }

    /// Current motor speeds in rad/s.
    pub fn speed(&self) -> &Vector4<f64> {
        &self.speed
    }

    /// Spin all motors down.
    pub fn reset(&mut self) {
        self.speed = Vector4::zeros();
    }

    /// Advance the motor ODE `speed' = (max_speed * pwm - speed) / tau` by
    /// one physics tick, returning the new speeds.
    ///
    /// The step is capped at the target so a coarse timestep cannot make
    /// the lag overshoot.
    pub fn pwm_to_speed(&mut self, pwm: &Vector4<f64>) -> &Vector4<f64> {
        let alpha = (self.dt / MOTOR_TAU).min(1.);
        self.speed += (pwm * self.max_speed - self.speed) * alpha;
        &self.speed
    }

    /// Map motor speeds to thrust and torque with zero-mean multiplicative
    /// noise drawn independently per motor from `rng`.
    pub fn speed_to_forces(&self, speed: &Vector4<f64>, rng: &mut impl Rng) -> MotorForces {
        let squared = speed.component_mul(speed);
        let mut thrust = squared * self.thrust_const;
        let mut torque = squared.component_mul(&Vector4::from(SPIN_DIRECTIONS)) * self.torque_const;

        if self.noise_ratio > 0. {
            thrust = thrust.map(|t| t + rng.sample::<f64, _>(StandardNormal) * self.noise_ratio * t);
            torque = torque.map(|t| t + rng.sample::<f64, _>(StandardNormal) * self.noise_ratio * t);
        }

        MotorForces { thrust, torque }
    }
}

/// Quadratic pseudo drag, `-c * v^2` element-wise.
///
/// The sign of the velocity is lost, so drag always acts along the negative
/// axes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Drag {
    pub linear: f64,
    pub angular: f64,
}

impl Drag {
    pub fn new(params: &DragParams) -> Self {
        Self {
            linear: params.drag_const_xyz,
            angular: params.drag_const_pqr,
        }
    }

    /// Return the drag force and torque for a linear and angular velocity.
    pub fn compute(
        &self,
        linear: &Vector3<f64>,
        angular: &Vector3<f64>,
    ) -> (Vector3<f64>, Vector3<f64>) {
        (
            -linear.component_mul(linear) * self.linear,
            -angular.component_mul(angular) * self.angular,
        )
    }
}
