use super::{FlightMode, HeightTarget, State};
use crate::params::ControlParams;
use crate::pid::PID;
use nalgebra::{Rotation2, Vector2, Vector3, Vector4};

/// The chain of controllers that turns a setpoint into x, y and z rate
/// commands for the mixer.
///
/// Each variant owns exactly the controllers its flight modes run, outer
/// loop last. A fresh cascade is built on every mode change so no state
/// leaks from one mode into the next.
#[derive(Clone, Debug)]
pub enum Cascade {
    /// Modes 0 and 2: `vp, vq, vr` go straight to the rate loop.
    Rate { rate: PID<3> },

    /// Modes 1 and 3: attitude angles drive the rate loop.
    Attitude { rate: PID<3>, attitude: PID<3> },

    /// Modes 4 and 5: local lateral velocity drives roll and pitch while the
    /// yaw rate passes through.
    LocalVelocity {
        rate: PID<3>,
        attitude: PID<2>,
        velocity: PID<2>,
    },

    /// Mode 6: as [`Cascade::LocalVelocity`] with the velocity setpoint
    /// rotated from the world frame into the body frame first.
    WorldVelocity {
        rate: PID<3>,
        attitude: PID<2>,
        velocity: PID<2>,
    },

    /// Mode 7: world position drives local velocity, then the full attitude
    /// including yaw.
    Position {
        rate: PID<3>,
        attitude: PID<3>,
        velocity: PID<2>,
        position: PID<2>,
    },
}

impl Cascade {
    /// Build the cascade for `mode` with freshly reset controllers stepped
    /// every `dt` seconds.
    pub fn new(mode: FlightMode, gains: &ControlParams, dt: f64) -> Self {
        let rate = PID::new(gains.ang_vel, dt);

        match mode {
            FlightMode::RateThrust | FlightMode::RateHeight => Cascade::Rate { rate },
            FlightMode::AttitudeClimbRate | FlightMode::AttitudeHeight => Cascade::Attitude {
                rate,
                attitude: PID::new(gains.ang_pos, dt),
            },
            FlightMode::LocalVelocityHeight | FlightMode::LocalVelocityClimbRate => {
                Cascade::LocalVelocity {
                    rate,
                    attitude: PID::new(gains.ang_pos.head::<2>(), dt),
                    velocity: PID::new(gains.lin_vel, dt),
                }
            }
            FlightMode::WorldVelocityClimbRate => Cascade::WorldVelocity {
                rate,
                attitude: PID::new(gains.ang_pos.head::<2>(), dt),
                velocity: PID::new(gains.lin_vel, dt),
            },
            FlightMode::Position => Cascade::Position {
                rate,
                attitude: PID::new(gains.ang_pos, dt),
                velocity: PID::new(gains.lin_vel, dt),
                position: PID::new(gains.lin_pos, dt),
            },
        }
    }

    /// Number of controllers in the chain.
    pub(crate) fn len(&self) -> usize {
        match self {
            Cascade::Rate { .. } => 1,
            Cascade::Attitude { .. } => 2,
            Cascade::LocalVelocity { .. } | Cascade::WorldVelocity { .. } => 3,
            Cascade::Position { .. } => 4,
        }
    }

    /// Step every controller once and return the rate command.
    pub fn update(&mut self, state: &State, setpoint: &Vector4<f64>) -> Vector3<f64> {
        let ang_vel = state.ang_vel();
        let ang_pos = state.ang_pos();

        match self {
            Cascade::Rate { rate } => rate.step(ang_vel, setpoint.xyz()),
            Cascade::Attitude { rate, attitude } => {
                let target = attitude.step(ang_pos, setpoint.xyz());
                rate.step(ang_vel, target)
            }
            Cascade::LocalVelocity {
                rate,
                attitude,
                velocity,
            } => {
                let target = Vector2::new(setpoint.x, setpoint.y);
                lateral(state, setpoint.z, target, rate, attitude, velocity)
            }
            Cascade::WorldVelocity {
                rate,
                attitude,
                velocity,
            } => {
                let target = to_body(state.yaw(), Vector2::new(setpoint.x, setpoint.y));
                lateral(state, setpoint.z, target, rate, attitude, velocity)
            }
            Cascade::Position {
                rate,
                attitude,
                velocity,
                position,
            } => {
                let lin_pos = state.lin_pos();
                let world_vel = position.step(
                    Vector2::new(lin_pos.x, lin_pos.y),
                    Vector2::new(setpoint.x, setpoint.y),
                );
                let accel = velocity.step(lin_xy(state), to_body(state.yaw(), world_vel));
                let angles = attitude.step(ang_pos, tilt(&accel).push(setpoint.z));
                rate.step(ang_vel, angles)
            }
        }
    }
}

/// The height loop, shared by every flight mode.
///
/// Unlike [`Cascade`] these controllers survive mode changes and are only
/// reset along with the vehicle.
#[derive(Clone, Debug)]
pub struct HeightControl {
    pub position: PID<1>,
    pub velocity: PID<1>,
}

impl HeightControl {
    pub fn new(gains: &ControlParams, dt: f64) -> Self {
        Self {
            position: PID::new(gains.z_pos, dt),
            velocity: PID::new(gains.z_vel, dt),
        }
    }

    pub fn reset(&mut self) {
        self.position.reset();
        self.velocity.reset();
    }

    /// Return the collective thrust command in `0 ~ 1`.
    pub fn update(&mut self, target: HeightTarget, state: &State, setpoint: f64) -> f64 {
        let climb_rate = state.lin_vel().z;

        let thrust = match target {
            HeightTarget::Thrust => setpoint,
            HeightTarget::ClimbRate => self.velocity.step_scalar(climb_rate, setpoint),
            HeightTarget::Height => {
                let climb = self.position.step_scalar(state.height(), setpoint);
                self.velocity.step_scalar(climb_rate, climb)
            }
        };

        thrust.clamp(0., 1.)
    }
}

/// Velocity -> roll/pitch -> rate, with `yaw_rate` passed through.
fn lateral(
    state: &State,
    yaw_rate: f64,
    target: Vector2<f64>,
    rate: &mut PID<3>,
    attitude: &mut PID<2>,
    velocity: &mut PID<2>,
) -> Vector3<f64> {
    let ang_pos = state.ang_pos();

    let accel = velocity.step(lin_xy(state), target);
    let angles = attitude.step(Vector2::new(ang_pos.x, ang_pos.y), tilt(&accel));
    rate.step(state.ang_vel(), angles.push(yaw_rate))
}

/// Map a desired local acceleration to roll and pitch targets.
///
/// Forward acceleration needs positive pitch and leftward (+y) acceleration
/// needs negative roll.
fn tilt(accel: &Vector2<f64>) -> Vector2<f64> {
    Vector2::new(-accel.y, accel.x)
}

fn lin_xy(state: &State) -> Vector2<f64> {
    let lin_vel = state.lin_vel();
    Vector2::new(lin_vel.x, lin_vel.y)
}

/// Rotate a world frame lateral vector into the body frame.
fn to_body(yaw: f64, world: Vector2<f64>) -> Vector2<f64> {
    Rotation2::new(yaw).inverse_transform_vector(&world)
}

#[cfg(test)]
mod tests {
    use super::{to_body, Cascade, HeightControl};
    use crate::copter::{FlightMode, HeightTarget, State};
    use crate::params::VehicleParams;
    use approx::assert_abs_diff_eq;
    use nalgebra::{Vector2, Vector3, Vector4};
    use std::f64::consts::FRAC_PI_2;

    const DT: f64 = 1. / 120.;

    fn gains() -> crate::params::ControlParams {
        VehicleParams::quadx().unwrap().control_params
    }

    fn level(lin_vel: Vector3<f64>, yaw: f64) -> State {
        State::new(
            Vector3::zeros(),
            Vector3::new(0., 0., yaw),
            lin_vel,
            Vector3::new(0., 0., 1.),
        )
    }

    #[test]
    fn cascade_length_per_mode() {
        let lengths = [1, 2, 1, 2, 3, 3, 3, 4];
        for (mode, len) in FlightMode::ALL.iter().zip(lengths) {
            assert_eq!(Cascade::new(*mode, &gains(), DT).len(), len, "{mode:?}");
        }
    }

    #[test]
    fn zero_error_gives_zero_rate_command() {
        let state = level(Vector3::zeros(), 0.);
        for mode in FlightMode::ALL {
            let mut cascade = Cascade::new(mode, &gains(), DT);
            let setpoint = match mode {
                FlightMode::Position => Vector4::new(0., 0., 0., 1.),
                _ => Vector4::zeros(),
            };
            assert_abs_diff_eq!(
                cascade.update(&state, &setpoint),
                Vector3::zeros(),
                epsilon = 1e-12
            );
        }
    }

    #[test]
    fn forward_velocity_pitches_nose_down_for_thrust_forward() {
        let mut cascade = Cascade::new(FlightMode::LocalVelocityClimbRate, &gains(), DT);
        let cmd = cascade.update(&level(Vector3::zeros(), 0.), &Vector4::new(1., 0., 0., 0.));
        // Positive pitch rate tips the thrust vector toward +x
        assert!(cmd.y > 0.);
        assert_abs_diff_eq!(cmd.x, 0., epsilon = 1e-12);
    }

    #[test]
    fn yaw_rate_passes_through_velocity_modes() {
        let mut cascade = Cascade::new(FlightMode::LocalVelocityHeight, &gains(), DT);
        let cmd = cascade.update(&level(Vector3::zeros(), 0.), &Vector4::new(0., 0., 0.5, 1.));
        assert!(cmd.z > 0.);
    }

    #[test]
    fn world_velocity_is_rotated_by_yaw() {
        assert_abs_diff_eq!(
            to_body(FRAC_PI_2, Vector2::new(0., 1.)),
            Vector2::new(1., 0.),
            epsilon = 1e-12
        );

        // Facing +y and asked to move along world +y, so pitch like forward flight
        let mut cascade = Cascade::new(FlightMode::WorldVelocityClimbRate, &gains(), DT);
        let cmd = cascade.update(
            &level(Vector3::zeros(), FRAC_PI_2),
            &Vector4::new(0., 1., 0., 0.),
        );
        assert!(cmd.y > 0.);
        assert_abs_diff_eq!(cmd.x, 0., epsilon = 1e-9);
    }

    #[test]
    fn position_error_is_rotated_by_yaw() {
        let target = |yaw: f64| Vector4::new(0., 1., yaw, 1.);

        // Facing +y, a target along world +y is straight ahead
        let mut cascade = Cascade::new(FlightMode::Position, &gains(), DT);
        let cmd = cascade.update(&level(Vector3::zeros(), FRAC_PI_2), &target(FRAC_PI_2));
        assert!(cmd.y > 0.);
        assert_abs_diff_eq!(cmd.x, 0., epsilon = 1e-9);
        assert_abs_diff_eq!(cmd.z, 0., epsilon = 1e-9);

        // Facing +x, the same target is off to the left and needs roll
        let mut cascade = Cascade::new(FlightMode::Position, &gains(), DT);
        let cmd = cascade.update(&level(Vector3::zeros(), 0.), &target(0.));
        assert!(cmd.x < 0.);
        assert_abs_diff_eq!(cmd.y, 0., epsilon = 1e-9);
    }

    #[test]
    fn thrust_passthrough_is_clipped() {
        let mut height = HeightControl::new(&gains(), DT);
        let state = level(Vector3::zeros(), 0.);
        assert_eq!(height.update(HeightTarget::Thrust, &state, -1.), 0.);
        assert_eq!(height.update(HeightTarget::Thrust, &state, 0.4), 0.4);
        assert_eq!(height.update(HeightTarget::Thrust, &state, 3.), 1.);
    }

    #[test]
    fn climbing_below_target_height_adds_thrust() {
        let mut height = HeightControl::new(&gains(), DT);
        let state = level(Vector3::zeros(), 0.);
        let below = height.update(HeightTarget::Height, &state, 2.);
        height.reset();
        let at = height.update(HeightTarget::Height, &state, 1.);
        assert!(below > at);
        assert_eq!(at, 0.);
    }
}
