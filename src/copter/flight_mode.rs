use super::State;
use crate::Error;
use nalgebra::Vector4;

/// Selects what the four setpoint values mean and which controllers run.
///
/// Notation: `vp, vq, vr` angular rates, `p, q, r` angular positions,
/// `u, v` local lateral velocities, `vx, vy` world lateral velocities,
/// `x, y, z` positions, `vz` vertical velocity and `T` thrust.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum FlightMode {
    /// `vp, vq, vr, T`
    #[default]
    RateThrust = 0,
    /// `p, q, r, vz`
    AttitudeClimbRate = 1,
    /// `vp, vq, vr, z`
    RateHeight = 2,
    /// `p, q, r, z`
    AttitudeHeight = 3,
    /// `u, v, vr, z`
    LocalVelocityHeight = 4,
    /// `u, v, vr, vz`
    LocalVelocityClimbRate = 5,
    /// `vx, vy, vr, vz`
    WorldVelocityClimbRate = 6,
    /// `x, y, r, z`
    Position = 7,
}

/// What the fourth setpoint value controls.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HeightTarget {
    /// Normalized thrust passed straight to the motors
    Thrust,
    /// Vertical velocity
    ClimbRate,
    /// Height above the origin
    Height,
}

impl FlightMode {
    pub const ALL: [FlightMode; 8] = [
        FlightMode::RateThrust,
        FlightMode::AttitudeClimbRate,
        FlightMode::RateHeight,
        FlightMode::AttitudeHeight,
        FlightMode::LocalVelocityHeight,
        FlightMode::LocalVelocityClimbRate,
        FlightMode::WorldVelocityClimbRate,
        FlightMode::Position,
    ];

    pub fn index(self) -> u8 {
        self as u8
    }

    pub fn height_target(self) -> HeightTarget {
        match self {
            FlightMode::RateThrust => HeightTarget::Thrust,
            FlightMode::AttitudeClimbRate
            | FlightMode::LocalVelocityClimbRate
            | FlightMode::WorldVelocityClimbRate => HeightTarget::ClimbRate,
            FlightMode::RateHeight
            | FlightMode::AttitudeHeight
            | FlightMode::LocalVelocityHeight
            | FlightMode::Position => HeightTarget::Height,
        }
    }

    /// The setpoint to hold when entering this mode from `state`, chosen so
    /// the switch does not cause a step in the commanded output.
    pub fn default_setpoint(self, state: &State) -> Vector4<f64> {
        match self {
            // Idle: motors to the floor
            FlightMode::RateThrust => Vector4::new(0., 0., 0., -1.),
            FlightMode::Position => {
                let position = state.lin_pos();
                Vector4::new(position.x, position.y, state.yaw(), position.z)
            }
            mode => match mode.height_target() {
                HeightTarget::Height => Vector4::new(0., 0., 0., state.height()),
                _ => Vector4::zeros(),
            },
        }
    }
}

impl TryFrom<i64> for FlightMode {
    type Error = Error;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        usize::try_from(value)
            .ok()
            .and_then(|idx| Self::ALL.get(idx).copied())
            .ok_or(Error::InvalidFlightMode(value))
    }
}

impl From<FlightMode> for u8 {
    fn from(mode: FlightMode) -> Self {
        mode.index()
    }
}

#[cfg(test)]
mod tests {
    use super::{FlightMode, HeightTarget};
    use crate::{copter::State, Error};
    use nalgebra::{Vector3, Vector4};

    fn state() -> State {
        State::new(
            Vector3::new(0.1, 0.2, 0.3),
            Vector3::new(0.05, -0.05, 0.4),
            Vector3::new(1., 2., 3.),
            Vector3::new(2., 3., 5.),
        )
    }

    #[test]
    fn parses_every_index() {
        for (idx, mode) in FlightMode::ALL.iter().enumerate() {
            assert_eq!(FlightMode::try_from(idx as i64).unwrap(), *mode);
            assert_eq!(u8::from(*mode) as usize, idx);
        }
    }

    #[test]
    fn rejects_unknown_modes() {
        assert!(matches!(
            FlightMode::try_from(8),
            Err(Error::InvalidFlightMode(8))
        ));
        assert!(matches!(
            FlightMode::try_from(-1),
            Err(Error::InvalidFlightMode(-1))
        ));
    }

    #[test]
    fn default_setpoints() {
        let state = state();
        let expect = [
            Vector4::new(0., 0., 0., -1.),
            Vector4::zeros(),
            Vector4::new(0., 0., 0., 5.),
            Vector4::new(0., 0., 0., 5.),
            Vector4::new(0., 0., 0., 5.),
            Vector4::zeros(),
            Vector4::zeros(),
            Vector4::new(2., 3., 0.4, 5.),
        ];
        for (mode, expected) in FlightMode::ALL.iter().zip(expect) {
            assert_eq!(mode.default_setpoint(&state), expected, "{mode:?}");
        }
    }

    #[test]
    fn height_targets() {
        assert_eq!(FlightMode::RateThrust.height_target(), HeightTarget::Thrust);
        assert_eq!(
            FlightMode::WorldVelocityClimbRate.height_target(),
            HeightTarget::ClimbRate
        );
        assert_eq!(FlightMode::Position.height_target(), HeightTarget::Height);
    }
}
