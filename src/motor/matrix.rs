use nalgebra::{Matrix4, Vector4};

/// Lowest pulse-width a running motor is allowed to receive.
pub const MIN_PWM: f64 = 0.05;

/// Highest pulse-width a motor can receive.
pub const MAX_PWM: f64 = 1.;

/// Fixed mixing matrix that maps a 4-DoF command to per-motor pulse-widths.
///
/// The command is ordered as x-rate, y-rate and z-rate torque commands
/// followed by the collective thrust in `0 ~ 1`.
#[derive(Clone, Debug, PartialEq)]
pub struct MotorMatrix {
    pub mix: Matrix4<f64>,
}

impl MotorMatrix {
    /// Create the mixing matrix for a quad-copter in X configuration.
    ///
    /// Motors 0 and 2 sit on the +y side, motors 1 and 2 on the -x side,
    /// and the diagonal pair 0/1 spins against the pair 2/3.
    pub fn quad() -> Self {
        #[rustfmt::skip]
        let mix = Matrix4::new(
             1., -1.,  1.,  1.,
            -1.,  1.,  1.,  1.,
             1.,  1., -1.,  1.,
            -1., -1., -1.,  1.,
        );
        Self { mix }
    }

    /// Mix a command into pulse-widths in `MIN_PWM ~ MAX_PWM`.
    ///
    /// Saturation is handled in two ordered passes: when any motor exceeds
    /// full throttle the whole vector is scaled down to keep the motor
    /// ratios, then a motor still below the floor lifts every channel by an
    /// affine shift that places the lowest motor on the floor while keeping
    /// the span up to full throttle. The shift is not re-checked against the
    /// maximum.
    pub fn pwm(&self, cmd: &Vector4<f64>) -> Vector4<f64> {
        let mut pwm = self.mix * cmd;

        let high = pwm.max();
        if high > MAX_PWM {
            pwm /= high;
        }

        let low = pwm.min();
        if low < MIN_PWM {
            pwm = pwm.map(|p| p + (MAX_PWM - p) / (MAX_PWM - low) * (MIN_PWM - low));
        }

        pwm
    }
}

impl Default for MotorMatrix {
    fn default() -> Self {
        Self::quad()
    }
}
