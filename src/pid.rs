use nalgebra::{SVector, Vector1};
use serde::Deserialize;

/// Diagonal gains and symmetric output limit for a [`PID`] of dimension `D`.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
pub struct PidGains<const D: usize> {
    pub kp: SVector<f64, D>,
    pub ki: SVector<f64, D>,
    pub kd: SVector<f64, D>,
    pub lim: SVector<f64, D>,
}

impl<const D: usize> PidGains<D> {
    pub fn new(
        kp: SVector<f64, D>,
        ki: SVector<f64, D>,
        kd: SVector<f64, D>,
        lim: SVector<f64, D>,
    ) -> Self {
        Self { kp, ki, kd, lim }
    }

    /// Take the gains of the first `N` axes.
    pub fn head<const N: usize>(&self) -> PidGains<N> {
        PidGains {
            kp: self.kp.fixed_rows::<N>(0).into_owned(),
            ki: self.ki.fixed_rows::<N>(0).into_owned(),
            kd: self.kd.fixed_rows::<N>(0).into_owned(),
            lim: self.lim.fixed_rows::<N>(0).into_owned(),
        }
    }
}

/// Proportional-integral-derivative controller over `D` independent axes
/// stepped at a fixed timestep `dt` (in seconds).
///
/// The integrator is clamped to the output limit, so a saturated axis stops
/// winding up as soon as its accumulated error reaches `lim`.
#[derive(Clone, Debug)]
pub struct PID<const D: usize> {
    pub gains: PidGains<D>,

    /// Timestep in seconds
    pub dt: f64,

    integral: SVector<f64, D>,
    prev_error: SVector<f64, D>,
}

impl<const D: usize> PID<D> {
    pub fn new(gains: PidGains<D>, dt: f64) -> Self {
        Self {
            gains,
            dt,
            integral: SVector::zeros(),
            prev_error: SVector::zeros(),
        }
    }

    /// Zero the integrator and the stored previous error.
    pub fn reset(&mut self) {
        self.integral = SVector::zeros();
        self.prev_error = SVector::zeros();
    }

    pub fn integral(&self) -> &SVector<f64, D> {
        &self.integral
    }

    /// Update the controller with the `measured` value and its `target`,
    /// returning the output clamped to `±lim` on every axis.
    pub fn step(
        &mut self,
        measured: SVector<f64, D>,
        target: SVector<f64, D>,
    ) -> SVector<f64, D> {
        let error = target - measured;

        // Integrate and constrain
        self.integral = clamp(&(self.integral + error * self.dt), &self.gains.lim);

        let derivative = if self.dt > 0. {
            (error - self.prev_error) / self.dt
        } else {
            SVector::zeros()
        };
        self.prev_error = error;

        let output = self.gains.kp.component_mul(&error)
            + self.gains.ki.component_mul(&self.integral)
            + self.gains.kd.component_mul(&derivative);

        clamp(&output, &self.gains.lim)
    }
}

impl PID<1> {
    pub fn step_scalar(&mut self, measured: f64, target: f64) -> f64 {
        self.step(Vector1::new(measured), Vector1::new(target))[0]
    }
}

fn clamp<const D: usize>(value: &SVector<f64, D>, lim: &SVector<f64, D>) -> SVector<f64, D> {
    value.zip_map(lim, |v, l| v.max(-l).min(l))
}

#[cfg(test)]
mod tests {
    use super::{PidGains, PID};
    use approx::assert_abs_diff_eq;
    use nalgebra::{Vector2, Vector3};

    fn gains(kp: f64, ki: f64, kd: f64, lim: f64) -> PidGains<2> {
        PidGains::new(
            Vector2::repeat(kp),
            Vector2::repeat(ki),
            Vector2::repeat(kd),
            Vector2::repeat(lim),
        )
    }

    #[test]
    fn proportional_only() {
        let mut pid = PID::new(gains(2., 0., 0., 10.), 0.1);
        let out = pid.step(Vector2::new(1., -1.), Vector2::new(2., 0.5));
        assert_abs_diff_eq!(out, Vector2::new(2., 3.), epsilon = 1e-12);
    }

    #[test]
    fn output_is_clamped_per_axis() {
        let mut pid = PID::new(gains(10., 0., 0., 1.), 0.1);
        let out = pid.step(Vector2::zeros(), Vector2::new(5., -0.05));
        assert_abs_diff_eq!(out, Vector2::new(1., -0.5), epsilon = 1e-12);
    }

    #[test]
    fn integral_accumulates_and_saturates() {
        let mut pid = PID::new(gains(0., 1., 0., 0.25), 0.1);
        let first = pid.step(Vector2::zeros(), Vector2::new(1., 0.));
        assert_abs_diff_eq!(first[0], 0.1, epsilon = 1e-12);

        for _ in 0..100 {
            pid.step(Vector2::zeros(), Vector2::new(1., 0.));
        }
        assert_abs_diff_eq!(pid.integral()[0], 0.25, epsilon = 1e-12);
        assert_abs_diff_eq!(pid.integral()[1], 0., epsilon = 1e-12);
    }

    #[test]
    fn derivative_uses_consecutive_errors() {
        let mut pid = PID::new(gains(0., 0., 1., 100.), 0.5);
        let first = pid.step(Vector2::zeros(), Vector2::new(1., 1.));
        assert_abs_diff_eq!(first, Vector2::new(2., 2.), epsilon = 1e-12);

        let second = pid.step(Vector2::zeros(), Vector2::new(1., 2.));
        assert_abs_diff_eq!(second, Vector2::new(0., 2.), epsilon = 1e-12);
    }

    #[test]
    fn reset_clears_history() {
        let mut pid = PID::new(gains(0., 1., 1., 100.), 0.5);
        pid.step(Vector2::zeros(), Vector2::new(3., 3.));
        pid.reset();
        assert_eq!(*pid.integral(), Vector2::zeros());

        let fresh = PID::new(gains(0., 1., 1., 100.), 0.5).step(Vector2::zeros(), Vector2::new(1., 1.));
        let out = pid.step(Vector2::zeros(), Vector2::new(1., 1.));
        assert_abs_diff_eq!(out, fresh, epsilon = 1e-12);
    }

    #[test]
    fn head_takes_leading_axes() {
        let gains = PidGains::new(
            Vector3::new(1., 2., 3.),
            Vector3::new(4., 5., 6.),
            Vector3::new(7., 8., 9.),
            Vector3::new(10., 11., 12.),
        );
        let head = gains.head::<2>();
        assert_eq!(head.kp, Vector2::new(1., 2.));
        assert_eq!(head.lim, Vector2::new(10., 11.));
    }

    #[test]
    fn scalar_step() {
        let mut pid = PID::new(
            PidGains::new(
                nalgebra::Vector1::new(0.5),
                nalgebra::Vector1::new(0.),
                nalgebra::Vector1::new(0.),
                nalgebra::Vector1::new(1.),
            ),
            0.01,
        );
        assert_abs_diff_eq!(pid.step_scalar(1., 2.), 0.5, epsilon = 1e-12);
    }
}
