//! Fixed-ratio loop timing.
//!
//! Every slower loop runs once per a whole number of ticks of the loop
//! beneath it: control runs every `physics_hz / ctrl_hz` physics ticks, and
//! an agent acts every `ctrl_hz / agent_hz` control updates.

use crate::{Error, Result};
use embedded_time::rate::Hertz;

/// The physics rate the vehicle parameters are tuned for.
pub const NOMINAL_PHYSICS_HZ: Hertz = Hertz(240);

/// Physics and control rates of an aviary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Schedule {
    pub physics_hz: Hertz,
    pub ctrl_hz: Hertz,
    ticks_per_control: u32,
}

impl Schedule {
    /// Create a schedule where the control rate divides the physics rate.
    pub fn new(physics_hz: Hertz, ctrl_hz: Hertz) -> Result<Self> {
        let ticks_per_control = ticks(physics_hz, ctrl_hz)
            .filter(|&steps| steps * ctrl_hz.0 == physics_hz.0)
            .ok_or(Error::InvalidControlRate {
                ctrl_hz: ctrl_hz.0,
                physics_hz: physics_hz.0,
            })?;

        if physics_hz != NOMINAL_PHYSICS_HZ {
            log::warn!(
                "physics rate {} Hz differs from the {} Hz the motor and drag models are tuned for",
                physics_hz.0,
                NOMINAL_PHYSICS_HZ.0
            );
        }

        Ok(Self {
            physics_hz,
            ctrl_hz,
            ticks_per_control,
        })
    }

    /// Physics timestep in seconds.
    pub fn physics_dt(&self) -> f64 {
        1. / self.physics_hz.0 as f64
    }

    /// Control timestep in seconds.
    pub fn ctrl_dt(&self) -> f64 {
        1. / self.ctrl_hz.0 as f64
    }

    /// Physics ticks per control update.
    pub fn ticks_per_control(&self) -> u32 {
        self.ticks_per_control
    }
}

/// Calculate the ticks of the `loop_rate` loop between each run of a task
/// at `task_rate`, or `None` when the task is slower than zero or faster
/// than the loop.
pub fn ticks(loop_rate: Hertz, task_rate: Hertz) -> Option<u32> {
    loop_rate.0.checked_div(task_rate.0).filter(|&ticks| ticks > 0)
}

/// Number of control updates per agent step.
///
/// Fails unless `agent_hz` divides `ctrl_hz` exactly. The error carries the
/// closest rates on either side that would be accepted.
pub fn step_ratio(ctrl_hz: Hertz, agent_hz: Hertz) -> Result<u32> {
    match ticks(ctrl_hz, agent_hz) {
        Some(ratio) if ratio * agent_hz.0 == ctrl_hz.0 => Ok(ratio),
        ratio => {
            let ratio = ratio.unwrap_or(0);
            Err(Error::InvalidAgentRate {
                agent_hz: agent_hz.0,
                base_hz: ctrl_hz.0,
                lowest: ctrl_hz.0 / (ratio + 1),
                highest: ctrl_hz.0 / ratio.max(1),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{step_ratio, ticks, Schedule};
    use crate::Error;
    use embedded_time::rate::Hertz;

    #[test]
    fn default_rates() {
        let schedule = Schedule::new(Hertz(240), Hertz(120)).unwrap();
        assert_eq!(schedule.ticks_per_control(), 2);
        assert_eq!(schedule.physics_dt(), 1. / 240.);
        assert_eq!(schedule.ctrl_dt(), 1. / 120.);
    }

    #[test]
    fn control_rate_must_divide_physics_rate() {
        assert!(matches!(
            Schedule::new(Hertz(240), Hertz(100)),
            Err(Error::InvalidControlRate {
                ctrl_hz: 100,
                physics_hz: 240
            })
        ));
        assert!(Schedule::new(Hertz(240), Hertz(480)).is_err());
        assert!(Schedule::new(Hertz(240), Hertz(0)).is_err());
    }

    #[test]
    fn zero_rate_task_has_no_ticks() {
        assert_eq!(ticks(Hertz(120), Hertz(0)), None);
        assert_eq!(ticks(Hertz(120), Hertz(40)), Some(3));
    }

    #[test]
    fn agent_ratios() {
        assert_eq!(step_ratio(Hertz(120), Hertz(30)).unwrap(), 4);
        assert_eq!(step_ratio(Hertz(120), Hertz(120)).unwrap(), 1);
        assert_eq!(step_ratio(Hertz(120), Hertz(1)).unwrap(), 120);
    }

    #[test]
    fn rejected_agent_rate_suggests_neighbours() {
        match step_ratio(Hertz(120), Hertz(50)) {
            Err(Error::InvalidAgentRate {
                agent_hz,
                lowest,
                highest,
                ..
            }) => {
                assert_eq!(agent_hz, 50);
                assert_eq!(lowest, 40);
                assert_eq!(highest, 60);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
