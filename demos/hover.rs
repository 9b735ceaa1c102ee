//! Take off from the ground, climb to two meters and fly a square.
//!
//! Run with `RUST_LOG=debug` to see flight mode changes.

use env_logger::{Builder, Env};
use multirotor_sim::physics::RigidBodyWorld;
use multirotor_sim::{Aviary, AviaryConfig, FlightMode};
use nalgebra::{Vector3, Vector4};

fn main() -> multirotor_sim::Result<()> {
    Builder::from_env(Env::default().default_filter_or("info")).init();

    let mut aviary = Aviary::<RigidBodyWorld>::new(AviaryConfig {
        start_pos: vec![Vector3::new(0., 0., 0.)],
        start_orn: vec![Vector3::zeros()],
        seed: Some(1),
        ..Default::default()
    })?;

    aviary.set_mode(FlightMode::Position);

    let waypoints = [
        Vector4::new(0., 0., 0., 2.),
        Vector4::new(2., 0., 0., 2.),
        Vector4::new(2., 2., 0., 2.),
        Vector4::new(0., 2., 0., 2.),
        Vector4::new(0., 0., 0., 2.),
    ];

    let ctrl_hz = aviary.schedule().ctrl_hz.0;
    for waypoint in waypoints {
        aviary.set_setpoint(0, waypoint)?;

        // Five seconds per waypoint
        for _ in 0..5 * ctrl_hz {
            aviary.step();
        }

        let drone = aviary.drone(0)?;
        let position = drone.state().lin_pos();
        log::info!(
            "t = {:5.2} s, target ({:.1}, {:.1}, {:.1}), position ({:.2}, {:.2}, {:.2}), pwm {:.3?}",
            aviary.elapsed_time(),
            waypoint.x,
            waypoint.y,
            waypoint.w,
            position.x,
            position.y,
            position.z,
            drone.pwm().as_slice()
        );
    }

    Ok(())
}
