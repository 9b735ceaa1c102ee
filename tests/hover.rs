use approx::assert_abs_diff_eq;
use multirotor_sim::physics::RigidBodyWorld;
use multirotor_sim::{Aviary, AviaryConfig, DroneOptions, FlightMode, VehicleParams};
use nalgebra::{Vector3, Vector4};

fn noiseless_aviary(start: Vector3<f64>) -> Aviary<RigidBodyWorld> {
    let mut params = VehicleParams::quadx().unwrap();
    params.motor_params.motor_noise_ratio = 0.;

    Aviary::new(AviaryConfig {
        start_pos: vec![start],
        start_orn: vec![Vector3::zeros()],
        drone_options: vec![DroneOptions {
            params: Some(params),
            ..Default::default()
        }],
        seed: Some(0),
        ..Default::default()
    })
    .unwrap()
}

#[test]
fn holding_height_settles_at_hover_throttle() {
    let mut aviary = noiseless_aviary(Vector3::new(0., 0., 2.));
    aviary.set_mode(FlightMode::AttitudeHeight);
    assert_eq!(*aviary.drone(0).unwrap().setpoint(), Vector4::new(0., 0., 0., 2.));

    // Ten seconds at the control rate
    for _ in 0..1200 {
        aviary.step();
    }

    let drone = aviary.drone(0).unwrap();
    let hover = drone.params().hover_pwm();
    let pwm = drone.pwm();
    assert_abs_diff_eq!(drone.state().height(), 2., epsilon = 0.05);
    for idx in 0..4 {
        assert_abs_diff_eq!(pwm[idx], hover, epsilon = 0.02);
    }
    assert_eq!(aviary.contact_array(), vec![0]);
}

#[test]
fn position_mode_flies_to_a_lateral_target() {
    let mut aviary = noiseless_aviary(Vector3::new(0., 0., 2.));
    aviary.set_mode(FlightMode::Position);
    aviary.set_setpoint(0, Vector4::new(1., 0., 0., 2.)).unwrap();

    for _ in 0..1200 {
        aviary.step();
    }

    let position = aviary.state(0).unwrap().lin_pos();
    assert_abs_diff_eq!(position.x, 1., epsilon = 0.1);
    assert_abs_diff_eq!(position.y, 0., epsilon = 0.05);
    assert_abs_diff_eq!(position.z, 2., epsilon = 0.1);
}

#[test]
fn idle_vehicle_comes_to_rest_on_the_ground() {
    let mut aviary = noiseless_aviary(Vector3::new(0., 0., 1.));
    for _ in 0..240 {
        aviary.step();
    }

    let drone = aviary.drone(0).unwrap();
    assert_eq!(drone.mode(), FlightMode::RateThrust);
    assert_eq!(drone.state().height(), 0.);
    assert_eq!(aviary.contact_array(), vec![1]);
}
