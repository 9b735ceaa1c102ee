//! A single quadrotor: state estimation from the physics engine, the
//! flight mode cascades, and the actuation model that turns the control
//! output back into forces.

use crate::motor::{Drag, Motors};
use crate::params::VehicleParams;
use crate::physics::{BodyId, BodySpec, Frame, Link, PhysicsEngine};
use crate::scheduler::Schedule;
use crate::{Error, Result};
use nalgebra::{UnitQuaternion, Vector3, Vector4};
use rand::Rng;

mod camera;
pub use camera::Camera;

mod cascade;
pub use cascade::{Cascade, HeightControl};

mod flight_mode;
pub use flight_mode::{FlightMode, HeightTarget};

mod state;
pub use state::State;

/// Per-vehicle construction options.
#[derive(Clone, Debug, PartialEq)]
pub struct DroneOptions {
    /// Vehicle parameters, the bundled quadrotor when `None`
    pub params: Option<VehicleParams>,
    pub use_camera: bool,
    pub use_gimbal: bool,
    pub camera_angle_degrees: f64,
    pub camera_fov_degrees: f64,
    /// Rows and columns of rendered frames
    pub camera_resolution: (usize, usize),
}

impl Default for DroneOptions {
    fn default() -> Self {
        Self {
            params: None,
            use_camera: false,
            use_gimbal: false,
            camera_angle_degrees: 20.,
            camera_fov_degrees: 90.,
            camera_resolution: (128, 128),
        }
    }
}

impl DroneOptions {
    /// Check the camera settings when a camera is requested.
    pub fn validate(&self) -> Result<()> {
        if !self.use_camera {
            return Ok(());
        }

        let fov = self.camera_fov_degrees;
        if fov.is_nan() || fov <= 0. || fov >= 180. {
            return Err(Error::invalid(
                "camera_fov_degrees",
                format!("must be in (0, 180), got {fov}"),
            ));
        }
        if !self.camera_angle_degrees.is_finite() {
            return Err(Error::invalid("camera_angle_degrees", "must be finite"));
        }
        let (rows, cols) = self.camera_resolution;
        if rows == 0 || cols == 0 {
            return Err(Error::invalid(
                "camera_resolution",
                format!("must be non-zero, got {rows}x{cols}"),
            ));
        }

        Ok(())
    }
}

/// A quadrotor flown through one of eight [`FlightMode`]s.
///
/// The host calls [`update_physics`](Drone::update_physics) every physics
/// tick and [`update`](Drone::update) at the control rate.
#[derive(Clone, Debug)]
pub struct Drone {
    body: BodyId,
    params: VehicleParams,
    start_position: Vector3<f64>,
    start_orientation: UnitQuaternion<f64>,
    ctrl_dt: f64,

    mode: FlightMode,
    cascade: Cascade,
    height: HeightControl,
    state: State,
    setpoint: Vector4<f64>,

    /// Last rate and thrust command sent to the mixer
    command: Vector4<f64>,
    pwm: Vector4<f64>,
    motors: Motors,
    drag: Drag,
    camera: Option<Camera>,
}

impl Drone {
    /// Spawn a vehicle at a start position and Euler orientation and reset
    /// it into the idle [`FlightMode::RateThrust`].
    pub fn spawn<E: PhysicsEngine>(
        engine: &mut E,
        start_position: Vector3<f64>,
        start_orientation: Vector3<f64>,
        options: &DroneOptions,
        schedule: &Schedule,
    ) -> Result<Self> {
        let params = match &options.params {
            Some(params) => params.clone(),
            None => VehicleParams::quadx()?,
        };
        params.validate()?;
        options.validate()?;

        let start_orientation = UnitQuaternion::from_euler_angles(
            start_orientation.x,
            start_orientation.y,
            start_orientation.z,
        );
        let body = engine.spawn(
            &BodySpec {
                mass: params.body_params.mass,
                inertia: params.body_params.inertia,
                links: params.body_params.motor_positions.to_vec(),
            },
            start_position,
            start_orientation,
        );

        let ctrl_dt = schedule.ctrl_dt();
        let camera = options.use_camera.then(|| {
            Camera::new(
                options.use_gimbal,
                options.camera_angle_degrees,
                options.camera_fov_degrees,
                options.camera_resolution,
            )
        });

        let mut drone = Self {
            body,
            start_position,
            start_orientation,
            ctrl_dt,
            mode: FlightMode::RateThrust,
            cascade: Cascade::new(FlightMode::RateThrust, &params.control_params, ctrl_dt),
            height: HeightControl::new(&params.control_params, ctrl_dt),
            state: State::default(),
            setpoint: Vector4::zeros(),
            command: Vector4::zeros(),
            pwm: Vector4::zeros(),
            motors: Motors::new(&params, schedule.physics_dt()),
            drag: Drag::new(&params.drag_params),
            camera,
            params,
        };
        drone.reset(engine);

        Ok(drone)
    }

    /// Return the body to its start pose, spin the motors down, clear every
    /// controller and enter the idle mode.
    pub fn reset<E: PhysicsEngine>(&mut self, engine: &mut E) {
        engine.reset_body(self.body, self.start_position, self.start_orientation);

        self.motors.reset();
        self.height.reset();
        self.command = Vector4::zeros();
        self.pwm = Vector4::zeros();

        self.update_state(engine);
        self.set_mode(FlightMode::RateThrust);
        self.capture_image(engine);
    }

    /// Switch flight mode, rebuilding the controller cascade and holding the
    /// current state as the new setpoint.
    pub fn set_mode(&mut self, mode: FlightMode) {
        if mode != self.mode {
            log::debug!(
                "body {} switching flight mode {} -> {}",
                self.body.0,
                self.mode.index(),
                mode.index()
            );
        }

        self.mode = mode;
        self.cascade = Cascade::new(mode, &self.params.control_params, self.ctrl_dt);
        self.setpoint = mode.default_setpoint(&self.state);
    }

    /// Set the four setpoint values, interpreted according to the current
    /// flight mode.
    pub fn set_setpoint(&mut self, setpoint: Vector4<f64>) {
        self.setpoint = setpoint;
    }

    /// Read the pose and velocity back from the engine.
    pub fn update_state<E: PhysicsEngine>(&mut self, engine: &E) {
        self.state = State::from_world(&engine.base_pose(self.body), &engine.base_velocity(self.body));
    }

    /// Run the cascade and height loop and mix the result into pulse-widths.
    pub fn update_control(&mut self) {
        let rates = self.cascade.update(&self.state, &self.setpoint);
        let thrust = self
            .height
            .update(self.mode.height_target(), &self.state, self.setpoint.w);

        self.command = rates.push(thrust);
        self.pwm = self.motors.matrix.pwm(&self.command);
    }

    /// Apply motor forces and drag for one physics tick.
    ///
    /// Drag only acts while the vehicle is airborne.
    pub fn update_physics<E: PhysicsEngine, R: Rng>(&mut self, engine: &mut E, rng: &mut R) {
        let speed = *self.motors.pwm_to_speed(&self.pwm);
        let forces = self.motors.speed_to_forces(&speed, rng);

        for idx in 0..4 {
            let link = Link::Motor(idx);
            engine.apply_force(self.body, link, Vector3::z() * forces.thrust[idx], Frame::Link);
            engine.apply_torque(self.body, link, Vector3::z() * forces.torque[idx], Frame::Link);
        }

        if engine.contact_count(self.body) == 0 {
            let velocity = engine.base_velocity(self.body);
            let (force, torque) = self.drag.compute(&velocity.linear, &velocity.angular);
            engine.apply_force(self.body, Link::Base, force, Frame::Link);
            engine.apply_torque(self.body, Link::Base, torque, Frame::Link);
        }
    }

    /// Control-rate update: read the state, run the controllers, and render
    /// a camera frame if the vehicle has a camera.
    pub fn update<E: PhysicsEngine>(&mut self, engine: &mut E) {
        self.update_state(engine);
        self.update_control();
        self.capture_image(engine);
    }

    fn capture_image<E: PhysicsEngine>(&mut self, engine: &mut E) {
        if let Some(camera) = &mut self.camera {
            let pose = engine.base_pose(self.body);
            camera.capture(engine, &pose);
        }
    }

    pub fn body(&self) -> BodyId {
        self.body
    }

    pub fn params(&self) -> &VehicleParams {
        &self.params
    }

    pub fn mode(&self) -> FlightMode {
        self.mode
    }

    pub fn cascade(&self) -> &Cascade {
        &self.cascade
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn setpoint(&self) -> &Vector4<f64> {
        &self.setpoint
    }

    pub fn command(&self) -> &Vector4<f64> {
        &self.command
    }

    pub fn pwm(&self) -> &Vector4<f64> {
        &self.pwm
    }

    pub fn motor_speed(&self) -> &Vector4<f64> {
        self.motors.speed()
    }

    pub fn camera(&self) -> Option<&Camera> {
        self.camera.as_ref()
    }
}
