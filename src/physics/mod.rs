//! The narrow request/response surface the control core needs from a
//! rigid-body physics engine.
//!
//! Anything implementing [`PhysicsEngine`] can host vehicles: the bundled
//! [`RigidBodyWorld`] for standalone simulation, or a stub in tests.

use nalgebra::{Matrix4, UnitQuaternion, Vector3};

mod rigid;
pub use rigid::RigidBodyWorld;

/// Handle to a body spawned in a [`PhysicsEngine`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyId(pub usize);

/// Where on a body a force or torque is applied.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Link {
    /// The body's center of mass.
    Base,
    /// The attachment point of the motor with this index.
    Motor(usize),
}

/// The frame a force or torque vector is expressed in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Frame {
    /// The body-fixed frame of the link.
    Link,
    World,
}

/// Settings used when connecting to a fresh engine instance.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WorldSettings {
    /// Physics timestep in seconds
    pub dt: f64,
    /// Gravitational acceleration in m/s^2 (positive, pointing down)
    pub gravity: f64,
}

/// Mass properties and link layout needed to spawn a vehicle.
#[derive(Clone, Debug, PartialEq)]
pub struct BodySpec {
    pub mass: f64,
    pub inertia: Vector3<f64>,
    /// Link offsets from the center of mass in the body frame
    pub links: Vec<Vector3<f64>>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pose {
    pub position: Vector3<f64>,
    pub orientation: UnitQuaternion<f64>,
}

/// World frame velocities of a body.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Velocity {
    pub linear: Vector3<f64>,
    pub angular: Vector3<f64>,
}

/// A camera render request.
#[derive(Clone, Debug, PartialEq)]
pub struct CameraRequest {
    pub rows: usize,
    pub cols: usize,
    pub view: Matrix4<f64>,
    pub projection: Matrix4<f64>,
}

/// Row-major image buffers returned by a render.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CameraImage {
    pub rows: usize,
    pub cols: usize,
    /// RGBA, four bytes per pixel
    pub rgb: Vec<u8>,
    /// Normalized depth in [0, 1]
    pub depth: Vec<f32>,
    /// Body id per pixel, -1 for background
    pub segmentation: Vec<i32>,
}

impl CameraImage {
    pub fn blank(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            rgb: vec![0; rows * cols * 4],
            depth: vec![1.; rows * cols],
            segmentation: vec![-1; rows * cols],
        }
    }
}

/// Capabilities a physics backend provides to the vehicles it hosts.
pub trait PhysicsEngine {
    /// Start a fresh simulation.
    fn connect(settings: &WorldSettings) -> Self
    where
        Self: Sized;

    fn spawn(
        &mut self,
        spec: &BodySpec,
        position: Vector3<f64>,
        orientation: UnitQuaternion<f64>,
    ) -> BodyId;

    /// Teleport a body to a pose and zero its velocity.
    fn reset_body(&mut self, body: BodyId, position: Vector3<f64>, orientation: UnitQuaternion<f64>);

    fn base_pose(&self, body: BodyId) -> Pose;

    fn base_velocity(&self, body: BodyId) -> Velocity;

    fn apply_force(&mut self, body: BodyId, link: Link, force: Vector3<f64>, frame: Frame);

    fn apply_torque(&mut self, body: BodyId, link: Link, torque: Vector3<f64>, frame: Frame);

    /// Number of contact points the body currently has with anything.
    fn contact_count(&self, body: BodyId) -> usize;

    fn render(&mut self, request: &CameraRequest) -> CameraImage;

    /// Advance the simulation by one timestep, consuming all applied
    /// forces and torques.
    fn step(&mut self);
}
