use crate::physics::{Pose, Velocity};
use nalgebra::{Matrix4x3, Vector3};

/// Vehicle state as a 4x3 matrix whose rows are the angular velocity, the
/// angular position (roll, pitch, yaw), the linear velocity and the linear
/// position.
///
/// Velocities are expressed in the vehicle's local frame, the position in
/// the world frame.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct State(pub Matrix4x3<f64>);

impl State {
    pub fn new(
        ang_vel: Vector3<f64>,
        ang_pos: Vector3<f64>,
        lin_vel: Vector3<f64>,
        lin_pos: Vector3<f64>,
    ) -> Self {
        Self(Matrix4x3::from_rows(&[
            ang_vel.transpose(),
            ang_pos.transpose(),
            lin_vel.transpose(),
            lin_pos.transpose(),
        ]))
    }

    /// Build the state from a world frame pose and velocity.
    pub fn from_world(pose: &Pose, velocity: &Velocity) -> Self {
        let rotation = pose.orientation;
        let (roll, pitch, yaw) = rotation.euler_angles();

        Self::new(
            rotation.inverse_transform_vector(&velocity.angular),
            Vector3::new(roll, pitch, yaw),
            rotation.inverse_transform_vector(&velocity.linear),
            pose.position,
        )
    }

    pub fn ang_vel(&self) -> Vector3<f64> {
        self.0.row(0).transpose()
    }

    pub fn ang_pos(&self) -> Vector3<f64> {
        self.0.row(1).transpose()
    }

    pub fn lin_vel(&self) -> Vector3<f64> {
        self.0.row(2).transpose()
    }

    pub fn lin_pos(&self) -> Vector3<f64> {
        self.0.row(3).transpose()
    }

    pub fn yaw(&self) -> f64 {
        self.0[(1, 2)]
    }

    pub fn height(&self) -> f64 {
        self.0[(3, 2)]
    }
}
