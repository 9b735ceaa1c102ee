use crate::physics::{CameraImage, CameraRequest, PhysicsEngine, Pose};
use nalgebra::{Matrix4, Perspective3, Point3, UnitQuaternion, Vector3};

const NEAR: f64 = 0.1;
const FAR: f64 = 255.;

/// Distance to the point the camera looks at along its optical axis.
const LOOK_DISTANCE: f64 = 1000.;

/// A forward-facing camera mounted on a vehicle's base.
#[derive(Clone, Debug)]
pub struct Camera {
    /// Keep the camera level in roll and pitch regardless of the vehicle
    pub use_gimbal: bool,
    /// Downward tilt when gimballed, upward tilt relative to the body
    /// otherwise, in degrees
    pub angle_degrees: f64,
    pub rows: usize,
    pub cols: usize,
    projection: Matrix4<f64>,
    image: CameraImage,
}

impl Camera {
    pub fn new(
        use_gimbal: bool,
        angle_degrees: f64,
        fov_degrees: f64,
        (rows, cols): (usize, usize),
    ) -> Self {
        let projection =
            Perspective3::new(1., fov_degrees.to_radians(), NEAR, FAR).to_homogeneous();

        Self {
            use_gimbal,
            angle_degrees,
            rows,
            cols,
            projection,
            image: CameraImage::blank(rows, cols),
        }
    }

    pub fn projection(&self) -> &Matrix4<f64> {
        &self.projection
    }

    /// The most recently captured frame.
    pub fn image(&self) -> &CameraImage {
        &self.image
    }

    /// The camera orientation for a vehicle at `pose`.
    pub fn orientation(&self, pose: &Pose) -> UnitQuaternion<f64> {
        let (roll, pitch, yaw) = pose.orientation.euler_angles();
        let angle = self.angle_degrees.to_radians();

        if self.use_gimbal {
            UnitQuaternion::from_euler_angles(0., angle, yaw)
        } else {
            UnitQuaternion::from_euler_angles(roll, pitch - angle, yaw)
        }
    }

    pub fn view(&self, pose: &Pose) -> Matrix4<f64> {
        let rotation = self.orientation(pose);
        let eye = Point3::from(pose.position);
        let target = eye + rotation * Vector3::x() * LOOK_DISTANCE;
        let up = rotation * Vector3::z();

        Matrix4::look_at_rh(&eye, &target, &up)
    }

    /// Render a new frame from `pose` and return it.
    pub fn capture<E: PhysicsEngine>(&mut self, engine: &mut E, pose: &Pose) -> &CameraImage {
        let request = CameraRequest {
            rows: self.rows,
            cols: self.cols,
            view: self.view(pose),
            projection: self.projection,
        };
        self.image = engine.render(&request);
        &self.image
    }
}

#[cfg(test)]
mod tests {
    use super::Camera;
    use crate::physics::Pose;
    use approx::assert_abs_diff_eq;
    use nalgebra::{UnitQuaternion, Vector3};

    fn pose(roll: f64, pitch: f64, yaw: f64) -> Pose {
        Pose {
            position: Vector3::new(0., 0., 2.),
            orientation: UnitQuaternion::from_euler_angles(roll, pitch, yaw),
        }
    }

    #[test]
    fn gimbal_ignores_body_roll_and_pitch() {
        let camera = Camera::new(true, 20., 90., (8, 8));
        let (roll, pitch, yaw) = camera.orientation(&pose(0.3, -0.2, 1.)).euler_angles();
        assert_abs_diff_eq!(roll, 0., epsilon = 1e-9);
        assert_abs_diff_eq!(pitch, 20f64.to_radians(), epsilon = 1e-9);
        assert_abs_diff_eq!(yaw, 1., epsilon = 1e-9);
    }

    #[test]
    fn fixed_mount_tilts_up_from_the_body() {
        let camera = Camera::new(false, 20., 90., (8, 8));
        let (roll, pitch, _) = camera.orientation(&pose(0.1, 0.5, 0.)).euler_angles();
        assert_abs_diff_eq!(roll, 0.1, epsilon = 1e-9);
        assert_abs_diff_eq!(pitch, 0.5 - 20f64.to_radians(), epsilon = 1e-9);
    }

    #[test]
    fn gimballed_camera_looks_down() {
        let camera = Camera::new(true, 20., 90., (8, 8));
        let view = camera.view(&pose(0., 0., 0.));
        // A point straight ahead and below lands in front of the camera
        let ahead = view * Vector3::new(10., 0., 2. - 10. * 20f64.to_radians().tan()).push(1.);
        assert!(ahead.z < 0.);
        assert_abs_diff_eq!(ahead.y, 0., epsilon = 1e-9);
        assert_abs_diff_eq!(ahead.x, 0., epsilon = 1e-9);
    }
}
