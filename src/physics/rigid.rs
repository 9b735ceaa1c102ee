use super::{
    BodyId, BodySpec, CameraImage, CameraRequest, Frame, Link, PhysicsEngine, Pose, Velocity,
    WorldSettings,
};
use nalgebra::{Matrix4, UnitQuaternion, Vector3, Vector4};

/// Fraction of lateral velocity lost per tick while touching the ground.
const GROUND_FRICTION: f64 = 0.1;

/// Fraction of angular velocity lost per tick while touching the ground.
const GROUND_ANGULAR_DAMPING: f64 = 0.2;

/// Bounding spheres closer than this still count as touching.
const CONTACT_SLOP: f64 = 1e-3;

const SKY: [u8; 4] = [135, 206, 235, 255];
const GROUND_LIGHT: [u8; 4] = [96, 160, 80, 255];
const GROUND_DARK: [u8; 4] = [72, 128, 60, 255];
const BODY: [u8; 4] = [60, 60, 60, 255];

#[derive(Clone, Debug)]
struct Body {
    spec: BodySpec,
    radius: f64,
    position: Vector3<f64>,
    orientation: UnitQuaternion<f64>,
    /// World frame
    linear: Vector3<f64>,
    /// World frame
    angular: Vector3<f64>,
    force: Vector3<f64>,
    torque: Vector3<f64>,
    contacts: usize,
}

/// A minimal rigid-body world: gravity, diagonal inertia, and a flat
/// ground plane at `z = 0`.
///
/// Forces and torques applied between two calls to
/// [`step`](PhysicsEngine::step) are accumulated and then integrated with
/// semi-implicit Euler. Bodies collide with each other as bounding spheres
/// that reach their farthest link; an overlap counts as one contact on
/// each body and is resolved inelastically.
#[derive(Clone, Debug)]
pub struct RigidBodyWorld {
    settings: WorldSettings,
    bodies: Vec<Body>,
    steps: u64,
}

impl RigidBodyWorld {
    /// Number of ticks simulated since connecting.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    fn body(&self, id: BodyId) -> &Body {
        &self.bodies[id.0]
    }

    fn body_mut(&mut self, id: BodyId) -> &mut Body {
        &mut self.bodies[id.0]
    }

    /// Cast a ray against every body and the ground, returning the distance
    /// along `dir` and the segmentation id of the closest hit.
    fn cast(&self, origin: &Vector3<f64>, dir: &Vector3<f64>) -> Option<(f64, i32, [u8; 4])> {
        let mut closest: Option<(f64, i32, [u8; 4])> = None;

        if dir.z < 0. && origin.z > 0. {
            let t = -origin.z / dir.z;
            let hit = origin + dir * t;
            let tile = (hit.x.floor() + hit.y.floor()) as i64;
            let color = if tile.rem_euclid(2) == 0 {
                GROUND_LIGHT
            } else {
                GROUND_DARK
            };
            closest = Some((t, 0, color));
        }

        for (idx, body) in self.bodies.iter().enumerate() {
            // Ray-sphere intersection
            let oc = origin - body.position;
            let a = dir.dot(dir);
            let b = 2. * oc.dot(dir);
            let c = oc.dot(&oc) - body.radius * body.radius;
            let disc = b * b - 4. * a * c;
            if disc < 0. {
                continue;
            }
            let t = (-b - disc.sqrt()) / (2. * a);
            if t > 0. && closest.map_or(true, |(best, _, _)| t < best) {
                closest = Some((t, idx as i32 + 1, BODY));
            }
        }

        closest
    }
}

impl PhysicsEngine for RigidBodyWorld {
    fn connect(settings: &WorldSettings) -> Self {
        Self {
            settings: *settings,
            bodies: Vec::new(),
            steps: 0,
        }
    }

    fn spawn(
        &mut self,
        spec: &BodySpec,
        position: Vector3<f64>,
        orientation: UnitQuaternion<f64>,
    ) -> BodyId {
        let radius = spec
            .links
            .iter()
            .map(|l| l.norm())
            .fold(0.05, f64::max);

        self.bodies.push(Body {
            spec: spec.clone(),
            radius,
            position,
            orientation,
            linear: Vector3::zeros(),
            angular: Vector3::zeros(),
            force: Vector3::zeros(),
            torque: Vector3::zeros(),
            contacts: 0,
        });
        BodyId(self.bodies.len() - 1)
    }

    fn reset_body(&mut self, body: BodyId, position: Vector3<f64>, orientation: UnitQuaternion<f64>) {
        let body = self.body_mut(body);
        body.position = position;
        body.orientation = orientation;
        body.linear = Vector3::zeros();
        body.angular = Vector3::zeros();
        body.force = Vector3::zeros();
        body.torque = Vector3::zeros();
        body.contacts = 0;
    }

    fn base_pose(&self, body: BodyId) -> Pose {
        let body = self.body(body);
        Pose {
            position: body.position,
            orientation: body.orientation,
        }
    }

    fn base_velocity(&self, body: BodyId) -> Velocity {
        let body = self.body(body);
        Velocity {
            linear: body.linear,
            angular: body.angular,
        }
    }

    fn apply_force(&mut self, body: BodyId, link: Link, force: Vector3<f64>, frame: Frame) {
        let body = self.body_mut(body);
        let force = match frame {
            Frame::Link => body.orientation * force,
            Frame::World => force,
        };
        let offset = match link {
            Link::Base => Vector3::zeros(),
            Link::Motor(idx) => body
                .spec
                .links
                .get(idx)
                .map_or_else(Vector3::zeros, |l| body.orientation * l),
        };

        body.force += force;
        body.torque += offset.cross(&force);
    }

    fn apply_torque(&mut self, body: BodyId, _link: Link, torque: Vector3<f64>, frame: Frame) {
        let body = self.body_mut(body);
        body.torque += match frame {
            Frame::Link => body.orientation * torque,
            Frame::World => torque,
        };
    }

    fn contact_count(&self, body: BodyId) -> usize {
        self.body(body).contacts
    }

    fn render(&mut self, request: &CameraRequest) -> CameraImage {
        let mut image = CameraImage::blank(request.rows, request.cols);
        let view_proj = request.projection * request.view;
        let Some(inverse) = view_proj.try_inverse() else {
            return image;
        };

        for row in 0..request.rows {
            for col in 0..request.cols {
                let x = (col as f64 + 0.5) / request.cols as f64 * 2. - 1.;
                let y = 1. - (row as f64 + 0.5) / request.rows as f64 * 2.;
                let near = unproject(&inverse, x, y, -1.);
                let far = unproject(&inverse, x, y, 1.);
                let dir = far - near;

                let idx = row * request.cols + col;
                let (color, depth, seg) = match self.cast(&near, &dir) {
                    Some((t, seg, color)) if t <= 1. => {
                        (color, ndc_depth(&view_proj, &(near + dir * t)), seg)
                    }
                    _ => (SKY, 1., -1),
                };

                image.rgb[idx * 4..idx * 4 + 4].copy_from_slice(&color);
                image.depth[idx] = depth as f32;
                image.segmentation[idx] = seg;
            }
        }

        image
    }

    fn step(&mut self) {
        let WorldSettings { dt, gravity } = self.settings;

        for body in &mut self.bodies {
            let mass = body.spec.mass;
            let inertia = body.spec.inertia;

            let weight = Vector3::new(0., 0., -mass * gravity);
            body.linear += (body.force + weight) / mass * dt;
            body.position += body.linear * dt;

            // Euler's rotation equations in the body frame
            let angular_body = body.orientation.inverse_transform_vector(&body.angular);
            let torque_body = body.orientation.inverse_transform_vector(&body.torque);
            let gyroscopic = angular_body.cross(&inertia.component_mul(&angular_body));
            let angular_accel = (torque_body - gyroscopic).component_div(&inertia);
            body.angular = body.orientation * (angular_body + angular_accel * dt);

            body.orientation = UnitQuaternion::from_scaled_axis(body.angular * dt) * body.orientation;

            body.contacts = 0;
            if body.position.z <= 0. {
                body.position.z = 0.;
                body.linear.z = body.linear.z.max(0.);
                body.linear.x *= 1. - GROUND_FRICTION;
                body.linear.y *= 1. - GROUND_FRICTION;
                body.angular *= 1. - GROUND_ANGULAR_DAMPING;
                body.contacts = 1;
            }

            body.force = Vector3::zeros();
            body.torque = Vector3::zeros();
        }

        self.collide_bodies();
        self.steps += 1;
    }
}

impl RigidBodyWorld {
    /// Count and separate every overlapping pair of bounding spheres.
    fn collide_bodies(&mut self) {
        for i in 0..self.bodies.len() {
            let (head, tail) = self.bodies.split_at_mut(i + 1);
            let a = &mut head[i];

            for b in tail {
                let offset = b.position - a.position;
                let distance = offset.norm();
                let penetration = a.radius + b.radius - distance;
                if penetration < -CONTACT_SLOP {
                    continue;
                }

                a.contacts += 1;
                b.contacts += 1;
                if penetration <= 0. {
                    continue;
                }

                // Coincident centres push apart vertically
                let normal = if distance > f64::EPSILON {
                    offset / distance
                } else {
                    Vector3::z()
                };
                let inv_a = 1. / a.spec.mass;
                let inv_b = 1. / b.spec.mass;
                let share = penetration / (inv_a + inv_b);
                a.position -= normal * share * inv_a;
                b.position += normal * share * inv_b;

                // Remove the approaching part of the relative velocity
                let closing = (b.linear - a.linear).dot(&normal);
                if closing < 0. {
                    let impulse = closing / (inv_a + inv_b);
                    a.linear += normal * impulse * inv_a;
                    b.linear -= normal * impulse * inv_b;
                }
            }
        }
    }
}

fn unproject(inverse: &Matrix4<f64>, x: f64, y: f64, z: f64) -> Vector3<f64> {
    let p = inverse * Vector4::new(x, y, z, 1.);
    p.xyz() / p.w
}

fn ndc_depth(view_proj: &Matrix4<f64>, point: &Vector3<f64>) -> f64 {
    let clip = view_proj * point.push(1.);
    (clip.z / clip.w * 0.5 + 0.5).clamp(0., 1.)
}

#[cfg(test)]
mod tests {
    use super::RigidBodyWorld;
    use crate::physics::{BodyId, BodySpec, Frame, Link, PhysicsEngine, WorldSettings};
    use approx::assert_abs_diff_eq;
    use nalgebra::{UnitQuaternion, Vector3};

    fn world() -> (RigidBodyWorld, BodyId) {
        let mut world = RigidBodyWorld::connect(&WorldSettings {
            dt: 0.01,
            gravity: 10.,
        });
        let spec = BodySpec {
            mass: 2.,
            inertia: Vector3::new(0.1, 0.1, 0.2),
            links: vec![Vector3::new(0.5, 0., 0.)],
        };
        let id = world.spawn(&spec, Vector3::new(0., 0., 10.), UnitQuaternion::identity());
        (world, id)
    }

    #[test]
    fn free_fall() {
        let (mut world, id) = world();
        for _ in 0..10 {
            world.step();
        }
        let vel = world.base_velocity(id);
        assert_abs_diff_eq!(vel.linear.z, -1., epsilon = 1e-9);
        assert_eq!(world.contact_count(id), 0);
        assert_eq!(world.steps(), 10);
    }

    #[test]
    fn weight_is_cancelled_by_equal_thrust() {
        let (mut world, id) = world();
        for _ in 0..10 {
            world.apply_force(id, Link::Base, Vector3::new(0., 0., 20.), Frame::Link);
            world.step();
        }
        assert_abs_diff_eq!(world.base_pose(id).position.z, 10., epsilon = 1e-9);
    }

    #[test]
    fn offset_force_produces_torque() {
        let (mut world, id) = world();
        world.apply_force(id, Link::Motor(0), Vector3::new(0., 0., 1.), Frame::Link);
        world.step();
        // r x F = (0.5, 0, 0) x (0, 0, 1) = (0, -0.5, 0)
        let vel = world.base_velocity(id);
        assert!(vel.angular.y < 0.);
        assert_abs_diff_eq!(vel.angular.x, 0., epsilon = 1e-12);
    }

    #[test]
    fn ground_stops_descent_and_reports_contact() {
        let (mut world, id) = world();
        world.reset_body(id, Vector3::new(0., 0., 0.), UnitQuaternion::identity());
        world.step();
        assert_eq!(world.contact_count(id), 1);
        assert_eq!(world.base_pose(id).position.z, 0.);
        assert_eq!(world.base_velocity(id).linear.z, 0.);
    }

    #[test]
    fn overlapping_bodies_touch_and_separate() {
        let (mut world, a) = world();
        let spec = BodySpec {
            mass: 2.,
            inertia: Vector3::new(0.1, 0.1, 0.2),
            links: vec![Vector3::new(0.5, 0., 0.)],
        };
        let b = world.spawn(&spec, Vector3::new(0.2, 0., 10.), UnitQuaternion::identity());
        let far = world.spawn(&spec, Vector3::new(5., 0., 10.), UnitQuaternion::identity());

        world.step();
        assert_eq!(world.contact_count(a), 1);
        assert_eq!(world.contact_count(b), 1);
        assert_eq!(world.contact_count(far), 0);

        // Equal masses share the correction and end one diameter apart
        let gap = world.base_pose(b).position - world.base_pose(a).position;
        assert_abs_diff_eq!(gap.x, 1., epsilon = 1e-9);
        assert_abs_diff_eq!(world.base_pose(a).position.x, -0.4, epsilon = 1e-9);

        // Still resting against each other on the next tick
        world.step();
        assert_eq!(world.contact_count(a), 1);
        let gap = world.base_pose(b).position - world.base_pose(a).position;
        assert_abs_diff_eq!(gap.norm(), 1., epsilon = 1e-9);
    }

    #[test]
    fn colliding_bodies_stop_closing() {
        let (mut world, a) = world();
        let spec = BodySpec {
            mass: 2.,
            inertia: Vector3::new(0.1, 0.1, 0.2),
            links: vec![Vector3::new(0.5, 0., 0.)],
        };
        let b = world.spawn(&spec, Vector3::new(1.05, 0., 10.), UnitQuaternion::identity());

        for _ in 0..10 {
            world.apply_force(a, Link::Base, Vector3::new(20., 0., 20.), Frame::World);
            world.apply_force(b, Link::Base, Vector3::new(-20., 0., 20.), Frame::World);
            world.step();
        }
        let closing = world.base_velocity(b).linear.x - world.base_velocity(a).linear.x;
        assert!(closing >= -1e-9);
        assert_eq!(world.contact_count(a), 1);
    }
}
