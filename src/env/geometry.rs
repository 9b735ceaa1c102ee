use nalgebra::{Matrix3, Vector3};

/// Rotation matrix `Rz * Ry * Rx` and unit forward vector for each
/// `(roll, pitch, yaw)` orientation.
pub fn compute_rotation_forward(orientations: &[Vector3<f64>]) -> Vec<(Matrix3<f64>, Vector3<f64>)> {
    orientations
        .iter()
        .map(|orn| {
            let (sr, cr) = orn.x.sin_cos();
            let (sp, cp) = orn.y.sin_cos();
            let (sy, cy) = orn.z.sin_cos();

            #[rustfmt::skip]
            let rx = Matrix3::new(
                1., 0.,  0.,
                0., cr, -sr,
                0., sr,  cr,
            );
            #[rustfmt::skip]
            let ry = Matrix3::new(
                 cp, 0., sp,
                 0., 1., 0.,
                -sp, 0., cp,
            );
            #[rustfmt::skip]
            let rz = Matrix3::new(
                cy, -sy, 0.,
                sy,  cy, 0.,
                0.,  0., 1.,
            );

            (rz * ry * rx, Vector3::new(cy * cp, sy * cp, -sp))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::compute_rotation_forward;
    use approx::assert_abs_diff_eq;
    use nalgebra::{Rotation3, Vector3};

    #[test]
    fn matches_intrinsic_zyx_rotation() {
        let orientations = [
            Vector3::zeros(),
            Vector3::new(0.3, -0.2, 1.1),
            Vector3::new(-1., 0.7, -2.5),
        ];
        for ((rotation, forward), orn) in compute_rotation_forward(&orientations)
            .into_iter()
            .zip(orientations)
        {
            let expected = Rotation3::from_euler_angles(orn.x, orn.y, orn.z);
            assert_abs_diff_eq!(rotation, *expected.matrix(), epsilon = 1e-12);
            assert_abs_diff_eq!(forward, rotation * Vector3::x(), epsilon = 1e-12);
            assert_abs_diff_eq!(forward.norm(), 1., epsilon = 1e-12);
        }
    }

    #[test]
    fn empty_batch() {
        assert!(compute_rotation_forward(&[]).is_empty());
    }
}
