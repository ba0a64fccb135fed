use crate::linalg;

/// Compute the rotation matrix from an axis and angle (Rodrigues formula).
///
/// # Arguments
///
/// * `axis` - The axis of rotation. It does not need to be normalized.
/// * `angle` - The angle of rotation in radians.
///
/// # Returns
///
/// The row-major rotation matrix, or an error for a zero axis.
///
/// Example:
///
/// ```
/// use lasercal_3d::transforms::axis_angle_to_rotation_matrix;
///
/// let rotation = axis_angle_to_rotation_matrix(&[0.0, 0.0, 1.0], 0.0).unwrap();
/// assert_eq!(rotation, [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]);
/// ```
pub fn axis_angle_to_rotation_matrix(
    axis: &[f64; 3],
    angle: f64,
) -> Result<[[f64; 3]; 3], &'static str> {
    let k = linalg::normalize3(axis).ok_or("cannot compute rotation matrix from a zero vector")?;

    let (s, c) = angle.sin_cos();
    let t = 1.0 - c;

    // R = c * I + s * [k]x + t * k k^T
    let mut rotation = [[0.0; 3]; 3];
    for (i, row) in rotation.iter_mut().enumerate() {
        for (j, val) in row.iter_mut().enumerate() {
            *val = t * k[i] * k[j] + if i == j { c } else { 0.0 };
        }
    }
    rotation[0][1] -= s * k[2];
    rotation[0][2] += s * k[1];
    rotation[1][0] += s * k[2];
    rotation[1][2] -= s * k[0];
    rotation[2][0] -= s * k[1];
    rotation[2][1] += s * k[0];

    Ok(rotation)
}

/// Rotate a point about an axis passing through `pivot`.
///
/// PRECONDITION: `rotation` is a proper rotation matrix.
pub fn rotate_about_pivot(
    point: &[f64; 3],
    pivot: &[f64; 3],
    rotation: &[[f64; 3]; 3],
) -> [f64; 3] {
    let local = linalg::sub3(point, pivot);
    linalg::add3(pivot, &linalg::mat33_mul_vec3(rotation, &local))
}
