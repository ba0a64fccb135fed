//! Small fixed size vector and matrix helpers over `[f64; 3]` arrays.

/// Compute the dot product of two 3D vectors.
#[inline]
pub fn dot_product3(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

/// Compute the cross product of two 3D vectors.
#[inline]
pub fn cross_vec3(a: &[f64; 3], b: &[f64; 3]) -> [f64; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

/// Compute the euclidean norm of a 3D vector.
#[inline]
pub fn norm3(a: &[f64; 3]) -> f64 {
    dot_product3(a, a).sqrt()
}

/// Normalize a 3D vector.
///
/// Returns `None` when the vector is too close to zero to define a direction.
pub fn normalize3(a: &[f64; 3]) -> Option<[f64; 3]> {
    let magnitude = norm3(a);
    if magnitude < 1e-12 {
        return None;
    }
    Some(scale3(a, 1.0 / magnitude))
}

/// Component-wise `a - b`.
#[inline]
pub fn sub3(a: &[f64; 3], b: &[f64; 3]) -> [f64; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

/// Component-wise `a + b`.
#[inline]
pub fn add3(a: &[f64; 3], b: &[f64; 3]) -> [f64; 3] {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

/// Multiply a 3D vector by a scalar.
#[inline]
pub fn scale3(a: &[f64; 3], s: f64) -> [f64; 3] {
    [a[0] * s, a[1] * s, a[2] * s]
}

/// Euclidean distance between two points.
pub fn euclidean_distance(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    norm3(&sub3(a, b))
}

/// Multiply a 3x3 matrix (row-major) by a 3D vector.
pub fn mat33_mul_vec3(m: &[[f64; 3]; 3], v: &[f64; 3]) -> [f64; 3] {
    [
        dot_product3(&m[0], v),
        dot_product3(&m[1], v),
        dot_product3(&m[2], v),
    ]
}

/// Build a 3x3 matrix from its three columns.
pub fn mat33_from_cols(c0: &[f64; 3], c1: &[f64; 3], c2: &[f64; 3]) -> [[f64; 3]; 3] {
    [
        [c0[0], c1[0], c2[0]],
        [c0[1], c1[1], c2[1]],
        [c0[2], c1[2], c2[2]],
    ]
}

/// Extract the column `j` of a 3x3 matrix.
pub fn mat33_col(m: &[[f64; 3]; 3], j: usize) -> [f64; 3] {
    [m[0][j], m[1][j], m[2][j]]
}

/// Determinant of a 3x3 matrix.
pub fn det_mat33(m: &[[f64; 3]; 3]) -> f64 {
    dot_product3(&m[0], &cross_vec3(&m[1], &m[2]))
}

/// Compute the centroid of a set of points.
///
/// Returns the origin for an empty set.
pub fn centroid3(points: &[[f64; 3]]) -> [f64; 3] {
    if points.is_empty() {
        return [0.0; 3];
    }
    let sum = points.iter().fold([0.0; 3], |acc, p| add3(&acc, p));
    scale3(&sum, 1.0 / points.len() as f64)
}
