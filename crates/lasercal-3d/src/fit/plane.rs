use serde::{Deserialize, Serialize};

use super::FitError;
use crate::{linalg, utils};

/// A plane described by a point on it and its unit normal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Plane {
    /// A point on the plane. For fitted planes this is the centroid of the input.
    pub point: [f64; 3],
    /// The unit normal of the plane.
    pub normal: [f64; 3],
}

impl Plane {
    /// Signed distance from the origin, such that `normal · X = distance` on the plane.
    pub fn distance(&self) -> f64 {
        linalg::dot_product3(&self.normal, &self.point)
    }

    /// Signed distance of a point to the plane, positive on the normal side.
    pub fn signed_distance(&self, p: &[f64; 3]) -> f64 {
        linalg::dot_product3(&self.normal, &linalg::sub3(p, &self.point))
    }

    /// The same plane with the opposite normal orientation.
    pub fn flipped(&self) -> Self {
        Self {
            point: self.point,
            normal: linalg::scale3(&self.normal, -1.0),
        }
    }
}

/// Fit a plane to a set of 3D points in the total least squares sense.
///
/// The normal is the right singular vector associated to the smallest singular
/// value of the covariance of the centered points. Its orientation is left to the
/// decomposition, callers that need a convention must apply it.
///
/// # Arguments
///
/// * `points` - At least 3 non-collinear points.
///
/// # Returns
///
/// The fitted plane passing through the centroid of the points.
pub fn fit_plane(points: &[[f64; 3]]) -> Result<Plane, FitError> {
    if points.len() < 3 {
        return Err(FitError::InsufficientPoints {
            required: 3,
            actual: points.len(),
        });
    }

    let centroid = linalg::centroid3(points);

    // covariance C = Σ (p - c)(p - c)^T
    let mut cov = [[0.0; 3]; 3];
    for p in points {
        let d = linalg::sub3(p, &centroid);
        for (i, row) in cov.iter_mut().enumerate() {
            for (j, val) in row.iter_mut().enumerate() {
                *val += d[i] * d[j];
            }
        }
    }

    let svd = utils::array33_to_faer_mat(&cov).svd();
    let singular = svd.s_diagonal();
    let (s0, s1) = (singular.read(0), singular.read(1));

    if s0 < 1e-12 {
        return Err(FitError::Degenerate("coincident points"));
    }
    if s1 < s0 * 1e-12 {
        return Err(FitError::Degenerate("collinear points"));
    }

    let normal = linalg::normalize3(&utils::faer_col_to_array3(svd.v(), 2))
        .ok_or(FitError::Degenerate("null plane normal"))?;

    Ok(Plane {
        point: centroid,
        normal,
    })
}

/// Standard deviation of the signed point-to-plane distances.
///
/// Returns zero for an empty set.
pub fn residual_std(plane: &Plane, points: &[[f64; 3]]) -> f64 {
    if points.is_empty() {
        return 0.0;
    }
    let n = points.len() as f64;
    let distances = points
        .iter()
        .map(|p| plane.signed_distance(p))
        .collect::<Vec<_>>();
    let mean = distances.iter().sum::<f64>() / n;
    (distances.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / n).sqrt()
}
