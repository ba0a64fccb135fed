use rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::{fit_plane, residual_std, FitError};
use crate::linalg;

/// A laser plane `normal · X = distance` in camera coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LaserPlane {
    /// Distance from the camera center to the plane.
    pub distance: f64,
    /// Unit normal of the plane, oriented away from the camera (z >= 0).
    pub normal: [f64; 3],
    /// Standard deviation of the point-to-plane distances of every input point.
    pub std: f64,
}

/// Parameters for the RANSAC stage of the laser plane fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RansacParams {
    /// Maximum number of hypotheses to evaluate.
    pub max_iterations: usize,
    /// Point-to-plane distance below which a point supports a hypothesis.
    pub inlier_threshold: f64,
    /// Desired probability that at least one sample set is outlier-free.
    pub confidence: f64,
    /// Optional fixed seed for reproducible sampling.
    pub random_seed: Option<u64>,
}

impl Default for RansacParams {
    fn default() -> Self {
        Self {
            max_iterations: 500,
            inlier_threshold: 0.5,
            confidence: 0.99,
            random_seed: None,
        }
    }
}

/// Parameters of the laser plane fit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LaserPlaneParams {
    /// Robust outlier rejection for the plane estimate. With `None`, the default,
    /// every point is used in the fit.
    pub ransac: Option<RansacParams>,
}

/// Fit a laser plane to the points triangulated for one laser.
///
/// Outliers are rejected with RANSAC over 3-point hypotheses when enabled, then the
/// plane is refitted on the inliers in the total least squares sense. The normal is
/// oriented so that its z component is non-negative and `distance = normal · centroid`.
/// The residual std is measured over all `points`, rejected ones included, so it
/// reflects the scatter of the whole cloud.
///
/// # Arguments
///
/// * `points` - The point cloud of one laser in camera coordinates.
/// * `params` - The fitting parameters.
pub fn fit_laser_plane(
    points: &[[f64; 3]],
    params: &LaserPlaneParams,
) -> Result<LaserPlane, FitError> {
    if points.len() < 3 {
        return Err(FitError::InsufficientPoints {
            required: 3,
            actual: points.len(),
        });
    }

    let inliers = match &params.ransac {
        Some(ransac) => ransac_plane_inliers(points, ransac)?,
        None => points.to_vec(),
    };

    let mut plane = fit_plane(&inliers)?;
    if plane.normal[2] < 0.0 {
        plane = plane.flipped();
    }

    Ok(LaserPlane {
        distance: plane.distance(),
        normal: plane.normal,
        std: residual_std(&plane, points),
    })
}

fn ransac_plane_inliers(
    points: &[[f64; 3]],
    params: &RansacParams,
) -> Result<Vec<[f64; 3]>, FitError> {
    const SAMPLE_SIZE: usize = 3;

    let mut rng = match params.random_seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    let n = points.len();
    let mut best_inliers: Vec<usize> = Vec::new();
    let mut required_iterations = params.max_iterations;
    let mut iteration = 0;

    while iteration < required_iterations {
        iteration += 1;

        let sample = rand::seq::index::sample(&mut rng, n, SAMPLE_SIZE);
        let (a, b, c) = (
            points[sample.index(0)],
            points[sample.index(1)],
            points[sample.index(2)],
        );

        let Some(normal) = linalg::normalize3(&linalg::cross_vec3(
            &linalg::sub3(&b, &a),
            &linalg::sub3(&c, &a),
        )) else {
            continue;
        };
        let distance = linalg::dot_product3(&normal, &a);

        let inliers = (0..n)
            .filter(|&i| {
                (linalg::dot_product3(&normal, &points[i]) - distance).abs()
                    < params.inlier_threshold
            })
            .collect::<Vec<_>>();

        if inliers.len() > best_inliers.len() {
            best_inliers = inliers;
            let ratio = best_inliers.len() as f64 / n as f64;
            required_iterations = required_iterations.min(adaptive_iterations(
                params.confidence,
                ratio,
                SAMPLE_SIZE,
                params.max_iterations,
            ));
        }
    }

    if best_inliers.len() < SAMPLE_SIZE {
        return Err(FitError::NoConsensus {
            inliers: best_inliers.len(),
        });
    }

    Ok(best_inliers.into_iter().map(|i| points[i]).collect())
}

// number of draws needed to pick one outlier-free sample with the given confidence
fn adaptive_iterations(
    confidence: f64,
    inlier_ratio: f64,
    sample_size: usize,
    max_iterations: usize,
) -> usize {
    let outlier_free = inlier_ratio.powi(sample_size as i32);
    let log_denom = (1.0 - outlier_free).max(1e-12).ln();
    if log_denom >= 0.0 {
        return max_iterations;
    }
    let estimate = ((1.0 - confidence).max(1e-12).ln() / log_denom).ceil();
    if estimate.is_finite() && estimate >= 1.0 {
        (estimate as usize).min(max_iterations)
    } else {
        max_iterations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::Rng;

    fn laser_points(noise: f64, seed: u64) -> Vec<[f64; 3]> {
        // plane x = 0.3 z - 90, i.e. normal ∝ (-1, 0, 0.3)
        let mut rng = StdRng::seed_from_u64(seed);
        let mut points = Vec::new();
        for i in 0..40 {
            for j in 0..5 {
                let z = 280.0 + j as f64 * 10.0;
                let y = -20.0 + i as f64 * 2.0;
                let x = 0.3 * z - 90.0 + rng.random_range(-noise..=noise);
                points.push([x, y, z]);
            }
        }
        points
    }

    #[test]
    fn test_fit_laser_plane_orientation() -> Result<(), Box<dyn std::error::Error>> {
        let points = laser_points(0.0, 0);
        let plane = fit_laser_plane(&points, &LaserPlaneParams { ransac: None })?;

        let expected = linalg::normalize3(&[-1.0, 0.0, 0.3]).ok_or("zero normal")?;
        for k in 0..3 {
            assert_relative_eq!(plane.normal[k], expected[k], epsilon = 1e-9);
        }
        // the plane contains (-90, 0, 0)
        assert_relative_eq!(plane.distance, 90.0 * -expected[0], epsilon = 1e-6);
        assert!(plane.normal[2] >= 0.0);
        assert!(plane.std < 1e-9);
        Ok(())
    }

    #[test]
    fn test_fit_laser_plane_rejects_reflections() -> Result<(), Box<dyn std::error::Error>> {
        let mut points = laser_points(0.05, 1);
        // spurious reflections far from the laser plane
        for i in 0..20 {
            points.push([40.0 + i as f64, 60.0, 350.0 - i as f64 * 3.0]);
        }

        let robust = fit_laser_plane(
            &points,
            &LaserPlaneParams {
                ransac: Some(RansacParams {
                    random_seed: Some(42),
                    ..Default::default()
                }),
            },
        )?;
        let plain = fit_laser_plane(&points, &LaserPlaneParams { ransac: None })?;

        // the robust estimate ignores the reflections, the residual std does not
        let expected = linalg::normalize3(&[-1.0, 0.0, 0.3]).ok_or("zero normal")?;
        assert!(linalg::dot_product3(&robust.normal, &expected) > 0.9999);
        assert!(
            linalg::dot_product3(&robust.normal, &expected)
                > linalg::dot_product3(&plain.normal, &expected)
        );
        assert!(robust.std > 0.1, "robust std {}", robust.std);
        Ok(())
    }

    #[test]
    fn test_fit_laser_plane_std_of_scattered_points() -> Result<(), Box<dyn std::error::Error>> {
        // points alternating ±15 around z = 300
        let mut points = Vec::new();
        for i in -5..5 {
            for j in -5..5 {
                let offset = if (i + j) % 2 == 0 { 15.0 } else { -15.0 };
                points.push([i as f64 * 10.0, j as f64 * 10.0, 300.0 + offset]);
            }
        }
        let plane = fit_laser_plane(&points, &LaserPlaneParams { ransac: None })?;
        assert_relative_eq!(plane.std, 15.0, epsilon = 1e-6);
        assert_relative_eq!(plane.distance, 300.0, epsilon = 1e-6);
        Ok(())
    }

    #[test]
    fn test_fit_laser_plane_ransac_reports_scatter() -> Result<(), Box<dyn std::error::Error>> {
        // two sheets 30 apart: RANSAC locks onto one of them
        let mut points = Vec::new();
        for i in -5..5 {
            for j in -5..5 {
                let offset = if (i + j) % 2 == 0 { 15.0 } else { -15.0 };
                points.push([i as f64 * 10.0, j as f64 * 10.0, 300.0 + offset]);
            }
        }
        let params = LaserPlaneParams {
            ransac: Some(RansacParams {
                random_seed: Some(7),
                ..Default::default()
            }),
        };
        let plane = fit_laser_plane(&points, &params)?;
        assert_relative_eq!(plane.normal[2], 1.0, epsilon = 1e-9);
        assert_relative_eq!(plane.std, 15.0, epsilon = 1e-6);
        Ok(())
    }

    #[test]
    fn test_fit_laser_plane_default_is_least_squares() {
        assert_eq!(LaserPlaneParams::default().ransac, None);
    }

    #[test]
    fn test_fit_laser_plane_insufficient() {
        assert_eq!(
            fit_laser_plane(&[], &LaserPlaneParams::default()),
            Err(FitError::InsufficientPoints {
                required: 3,
                actual: 0
            })
        );
    }

    #[test]
    fn test_adaptive_iterations() {
        assert_eq!(adaptive_iterations(0.99, 1.0, 3, 500), 1);
        assert_eq!(adaptive_iterations(0.99, 0.0, 3, 500), 500);
        let half = adaptive_iterations(0.99, 0.5, 3, 500);
        assert!(half > 1 && half < 500);
    }
}
