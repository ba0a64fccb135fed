use serde::{Deserialize, Serialize};

use super::FitError;
use crate::{linalg, utils};

/// A circle embedded in 3D space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Circle {
    /// The center of the circle.
    pub center: [f64; 3],
    /// Rotation whose columns are the two in-plane axes and the plane normal.
    ///
    /// It maps coordinates in the circle frame to the frame of the input points.
    pub rotation: [[f64; 3]; 3],
    /// The radius of the circle.
    pub radius: f64,
}

/// Build an orthonormal basis `(s, r)` of the plane with the given unit normal.
///
/// `s = x̂ × n` (or `ŷ × n` when the normal is aligned with x) and `r = n × s`,
/// so that `[s, r, n]` is a right handed frame.
pub fn plane_basis(normal: &[f64; 3]) -> Result<([f64; 3], [f64; 3]), FitError> {
    let s = linalg::normalize3(&linalg::cross_vec3(&[1.0, 0.0, 0.0], normal))
        .or_else(|| linalg::normalize3(&linalg::cross_vec3(&[0.0, 1.0, 0.0], normal)))
        .ok_or(FitError::Degenerate("null plane normal"))?;
    let r = linalg::normalize3(&linalg::cross_vec3(normal, &s))
        .ok_or(FitError::Degenerate("null plane normal"))?;
    Ok((s, r))
}

/// Fit a circle constrained to lie in the plane through `point` with `normal`.
///
/// The points are expressed in the in-plane 2D frame of the plane, normalized for
/// conditioning, and fitted with the algebraic model
/// `a (x² + y²) + b x + c y + d = 0`, solved as the null vector of the 4x4 scatter
/// matrix. Out of plane components of the points are ignored.
///
/// # Arguments
///
/// * `point` - A point on the plane.
/// * `normal` - The plane normal, it does not need to be normalized.
/// * `points` - At least 3 non-collinear points.
pub fn fit_circle_in_plane(
    point: &[f64; 3],
    normal: &[f64; 3],
    points: &[[f64; 3]],
) -> Result<Circle, FitError> {
    if points.len() < 3 {
        return Err(FitError::InsufficientPoints {
            required: 3,
            actual: points.len(),
        });
    }

    let normal = linalg::normalize3(normal).ok_or(FitError::Degenerate("null plane normal"))?;
    let (s, r) = plane_basis(&normal)?;

    // in-plane coordinates
    let local = points
        .iter()
        .map(|p| {
            let d = linalg::sub3(p, point);
            [linalg::dot_product3(&d, &s), linalg::dot_product3(&d, &r)]
        })
        .collect::<Vec<_>>();

    // center on the mean and scale to unit rms radius
    let n = local.len() as f64;
    let mean_u = local.iter().map(|q| q[0]).sum::<f64>() / n;
    let mean_v = local.iter().map(|q| q[1]).sum::<f64>() / n;
    let rms = (local
        .iter()
        .map(|q| (q[0] - mean_u).powi(2) + (q[1] - mean_v).powi(2))
        .sum::<f64>()
        / n)
        .sqrt();
    if rms < 1e-12 {
        return Err(FitError::Degenerate("coincident points"));
    }
    let scale = 1.0 / rms;

    // scatter matrix M = Σ z z^T with z = [x² + y², x, y, 1]
    let mut scatter = faer::Mat::<f64>::zeros(4, 4);
    for q in &local {
        let x = (q[0] - mean_u) * scale;
        let y = (q[1] - mean_v) * scale;
        let z = [x * x + y * y, x, y, 1.0];
        for i in 0..4 {
            for j in 0..4 {
                scatter.write(i, j, scatter.read(i, j) + z[i] * z[j]);
            }
        }
    }

    let svd = scatter.svd();
    let [a, b, c, d] = utils::faer_col_to_array4(svd.v(), 3);

    let magnitude = a.abs().max(b.abs()).max(c.abs()).max(d.abs());
    if a.abs() < 1e-9 * magnitude {
        return Err(FitError::Degenerate("collinear points"));
    }

    let cx = -b / (2.0 * a);
    let cy = -c / (2.0 * a);
    let radius_sq = cx * cx + cy * cy - d / a;
    if radius_sq <= 0.0 {
        return Err(FitError::Degenerate("imaginary circle"));
    }

    // undo the normalization
    let center_u = cx * rms + mean_u;
    let center_v = cy * rms + mean_v;
    let radius = radius_sq.sqrt() * rms;

    let center = linalg::add3(
        point,
        &linalg::add3(&linalg::scale3(&s, center_u), &linalg::scale3(&r, center_v)),
    );

    Ok(Circle {
        center,
        rotation: linalg::mat33_from_cols(&s, &r, &normal),
        radius,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_fit_circle_horizontal() -> Result<(), Box<dyn std::error::Error>> {
        let center = [-5.0, 70.0, 320.0];
        let radius = 50.0;
        // points on an arc of the circle y = 70, normal (0, -1, 0)
        let points = (0..12)
            .map(|i| {
                let theta = (-33.0 + 6.0 * i as f64).to_radians();
                [
                    center[0] - radius * theta.cos(),
                    center[1],
                    center[2] - radius * theta.sin(),
                ]
            })
            .collect::<Vec<_>>();

        let circle = fit_circle_in_plane(&points[0], &[0.0, -1.0, 0.0], &points)?;

        assert_relative_eq!(circle.radius, radius, epsilon = 1e-6);
        for k in 0..3 {
            assert_relative_eq!(circle.center[k], center[k], epsilon = 1e-6);
        }
        assert_relative_eq!(linalg::det_mat33(&circle.rotation), 1.0, epsilon = 1e-12);
        assert_eq!(linalg::mat33_col(&circle.rotation, 2), [0.0, -1.0, 0.0]);
        Ok(())
    }

    #[test]
    fn test_fit_circle_tilted_plane() -> Result<(), Box<dyn std::error::Error>> {
        let normal = linalg::normalize3(&[0.3, -1.0, 0.2]).ok_or("zero normal")?;
        let (s, r) = plane_basis(&normal)?;
        let center = [10.0, 20.0, 300.0];
        let points = (0..8)
            .map(|i| {
                let theta = i as f64 * std::f64::consts::TAU / 8.0;
                linalg::add3(
                    &center,
                    &linalg::add3(
                        &linalg::scale3(&s, 25.0 * theta.cos()),
                        &linalg::scale3(&r, 25.0 * theta.sin()),
                    ),
                )
            })
            .collect::<Vec<_>>();

        let circle = fit_circle_in_plane(&center, &normal, &points)?;
        assert_relative_eq!(circle.radius, 25.0, epsilon = 1e-9);
        for k in 0..3 {
            assert_relative_eq!(circle.center[k], center[k], epsilon = 1e-9);
        }
        Ok(())
    }

    #[test]
    fn test_fit_circle_degenerate() {
        let line = vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [2.0, 0.0, 0.0], [3.0, 0.0, 0.0]];
        assert!(matches!(
            fit_circle_in_plane(&line[0], &[0.0, 1.0, 0.0], &line),
            Err(FitError::Degenerate(_))
        ));
        assert!(matches!(
            fit_circle_in_plane(&[0.0; 3], &[0.0, 1.0, 0.0], &line[..2]),
            Err(FitError::InsufficientPoints { .. })
        ));
    }

    #[test]
    fn test_plane_basis_orthonormal() -> Result<(), Box<dyn std::error::Error>> {
        for normal in [[0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]] {
            let (s, r) = plane_basis(&normal)?;
            assert_relative_eq!(linalg::norm3(&s), 1.0, epsilon = 1e-12);
            assert_relative_eq!(linalg::dot_product3(&s, &r), 0.0, epsilon = 1e-12);
            assert_relative_eq!(linalg::dot_product3(&s, &normal), 0.0, epsilon = 1e-12);
            assert_eq!(linalg::cross_vec3(&s, &r), normal);
        }
        Ok(())
    }
}
