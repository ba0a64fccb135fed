use serde::{Deserialize, Serialize};

use crate::linalg;

/// The intrinsic parameters of a pinhole camera without lens distortion.
///
/// Pixels are assumed to be already undistorted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PinholeCamera {
    /// The focal length in pixels along x.
    pub fx: f64,
    /// The focal length in pixels along y.
    pub fy: f64,
    /// The principal point x coordinate in pixels.
    pub cx: f64,
    /// The principal point y coordinate in pixels.
    pub cy: f64,
}

impl Default for PinholeCamera {
    fn default() -> Self {
        Self {
            fx: 1430.0,
            fy: 1430.0,
            cx: 480.0,
            cy: 620.0,
        }
    }
}

impl PinholeCamera {
    /// Create a new camera from its focal lengths and principal point.
    pub fn new(fx: f64, fy: f64, cx: f64, cy: f64) -> Self {
        Self { fx, fy, cx, cy }
    }

    /// Project a 3D point in camera coordinates to pixel coordinates.
    ///
    /// Returns `None` for points on or behind the image plane.
    pub fn project(&self, point: &[f64; 3]) -> Option<[f64; 2]> {
        if point[2] <= 0.0 {
            return None;
        }
        let inv_z = 1.0 / point[2];
        Some([
            self.fx * point[0] * inv_z + self.cx,
            self.fy * point[1] * inv_z + self.cy,
        ])
    }

    /// The viewing ray through a pixel, scaled so that its z component is 1.
    pub fn ray(&self, pixel: &[f64; 2]) -> [f64; 3] {
        [
            (pixel[0] - self.cx) / self.fx,
            (pixel[1] - self.cy) / self.fy,
            1.0,
        ]
    }

    /// Intersect the viewing ray of a pixel with the plane `normal · X = distance`.
    ///
    /// Returns `None` when the ray is parallel to the plane or hits it behind the camera.
    pub fn intersect_plane(
        &self,
        pixel: &[f64; 2],
        distance: f64,
        normal: &[f64; 3],
    ) -> Option<[f64; 3]> {
        let ray = self.ray(pixel);
        let denom = linalg::dot_product3(normal, &ray);
        if denom.abs() < 1e-12 {
            return None;
        }
        let t = distance / denom;
        if t <= 0.0 {
            return None;
        }
        Some(linalg::scale3(&ray, t))
    }

    /// Back-project a set of pixels onto the plane `normal · X = distance`.
    ///
    /// Pixels whose ray misses the plane are skipped.
    pub fn unproject_to_plane(
        &self,
        pixels: &[[f64; 2]],
        distance: f64,
        normal: &[f64; 3],
    ) -> Vec<[f64; 3]> {
        pixels
            .iter()
            .filter_map(|pixel| self.intersect_plane(pixel, distance, normal))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_project_points() {
        let camera = PinholeCamera::new(500.0, 500.0, 320.0, 240.0);

        let center = camera.project(&[0.0, 0.0, 5.0]).unwrap();
        assert_relative_eq!(center[0], 320.0);
        assert_relative_eq!(center[1], 240.0);

        let p = camera.project(&[1.0, 2.0, 10.0]).unwrap();
        assert_relative_eq!(p[0], 500.0 * 1.0 / 10.0 + 320.0);
        assert_relative_eq!(p[1], 500.0 * 2.0 / 10.0 + 240.0);

        assert!(camera.project(&[0.0, 0.0, -5.0]).is_none());
    }

    #[test]
    fn test_unproject_roundtrip() {
        let camera = PinholeCamera::new(1430.0, 1430.0, 480.0, 620.0);
        let normal = linalg::normalize3(&[0.2, -0.1, 1.0]).unwrap();
        let point = [12.0, -30.0, 310.0];
        let distance = linalg::dot_product3(&normal, &point);

        let pixel = camera.project(&point).unwrap();
        let back = camera.intersect_plane(&pixel, distance, &normal).unwrap();
        for k in 0..3 {
            assert_relative_eq!(back[k], point[k], epsilon = 1e-9);
        }
    }

    #[test]
    fn test_unproject_rejects_behind_and_parallel() {
        let camera = PinholeCamera::default();
        // plane z = -100 lies behind the camera
        assert!(camera
            .intersect_plane(&[480.0, 620.0], -100.0, &[0.0, 0.0, 1.0])
            .is_none());
        // plane x = 10 is parallel to the optical axis ray
        assert!(camera
            .intersect_plane(&[480.0, 620.0], 10.0, &[1.0, 0.0, 0.0])
            .is_none());

        let points = camera.unproject_to_plane(
            &[[480.0, 620.0], [500.0, 600.0]],
            300.0,
            &[0.0, 0.0, 1.0],
        );
        assert_eq!(points.len(), 2);
        assert_relative_eq!(points[0][2], 300.0);
    }
}
