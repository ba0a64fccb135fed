use lasercal_3d::camera::PinholeCamera;
use serde::{Deserialize, Serialize};

use crate::error::DeviceError;

/// Identifies one of the two lasers of the scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LaserIndex {
    /// The laser with index 0.
    Left,
    /// The laser with index 1.
    Right,
}

impl LaserIndex {
    /// Both lasers in index order.
    pub const ALL: [LaserIndex; 2] = [LaserIndex::Left, LaserIndex::Right];

    /// The stable numeric index of the laser.
    pub fn index(self) -> usize {
        match self {
            LaserIndex::Left => 0,
            LaserIndex::Right => 1,
        }
    }
}

impl std::fmt::Display for LaserIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.index())
    }
}

/// The pose of the calibration pattern in camera coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PatternPose {
    /// Rotation from the pattern frame to the camera frame.
    pub rotation: [[f64; 3]; 3],
    /// Position of the first pattern corner in the camera frame.
    pub translation: [f64; 3],
}

/// The plane of the pattern, `normal · X = distance`, and its image corners.
#[derive(Debug, Clone, PartialEq)]
pub struct PatternPlane {
    /// Distance of the plane from the camera center.
    pub distance: f64,
    /// Unit normal of the plane.
    pub normal: [f64; 3],
    /// Inner corners in pixels, row-major.
    pub corners: Vec<[f64; 2]>,
}

/// The camera and the laser board.
pub trait CameraDriver {
    /// The image type delivered by the camera.
    type Image;

    /// Turn the live preview on or off.
    fn set_streaming(&mut self, enabled: bool);

    /// Capture an image of the pattern with the lasers off.
    fn capture_pattern(&mut self) -> Result<Self::Image, DeviceError>;

    /// Capture an image with only the given laser on.
    fn capture_laser(&mut self, laser: LaserIndex) -> Result<Self::Image, DeviceError>;
}

/// Chessboard detection.
pub trait PatternDetector<I> {
    /// Detect the pattern pose. `None` when the pattern is not visible.
    fn detect_pose(&mut self, image: &I) -> Option<PatternPose>;

    /// Compute the pattern plane and corners for a detected pose.
    fn detect_pattern_plane(&mut self, pose: &PatternPose) -> Option<PatternPlane>;

    /// Keep only the region of the image covered by the pattern.
    fn pattern_mask(&mut self, image: I, corners: &[[f64; 2]]) -> I;
}

/// Laser line segmentation.
pub trait LaserSegmenter<I> {
    /// Extract the pixels lit by the laser.
    fn compute_2d_points(&mut self, image: &I) -> Vec<[f64; 2]>;
}

/// Back-projection of pixels onto a plane known in camera coordinates.
pub trait PointCloudGenerator {
    /// Intersect the rays of `pixels` with the plane `normal · X = distance`.
    ///
    /// Returns `None` when no ray reaches the plane.
    fn compute_camera_point_cloud(
        &self,
        pixels: &[[f64; 2]],
        distance: f64,
        normal: &[f64; 3],
    ) -> Option<Vec<[f64; 3]>>;
}

impl PointCloudGenerator for PinholeCamera {
    fn compute_camera_point_cloud(
        &self,
        pixels: &[[f64; 2]],
        distance: f64,
        normal: &[f64; 3],
    ) -> Option<Vec<[f64; 3]>> {
        let points = self.unproject_to_plane(pixels, distance, normal);
        if points.is_empty() && !pixels.is_empty() {
            return None;
        }
        Some(points)
    }
}

/// The rotating platform motor.
pub trait PlatformDriver {
    /// Power the motor.
    fn enable(&mut self) -> Result<(), DeviceError>;

    /// Rotate by `degrees` relative to the current position. Blocks until done.
    fn rotate(&mut self, degrees: f64) -> Result<(), DeviceError>;

    /// Release the motor.
    fn disable(&mut self) -> Result<(), DeviceError>;
}

/// The collaborators used to extract samples at each step.
pub struct Collaborators<'a, I> {
    /// The camera and laser board.
    pub camera: &'a mut dyn CameraDriver<Image = I>,
    /// The pattern detector.
    pub detector: &'a mut dyn PatternDetector<I>,
    /// The laser segmenter.
    pub segmenter: &'a mut dyn LaserSegmenter<I>,
    /// The back-projection onto the pattern plane.
    pub generator: &'a dyn PointCloudGenerator,
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_laser_index() {
        assert_eq!(LaserIndex::ALL.map(LaserIndex::index), [0, 1]);
        assert_eq!(LaserIndex::Right.to_string(), "1");
    }

    #[test]
    fn test_pinhole_point_cloud() -> Result<(), Box<dyn std::error::Error>> {
        let camera = PinholeCamera::default();
        let pixels = [[480.0, 620.0], [623.0, 763.0]];
        let points = camera
            .compute_camera_point_cloud(&pixels, 300.0, &[0.0, 0.0, 1.0])
            .ok_or("missed plane")?;
        assert_eq!(points.len(), 2);
        assert_eq!(points[0], [0.0, 0.0, 300.0]);
        assert_relative_eq!(points[1][0], 30.0, epsilon = 1e-9);
        assert_relative_eq!(points[1][1], 30.0, epsilon = 1e-9);

        // plane behind the camera
        assert!(camera
            .compute_camera_point_cloud(&pixels, -300.0, &[0.0, 0.0, 1.0])
            .is_none());
        assert_eq!(
            camera.compute_camera_point_cloud(&[], 300.0, &[0.0, 0.0, 1.0]),
            Some(vec![])
        );
        Ok(())
    }
}
