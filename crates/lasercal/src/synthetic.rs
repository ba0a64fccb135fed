//! A simulated scanner for tests and demos.
//!
//! The scene is a chessboard standing on a platform that rotates about a vertical
//! axis, seen by a pinhole camera, with two laser planes containing the platform axis.
//! Camera, platform, detector and segmenter share the platform angle, so the images
//! captured after a rotation show the pattern at the new angle.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use lasercal_3d::{camera::PinholeCamera, linalg, transforms};
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::collaborators::{
    CameraDriver, Collaborators, LaserIndex, LaserSegmenter, PatternDetector, PatternPlane,
    PatternPose, PlatformDriver,
};
use crate::commit::LaserPlaneRecord;
use crate::error::DeviceError;

const IDENTITY: [[f64; 3]; 3] = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];

/// The geometry of the simulated scanner, in millimeters and camera coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticScene {
    /// The camera intrinsics.
    pub camera: PinholeCamera,
    /// Number of inner corner rows of the pattern.
    pub rows: usize,
    /// Number of inner corner columns of the pattern.
    pub columns: usize,
    /// Side of a pattern square.
    pub square_width: f64,
    /// Center of the platform surface.
    pub platform_center: [f64; 3],
    /// Unit rotation axis of the platform, pointing up.
    pub platform_axis: [f64; 3],
    /// Height of the pattern origin corner above the platform.
    pub origin_distance: f64,
    /// Horizontal offset of the origin corner from the axis at angle zero.
    pub origin_offset: [f64; 3],
    /// The two laser planes.
    pub lasers: [LaserPlaneRecord; 2],
    /// The pattern is detected only within this angle, in degrees.
    pub visibility_limit: f64,
    /// Amplitude of the uniform noise added to laser pixels.
    pub pixel_noise: f64,
    /// Stray laser pixels seen outside of the pattern when an image is not masked.
    pub reflections: usize,
    /// Seed of the noise generator.
    pub seed: u64,
}

impl Default for SyntheticScene {
    fn default() -> Self {
        let platform_center = [0.0, 90.0, 320.0];
        let platform_axis = [0.0, -1.0, 0.0];
        let lasers = [[-100.0, 0.0, 0.0], [100.0, 0.0, 0.0]]
            .map(|source| laser_through_axis(&platform_center, &platform_axis, &source));
        Self {
            camera: PinholeCamera::default(),
            rows: 6,
            columns: 11,
            square_width: 13.0,
            platform_center,
            platform_axis,
            origin_distance: 20.0,
            origin_offset: [-40.0, 0.0, -30.0],
            lasers,
            visibility_limit: 75.0,
            pixel_noise: 0.1,
            reflections: 20,
            seed: 0,
        }
    }
}

// the plane containing the platform axis and the laser source, with d > 0
fn laser_through_axis(center: &[f64; 3], axis: &[f64; 3], source: &[f64; 3]) -> LaserPlaneRecord {
    let normal = linalg::normalize3(&linalg::cross_vec3(axis, &linalg::sub3(center, source)))
        .unwrap_or([0.0, 0.0, 1.0]);
    let distance = linalg::dot_product3(&normal, center);
    if distance < 0.0 {
        LaserPlaneRecord {
            distance: -distance,
            normal: linalg::scale3(&normal, -1.0),
        }
    } else {
        LaserPlaneRecord { distance, normal }
    }
}

impl SyntheticScene {
    /// The platform rotation for an angle in degrees.
    pub fn platform_rotation(&self, angle: f64) -> [[f64; 3]; 3] {
        transforms::axis_angle_to_rotation_matrix(&self.platform_axis, angle.to_radians())
            .unwrap_or(IDENTITY)
    }

    /// The pose of the pattern at an angle. At angle zero the pattern frame is aligned
    /// with the camera frame.
    pub fn pattern_pose(&self, angle: f64) -> PatternPose {
        let rotation = self.platform_rotation(angle);
        let origin = linalg::add3(
            &linalg::add3(
                &self.platform_center,
                &linalg::scale3(&self.platform_axis, self.origin_distance),
            ),
            &self.origin_offset,
        );
        let first = linalg::sub3(
            &origin,
            &[0.0, (self.rows - 1) as f64 * self.square_width, 0.0],
        );
        PatternPose {
            rotation,
            translation: transforms::rotate_about_pivot(&first, &self.platform_center, &rotation),
        }
    }

    /// A point of the pattern given in pattern coordinates.
    pub fn pattern_point(&self, pose: &PatternPose, u: f64, v: f64) -> [f64; 3] {
        linalg::add3(
            &pose.translation,
            &linalg::mat33_mul_vec3(&pose.rotation, &[u, v, 0.0]),
        )
    }

    /// The inner corners of the pattern in camera coordinates, row-major.
    pub fn corners(&self, pose: &PatternPose) -> Vec<[f64; 3]> {
        let mut corners = Vec::with_capacity(self.rows * self.columns);
        for r in 0..self.rows {
            for c in 0..self.columns {
                let (u, v) = (c as f64 * self.square_width, r as f64 * self.square_width);
                corners.push(self.pattern_point(pose, u, v));
            }
        }
        corners
    }

    /// Where the origin corner is at an angle.
    pub fn origin_corner(&self, angle: f64) -> [f64; 3] {
        let pose = self.pattern_pose(angle);
        self.pattern_point(&pose, 0.0, (self.rows - 1) as f64 * self.square_width)
    }

    /// The plane and projected corners of the pattern. `None` when a corner is not
    /// in front of the camera.
    pub fn pattern_plane(&self, pose: &PatternPose) -> Option<PatternPlane> {
        let corners = self
            .corners(pose)
            .iter()
            .map(|corner| self.camera.project(corner))
            .collect::<Option<Vec<_>>>()?;
        let normal = linalg::mat33_col(&pose.rotation, 2);
        let distance = linalg::dot_product3(&normal, &pose.translation);
        Some(if distance < 0.0 {
            PatternPlane {
                distance: -distance,
                normal: linalg::scale3(&normal, -1.0),
                corners,
            }
        } else {
            PatternPlane {
                distance,
                normal,
                corners,
            }
        })
    }

    /// The noise free points where a laser crosses the pattern at an angle.
    ///
    /// The pattern is sampled every quarter of a square along its rows.
    pub fn laser_line(&self, angle: f64, laser: LaserIndex) -> Vec<[f64; 3]> {
        let pose = self.pattern_pose(angle);
        let plane = &self.lasers[laser.index()];
        let along_u = linalg::dot_product3(&plane.normal, &linalg::mat33_col(&pose.rotation, 0));
        let along_v = linalg::dot_product3(&plane.normal, &linalg::mat33_col(&pose.rotation, 1));
        if along_u.abs() < 1e-9 {
            return Vec::new();
        }

        let offset = plane.distance - linalg::dot_product3(&plane.normal, &pose.translation);
        let width = (self.columns - 1) as f64 * self.square_width;
        let samples = (self.rows - 1) * 4;
        (0..=samples)
            .filter_map(|k| {
                let v = k as f64 * self.square_width / 4.0;
                let u = (offset - v * along_v) / along_u;
                (0.0..=width)
                    .contains(&u)
                    .then(|| self.pattern_point(&pose, u, v))
            })
            .collect()
    }

    /// Whether the pattern is visible at an angle.
    pub fn is_visible(&self, angle: f64) -> bool {
        angle.abs() <= self.visibility_limit
    }
}

/// The platform angle in degrees, shared by the simulated devices.
#[derive(Debug, Clone, Default)]
pub struct PlatformAngle(Arc<AtomicU64>);

impl PlatformAngle {
    /// The current angle.
    pub fn get(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::SeqCst))
    }

    /// Set the current angle.
    pub fn set(&self, angle: f64) {
        self.0.store(angle.to_bits(), Ordering::SeqCst);
    }
}

/// A simulated image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyntheticFrame {
    /// The platform angle when the image was taken.
    pub angle: f64,
    /// The laser turned on, `None` for a pattern image.
    pub laser: Option<LaserIndex>,
    /// Whether the image was masked to the pattern.
    pub masked: bool,
}

/// A simulated camera and laser board.
#[derive(Debug, Clone)]
pub struct SyntheticCamera {
    angle: PlatformAngle,
    streaming: bool,
    connected: bool,
    captures: usize,
}

impl SyntheticCamera {
    /// Create a camera looking at the platform at `angle`.
    pub fn new(angle: PlatformAngle) -> Self {
        Self {
            angle,
            streaming: true,
            connected: true,
            captures: 0,
        }
    }

    /// Whether the live preview is on.
    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    /// Simulate unplugging the camera.
    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }

    /// Number of images captured.
    pub fn captures(&self) -> usize {
        self.captures
    }

    fn capture(&mut self, laser: Option<LaserIndex>) -> Result<SyntheticFrame, DeviceError> {
        if !self.connected {
            return Err(DeviceError::Disconnected);
        }
        self.captures += 1;
        Ok(SyntheticFrame {
            angle: self.angle.get(),
            laser,
            masked: false,
        })
    }
}

impl CameraDriver for SyntheticCamera {
    type Image = SyntheticFrame;

    fn set_streaming(&mut self, enabled: bool) {
        self.streaming = enabled;
    }

    fn capture_pattern(&mut self) -> Result<SyntheticFrame, DeviceError> {
        self.capture(None)
    }

    fn capture_laser(&mut self, laser: LaserIndex) -> Result<SyntheticFrame, DeviceError> {
        self.capture(Some(laser))
    }
}

/// A simulated platform motor.
#[derive(Debug, Clone)]
pub struct SyntheticPlatform {
    angle: PlatformAngle,
    enabled: bool,
    moves: Vec<f64>,
}

impl SyntheticPlatform {
    /// Create a platform driving `angle`.
    pub fn new(angle: PlatformAngle) -> Self {
        Self {
            angle,
            enabled: false,
            moves: Vec::new(),
        }
    }

    /// Whether the motor is powered.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// The relative moves executed so far.
    pub fn moves(&self) -> &[f64] {
        &self.moves
    }

    /// The current platform angle.
    pub fn angle(&self) -> f64 {
        self.angle.get()
    }
}

impl PlatformDriver for SyntheticPlatform {
    fn enable(&mut self) -> Result<(), DeviceError> {
        self.enabled = true;
        Ok(())
    }

    fn rotate(&mut self, degrees: f64) -> Result<(), DeviceError> {
        if !self.enabled {
            return Err(DeviceError::Motion("motor is disabled".to_string()));
        }
        self.angle.set(self.angle.get() + degrees);
        self.moves.push(degrees);
        Ok(())
    }

    fn disable(&mut self) -> Result<(), DeviceError> {
        self.enabled = false;
        Ok(())
    }
}

/// A simulated chessboard detector.
#[derive(Debug, Clone)]
pub struct SyntheticDetector {
    scene: SyntheticScene,
    max_detections: Option<usize>,
    detections: usize,
}

impl SyntheticDetector {
    /// Create a detector for the scene.
    pub fn new(scene: SyntheticScene) -> Self {
        Self {
            scene,
            max_detections: None,
            detections: 0,
        }
    }

    /// Stop detecting the pattern after `max_detections` poses.
    pub fn with_max_detections(mut self, max_detections: usize) -> Self {
        self.max_detections = Some(max_detections);
        self
    }

    /// Number of poses detected so far.
    pub fn detections(&self) -> usize {
        self.detections
    }
}

impl PatternDetector<SyntheticFrame> for SyntheticDetector {
    fn detect_pose(&mut self, image: &SyntheticFrame) -> Option<PatternPose> {
        if !self.scene.is_visible(image.angle) {
            return None;
        }
        if self.max_detections.is_some_and(|max| self.detections >= max) {
            return None;
        }
        self.detections += 1;
        Some(self.scene.pattern_pose(image.angle))
    }

    fn detect_pattern_plane(&mut self, pose: &PatternPose) -> Option<PatternPlane> {
        self.scene.pattern_plane(pose)
    }

    fn pattern_mask(&mut self, image: SyntheticFrame, _corners: &[[f64; 2]]) -> SyntheticFrame {
        SyntheticFrame {
            masked: true,
            ..image
        }
    }
}

/// A simulated laser segmenter with pixel noise.
#[derive(Debug, Clone)]
pub struct SyntheticSegmenter {
    scene: SyntheticScene,
    rng: StdRng,
}

impl SyntheticSegmenter {
    /// Create a segmenter for the scene, seeded from the scene.
    pub fn new(scene: SyntheticScene) -> Self {
        let rng = StdRng::seed_from_u64(scene.seed);
        Self { scene, rng }
    }
}

impl LaserSegmenter<SyntheticFrame> for SyntheticSegmenter {
    fn compute_2d_points(&mut self, image: &SyntheticFrame) -> Vec<[f64; 2]> {
        let Some(laser) = image.laser else {
            return Vec::new();
        };

        let noise = self.scene.pixel_noise;
        let mut pixels = self
            .scene
            .laser_line(image.angle, laser)
            .iter()
            .filter_map(|point| self.scene.camera.project(point))
            .map(|[u, v]| {
                [
                    u + self.rng.random_range(-noise..=noise),
                    v + self.rng.random_range(-noise..=noise),
                ]
            })
            .collect::<Vec<_>>();

        if !image.masked {
            let (width, height) = (2.0 * self.scene.camera.cx, 2.0 * self.scene.camera.cy);
            for _ in 0..self.scene.reflections {
                pixels.push([
                    self.rng.random_range(0.0..width),
                    self.rng.random_range(0.0..height),
                ]);
            }
        }

        pixels
    }
}

/// Every simulated device of a scanner, sharing one platform angle.
#[derive(Debug, Clone)]
pub struct SyntheticScanner {
    /// The simulated scene.
    pub scene: SyntheticScene,
    /// The camera and laser board.
    pub camera: SyntheticCamera,
    /// The platform motor.
    pub platform: SyntheticPlatform,
    /// The pattern detector.
    pub detector: SyntheticDetector,
    /// The laser segmenter.
    pub segmenter: SyntheticSegmenter,
}

impl SyntheticScanner {
    /// Create the devices for a scene, with the platform at angle zero.
    pub fn new(scene: SyntheticScene) -> Self {
        let angle = PlatformAngle::default();
        Self {
            camera: SyntheticCamera::new(angle.clone()),
            platform: SyntheticPlatform::new(angle),
            detector: SyntheticDetector::new(scene.clone()),
            segmenter: SyntheticSegmenter::new(scene.clone()),
            scene,
        }
    }

    /// Borrow the devices as calibration collaborators, with the platform apart.
    pub fn collaborators(
        &mut self,
    ) -> (Collaborators<'_, SyntheticFrame>, &mut SyntheticPlatform) {
        (
            Collaborators {
                camera: &mut self.camera,
                detector: &mut self.detector,
                segmenter: &mut self.segmenter,
                generator: &self.scene.camera,
            },
            &mut self.platform,
        )
    }
}
