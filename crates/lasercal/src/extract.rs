use crate::collaborators::{Collaborators, LaserIndex, PatternPlane};
use crate::samples::CalibrationSamples;

/// What one capture step contributed to the accumulators.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StepSamples {
    /// The platform angle of the step in degrees.
    pub angle: f64,
    /// Whether the pattern pose was detected.
    pub pose_detected: bool,
    /// The origin corner appended to the platform samples, if any.
    pub platform_sample: Option<[f64; 3]>,
    /// Number of points appended to each laser cloud.
    pub laser_points: [usize; 2],
}

/// Turns the images of one platform angle into calibration samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleExtractor {
    origin_index: usize,
}

impl SampleExtractor {
    /// Create an extractor for a pattern with `rows` x `columns` inner corners.
    pub fn new(rows: usize, columns: usize) -> Self {
        Self {
            origin_index: columns * rows.saturating_sub(1),
        }
    }

    /// Index of the origin corner (last row, first column).
    pub fn origin_index(&self) -> usize {
        self.origin_index
    }

    /// Capture and process one platform angle.
    ///
    /// A missed detection is a normal outcome: the pattern image is kept in `preview`
    /// and nothing is appended. With a detected pose the origin corner is appended to
    /// the platform samples and both laser lines, masked to the pattern, are
    /// triangulated onto the pattern plane. The last masked laser image replaces
    /// `preview`. Capture errors are logged and skipped.
    pub fn extract<I>(
        &self,
        angle: f64,
        collaborators: &mut Collaborators<'_, I>,
        samples: &mut CalibrationSamples,
        preview: &mut Option<I>,
    ) -> StepSamples {
        let mut step = StepSamples {
            angle,
            ..Default::default()
        };

        let image = match collaborators.camera.capture_pattern() {
            Ok(image) => image,
            Err(e) => {
                log::warn!("Pattern capture failed at {angle}°: {e}");
                return step;
            }
        };

        let Some(pose) = collaborators.detector.detect_pose(&image) else {
            log::debug!("Pattern not detected at {angle}°");
            *preview = Some(image);
            return step;
        };
        step.pose_detected = true;

        // platform extrinsics
        if let Some(plane) = collaborators.detector.detect_pattern_plane(&pose) {
            step.platform_sample = self.origin_sample(collaborators, &plane);
            if let Some(origin) = step.platform_sample {
                samples.platform.push(origin);
            }
        }

        // laser triangulation
        if let Some(plane) = collaborators.detector.detect_pattern_plane(&pose) {
            for laser in LaserIndex::ALL {
                let image = match collaborators.camera.capture_laser(laser) {
                    Ok(image) => image,
                    Err(e) => {
                        log::warn!("Laser {laser} capture failed at {angle}°: {e}");
                        continue;
                    }
                };
                let masked = collaborators.detector.pattern_mask(image, &plane.corners);
                let pixels = collaborators.segmenter.compute_2d_points(&masked);
                let points = collaborators
                    .generator
                    .compute_camera_point_cloud(&pixels, plane.distance, &plane.normal)
                    .unwrap_or_default();
                samples.laser_mut(laser).extend_from_slice(&points);
                step.laser_points[laser.index()] = points.len();
                *preview = Some(masked);
            }
        }

        log::debug!(
            "Step {angle}°: platform sample {:?}, laser points {:?}",
            step.platform_sample,
            step.laser_points
        );

        step
    }

    fn origin_sample<I>(
        &self,
        collaborators: &Collaborators<'_, I>,
        plane: &PatternPlane,
    ) -> Option<[f64; 3]> {
        let origin = plane.corners.get(self.origin_index)?;
        let points = collaborators.generator.compute_camera_point_cloud(
            std::slice::from_ref(origin),
            plane.distance,
            &plane.normal,
        )?;
        points.first().copied()
    }
}
