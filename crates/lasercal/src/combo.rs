use std::path::PathBuf;

use lasercal_3d::io::ply::PlyEncoding;

use crate::aggregate::{aggregate, AggregateFailure, AggregationConfig, ComboFit};
use crate::collaborators::Collaborators;
use crate::config::CalibrationConfig;
use crate::extract::{SampleExtractor, StepSamples};
use crate::samples::CalibrationSamples;
use crate::session::CaptureProcedure;

/// Laser triangulation and platform extrinsics calibrated from a single sweep.
///
/// At every angle the origin corner of the pattern is collected for the platform
/// fit, and both laser lines on the pattern are triangulated for the laser plane
/// fits. Run it with [`crate::session::MovingCalibration`].
pub struct ComboCalibration<'a, I> {
    collaborators: Collaborators<'a, I>,
    extractor: SampleExtractor,
    config: AggregationConfig,
    export_dir: Option<PathBuf>,
    samples: Option<CalibrationSamples>,
    steps: Vec<StepSamples>,
    image: Option<I>,
}

impl<'a, I> ComboCalibration<'a, I> {
    /// Create the procedure from its collaborators and settings.
    pub fn new(collaborators: Collaborators<'a, I>, config: &CalibrationConfig) -> Self {
        Self {
            collaborators,
            extractor: SampleExtractor::new(config.pattern.rows, config.pattern.columns),
            config: AggregationConfig::from_config(config),
            export_dir: config.export_dir.clone(),
            samples: None,
            steps: Vec::new(),
            image: None,
        }
    }

    /// The preview image: the last pattern image without detection, or the last
    /// masked laser image. Cleared when the session is released.
    pub fn image(&self) -> Option<&I> {
        self.image.as_ref()
    }

    /// The samples accumulated so far, `None` outside of a capture.
    pub fn samples(&self) -> Option<&CalibrationSamples> {
        self.samples.as_ref()
    }

    /// The contribution of each step of the last sweep.
    pub fn steps(&self) -> &[StepSamples] {
        &self.steps
    }
}

impl<I> CaptureProcedure for ComboCalibration<'_, I> {
    type Fit = ComboFit;

    fn initialize(&mut self) {
        self.image = None;
        self.collaborators.camera.set_streaming(false);
        self.samples = Some(CalibrationSamples::default());
        self.steps.clear();
    }

    fn capture(&mut self, angle: f64) {
        let Some(samples) = self.samples.as_mut() else {
            log::warn!("Capture at {angle}° outside of a session");
            return;
        };
        let step = self
            .extractor
            .extract(angle, &mut self.collaborators, samples, &mut self.image);
        self.steps.push(step);
    }

    fn finish(&mut self) {
        self.collaborators.camera.set_streaming(true);
    }

    fn aggregate(&mut self) -> Result<ComboFit, AggregateFailure> {
        let samples = self.samples.take().unwrap_or_default();

        if let Some(dir) = &self.export_dir {
            match samples.export_point_clouds(dir, PlyEncoding::BinaryLittleEndian) {
                Ok(paths) => log::info!("Laser point clouds saved to {paths:?}"),
                Err(e) => log::warn!("Failed to save the laser point clouds: {e}"),
            }
        }

        aggregate(samples, &self.config)
    }

    fn release(&mut self) {
        self.samples = None;
        self.image = None;
    }
}
