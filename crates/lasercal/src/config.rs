use std::path::{Path, PathBuf};

use lasercal_3d::{camera::PinholeCamera, fit::LaserPlaneParams};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// The platform angles visited by a sweep, in degrees.
///
/// Angles go from `start` up to `stop` excluded, every `step` degrees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AngleSchedule {
    /// The first angle.
    pub start: f64,
    /// The end of the sweep, excluded.
    pub stop: f64,
    /// The increment between two captures.
    pub step: f64,
}

impl Default for AngleSchedule {
    fn default() -> Self {
        Self {
            start: -90.0,
            stop: 90.0,
            step: 5.0,
        }
    }
}

impl AngleSchedule {
    /// Largest number of angles a sweep may visit.
    pub const MAX_STEPS: usize = 3600;

    /// Create a new schedule.
    pub fn new(start: f64, stop: f64, step: f64) -> Self {
        Self { start, stop, step }
    }

    /// Check that the schedule describes a finite, non empty sweep.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.start.is_finite() && self.stop.is_finite() && self.step.is_finite()) {
            return Err(ConfigError::InvalidSchedule(format!("{self:?}")));
        }
        if self.step <= 0.0 {
            return Err(ConfigError::InvalidSchedule(format!(
                "step must be positive, got {}",
                self.step
            )));
        }
        if self.stop <= self.start {
            return Err(ConfigError::InvalidSchedule(format!(
                "stop {} is not after start {}",
                self.stop, self.start
            )));
        }
        if self.step_count() > Self::MAX_STEPS as f64 {
            return Err(ConfigError::InvalidSchedule(format!(
                "{} steps exceed the maximum of {}",
                self.step_count(),
                Self::MAX_STEPS
            )));
        }
        Ok(())
    }

    // tolerate rounding in (stop - start) / step
    fn step_count(&self) -> f64 {
        ((self.stop - self.start) / self.step - 1e-9).ceil().max(0.0)
    }

    /// The ordered angles of the sweep. Empty for an invalid schedule.
    pub fn angles(&self) -> Vec<f64> {
        if self.validate().is_err() {
            return Vec::new();
        }
        (0..self.step_count() as usize)
            .map(|i| self.start + i as f64 * self.step)
            .collect()
    }
}

/// The geometry of the chessboard pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternConfig {
    /// Number of inner corner rows.
    pub rows: usize,
    /// Number of inner corner columns.
    pub columns: usize,
    /// Side of a square in millimeters.
    pub square_width: f64,
    /// Height of the origin corner above the platform surface in millimeters.
    pub origin_distance: f64,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            rows: 6,
            columns: 11,
            square_width: 13.0,
            origin_distance: 0.0,
        }
    }
}

impl PatternConfig {
    /// Check that the pattern has an origin corner and a positive size.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rows < 2 || self.columns < 2 {
            return Err(ConfigError::InvalidPattern(format!(
                "expected at least 2x2 corners, got {}x{}",
                self.rows, self.columns
            )));
        }
        if self.square_width.is_nan() || self.square_width <= 0.0 {
            return Err(ConfigError::InvalidPattern(format!(
                "square width must be positive, got {}",
                self.square_width
            )));
        }
        Ok(())
    }
}

/// Thresholds deciding whether a calibration is accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcceptanceConfig {
    /// A laser plane is rejected when its residual std is not strictly below this value.
    pub max_laser_std: f64,
    /// Maximum distance between the fitted platform translation and the prior.
    pub max_translation_drift: f64,
    /// Minimum number of platform samples needed to fit the platform.
    pub min_platform_samples: usize,
    /// Expected platform translation in camera coordinates.
    pub prior_translation: [f64; 3],
}

impl Default for AcceptanceConfig {
    fn default() -> Self {
        Self {
            max_laser_std: 10.0,
            max_translation_drift: 100.0,
            min_platform_samples: 5,
            prior_translation: [-5.0, 90.0, 320.0],
        }
    }
}

/// All the settings of a combined calibration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// The platform angles to capture.
    pub schedule: AngleSchedule,
    /// The calibration pattern.
    pub pattern: PatternConfig,
    /// The acceptance thresholds.
    pub acceptance: AcceptanceConfig,
    /// The laser plane fitting parameters.
    pub laser_fit: LaserPlaneParams,
    /// The camera intrinsics used to back-project pixels.
    pub camera: PinholeCamera,
    /// Directory where the laser point clouds are exported at aggregation.
    pub export_dir: Option<PathBuf>,
    /// Rotate the platform back to where it started after the sweep.
    pub return_to_origin: bool,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            schedule: AngleSchedule::default(),
            pattern: PatternConfig::default(),
            acceptance: AcceptanceConfig::default(),
            laser_fit: LaserPlaneParams::default(),
            camera: PinholeCamera::default(),
            export_dir: None,
            return_to_origin: true,
        }
    }
}

impl CalibrationConfig {
    /// The ordered platform angles of the sweep.
    pub fn angles(&self) -> Vec<f64> {
        self.schedule.angles()
    }

    /// Check the schedule and the pattern.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.schedule.validate()?;
        self.pattern.validate()?;
        Ok(())
    }

    /// Read and validate a configuration stored as JSON.
    ///
    /// Missing fields take their default value.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the configuration as pretty printed JSON.
    pub fn to_json_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_schedule() {
        let angles = AngleSchedule::default().angles();
        assert_eq!(angles.len(), 36);
        assert_eq!(angles[0], -90.0);
        assert_eq!(angles[35], 85.0);
    }

    #[test]
    fn test_schedule_excludes_stop() {
        let angles = AngleSchedule::new(-33.0, 39.0, 6.0).angles();
        assert_eq!(angles.len(), 12);
        assert_eq!(angles.last(), Some(&33.0));

        let angles = AngleSchedule::new(0.0, 1.0, 0.3).angles();
        assert_eq!(angles.len(), 4);

        let finest = AngleSchedule::new(0.0, 360.0, 0.1);
        assert!(finest.validate().is_ok());
        assert_eq!(finest.angles().len(), AngleSchedule::MAX_STEPS);
    }

    #[test]
    fn test_invalid_schedule() {
        for schedule in [
            AngleSchedule::new(0.0, 10.0, 0.0),
            AngleSchedule::new(0.0, 10.0, -1.0),
            AngleSchedule::new(10.0, 10.0, 1.0),
            AngleSchedule::new(f64::NAN, 10.0, 1.0),
            AngleSchedule::new(-90.0, 90.0, 1e-9),
        ] {
            assert!(schedule.validate().is_err(), "{schedule:?}");
            assert!(schedule.angles().is_empty());
        }
    }

    #[test]
    fn test_pattern_validate() {
        assert!(PatternConfig::default().validate().is_ok());
        assert!(PatternConfig {
            rows: 1,
            ..Default::default()
        }
        .validate()
        .is_err());
    }

    #[test]
    fn test_json_round_trip() -> Result<(), Box<dyn std::error::Error>> {
        let tmp_dir = tempfile::tempdir()?;
        let path = tmp_dir.path().join("calibration.json");

        let config = CalibrationConfig {
            schedule: AngleSchedule::new(-30.0, 30.0, 10.0),
            export_dir: Some(tmp_dir.path().to_path_buf()),
            ..Default::default()
        };
        config.to_json_file(&path)?;
        assert_eq!(CalibrationConfig::from_json_file(&path)?, config);
        Ok(())
    }

    #[test]
    fn test_partial_json() -> Result<(), Box<dyn std::error::Error>> {
        let config: CalibrationConfig =
            serde_json::from_str(r#"{ "acceptance": { "max_laser_std": 2.5 } }"#)?;
        assert_eq!(config.acceptance.max_laser_std, 2.5);
        assert_eq!(config.acceptance.min_platform_samples, 5);
        assert_eq!(config.schedule, AngleSchedule::default());
        assert!(config.return_to_origin);
        Ok(())
    }

    #[test]
    fn test_invalid_json_file() -> Result<(), Box<dyn std::error::Error>> {
        let tmp_dir = tempfile::tempdir()?;
        let path = tmp_dir.path().join("bad.json");
        std::fs::write(&path, r#"{ "schedule": { "step": 0.0 } }"#)?;
        assert!(matches!(
            CalibrationConfig::from_json_file(&path),
            Err(ConfigError::InvalidSchedule(_))
        ));

        std::fs::write(&path, "not json")?;
        assert!(matches!(
            CalibrationConfig::from_json_file(&path),
            Err(ConfigError::Json(_))
        ));
        Ok(())
    }
}
