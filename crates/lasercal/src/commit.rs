use std::path::Path;

use lasercal_3d::camera::PinholeCamera;
use serde::{Deserialize, Serialize};

use crate::aggregate::ComboFit;
use crate::error::ConfigError;

/// A laser plane `normal · X = distance` in camera coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LaserPlaneRecord {
    /// Distance from the camera center.
    pub distance: f64,
    /// Unit normal.
    pub normal: [f64; 3],
}

/// The calibration values used by the scanner to reconstruct points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationData {
    /// Camera intrinsics.
    pub camera: PinholeCamera,
    /// The laser planes, indexed by laser.
    pub laser_planes: [LaserPlaneRecord; 2],
    /// Rotation of the platform frame in camera coordinates.
    pub platform_rotation: [[f64; 3]; 3],
    /// Position of the platform center in camera coordinates.
    pub platform_translation: [f64; 3],
}

impl Default for CalibrationData {
    fn default() -> Self {
        Self {
            camera: PinholeCamera::default(),
            laser_planes: [LaserPlaneRecord::default(); 2],
            platform_rotation: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
            platform_translation: [0.0; 3],
        }
    }
}

impl CalibrationData {
    /// Read calibration data stored as JSON.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Write the calibration data as pretty printed JSON.
    pub fn to_json_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

impl ComboFit {
    /// Write the laser planes and the platform pose into `data`.
    pub fn accept(&self, data: &mut CalibrationData) {
        for (record, plane) in data.laser_planes.iter_mut().zip(&self.lasers) {
            record.distance = plane.distance;
            record.normal = plane.normal;
        }
        data.platform_rotation = self.platform.rotation;
        data.platform_translation = self.platform.translation;
        log::info!("Combined calibration accepted");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::PlatformPoseFit;
    use crate::samples::CalibrationSamples;
    use lasercal_3d::fit::LaserPlane;

    fn fit() -> ComboFit {
        ComboFit {
            platform: PlatformPoseFit {
                point: [0.0, 70.0, 300.0],
                normal: [0.0, -1.0, 0.0],
                center: [0.0, 70.0, 320.0],
                rotation: [[0.0, 1.0, 0.0], [0.0, 0.0, -1.0], [-1.0, 0.0, 0.0]],
                radius: 50.0,
                translation: [0.0, 90.0, 320.0],
            },
            lasers: [
                LaserPlane {
                    distance: 95.0,
                    normal: [-0.95, 0.0, 0.3],
                    std: 0.1,
                },
                LaserPlane {
                    distance: 96.0,
                    normal: [0.95, 0.0, 0.3],
                    std: 0.2,
                },
            ],
            samples: CalibrationSamples::default(),
        }
    }

    #[test]
    fn test_accept() {
        let fit = fit();
        let mut data = CalibrationData::default();
        fit.accept(&mut data);

        assert_eq!(data.laser_planes[0].distance, 95.0);
        assert_eq!(data.laser_planes[1].normal, [0.95, 0.0, 0.3]);
        assert_eq!(data.platform_rotation, fit.platform.rotation);
        assert_eq!(data.platform_translation, [0.0, 90.0, 320.0]);
        assert_eq!(data.camera, PinholeCamera::default());
    }

    #[test]
    fn test_json_round_trip() -> Result<(), Box<dyn std::error::Error>> {
        let tmp_dir = tempfile::tempdir()?;
        let path = tmp_dir.path().join("calibration_data.json");

        let mut data = CalibrationData::default();
        fit().accept(&mut data);
        data.to_json_file(&path)?;
        assert_eq!(CalibrationData::from_json_file(&path)?, data);
        Ok(())
    }
}
