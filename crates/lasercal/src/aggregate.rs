use lasercal_3d::{
    fit::{fit_circle_in_plane, fit_laser_plane, fit_plane, FitError, LaserPlane, LaserPlaneParams},
    linalg,
    pointcloud::PointCloud,
};
use serde::{Deserialize, Serialize};

use crate::collaborators::LaserIndex;
use crate::config::{AcceptanceConfig, CalibrationConfig};
use crate::samples::{CalibrationSamples, PlatformSamples};

/// The settings used by [`aggregate`].
#[derive(Debug, Clone, PartialEq)]
pub struct AggregationConfig {
    /// The acceptance thresholds.
    pub acceptance: AcceptanceConfig,
    /// The laser plane fitting parameters.
    pub laser_fit: LaserPlaneParams,
    /// Height of the pattern origin corner above the platform.
    pub origin_distance: f64,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self::from_config(&CalibrationConfig::default())
    }
}

impl AggregationConfig {
    /// Extract the aggregation settings of a calibration configuration.
    pub fn from_config(config: &CalibrationConfig) -> Self {
        Self {
            acceptance: config.acceptance.clone(),
            laser_fit: config.laser_fit.clone(),
            origin_distance: config.pattern.origin_distance,
        }
    }
}

/// The platform pose recovered from the origin corner trajectory.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlatformPoseFit {
    /// Centroid of the samples, a point of the fitted plane.
    pub point: [f64; 3],
    /// Unit normal of the platform plane, with a non positive y component.
    pub normal: [f64; 3],
    /// Center of the fitted circle.
    pub center: [f64; 3],
    /// Rotation of the platform frame in camera coordinates.
    pub rotation: [[f64; 3]; 3],
    /// Radius of the fitted circle.
    pub radius: f64,
    /// Position of the platform center in camera coordinates.
    pub translation: [f64; 3],
}

/// One acceptance check that did not pass.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum FailedCheck {
    /// Too few origin corners were collected to fit the platform.
    #[error("Only {actual} platform samples, at least {required} are required")]
    InsufficientPlatformSamples {
        /// The minimum number of samples.
        required: usize,
        /// The number of samples collected.
        actual: usize,
    },

    /// The platform plane or circle could not be fitted.
    #[error("Failed to fit the platform. {0}")]
    PlatformFit(FitError),

    /// The platform translation is too far from the prior.
    #[error("Platform translation drifted {drift:.3} from the prior, maximum {max:.3}")]
    TranslationDrift {
        /// Distance between the fitted translation and the prior.
        drift: f64,
        /// The tolerance.
        max: f64,
    },

    /// A laser plane could not be fitted.
    #[error("Failed to fit laser {laser} plane. {error}")]
    LaserFit {
        /// The laser.
        laser: LaserIndex,
        /// The fitting error.
        error: FitError,
    },

    /// A laser plane residual is too large.
    #[error("Laser {laser} residual std {std:.4} is not below {max:.4}")]
    LaserResidual {
        /// The laser.
        laser: LaserIndex,
        /// The residual standard deviation.
        std: f64,
        /// The threshold.
        max: f64,
    },
}

/// A rejected calibration, with every failed check and whatever could be fitted.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[error("Calibration rejected after {} failed checks", .failed_checks.len())]
pub struct AggregateFailure {
    /// The checks that did not pass, lasers first.
    pub failed_checks: Vec<FailedCheck>,
    /// The platform pose if it could be fitted.
    pub platform: Option<PlatformPoseFit>,
    /// The laser planes that could be fitted.
    pub lasers: [Option<LaserPlane>; 2],
}

/// An accepted calibration.
#[derive(Debug, Clone, PartialEq)]
pub struct ComboFit {
    /// The platform pose.
    pub platform: PlatformPoseFit,
    /// The laser planes, indexed by [`LaserIndex::index`].
    pub lasers: [LaserPlane; 2],
    /// The samples the fit was computed from.
    pub samples: CalibrationSamples,
}

/// Fit the platform pose to the origin corner samples.
///
/// The plane normal is flipped to have a non positive y component, then the circle
/// described by the origin corner is fitted inside that plane. The translation is
/// the circle center moved down by `origin_distance` along the normal.
pub fn fit_platform(
    samples: &PlatformSamples,
    min_samples: usize,
    origin_distance: f64,
) -> Result<PlatformPoseFit, FailedCheck> {
    if samples.len() < min_samples {
        return Err(FailedCheck::InsufficientPlatformSamples {
            required: min_samples,
            actual: samples.len(),
        });
    }

    let points = samples.points();
    let mut plane = fit_plane(&points).map_err(FailedCheck::PlatformFit)?;
    if plane.normal[1] > 0.0 {
        plane = plane.flipped();
    }

    let circle = fit_circle_in_plane(&plane.point, &plane.normal, &points)
        .map_err(FailedCheck::PlatformFit)?;
    let translation = linalg::sub3(
        &circle.center,
        &linalg::scale3(&plane.normal, origin_distance),
    );

    log::info!("Platform calibration");
    log::info!(" Translation: {translation:?}");
    log::info!(" Rotation: {:?}", circle.rotation);
    log::info!(" Normal: {:?}", plane.normal);

    Ok(PlatformPoseFit {
        point: plane.point,
        normal: plane.normal,
        center: circle.center,
        rotation: circle.rotation,
        radius: circle.radius,
        translation,
    })
}

/// Fit the plane of one laser.
pub fn fit_laser(
    laser: LaserIndex,
    cloud: &PointCloud,
    params: &LaserPlaneParams,
) -> Result<LaserPlane, FailedCheck> {
    let plane = fit_laser_plane(cloud.points(), params)
        .map_err(|error| FailedCheck::LaserFit { laser, error })?;
    log::info!(
        "Laser {laser} plane: distance {:.4}, normal {:?}, std {:.4} ({} points)",
        plane.distance,
        plane.normal,
        plane.std,
        cloud.len()
    );
    Ok(plane)
}

/// Check that the platform translation is strictly closer than the tolerance to the prior.
pub fn check_translation(
    platform: &PlatformPoseFit,
    acceptance: &AcceptanceConfig,
) -> Result<(), FailedCheck> {
    let drift = linalg::euclidean_distance(&platform.translation, &acceptance.prior_translation);
    if drift < acceptance.max_translation_drift {
        Ok(())
    } else {
        Err(FailedCheck::TranslationDrift {
            drift,
            max: acceptance.max_translation_drift,
        })
    }
}

/// Check that a laser plane residual std is strictly below the threshold.
pub fn check_laser_residual(
    laser: LaserIndex,
    plane: &LaserPlane,
    acceptance: &AcceptanceConfig,
) -> Result<(), FailedCheck> {
    if plane.std < acceptance.max_laser_std {
        Ok(())
    } else {
        Err(FailedCheck::LaserResidual {
            laser,
            std: plane.std,
            max: acceptance.max_laser_std,
        })
    }
}

/// Fit both lasers and the platform, then apply the acceptance policy.
///
/// Every fit and check runs even when an earlier one failed, so a rejection lists all
/// the failed checks. The calibration is accepted only when both laser planes and the
/// platform pose were fitted and every check passed.
///
/// # Arguments
///
/// * `samples` - The accumulated samples, consumed.
/// * `config` - The thresholds and fitting parameters.
pub fn aggregate(
    samples: CalibrationSamples,
    config: &AggregationConfig,
) -> Result<ComboFit, AggregateFailure> {
    let mut failed_checks = Vec::new();

    let lasers = LaserIndex::ALL.map(|laser| {
        match fit_laser(laser, samples.laser(laser), &config.laser_fit) {
            Ok(plane) => {
                if let Err(check) = check_laser_residual(laser, &plane, &config.acceptance) {
                    failed_checks.push(check);
                }
                Some(plane)
            }
            Err(check) => {
                failed_checks.push(check);
                None
            }
        }
    });

    let platform = match fit_platform(
        &samples.platform,
        config.acceptance.min_platform_samples,
        config.origin_distance,
    ) {
        Ok(platform) => {
            if let Err(check) = check_translation(&platform, &config.acceptance) {
                failed_checks.push(check);
            }
            Some(platform)
        }
        Err(check) => {
            failed_checks.push(check);
            None
        }
    };

    match (platform, lasers) {
        (Some(platform), [Some(left), Some(right)]) if failed_checks.is_empty() => Ok(ComboFit {
            platform,
            lasers: [left, right],
            samples,
        }),
        (platform, lasers) => {
            for check in &failed_checks {
                log::warn!("{check}");
            }
            Err(AggregateFailure {
                failed_checks,
                platform,
                lasers,
            })
        }
    }
}
