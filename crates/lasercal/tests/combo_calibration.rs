use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use approx::assert_relative_eq;
use lasercal::{
    aggregate::{ComboFit, FailedCheck},
    collaborators::LaserIndex,
    combo::ComboCalibration,
    commit::CalibrationData,
    config::{AngleSchedule, CalibrationConfig, PatternConfig},
    extract::StepSamples,
    session::{CalibrationFailure, CalibrationOutcome, CalibrationState, MovingCalibration},
    synthetic::{SyntheticDetector, SyntheticScanner, SyntheticScene},
};
use lasercal_3d::{
    fit::{fit_laser_plane, LaserPlaneParams, RansacParams},
    io::ply::read_ply,
    linalg,
};

fn config(schedule: AngleSchedule) -> CalibrationConfig {
    CalibrationConfig {
        schedule,
        pattern: PatternConfig {
            rows: 6,
            columns: 11,
            square_width: 13.0,
            origin_distance: 20.0,
        },
        laser_fit: LaserPlaneParams {
            ransac: Some(RansacParams {
                random_seed: Some(0),
                ..Default::default()
            }),
        },
        ..Default::default()
    }
}

// 12 angles from -33° to 33°
fn twelve_angles() -> CalibrationConfig {
    config(AngleSchedule::new(-33.0, 39.0, 6.0))
}

fn run(
    scanner: &mut SyntheticScanner,
    config: &CalibrationConfig,
) -> (CalibrationOutcome<ComboFit>, Vec<StepSamples>) {
    let (collaborators, platform) = scanner.collaborators();
    let procedure = ComboCalibration::new(collaborators, config);
    let mut session = MovingCalibration::new(procedure, platform, config.angles())
        .with_return_to_origin(config.return_to_origin);

    let outcome = session.run();
    let steps = session.procedure().steps().to_vec();
    (outcome, steps)
}

fn expect_success(outcome: CalibrationOutcome<ComboFit>) -> Result<ComboFit, String> {
    match outcome {
        CalibrationOutcome::Success(fit) => Ok(fit),
        other => Err(format!("expected a successful calibration, got {other:?}")),
    }
}

#[test]
fn test_combo_calibration_success() -> Result<(), Box<dyn std::error::Error>> {
    let config = twelve_angles();
    let mut scanner = SyntheticScanner::new(SyntheticScene::default());

    let (outcome, steps) = run(&mut scanner, &config);
    let fit = expect_success(outcome)?;

    assert_eq!(steps.len(), 12);
    assert!(steps.iter().all(|s| s.pose_detected));

    // platform
    let platform = &fit.platform;
    assert!(platform.normal[1] <= 0.0);
    for (k, expected) in [0.0, -1.0, 0.0].into_iter().enumerate() {
        assert_relative_eq!(platform.normal[k], expected, epsilon = 1e-6);
    }
    assert_relative_eq!(platform.radius, 50.0, epsilon = 1e-6);
    for (k, expected) in scanner.scene.platform_center.into_iter().enumerate() {
        assert_relative_eq!(platform.translation[k], expected, epsilon = 1e-6);
    }
    assert!(
        linalg::euclidean_distance(&platform.translation, &config.acceptance.prior_translation)
            < 100.0
    );
    assert_eq!(fit.samples.platform.len(), 12);

    // lasers
    for laser in LaserIndex::ALL {
        let plane = &fit.lasers[laser.index()];
        let expected = &scanner.scene.lasers[laser.index()];
        assert!(plane.std < 1.0, "laser {laser} std {}", plane.std);
        assert!(linalg::dot_product3(&plane.normal, &expected.normal) > 0.9999);
        assert_relative_eq!(plane.distance, expected.distance, epsilon = 0.5);
    }

    // the devices are back to their idle state
    assert!(scanner.camera.is_streaming());
    assert!(!scanner.platform.is_enabled());
    assert_relative_eq!(scanner.platform.angle(), 0.0, epsilon = 1e-9);
    Ok(())
}

#[test]
fn test_combo_calibration_accumulates_every_step() -> Result<(), Box<dyn std::error::Error>> {
    let config = twelve_angles();
    let mut scanner = SyntheticScanner::new(SyntheticScene::default());

    let (outcome, steps) = run(&mut scanner, &config);
    let fit = expect_success(outcome)?;

    for laser in LaserIndex::ALL {
        let expected = steps
            .iter()
            .map(|s| s.laser_points[laser.index()])
            .sum::<usize>();
        assert!(expected > 0);
        assert_eq!(fit.samples.laser(laser).len(), expected);
    }
    let platform_samples = steps.iter().filter(|s| s.platform_sample.is_some()).count();
    assert_eq!(fit.samples.platform.len(), platform_samples);
    Ok(())
}

#[test]
fn test_combo_calibration_rejects_few_platform_samples() {
    let config = twelve_angles();
    let mut scanner = SyntheticScanner::new(SyntheticScene::default());
    scanner.detector = SyntheticDetector::new(scanner.scene.clone()).with_max_detections(3);

    let (outcome, steps) = run(&mut scanner, &config);

    assert_eq!(steps.iter().filter(|s| s.pose_detected).count(), 3);
    let CalibrationOutcome::Failure(CalibrationFailure::Aggregate(failure)) = outcome else {
        panic!("expected a rejected calibration, got {outcome:?}");
    };
    assert_eq!(failure.platform, None);
    assert!(failure.failed_checks.contains(&FailedCheck::InsufficientPlatformSamples {
        required: 5,
        actual: 3
    }));
    // the lasers are still fitted for diagnostics
    assert!(failure.lasers.iter().all(Option::is_some));
    assert!(scanner.camera.is_streaming());
}

#[test]
fn test_combo_calibration_cancel() {
    let config = twelve_angles();
    let mut scanner = SyntheticScanner::new(SyntheticScene::default());
    let cancel = Arc::new(AtomicBool::new(false));

    let (outcome, steps, state, released) = {
        let token = cancel.clone();
        let (collaborators, platform) = scanner.collaborators();
        let procedure = ComboCalibration::new(collaborators, &config);
        let mut session = MovingCalibration::new(procedure, platform, config.angles())
            .with_cancel_token(cancel.clone())
            .with_progress(move |progress| {
                if progress.step == 4 {
                    token.store(true, Ordering::SeqCst);
                }
            });

        let outcome = session.run();
        let procedure = session.procedure();
        let released = procedure.samples().is_none() && procedure.image().is_none();
        (outcome, procedure.steps().to_vec(), session.state(), released)
    };

    assert!(outcome.is_cancelled());
    assert!(outcome.success().is_none());
    assert_eq!(state, CalibrationState::Cancelled);
    assert!(released);
    assert_eq!(steps.len(), 5);
    assert!(cancel.load(Ordering::SeqCst));

    assert!(scanner.camera.is_streaming());
    assert!(!scanner.platform.is_enabled());
    assert_relative_eq!(scanner.platform.angle(), 0.0, epsilon = 1e-9);
}

#[test]
fn test_combo_calibration_full_sweep() -> Result<(), Box<dyn std::error::Error>> {
    // the default sweep goes beyond the visibility of the pattern
    let config = config(AngleSchedule::default());
    let scene = SyntheticScene::default();
    let visible = config.angles().iter().filter(|a| scene.is_visible(**a)).count();
    let mut scanner = SyntheticScanner::new(scene);

    let (outcome, steps) = run(&mut scanner, &config);
    let fit = expect_success(outcome)?;

    assert_eq!(steps.len(), 36);
    assert_eq!(steps.iter().filter(|s| s.pose_detected).count(), visible);
    assert!(steps
        .iter()
        .filter(|s| !s.pose_detected)
        .all(|s| s.platform_sample.is_none() && s.laser_points == [0, 0]));
    assert_eq!(fit.samples.platform.len(), visible);
    for laser in LaserIndex::ALL {
        assert!(fit.lasers[laser.index()].std < 1.0);
    }
    Ok(())
}

#[test]
fn test_combo_calibration_exports_point_clouds() -> Result<(), Box<dyn std::error::Error>> {
    let tmp_dir = tempfile::tempdir()?;
    let config = CalibrationConfig {
        export_dir: Some(tmp_dir.path().join("clouds")),
        ..twelve_angles()
    };
    let mut scanner = SyntheticScanner::new(SyntheticScene::default());

    let (outcome, _) = run(&mut scanner, &config);
    let fit = expect_success(outcome)?;

    for laser in LaserIndex::ALL {
        let path = tmp_dir
            .path()
            .join("clouds")
            .join(format!("laser_{}.ply", laser.index()));
        let cloud = read_ply(&path)?;
        assert_eq!(&cloud, fit.samples.laser(laser));

        // refitting the exported cloud gives the same plane
        let plane = fit_laser_plane(cloud.points(), &config.laser_fit)?;
        assert_relative_eq!(plane.distance, fit.lasers[laser.index()].distance, epsilon = 1e-9);
    }
    Ok(())
}

#[test]
fn test_combo_calibration_accept() -> Result<(), Box<dyn std::error::Error>> {
    let config = twelve_angles();
    let mut scanner = SyntheticScanner::new(SyntheticScene::default());

    let (outcome, _) = run(&mut scanner, &config);
    let fit = expect_success(outcome)?;

    let mut data = CalibrationData::default();
    fit.accept(&mut data);

    for laser in LaserIndex::ALL {
        assert_eq!(data.laser_planes[laser.index()].distance, fit.lasers[laser.index()].distance);
        assert_eq!(data.laser_planes[laser.index()].normal, fit.lasers[laser.index()].normal);
    }
    assert_eq!(data.platform_rotation, fit.platform.rotation);
    assert_eq!(data.platform_translation, fit.platform.translation);
    Ok(())
}
