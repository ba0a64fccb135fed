use argh::FromArgs;
use lasercal::{
    combo::ComboCalibration,
    commit::CalibrationData,
    config::CalibrationConfig,
    session::{CalibrationOutcome, CaptureProgress, MovingCalibration},
    synthetic::{SyntheticDetector, SyntheticScanner, SyntheticScene},
};
use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

#[derive(FromArgs, Debug)]
/// Run the combined laser and platform calibration on a simulated scanner
struct Args {
    /// path to the calibration settings, JSON
    #[argh(option, short = 'c')]
    config: Option<PathBuf>,

    /// path to the calibration data to update, JSON
    #[argh(option, short = 'o', default = "PathBuf::from(\"calibration_data.json\")")]
    output: PathBuf,

    /// directory where the laser point clouds are saved
    #[argh(option, short = 'e')]
    export_dir: Option<PathBuf>,

    /// stop detecting the pattern after this many detections
    #[argh(option, short = 'm')]
    max_detections: Option<usize>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args: Args = argh::from_env();

    let mut config = match &args.config {
        Some(path) => CalibrationConfig::from_json_file(path)?,
        None => CalibrationConfig::default(),
    };
    if args.export_dir.is_some() {
        config.export_dir = args.export_dir.clone();
    }
    config.validate()?;

    // the simulated scene follows the pattern of the settings
    let scene = SyntheticScene {
        camera: config.camera,
        rows: config.pattern.rows,
        columns: config.pattern.columns,
        square_width: config.pattern.square_width,
        origin_distance: config.pattern.origin_distance,
        ..Default::default()
    };

    // create a cancel token to stop the sweep
    let cancel_token = Arc::new(AtomicBool::new(false));

    ctrlc::set_handler({
        let cancel_token = cancel_token.clone();
        move || {
            println!("Received Ctrl-C signal. Sending cancel signal !!");
            cancel_token.store(true, Ordering::SeqCst);
        }
    })?;

    // run the session in a worker thread
    let worker = std::thread::spawn({
        let cancel_token = cancel_token.clone();
        let config = config.clone();
        move || {
            let mut scanner = SyntheticScanner::new(scene);
            if let Some(max_detections) = args.max_detections {
                scanner.detector =
                    SyntheticDetector::new(scanner.scene.clone()).with_max_detections(max_detections);
            }

            let (collaborators, platform) = scanner.collaborators();
            let procedure = ComboCalibration::new(collaborators, &config);
            let mut session = MovingCalibration::new(procedure, platform, config.angles())
                .with_return_to_origin(config.return_to_origin)
                .with_cancel_token(cancel_token)
                .with_progress(|progress: &CaptureProgress| {
                    log::info!(
                        "Step {}/{} at {:.1}°",
                        progress.step + 1,
                        progress.total,
                        progress.angle
                    );
                });

            session.run()
        }
    });

    let outcome = worker
        .join()
        .map_err(|_| "the calibration worker panicked")?;

    let fit = match outcome {
        CalibrationOutcome::Success(fit) => fit,
        CalibrationOutcome::Failure(failure) => {
            log::error!("{failure}");
            return Err(failure.into());
        }
        CalibrationOutcome::Cancelled => {
            println!("Calibration cancelled, nothing was saved");
            return Ok(());
        }
    };

    for (i, laser) in fit.lasers.iter().enumerate() {
        println!(
            "Laser {i}: distance {:.3}, normal {:?}, std {:.4}",
            laser.distance, laser.normal, laser.std
        );
    }
    println!(
        "Platform: translation {:?}, radius {:.3}",
        fit.platform.translation, fit.platform.radius
    );

    let mut data = if args.output.exists() {
        CalibrationData::from_json_file(&args.output)?
    } else {
        CalibrationData {
            camera: config.camera,
            ..Default::default()
        }
    };
    fit.accept(&mut data);
    data.to_json_file(&args.output)?;
    println!("Calibration data saved to {}", args.output.display());

    Ok(())
}
