use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use crate::aggregate::AggregateFailure;
use crate::collaborators::PlatformDriver;
use crate::error::DeviceError;

/// The states of a calibration session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationState {
    /// No session is running.
    Idle,
    /// The procedure is resetting its accumulators.
    Initializing,
    /// A capture step is running.
    Capturing {
        /// Zero based index of the step.
        step: usize,
        /// Number of steps of the sweep.
        total: usize,
    },
    /// The accumulated samples are being fitted.
    Aggregating,
    /// The calibration succeeded and waits for the caller to accept it.
    AcceptPending,
    /// The calibration was rejected or a device failed.
    Failed,
    /// The session was cancelled.
    Cancelled,
}

/// The hooks of a procedure driven by [`MovingCalibration`].
pub trait CaptureProcedure {
    /// The result of a successful calibration.
    type Fit;

    /// Reset the accumulators. Called once before the first capture.
    fn initialize(&mut self);

    /// Capture and process one platform angle in degrees.
    fn capture(&mut self, angle: f64);

    /// Called once the sweep is over, whatever its outcome.
    fn finish(&mut self) {}

    /// Fit the accumulated samples. Called at most once per session.
    fn aggregate(&mut self) -> Result<Self::Fit, AggregateFailure>;

    /// Drop the accumulators and any retained image.
    fn release(&mut self);
}

/// Reported after every capture step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureProgress {
    /// Zero based index of the step.
    pub step: usize,
    /// Number of steps of the sweep.
    pub total: usize,
    /// The platform angle of the step in degrees.
    pub angle: f64,
}

/// Why a calibration did not produce a result.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CalibrationFailure {
    /// The platform could not be driven, its position is unknown.
    #[error("Platform failure. {0}")]
    Device(#[from] DeviceError),

    /// The samples did not pass the acceptance checks.
    #[error(transparent)]
    Aggregate(#[from] AggregateFailure),
}

/// The outcome of a calibration session.
#[derive(Debug, Clone, PartialEq)]
pub enum CalibrationOutcome<F> {
    /// The calibration was accepted by every check.
    Success(F),
    /// The calibration failed.
    Failure(CalibrationFailure),
    /// The session was cancelled. No partial result is kept.
    Cancelled,
}

impl<F> CalibrationOutcome<F> {
    /// The fit of a successful calibration.
    pub fn success(self) -> Option<F> {
        match self {
            CalibrationOutcome::Success(fit) => Some(fit),
            _ => None,
        }
    }

    /// Whether the calibration succeeded.
    pub fn is_success(&self) -> bool {
        matches!(self, CalibrationOutcome::Success(_))
    }

    /// Whether the session was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, CalibrationOutcome::Cancelled)
    }
}

type ProgressCallback<'a> = Box<dyn FnMut(&CaptureProgress) + 'a>;

/// Drives a [`CaptureProcedure`] over a sweep of platform angles.
///
/// The platform is enabled, moved to each angle in turn and disabled at the end,
/// also on cancellation or failure. Cancellation is cooperative: the token is checked
/// before every step and before aggregation, an in-flight step always completes.
pub struct MovingCalibration<'a, P: CaptureProcedure> {
    procedure: P,
    platform: &'a mut dyn PlatformDriver,
    angles: Vec<f64>,
    return_to_origin: bool,
    cancel: Arc<AtomicBool>,
    progress: Option<ProgressCallback<'a>>,
    state: CalibrationState,
}

impl<'a, P: CaptureProcedure> MovingCalibration<'a, P> {
    /// Create a session visiting `angles` in order.
    pub fn new(procedure: P, platform: &'a mut dyn PlatformDriver, angles: Vec<f64>) -> Self {
        Self {
            procedure,
            platform,
            angles,
            return_to_origin: true,
            cancel: Arc::new(AtomicBool::new(false)),
            progress: None,
            state: CalibrationState::Idle,
        }
    }

    /// Whether to rotate the platform back to its starting position after the sweep.
    pub fn with_return_to_origin(mut self, return_to_origin: bool) -> Self {
        self.return_to_origin = return_to_origin;
        self
    }

    /// Use an externally owned cancellation token.
    pub fn with_cancel_token(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    /// Call `callback` after every capture step.
    pub fn with_progress(mut self, callback: impl FnMut(&CaptureProgress) + 'a) -> Self {
        self.progress = Some(Box::new(callback));
        self
    }

    /// The cancellation token. Setting it to `true` cancels the running session.
    pub fn cancel_token(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    /// Request the cancellation of the running session.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    /// The current state.
    pub fn state(&self) -> CalibrationState {
        self.state
    }

    /// The driven procedure.
    pub fn procedure(&self) -> &P {
        &self.procedure
    }

    /// Go back to [`CalibrationState::Idle`], clearing the cancellation request and
    /// releasing the procedure.
    pub fn reset(&mut self) {
        self.cancel.store(false, Ordering::SeqCst);
        self.procedure.release();
        self.set_state(CalibrationState::Idle);
    }

    /// Run the whole session: sweep, aggregate and report the outcome.
    ///
    /// The accumulators are released before returning, a successful fit carries its
    /// own copy of the samples.
    ///
    /// The cancellation token is not cleared here: a token set before the call, or
    /// left set by a cancelled run, cancels this run before its first step. Call
    /// [`MovingCalibration::reset`] to start over after a cancellation.
    pub fn run(&mut self) -> CalibrationOutcome<P::Fit> {
        self.set_state(CalibrationState::Initializing);
        self.procedure.initialize();

        let mut position = 0.0;
        let sweep = self.sweep(&mut position);
        self.park(position);
        self.procedure.finish();

        let outcome = match sweep {
            Err(e) => {
                log::warn!("Calibration aborted: {e}");
                self.set_state(CalibrationState::Failed);
                CalibrationOutcome::Failure(CalibrationFailure::Device(e))
            }
            Ok(()) if self.is_cancelled() => {
                log::info!("Calibration cancelled");
                self.set_state(CalibrationState::Cancelled);
                CalibrationOutcome::Cancelled
            }
            Ok(()) => {
                self.set_state(CalibrationState::Aggregating);
                match self.procedure.aggregate() {
                    Ok(fit) => {
                        self.set_state(CalibrationState::AcceptPending);
                        CalibrationOutcome::Success(fit)
                    }
                    Err(failure) => {
                        log::warn!("{failure}");
                        self.set_state(CalibrationState::Failed);
                        CalibrationOutcome::Failure(CalibrationFailure::Aggregate(failure))
                    }
                }
            }
        };

        self.procedure.release();
        outcome
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    fn set_state(&mut self, state: CalibrationState) {
        log::debug!("Calibration state: {:?} -> {:?}", self.state, state);
        self.state = state;
    }

    // rotate through the angles, `position` tracks where the platform is
    fn sweep(&mut self, position: &mut f64) -> Result<(), DeviceError> {
        self.platform.enable()?;

        let angles = self.angles.clone();
        let total = angles.len();
        for (step, &angle) in angles.iter().enumerate() {
            if self.is_cancelled() {
                return Ok(());
            }

            self.platform.rotate(angle - *position)?;
            *position = angle;

            self.set_state(CalibrationState::Capturing { step, total });
            self.procedure.capture(angle);

            if let Some(progress) = self.progress.as_mut() {
                progress(&CaptureProgress { step, total, angle });
            }
        }

        Ok(())
    }

    // best effort, the outcome is already decided
    fn park(&mut self, position: f64) {
        if self.return_to_origin && position != 0.0 {
            if let Err(e) = self.platform.rotate(-position) {
                log::warn!("Failed to return the platform to the origin: {e}");
            }
        }
        if let Err(e) = self.platform.disable() {
            log::warn!("Failed to disable the platform: {e}");
        }
    }
}
