#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Batch fitting of the accumulated samples and acceptance checks.
///
/// See [`aggregate::aggregate`] for the full policy.
pub mod aggregate;

/// Interfaces of the hardware and vision components driven by a calibration.
pub mod collaborators;

/// The combined laser triangulation and platform extrinsics procedure.
pub mod combo;

/// Applying an accepted calibration onto the calibration data store.
pub mod commit;

/// Calibration settings, loadable from JSON.
pub mod config;

/// Error types for devices and configuration.
pub mod error;

/// Per step sample extraction.
pub mod extract;

/// Accumulators owned by a calibration session.
pub mod samples;

/// The stepwise platform sweep and its state machine.
pub mod session;

/// A deterministic simulated scanner implementing every collaborator.
pub mod synthetic;

pub use error::{ConfigError, DeviceError};
