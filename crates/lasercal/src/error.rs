/// An error reported by a camera, board or platform collaborator.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum DeviceError {
    /// The device is not connected.
    #[error("Device is disconnected")]
    Disconnected,

    /// The camera failed to deliver a frame.
    #[error("Failed to capture image. {0}")]
    Capture(String),

    /// The platform failed to execute a motor command.
    #[error("Failed to move the platform. {0}")]
    Motion(String),
}

/// An error type for the configuration.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// Error to read or write the file.
    #[error("Failed to manipulate the configuration file. {0}")]
    Io(#[from] std::io::Error),

    /// Error to parse or serialize the JSON document.
    #[error("Failed to parse the configuration. {0}")]
    Json(#[from] serde_json::Error),

    /// The angle schedule does not describe a finite sweep.
    #[error("Invalid angle schedule: {0}")]
    InvalidSchedule(String),

    /// The pattern geometry is unusable.
    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),
}
