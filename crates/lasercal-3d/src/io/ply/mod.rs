mod parser;
mod properties;
mod writer;

pub use parser::*;
pub use properties::*;
pub use writer::*;

/// Error types for the PLY module.
#[derive(Debug, thiserror::Error)]
pub enum PlyError {
    /// Failed to read or write the PLY file
    #[error("Failed to read or write PLY file. {0}")]
    Io(#[from] std::io::Error),

    /// Failed to deserialize a binary vertex
    #[error("Failed to deserialize PLY vertex. {0}")]
    Deserialize(#[from] bincode::error::DecodeError),

    /// Failed to serialize a binary vertex
    #[error("Failed to serialize PLY vertex. {0}")]
    Serialize(#[from] bincode::error::EncodeError),

    /// The header is malformed or declares an unsupported layout
    #[error("Unsupported PLY header: {0}")]
    UnsupportedHeader(String),

    /// Unsupported PLY property
    #[error("Unsupported PLY property: {0}")]
    UnsupportedProperty(String),

    /// A value in an ascii body could not be parsed
    #[error("Invalid PLY value: {0}")]
    InvalidValue(String),
}
