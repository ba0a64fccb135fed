#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Pinhole camera projection and back-projection onto planes.
pub mod camera;

/// Plane, circle and laser plane fitting.
pub mod fit;

/// I/O utilities for reading and writing 3D data.
pub mod io;

/// Linear algebra utilities.
pub mod linalg;

/// Point cloud container.
pub mod pointcloud;

/// 3D transforms algorithms.
pub mod transforms;

/// Conversions between fixed size arrays and faer types.
pub mod utils;
