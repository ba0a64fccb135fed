use std::path::{Path, PathBuf};

use lasercal_3d::{
    io::ply::{write_ply, PlyEncoding, PlyError},
    pointcloud::PointCloud,
};

use crate::collaborators::LaserIndex;

/// The origin corner positions collected over the sweep, one coordinate per sequence.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlatformSamples {
    /// x coordinates.
    pub x: Vec<f64>,
    /// y coordinates.
    pub y: Vec<f64>,
    /// z coordinates.
    pub z: Vec<f64>,
}

impl PlatformSamples {
    /// Append one sample.
    pub fn push(&mut self, point: [f64; 3]) {
        self.x.push(point[0]);
        self.y.push(point[1]);
        self.z.push(point[2]);
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.x.len()
    }

    /// Whether no sample was collected.
    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// The samples as points.
    pub fn points(&self) -> Vec<[f64; 3]> {
        self.x
            .iter()
            .zip(&self.y)
            .zip(&self.z)
            .map(|((&x, &y), &z)| [x, y, z])
            .collect()
    }
}

/// Everything accumulated by a combined calibration session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CalibrationSamples {
    /// Origin corner positions for the platform fit.
    pub platform: PlatformSamples,
    /// Triangulated laser points, indexed by [`LaserIndex::index`].
    pub lasers: [PointCloud; 2],
}

impl CalibrationSamples {
    /// The point cloud of one laser.
    pub fn laser(&self, laser: LaserIndex) -> &PointCloud {
        &self.lasers[laser.index()]
    }

    /// The point cloud of one laser, for accumulation.
    pub fn laser_mut(&mut self, laser: LaserIndex) -> &mut PointCloud {
        &mut self.lasers[laser.index()]
    }

    /// Write each laser cloud to `laser_<index>.ply` inside `dir`.
    ///
    /// The directory is created if needed. Returns the written paths in laser order.
    pub fn export_point_clouds(
        &self,
        dir: impl AsRef<Path>,
        encoding: PlyEncoding,
    ) -> Result<Vec<PathBuf>, PlyError> {
        std::fs::create_dir_all(dir.as_ref())?;
        let mut paths = Vec::with_capacity(LaserIndex::ALL.len());
        for laser in LaserIndex::ALL {
            let path = dir.as_ref().join(format!("laser_{}.ply", laser.index()));
            write_ply(&path, self.laser(laser), encoding)?;
            paths.push(path);
        }
        Ok(paths)
    }
}
