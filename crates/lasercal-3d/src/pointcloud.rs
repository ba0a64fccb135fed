/// A point cloud with points and optional per-point colors.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointCloud {
    // The points in the point cloud.
    points: Vec<[f64; 3]>,
    // The colors of the points.
    colors: Option<Vec<[u8; 3]>>,
}

impl PointCloud {
    /// Create a new point cloud from points and colors (optional).
    pub fn new(points: Vec<[f64; 3]>, colors: Option<Vec<[u8; 3]>>) -> Self {
        Self { points, colors }
    }

    /// Create a point cloud holding only positions.
    pub fn from_points(points: Vec<[f64; 3]>) -> Self {
        Self::new(points, None)
    }

    /// Get the number of points in the point cloud.
    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Check if the point cloud is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Get as reference the points in the point cloud.
    pub fn points(&self) -> &[[f64; 3]] {
        &self.points
    }

    /// Get as reference the colors of the points in the point cloud.
    pub fn colors(&self) -> Option<&[[u8; 3]]> {
        self.colors.as_deref()
    }

    /// Append positions at the end of the cloud.
    ///
    /// Colors are dropped since they would no longer cover every point.
    pub fn extend_from_slice(&mut self, points: &[[f64; 3]]) {
        if points.is_empty() {
            return;
        }
        self.points.extend_from_slice(points);
        self.colors = None;
    }
}
