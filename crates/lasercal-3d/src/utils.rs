/// Utility function to convert a 3x3 array to an owned faer matrix.
///
/// # Arguments
///
/// * `array` - A 3x3 array in row-major order.
///
/// # Returns
///
/// A faer matrix 3x3.
pub fn array33_to_faer_mat(array: &[[f64; 3]; 3]) -> faer::Mat<f64> {
    faer::Mat::<f64>::from_fn(3, 3, |i, j| array[i][j])
}

/// Utility function to copy a column of a faer matrix into a 3D array.
///
/// PRECONDITION: the matrix has at least 3 rows and `col` is a valid column index.
pub fn faer_col_to_array3(mat: faer::MatRef<'_, f64>, col: usize) -> [f64; 3] {
    [mat.read(0, col), mat.read(1, col), mat.read(2, col)]
}

/// Utility function to copy a column of a faer matrix into a 4D array.
///
/// PRECONDITION: the matrix has at least 4 rows and `col` is a valid column index.
pub fn faer_col_to_array4(mat: faer::MatRef<'_, f64>, col: usize) -> [f64; 4] {
    [
        mat.read(0, col),
        mat.read(1, col),
        mat.read(2, col),
        mat.read(3, col),
    ]
}
