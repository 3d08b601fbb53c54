//! Flat numeric containers used throughout the network.
//!
//! `Matrix` follows the (features, batch) orientation: each column is one
//! sample. Storage is row-major `Vec<f64>` with manual index arithmetic,
//! no BLAS.

use crate::error::{Error, Result};

/// Dense 2D matrix, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl Matrix {
    /// All-zero matrix of the given shape.
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    /// Fill a matrix by repeatedly calling `f` in row-major order.
    pub fn from_fn(rows: usize, cols: usize, mut f: impl FnMut() -> f64) -> Self {
        let data = (0..rows * cols).map(|_| f()).collect();
        Self { rows, cols, data }
    }

    /// Build a matrix from row-major data; fails if the length does not
    /// match the shape.
    pub fn from_vec(rows: usize, cols: usize, data: Vec<f64>) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(Error::shape(
                "Matrix::from_vec",
                (rows, cols),
                (data.len(), 1),
            ));
        }
        Ok(Self { rows, cols, data })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f64] {
        &mut self.data
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.cols + col]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        self.data[row * self.cols + col] = value;
    }

    /// Elementwise map into a new matrix.
    pub fn map(&self, f: impl Fn(f64) -> f64) -> Matrix {
        Matrix {
            rows: self.rows,
            cols: self.cols,
            data: self.data.iter().map(|&v| f(v)).collect(),
        }
    }

    /// Matrix product `self * rhs`.
    pub fn matmul(&self, rhs: &Matrix) -> Result<Matrix> {
        if self.cols != rhs.rows {
            return Err(Error::shape(
                "matmul",
                (self.cols, rhs.cols),
                (rhs.rows, rhs.cols),
            ));
        }
        let mut out = Matrix::zeros(self.rows, rhs.cols);
        for i in 0..self.rows {
            for k in 0..self.cols {
                let a = self.data[i * self.cols + k];
                let rhs_row = &rhs.data[k * rhs.cols..(k + 1) * rhs.cols];
                let out_row = &mut out.data[i * rhs.cols..(i + 1) * rhs.cols];
                for (o, &r) in out_row.iter_mut().zip(rhs_row) {
                    *o += a * r;
                }
            }
        }
        Ok(out)
    }

    /// Product `self^T * rhs` without materializing the transpose.
    pub fn transposed_matmul(&self, rhs: &Matrix) -> Result<Matrix> {
        if self.rows != rhs.rows {
            return Err(Error::shape(
                "transposed_matmul",
                (self.rows, self.cols),
                (rhs.rows, rhs.cols),
            ));
        }
        let mut out = Matrix::zeros(self.cols, rhs.cols);
        for k in 0..self.rows {
            let lhs_row = &self.data[k * self.cols..(k + 1) * self.cols];
            let rhs_row = &rhs.data[k * rhs.cols..(k + 1) * rhs.cols];
            for (i, &a) in lhs_row.iter().enumerate() {
                let out_row = &mut out.data[i * rhs.cols..(i + 1) * rhs.cols];
                for (o, &r) in out_row.iter_mut().zip(rhs_row) {
                    *o += a * r;
                }
            }
        }
        Ok(out)
    }

    /// Product `self * rhs^T` without materializing the transpose.
    pub fn matmul_transposed(&self, rhs: &Matrix) -> Result<Matrix> {
        if self.cols != rhs.cols {
            return Err(Error::shape(
                "matmul_transposed",
                (self.rows, self.cols),
                (rhs.rows, rhs.cols),
            ));
        }
        let mut out = Matrix::zeros(self.rows, rhs.rows);
        for i in 0..self.rows {
            let lhs_row = &self.data[i * self.cols..(i + 1) * self.cols];
            for j in 0..rhs.rows {
                let rhs_row = &rhs.data[j * rhs.cols..(j + 1) * rhs.cols];
                let mut sum = 0.0;
                for (&a, &b) in lhs_row.iter().zip(rhs_row) {
                    sum += a * b;
                }
                out.data[i * rhs.rows + j] = sum;
            }
        }
        Ok(out)
    }

    /// Broadcast-add a (rows, 1) column to every column of `self`.
    pub fn add_column(&mut self, column: &Matrix) -> Result<()> {
        if column.rows != self.rows || column.cols != 1 {
            return Err(Error::shape(
                "add_column",
                (self.rows, 1),
                (column.rows, column.cols),
            ));
        }
        for (row, &b) in self.data.chunks_exact_mut(self.cols).zip(&column.data) {
            for v in row {
                *v += b;
            }
        }
        Ok(())
    }

    /// Row-wise sums as a (rows, 1) column.
    pub fn row_sums(&self) -> Matrix {
        let data = self
            .data
            .chunks_exact(self.cols)
            .map(|row| row.iter().sum())
            .collect();
        Matrix {
            rows: self.rows,
            cols: 1,
            data,
        }
    }

    pub fn scale(&mut self, factor: f64) {
        for v in &mut self.data {
            *v *= factor;
        }
    }

    /// In-place `self -= alpha * other`, the gradient-descent step.
    pub fn sub_scaled(&mut self, other: &Matrix, alpha: f64) -> Result<()> {
        if self.shape() != other.shape() {
            return Err(Error::shape("sub_scaled", self.shape(), other.shape()));
        }
        for (v, &g) in self.data.iter_mut().zip(&other.data) {
            *v -= alpha * g;
        }
        Ok(())
    }

    /// Per-column argmax row index. Ties resolve to the lowest index
    /// (strictly-greater scan from row 0).
    pub fn column_argmax(&self) -> Vec<usize> {
        let mut best = vec![0usize; self.cols];
        let mut best_value = self.data[..self.cols].to_vec();
        for row in 1..self.rows {
            for col in 0..self.cols {
                let v = self.data[row * self.cols + col];
                if v > best_value[col] {
                    best_value[col] = v;
                    best[col] = row;
                }
            }
        }
        best
    }
}

/// A batch of square single-channel images, sample-major contiguous.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageBatch {
    height: usize,
    width: usize,
    count: usize,
    data: Vec<f64>,
}

impl ImageBatch {
    pub fn zeros(height: usize, width: usize, count: usize) -> Self {
        Self {
            height,
            width,
            count,
            data: vec![0.0; height * width * count],
        }
    }

    /// Build a batch from sample-major pixel data.
    pub fn from_vec(height: usize, width: usize, count: usize, data: Vec<f64>) -> Result<Self> {
        if data.len() != height * width * count {
            return Err(Error::shape(
                "ImageBatch::from_vec",
                (height * width, count),
                (data.len(), 1),
            ));
        }
        Ok(Self {
            height,
            width,
            count,
            data,
        })
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Row-major pixels of one sample.
    pub fn image(&self, sample: usize) -> &[f64] {
        let size = self.height * self.width;
        &self.data[sample * size..(sample + 1) * size]
    }

    pub fn image_mut(&mut self, sample: usize) -> &mut [f64] {
        let size = self.height * self.width;
        &mut self.data[sample * size..(sample + 1) * size]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_vec_length_check() {
        assert!(Matrix::from_vec(2, 2, vec![1.0, 2.0, 3.0]).is_err());
        assert!(Matrix::from_vec(2, 2, vec![1.0, 2.0, 3.0, 4.0]).is_ok());
    }

    #[test]
    fn test_matmul() {
        let a = Matrix::from_vec(2, 3, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        let b = Matrix::from_vec(3, 2, vec![7.0, 8.0, 9.0, 10.0, 11.0, 12.0]).unwrap();
        let c = a.matmul(&b).unwrap();
        assert_eq!(c.shape(), (2, 2));
        assert_eq!(c.get(0, 0), 58.0);
        assert_eq!(c.get(0, 1), 64.0);
        assert_eq!(c.get(1, 0), 139.0);
        assert_eq!(c.get(1, 1), 154.0);
    }

    #[test]
    fn test_matmul_shape_mismatch() {
        let a = Matrix::zeros(2, 3);
        let b = Matrix::zeros(2, 3);
        assert!(a.matmul(&b).is_err());
    }

    #[test]
    fn test_transposed_matmul_matches_explicit_transpose() {
        let a = Matrix::from_vec(2, 3, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        let b = Matrix::from_vec(2, 2, vec![1.0, 0.0, 0.0, 2.0]).unwrap();
        // a^T is 3x2; a^T * b is 3x2
        let c = a.transposed_matmul(&b).unwrap();
        assert_eq!(c.shape(), (3, 2));
        assert_eq!(c.get(0, 0), 1.0);
        assert_eq!(c.get(0, 1), 8.0);
        assert_eq!(c.get(2, 0), 3.0);
        assert_eq!(c.get(2, 1), 12.0);
    }

    #[test]
    fn test_matmul_transposed() {
        let a = Matrix::from_vec(2, 3, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        let b = Matrix::from_vec(2, 3, vec![1.0, 1.0, 1.0, 2.0, 2.0, 2.0]).unwrap();
        // a * b^T is 2x2
        let c = a.matmul_transposed(&b).unwrap();
        assert_eq!(c.get(0, 0), 6.0);
        assert_eq!(c.get(0, 1), 12.0);
        assert_eq!(c.get(1, 0), 15.0);
        assert_eq!(c.get(1, 1), 30.0);
    }

    #[test]
    fn test_add_column_broadcast() {
        let mut m = Matrix::zeros(2, 3);
        let b = Matrix::from_vec(2, 1, vec![1.0, -1.0]).unwrap();
        m.add_column(&b).unwrap();
        assert_eq!(m.get(0, 2), 1.0);
        assert_eq!(m.get(1, 0), -1.0);
    }

    #[test]
    fn test_row_sums() {
        let m = Matrix::from_vec(2, 3, vec![1.0, 2.0, 3.0, -1.0, 0.0, 1.0]).unwrap();
        let s = m.row_sums();
        assert_eq!(s.shape(), (2, 1));
        assert_eq!(s.get(0, 0), 6.0);
        assert_eq!(s.get(1, 0), 0.0);
    }

    #[test]
    fn test_column_argmax_lowest_index_tie_break() {
        let m = Matrix::from_vec(3, 2, vec![1.0, 0.0, 1.0, 2.0, 0.0, 2.0]).unwrap();
        // Column 0 ties rows 0 and 1 at 1.0: lowest index wins.
        assert_eq!(m.column_argmax(), vec![0, 1]);
    }

    #[test]
    fn test_sub_scaled() {
        let mut m = Matrix::from_vec(1, 2, vec![1.0, 2.0]).unwrap();
        let g = Matrix::from_vec(1, 2, vec![0.5, 0.5]).unwrap();
        m.sub_scaled(&g, 2.0).unwrap();
        assert_eq!(m.data(), &[0.0, 1.0]);
    }

    #[test]
    fn test_image_batch_indexing() {
        let mut batch = ImageBatch::zeros(2, 2, 2);
        batch.image_mut(1)[3] = 7.0;
        assert_eq!(batch.image(0), &[0.0, 0.0, 0.0, 0.0]);
        assert_eq!(batch.image(1), &[0.0, 0.0, 0.0, 7.0]);
    }
}
