//! Core types for the batched solver.
//!
//! Provides [`CsrMatrix`] for compressed sparse row storage, [`Batch`] for a
//! packed collection of independent vectors, [`DenseMatrix`] for the sparse ×
//! dense products, and [`Snapshot`] for reporting solver state.

use crate::element::{Element, RawValues};
use crate::error::{SolverError, ValidationError};

// ---------------------------------------------------------------------------
// CsrMatrix<T>
// ---------------------------------------------------------------------------

/// Compressed Sparse Row (CSR) matrix.
///
/// # Layout
///
/// For a matrix with `m` rows and `nnz` non-zeros:
/// - `row_ptr` has length `m + 1`
/// - `col_indices` and `values` each have length `nnz`
/// - Row `i` spans indices `row_ptr[i]..row_ptr[i+1]`
#[derive(Debug, Clone, PartialEq)]
pub struct CsrMatrix<T> {
    /// Row pointers: `row_ptr[i]` is the start index in `col_indices`/`values`
    /// for row `i`.
    pub row_ptr: Vec<usize>,
    /// Column indices for each non-zero entry.
    pub col_indices: Vec<usize>,
    /// Values for each non-zero entry.
    pub values: Vec<T>,
    /// Number of rows (`dim_i`).
    pub rows: usize,
    /// Number of columns (`dim_j`).
    pub cols: usize,
}

impl<T: Element> CsrMatrix<T> {
    /// Sparse matrix-vector multiply: `y = A * x`.
    ///
    /// # Panics
    ///
    /// Debug-asserts that `x.len() >= self.cols` and `y.len() >= self.rows`.
    #[inline]
    pub fn spmv(&self, x: &[T], y: &mut [T]) {
        debug_assert!(
            x.len() >= self.cols,
            "spmv: x.len()={} < cols={}",
            x.len(),
            self.cols,
        );
        debug_assert!(
            y.len() >= self.rows,
            "spmv: y.len()={} < rows={}",
            y.len(),
            self.rows,
        );

        for (i, yi) in y.iter_mut().take(self.rows).enumerate() {
            let mut sum = T::zero();
            for idx in self.row_ptr[i]..self.row_ptr[i + 1] {
                sum += self.values[idx] * x[self.col_indices[idx]];
            }
            *yi = sum;
        }
    }

    /// Build a CSR matrix from COO (coordinate) triplets.
    ///
    /// Entries are sorted by (row, col) internally. Duplicate positions are
    /// kept as separate entries, which SpMV sums implicitly.
    ///
    /// # Panics
    ///
    /// Panics if a triplet lies outside `rows x cols`.
    pub fn from_coo(
        rows: usize,
        cols: usize,
        entries: impl IntoIterator<Item = (usize, usize, T)>,
    ) -> Self {
        let mut sorted: Vec<_> = entries.into_iter().collect();
        sorted.sort_unstable_by_key(|(r, c, _)| (*r, *c));

        let nnz = sorted.len();
        let mut row_ptr = vec![0usize; rows + 1];
        let mut col_indices = Vec::with_capacity(nnz);
        let mut values = Vec::with_capacity(nnz);

        for &(r, _, _) in &sorted {
            assert!(r < rows, "row index {} out of bounds (rows={})", r, rows);
            row_ptr[r + 1] += 1;
        }
        for i in 1..=rows {
            row_ptr[i] += row_ptr[i - 1];
        }

        for (_, c, v) in sorted {
            assert!(c < cols, "col index {} out of bounds (cols={})", c, cols);
            col_indices.push(c);
            values.push(v);
        }

        Self {
            row_ptr,
            col_indices,
            values,
            rows,
            cols,
        }
    }

    /// Build a square identity matrix of dimension `n`.
    pub fn identity(n: usize) -> Self {
        Self {
            row_ptr: (0..=n).collect(),
            col_indices: (0..n).collect(),
            values: vec![T::one(); n],
            rows: n,
            cols: n,
        }
    }

    /// Assemble a matrix from untyped CSR arrays.
    ///
    /// Offsets and column indices must be [`RawValues::I32`]; values must match
    /// `T`. The result is not structurally validated; run
    /// [`validate_csr_matrix`](crate::validation::validate_csr_matrix) before use.
    ///
    /// # Errors
    ///
    /// [`SolverError::TypeMismatch`] for a wrong element type, or
    /// [`ValidationError::NegativeIndex`] for negative offsets or indices.
    pub fn from_raw_parts(
        row_offsets: RawValues,
        column_indices: RawValues,
        values: RawValues,
        rows: usize,
        cols: usize,
    ) -> Result<Self, SolverError> {
        Ok(Self {
            row_ptr: row_offsets.into_indices()?,
            col_indices: column_indices.into_indices()?,
            values: T::from_raw(values)?,
            rows,
            cols,
        })
    }
}

impl<T> CsrMatrix<T> {
    /// Number of non-zero entries.
    #[inline]
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Number of stored entries in a specific row.
    #[inline]
    pub fn row_degree(&self, row: usize) -> usize {
        self.row_ptr[row + 1] - self.row_ptr[row]
    }

    /// Iterate over `(col_index, &value)` pairs for the given row.
    #[inline]
    pub fn row_entries(&self, row: usize) -> impl Iterator<Item = (usize, &T)> {
        let start = self.row_ptr[row];
        let end = self.row_ptr[row + 1];
        self.col_indices[start..end]
            .iter()
            .copied()
            .zip(self.values[start..end].iter())
    }
}

impl<T: Copy + Default> CsrMatrix<T> {
    /// Transpose: produces `A^T` in CSR form.
    ///
    /// Two-pass counting sort in O(nnz + rows + cols) time.
    pub fn transpose(&self) -> CsrMatrix<T> {
        let nnz = self.nnz();
        let t_rows = self.cols;

        let mut row_ptr = vec![0usize; t_rows + 1];
        for &c in &self.col_indices {
            row_ptr[c + 1] += 1;
        }
        for i in 1..=t_rows {
            row_ptr[i] += row_ptr[i - 1];
        }

        let mut col_indices = vec![0usize; nnz];
        let mut values = vec![T::default(); nnz];
        let mut cursor = row_ptr.clone();

        for row in 0..self.rows {
            for idx in self.row_ptr[row]..self.row_ptr[row + 1] {
                let c = self.col_indices[idx];
                let dest = cursor[c];
                col_indices[dest] = row;
                values[dest] = self.values[idx];
                cursor[c] += 1;
            }
        }

        CsrMatrix {
            row_ptr,
            col_indices,
            values,
            rows: t_rows,
            cols: self.rows,
        }
    }
}

// ---------------------------------------------------------------------------
// Batch<T>
// ---------------------------------------------------------------------------

/// A batch of independent vectors of equal length, packed row-major.
///
/// Entry `b` occupies `data[b * dim..(b + 1) * dim]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch<T> {
    data: Vec<T>,
    batch_size: usize,
    dim: usize,
}

impl<T: Element> Batch<T> {
    /// Create a batch of `batch_size` zero vectors of length `dim`.
    pub fn zeros(batch_size: usize, dim: usize) -> Self {
        Self {
            data: vec![T::zero(); batch_size * dim],
            batch_size,
            dim,
        }
    }

    /// Wrap packed data.
    ///
    /// # Errors
    ///
    /// [`ValidationError::DimensionMismatch`] if `data.len() != batch_size * dim`.
    pub fn from_vec(data: Vec<T>, batch_size: usize, dim: usize) -> Result<Self, ValidationError> {
        if data.len() != batch_size * dim {
            return Err(ValidationError::DimensionMismatch(format!(
                "batch data length {} does not equal batch_size * dim = {} * {}",
                data.len(),
                batch_size,
                dim,
            )));
        }
        Ok(Self {
            data,
            batch_size,
            dim,
        })
    }

    /// Build a batch from one vector per entry.
    ///
    /// # Errors
    ///
    /// [`ValidationError::DimensionMismatch`] if the entries differ in length.
    pub fn from_rows<R: AsRef<[T]>>(rows: &[R]) -> Result<Self, ValidationError> {
        let dim = rows.first().map_or(0, |r| r.as_ref().len());
        let mut data = Vec::with_capacity(rows.len() * dim);
        for (b, row) in rows.iter().enumerate() {
            let row = row.as_ref();
            if row.len() != dim {
                return Err(ValidationError::DimensionMismatch(format!(
                    "batch entry {b} has length {} but entry 0 has length {dim}",
                    row.len(),
                )));
            }
            data.extend_from_slice(row);
        }
        Ok(Self {
            data,
            batch_size: rows.len(),
            dim,
        })
    }

    /// Build a batch from untyped data.
    ///
    /// # Errors
    ///
    /// [`SolverError::TypeMismatch`] if `raw` does not carry `T`, or
    /// [`SolverError::InvalidInput`] on a length mismatch.
    pub fn from_raw(raw: RawValues, batch_size: usize, dim: usize) -> Result<Self, SolverError> {
        let data = T::from_raw(raw)?;
        Ok(Self::from_vec(data, batch_size, dim)?)
    }
}

impl<T> Batch<T> {
    /// Number of entries.
    #[inline]
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Length of each entry.
    #[inline]
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Entry `b`.
    #[inline]
    pub fn entry(&self, b: usize) -> &[T] {
        &self.data[b * self.dim..(b + 1) * self.dim]
    }

    /// Mutable entry `b`.
    #[inline]
    pub fn entry_mut(&mut self, b: usize) -> &mut [T] {
        &mut self.data[b * self.dim..(b + 1) * self.dim]
    }

    /// Packed data.
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Mutable packed data.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Consume the batch, returning the packed data.
    pub fn into_vec(self) -> Vec<T> {
        self.data
    }
}

// ---------------------------------------------------------------------------
// DenseMatrix<T>
// ---------------------------------------------------------------------------

/// Row-major dense matrix used by the sparse × dense products.
#[derive(Debug, Clone, PartialEq)]
pub struct DenseMatrix<T> {
    /// Row-major values, `rows * cols` long.
    pub data: Vec<T>,
    /// Number of rows.
    pub rows: usize,
    /// Number of columns.
    pub cols: usize,
}

impl<T: Element> DenseMatrix<T> {
    /// All-zero `rows x cols` matrix.
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            data: vec![T::zero(); rows * cols],
            rows,
            cols,
        }
    }

    /// Wrap row-major data.
    ///
    /// # Errors
    ///
    /// [`ValidationError::DimensionMismatch`] if `data.len() != rows * cols`.
    pub fn from_vec(data: Vec<T>, rows: usize, cols: usize) -> Result<Self, ValidationError> {
        if data.len() != rows * cols {
            return Err(ValidationError::DimensionMismatch(format!(
                "dense data length {} does not equal {rows} x {cols}",
                data.len(),
            )));
        }
        Ok(Self { data, rows, cols })
    }

    /// Element at `(row, col)`.
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> T {
        self.data[row * self.cols + col]
    }

    /// Row `i` as a slice.
    #[inline]
    pub fn row(&self, i: usize) -> &[T] {
        &self.data[i * self.cols..(i + 1) * self.cols]
    }
}

// ---------------------------------------------------------------------------
// Snapshot<T>
// ---------------------------------------------------------------------------

/// Solver state for every batch entry at one point of the iteration.
///
/// The per-entry vectors all have length `batch_size`.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot<T> {
    /// Current solution estimates.
    pub x: Batch<T>,
    /// Current residuals `y - A x`.
    pub residual: Batch<T>,
    /// Iterations each entry has taken.
    pub iterations: Vec<u32>,
    /// Operator applications charged to each entry.
    pub function_evaluations: Vec<u32>,
    /// Whether each entry met its tolerance.
    pub converged: Vec<bool>,
    /// Whether each entry was flagged as diverged.
    pub diverged: Vec<bool>,
}

impl<T> Snapshot<T> {
    /// Number of batch entries.
    pub fn batch_size(&self) -> usize {
        self.iterations.len()
    }

    /// Whether every entry converged.
    pub fn all_converged(&self) -> bool {
        self.converged.iter().all(|&c| c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_from_rows_packs_row_major() {
        let batch = Batch::<f64>::from_rows(&[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        assert_eq!(batch.batch_size(), 2);
        assert_eq!(batch.dim(), 2);
        assert_eq!(batch.as_slice(), &[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(batch.entry(1), &[3.0, 4.0]);
    }

    #[test]
    fn batch_from_rows_rejects_ragged() {
        let err = Batch::<f32>::from_rows(&[vec![1.0, 2.0], vec![3.0]]).unwrap_err();
        assert!(matches!(err, ValidationError::DimensionMismatch(_)));
    }

    #[test]
    fn batch_from_raw_type_mismatch() {
        let err = Batch::<f32>::from_raw(RawValues::F64(vec![1.0]), 1, 1).unwrap_err();
        assert!(matches!(err, SolverError::TypeMismatch { .. }));
    }

    #[test]
    fn batch_from_raw_length_mismatch() {
        let err = Batch::<f32>::from_raw(RawValues::F32(vec![1.0; 5]), 2, 3).unwrap_err();
        assert!(matches!(err, SolverError::InvalidInput(_)));
    }

    #[test]
    fn csr_from_raw_parts() {
        let m = CsrMatrix::<f32>::from_raw_parts(
            RawValues::I32(vec![0, 1, 2]),
            RawValues::I32(vec![0, 1]),
            RawValues::F32(vec![2.0, 3.0]),
            2,
            2,
        )
        .unwrap();
        assert_eq!(m.row_ptr, vec![0, 1, 2]);
        assert_eq!(m.nnz(), 2);
    }

    #[test]
    fn csr_from_raw_parts_wrong_value_type() {
        let err = CsrMatrix::<f32>::from_raw_parts(
            RawValues::I32(vec![0, 1]),
            RawValues::I32(vec![0]),
            RawValues::F64(vec![1.0]),
            1,
            1,
        )
        .unwrap_err();
        assert!(matches!(err, SolverError::TypeMismatch { .. }));
    }

    #[test]
    fn transpose_swaps_dimensions() {
        // [1 2 0]
        // [0 0 3]
        let m = CsrMatrix::<f64>::from_coo(2, 3, vec![(0, 0, 1.0), (0, 1, 2.0), (1, 2, 3.0)]);
        let t = m.transpose();
        assert_eq!((t.rows, t.cols), (3, 2));
        assert_eq!(t.row_entries(1).collect::<Vec<_>>(), vec![(0, &2.0)]);
        assert_eq!(t.row_entries(2).collect::<Vec<_>>(), vec![(1, &3.0)]);
    }

    #[test]
    fn snapshot_all_converged() {
        let snap = Snapshot {
            x: Batch::<f64>::zeros(2, 1),
            residual: Batch::<f64>::zeros(2, 1),
            iterations: vec![1, 2],
            function_evaluations: vec![2, 3],
            converged: vec![true, false],
            diverged: vec![false, false],
        };
        assert_eq!(snap.batch_size(), 2);
        assert!(!snap.all_converged());
    }
}
