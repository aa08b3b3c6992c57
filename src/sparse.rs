//! Triplet-based sparse matrix (component A).
//!
//! Mutated only while a [`StageProblem`](crate::stage::StageProblem) template
//! is being built from SMPS data; treated as immutable afterwards. Duplicate
//! coordinates are allowed — their values are summed wherever the matrix is
//! consumed.

use crate::error::{TwosdError, TwosdResult};

#[derive(Debug, Clone)]
pub struct SparseMatrix<T> {
    nrows: usize,
    ncols: usize,
    triplets: Vec<(usize, usize, T)>,
}

impl<T: Copy + Default + std::ops::AddAssign + std::ops::Mul<Output = T>> SparseMatrix<T> {
    pub fn new(nrows: usize, ncols: usize) -> Self {
        Self {
            nrows,
            ncols,
            triplets: Vec::new(),
        }
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    /// Appends a triplet. Does not check for duplicates: identical
    /// coordinates accumulate additively in every consumer.
    pub fn add(&mut self, row: usize, col: usize, value: T) -> TwosdResult<()> {
        if row >= self.nrows || col >= self.ncols {
            return Err(TwosdError::shape_mismatch(
                "SparseMatrix::add",
                self.nrows * self.ncols,
                row * self.ncols + col,
            ));
        }
        self.triplets.push((row, col, value));
        Ok(())
    }

    pub fn nnz(&self) -> usize {
        self.triplets.len()
    }

    pub fn triplets(&self) -> &[(usize, usize, T)] {
        &self.triplets
    }

    /// `out[i] = sum_j A[i,j] * x[j]`.
    pub fn multiply_into(&self, x: &[T], out: &mut [T]) -> TwosdResult<()> {
        if x.len() != self.ncols {
            return Err(TwosdError::shape_mismatch("multiply_into(x)", self.ncols, x.len()));
        }
        if out.len() != self.nrows {
            return Err(TwosdError::shape_mismatch("multiply_into(out)", self.nrows, out.len()));
        }
        out.iter_mut().for_each(|v| *v = T::default());
        for &(r, c, v) in &self.triplets {
            out[r] += v * x[c];
        }
        Ok(())
    }

    /// `out -= A * x`, preserving whatever `out` already held.
    pub fn multiply_subtract_into(&self, x: &[T], out: &mut [T]) -> TwosdResult<()>
    where
        T: std::ops::SubAssign,
    {
        if x.len() != self.ncols {
            return Err(TwosdError::shape_mismatch(
                "multiply_subtract_into(x)",
                self.ncols,
                x.len(),
            ));
        }
        if out.len() != self.nrows {
            return Err(TwosdError::shape_mismatch(
                "multiply_subtract_into(out)",
                self.nrows,
                out.len(),
            ));
        }
        for &(r, c, v) in &self.triplets {
            out[r] -= v * x[c];
        }
        Ok(())
    }

    /// `out[j] = sum_i A[i,j] * y[i]`.
    pub fn multiply_transpose_into(&self, y: &[T], out: &mut [T]) -> TwosdResult<()> {
        if y.len() != self.nrows {
            return Err(TwosdError::shape_mismatch(
                "multiply_transpose_into(y)",
                self.nrows,
                y.len(),
            ));
        }
        if out.len() != self.ncols {
            return Err(TwosdError::shape_mismatch(
                "multiply_transpose_into(out)",
                self.ncols,
                out.len(),
            ));
        }
        out.iter_mut().for_each(|v| *v = T::default());
        for &(r, c, v) in &self.triplets {
            out[c] += v * y[r];
        }
        Ok(())
    }

    /// CSR snapshot via counting sort: first pass counts per-row occupancy
    /// into a cumulative `row_begin`, second pass scatters into `col_idx`/
    /// `val` using per-row write cursors. Row order is ascending; column
    /// order within a row is the original insertion order.
    pub fn to_csr(&self) -> Csr<T> {
        let mut row_begin = vec![0usize; self.nrows + 1];
        for &(r, _, _) in &self.triplets {
            row_begin[r + 1] += 1;
        }
        for i in 0..self.nrows {
            row_begin[i + 1] += row_begin[i];
        }

        let nnz = self.triplets.len();
        let mut col_idx = vec![0usize; nnz];
        let mut val = vec![T::default(); nnz];
        let mut cursor = row_begin.clone();
        for &(r, c, v) in &self.triplets {
            let pos = cursor[r];
            col_idx[pos] = c;
            val[pos] = v;
            cursor[r] += 1;
        }

        Csr {
            nrows: self.nrows,
            ncols: self.ncols,
            row_begin,
            col_idx,
            val,
        }
    }
}

/// Row-major compressed sparse representation of a [`SparseMatrix`] snapshot.
#[derive(Debug, Clone)]
pub struct Csr<T> {
    pub nrows: usize,
    pub ncols: usize,
    pub row_begin: Vec<usize>,
    pub col_idx: Vec<usize>,
    pub val: Vec<T>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn multiply_into_matches_definition() {
        let mut a = SparseMatrix::<f64>::new(2, 3);
        a.add(0, 0, 1.0).unwrap();
        a.add(0, 2, 2.0).unwrap();
        a.add(1, 1, 3.0).unwrap();

        let x = [1.0, 2.0, 3.0];
        let mut y = [0.0; 2];
        a.multiply_into(&x, &mut y).unwrap();
        assert_eq!(y, [1.0 * 1.0 + 2.0 * 3.0, 3.0 * 2.0]);
    }

    #[test]
    fn duplicate_coordinates_accumulate() {
        let mut a = SparseMatrix::<f64>::new(1, 1);
        a.add(0, 0, 1.0).unwrap();
        a.add(0, 0, 4.0).unwrap();
        let mut y = [0.0];
        a.multiply_into(&[2.0], &mut y).unwrap();
        assert_eq!(y[0], 10.0);
    }

    #[test]
    fn multiply_subtract_into_preserves_existing() {
        let mut a = SparseMatrix::<f64>::new(1, 1);
        a.add(0, 0, 2.0).unwrap();
        let mut y = [10.0];
        a.multiply_subtract_into(&[3.0], &mut y).unwrap();
        assert_eq!(y[0], 4.0);
    }

    #[test]
    fn multiply_transpose_into_matches_definition() {
        let mut a = SparseMatrix::<f64>::new(2, 2);
        a.add(0, 1, 5.0).unwrap();
        a.add(1, 0, 7.0).unwrap();
        let mut z = [0.0; 2];
        a.multiply_transpose_into(&[1.0, 2.0], &mut z).unwrap();
        // z[j] = sum_i A[i,j] * y[i]
        assert_eq!(z, [7.0 * 2.0, 5.0 * 1.0]);
    }

    #[rstest]
    #[case(vec![(0,0,1.0),(0,2,2.0),(1,1,3.0),(1,0,9.0)])]
    #[case(vec![(2,2,1.0),(0,0,1.0),(0,0,1.0)])]
    fn csr_export_is_a_permutation_of_triplets(#[case] entries: Vec<(usize, usize, f64)>) {
        let nrows = entries.iter().map(|e| e.0).max().unwrap_or(0) + 1;
        let ncols = entries.iter().map(|e| e.1).max().unwrap_or(0) + 1;
        let mut a = SparseMatrix::<f64>::new(nrows, ncols);
        for &(r, c, v) in &entries {
            a.add(r, c, v).unwrap();
        }
        let csr = a.to_csr();

        let mut from_csr: Vec<(usize, usize, f64)> = Vec::new();
        for r in 0..csr.nrows {
            for p in csr.row_begin[r]..csr.row_begin[r + 1] {
                from_csr.push((r, csr.col_idx[p], csr.val[p]));
            }
        }
        let mut expected = entries.clone();
        expected.sort_by(|a, b| a.0.cmp(&b.0));
        from_csr.sort_by(|a, b| a.0.cmp(&b.0));
        // Rows are sorted ascending in the CSR form; within a bucket order must
        // match original insertion order, so compare per-row multisets.
        for r in 0..nrows {
            let mut exp_row: Vec<_> = entries.iter().filter(|e| e.0 == r).cloned().collect();
            let mut got_row: Vec<_> = from_csr.iter().filter(|e| e.0 == r).cloned().collect();
            exp_row.sort_by(|a, b| a.1.cmp(&b.1).then(a.2.partial_cmp(&b.2).unwrap()));
            got_row.sort_by(|a, b| a.1.cmp(&b.1).then(a.2.partial_cmp(&b.2).unwrap()));
            assert_eq!(exp_row, got_row);
        }
    }

    #[test]
    fn dimension_mismatch_fails() {
        let a = SparseMatrix::<f64>::new(2, 2);
        let mut y = [0.0; 2];
        assert!(a.multiply_into(&[1.0], &mut y).is_err());
    }
}
