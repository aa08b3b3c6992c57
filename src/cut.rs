//! Cut helper (component F): turns a second-stage dual vector into an affine
//! lower bound on the recourse function, in two passes — a static part that
//! only depends on the template, and a dynamic part that folds in the
//! scenario deviation from the reference values.

use crate::error::{TwosdError, TwosdResult};
use crate::pattern::StageStochasticPattern;
use crate::sparse::SparseMatrix;

/// An affine lower bound `Q_hat(z) = alpha + beta . z` on the cost-to-go as a
/// function of the previous stage's decision vector `z`.
#[derive(Debug, Clone)]
pub struct Cut {
    pub alpha: f64,
    pub beta: Vec<f64>,
}

impl Cut {
    pub fn zero(nvars_last: usize) -> Self {
        Self {
            alpha: 0.0,
            beta: vec![0.0; nvars_last],
        }
    }

    pub fn evaluate(&self, z: &[f64]) -> f64 {
        self.alpha + self.beta.iter().zip(z.iter()).map(|(b, z_i)| b * z_i).sum::<f64>()
    }
}

/// The dual vector layout mandated by §4.3's `solve(require_dual=true)`:
/// row duals first, then the bound duals for `fixed_idx`, `lb_idx`,
/// `ub_idx`, in that order.
pub struct DualLayout<'a> {
    pub nrows: usize,
    pub fixed_idx: &'a [usize],
    pub lb_idx: &'a [usize],
    pub ub_idx: &'a [usize],
}

impl<'a> DualLayout<'a> {
    pub fn len(&self) -> usize {
        self.nrows + self.fixed_idx.len() + self.lb_idx.len() + self.ub_idx.len()
    }
}

/// Builds the static part of a cut: the part of (alpha, beta) that depends
/// only on the template (rhs_bar, bounds, transfer_block), not on the
/// scenario.
pub fn static_part(
    pi: &[f64],
    rhs_bar: &[f64],
    lb: &[f64],
    ub: &[f64],
    layout: &DualLayout,
    transfer_block: &SparseMatrix<f64>,
) -> TwosdResult<Cut> {
    if pi.len() != layout.len() {
        return Err(TwosdError::shape_mismatch("cut::static_part(pi)", layout.len(), pi.len()));
    }
    if rhs_bar.len() != layout.nrows {
        return Err(TwosdError::shape_mismatch(
            "cut::static_part(rhs_bar)",
            layout.nrows,
            rhs_bar.len(),
        ));
    }

    let mut alpha = 0.0;
    for (i, &r) in rhs_bar.iter().enumerate() {
        alpha += r * pi[i];
    }

    let mut cursor = layout.nrows;
    for &k in layout.fixed_idx {
        alpha += ub[k] * pi[cursor];
        cursor += 1;
    }
    for &k in layout.lb_idx {
        alpha += lb[k] * pi[cursor];
        cursor += 1;
    }
    for &k in layout.ub_idx {
        alpha += ub[k] * pi[cursor];
        cursor += 1;
    }

    let mut beta = vec![0.0; transfer_block.ncols()];
    transfer_block.multiply_transpose_into(&pi[..layout.nrows], &mut beta)?;

    Ok(Cut { alpha, beta })
}

/// Folds the scenario-specific deviation into an existing cut, per §4.5's
/// dynamic part. `omega` must match `pattern.rv_count()`.
pub fn add_dynamic_part(
    cut: &mut Cut,
    pi: &[f64],
    pattern: &StageStochasticPattern,
    omega: &[f64],
) -> TwosdResult<()> {
    if omega.len() != pattern.rv_count() {
        return Err(TwosdError::shape_mismatch(
            "cut::add_dynamic_part(omega)",
            pattern.rv_count(),
            omega.len(),
        ));
    }
    for (cell, &w) in pattern.cells().iter().zip(omega.iter()) {
        let delta = w - cell.reference_value;
        let row = cell.row_index as usize;
        if cell.col_index == -1 {
            cut.alpha += delta * pi[row];
        } else {
            cut.beta[cell.col_index as usize] += delta * pi[row];
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::StochasticPattern;

    #[test]
    fn static_part_matches_definition() {
        let mut transfer = SparseMatrix::<f64>::new(2, 2);
        transfer.add(0, 0, 1.0).unwrap();
        transfer.add(1, 1, 2.0).unwrap();

        let rhs_bar = [10.0, 20.0];
        let lb = [0.0, -1.0];
        let ub = [5.0, 3.0];
        let layout = DualLayout {
            nrows: 2,
            fixed_idx: &[],
            lb_idx: &[1],
            ub_idx: &[0],
        };
        // pi layout: [row0, row1, lb@var1, ub@var0]
        let pi = [1.0, 2.0, 0.5, 0.25];

        let cut = static_part(&pi, &rhs_bar, &lb, &ub, &layout, &transfer).unwrap();
        let expected_alpha = 10.0 * 1.0 + 20.0 * 2.0 + lb[1] * 0.5 + ub[0] * 0.25;
        assert!((cut.alpha - expected_alpha).abs() < 1e-12);
        assert_eq!(cut.beta, vec![1.0 * 1.0, 2.0 * 2.0]);
    }

    #[test]
    fn dynamic_part_rejects_mismatched_scenario() {
        let mut pattern = StochasticPattern::new(2);
        pattern.push_rhs(1, 0, 0.0);
        let stage_pattern = pattern.filter_by_stage(1);
        let mut cut = Cut::zero(1);
        let err = add_dynamic_part(&mut cut, &[0.0], &stage_pattern, &[]).unwrap_err();
        assert!(matches!(err, TwosdError::ShapeMismatch { .. }));
    }

    #[test]
    fn dynamic_part_rhs_cell_adds_to_alpha() {
        let mut pattern = StochasticPattern::new(2);
        pattern.push_rhs(0, 2, 100.0);
        let stage_pattern = pattern.filter_by_stage(0);
        let mut cut = Cut::zero(1);
        let pi = [0.0, 0.0, 3.0];
        add_dynamic_part(&mut cut, &pi, &stage_pattern, &[123.4]).unwrap();
        assert!((cut.alpha - (123.4 - 100.0) * 3.0).abs() < 1e-12);
    }

    #[test]
    fn dynamic_part_transfer_cell_adds_to_beta() {
        let mut pattern = StochasticPattern::new(2);
        pattern.push_transfer(1, 0, 2, 5.0);
        let stage_pattern = pattern.filter_by_stage(1);
        let mut cut = Cut::zero(3);
        let pi = [4.0];
        add_dynamic_part(&mut cut, &pi, &stage_pattern, &[8.0]).unwrap();
        assert!((cut.beta[2] - (8.0 - 5.0) * 4.0).abs() < 1e-12);
    }
}
