//! Stage problem (component C): a parametric LP template for one stage,
//! with a change-of-variable shift (d = x − x_base) and per-scenario
//! right-hand-side/transfer perturbation, grounded in
//! `original_source/include/prob.h` and `src/prob.cpp`'s `TwoStageProb`
//! class.

use smps_io::cor::{Core, RowType};
use smps_io::tim::Time;

use crate::backend::{Backend, Sense};
use crate::cut::DualLayout;
use crate::error::{TwosdError, TwosdResult};
use crate::pattern::{StageStochasticPattern, StochasticPattern};
use crate::sparse::SparseMatrix;
use crate::util::approx_equal;

fn convert_smps_err(e: smps_io::Error) -> TwosdError {
    match e {
        smps_io::Error::Parse { file, line, reason } => TwosdError::parse(file, line, reason),
        smps_io::Error::Unsupported { file, line, reason } => TwosdError::parse(file, line, format!("unsupported: {reason}")),
    }
}

fn sense_from_row_type(rt: RowType, file: &str, row: usize) -> TwosdResult<Sense> {
    match rt {
        RowType::Greater => Ok(Sense::Greater),
        RowType::Less => Ok(Sense::Less),
        RowType::Equal => Ok(Sense::Equal),
        RowType::Objective => Err(TwosdError::parse(file, row, "objective row cannot appear inside a stage's own rows")),
    }
}

/// Builds the instance-wide random-cell classification from the raw
/// `(col_name, row_name)` positions declared in the STO file, per §4.2.
pub fn build_stochastic_pattern(core: &Core, time: &Time, stoch: &smps_io::sto::Stoch) -> TwosdResult<StochasticPattern> {
    let mut pattern = StochasticPattern::new(time.num_stages());
    for pos in stoch.positions() {
        let (row_stage, row_idx) = time.row_stage(&pos.row_name, core).map_err(convert_smps_err)?;
        let (col_stage, col_idx) = time.col_stage(&pos.col_name, core).map_err(convert_smps_err)?;

        let reference_value = if col_stage == -1 {
            let abs_row = core
                .row_name_map
                .get_index(&pos.row_name)
                .ok_or_else(|| TwosdError::parse("sto", 0, format!("row '{}' not found", pos.row_name)))?;
            core.rhs_coefficients[abs_row]
        } else if row_stage != -1 {
            let abs_row = core
                .row_name_map
                .get_index(&pos.row_name)
                .ok_or_else(|| TwosdError::parse("sto", 0, format!("row '{}' not found", pos.row_name)))?;
            let abs_col = core
                .col_name_map
                .get_index(&pos.col_name)
                .ok_or_else(|| TwosdError::parse("sto", 0, format!("column '{}' not found", pos.col_name)))?;
            core.lp_coefficients
                .iter()
                .filter(|&&(r, c, _)| r == abs_row && c == abs_col)
                .map(|&(_, _, v)| v)
                .sum()
        } else {
            0.0
        };

        pattern.classify(row_stage, row_idx, col_stage, col_idx, reference_value)?;
    }
    Ok(pattern)
}

/// The `d = x − x_base` change-of-variable state (§3 invariant I1).
#[derive(Debug, Clone, Default)]
struct ShiftState {
    enabled: bool,
    x_base: Vec<f64>,
    rhs_shift: Vec<f64>,
    cost_shift: f64,
}

/// Independent fixed/lower/upper bound memberships (§3 invariant I3; §9's
/// REDESIGN FLAG against `else-if` classification).
#[derive(Debug, Clone, Default)]
pub struct BoundClassification {
    pub fixed_idx: Vec<usize>,
    pub lb_idx: Vec<usize>,
    pub ub_idx: Vec<usize>,
}

impl BoundClassification {
    fn build(lb: &[f64], ub: &[f64]) -> Self {
        let mut fixed_idx = Vec::new();
        let mut lb_idx = Vec::new();
        let mut ub_idx = Vec::new();
        for i in 0..lb.len() {
            if approx_equal(lb[i], ub[i]) {
                fixed_idx.push(i);
            }
            if lb[i].is_finite() && lb[i] != 0.0 && !approx_equal(lb[i], ub[i]) {
                lb_idx.push(i);
            }
            if ub[i].is_finite() && !approx_equal(lb[i], ub[i]) {
                ub_idx.push(i);
            }
        }
        Self { fixed_idx, lb_idx, ub_idx }
    }
}

/// Parametric LP template for one stage (component C).
pub struct StageProblem<B: Backend> {
    nvars_last: usize,
    nvars_current: usize,
    nrows: usize,

    var_names: Vec<String>,
    row_names: Vec<String>,

    transfer_block: SparseMatrix<f64>,
    current_block: SparseMatrix<f64>,

    lb: Vec<f64>,
    ub: Vec<f64>,
    rhs_bar: Vec<f64>,
    inequality_directions: Vec<Sense>,
    cost_coefficients: Vec<f64>,

    stage_stoc_pattern: StageStochasticPattern,
    shift: ShiftState,
    bounds: BoundClassification,

    solver: Option<B>,
}

impl<B: Backend> Clone for StageProblem<B> {
    /// Copies every field except the solver handle — per §9, a freshly
    /// copied `StageProblem` owns no backend state until `attach_solver` is
    /// called again.
    fn clone(&self) -> Self {
        Self {
            nvars_last: self.nvars_last,
            nvars_current: self.nvars_current,
            nrows: self.nrows,
            var_names: self.var_names.clone(),
            row_names: self.row_names.clone(),
            transfer_block: self.transfer_block.clone(),
            current_block: self.current_block.clone(),
            lb: self.lb.clone(),
            ub: self.ub.clone(),
            rhs_bar: self.rhs_bar.clone(),
            inequality_directions: self.inequality_directions.clone(),
            cost_coefficients: self.cost_coefficients.clone(),
            stage_stoc_pattern: self.stage_stoc_pattern.clone(),
            shift: self.shift.clone(),
            bounds: self.bounds.clone(),
            solver: None,
        }
    }
}

impl<B: Backend> StageProblem<B> {
    /// Builds stage `stage`'s template out of the tokenized COR/TIM files
    /// and the instance-wide stochastic pattern.
    pub fn from_smps(core: &Core, time: &Time, full_pattern: &StochasticPattern, stage: usize) -> TwosdResult<Self> {
        let row_range = time.row_range(stage, core).map_err(convert_smps_err)?;
        let col_range = time.col_range(stage, core).map_err(convert_smps_err)?;
        let nrows = row_range.len();
        let nvars_current = col_range.len();

        let (nvars_last, prev_col_start, prev_col_end) = if stage == 0 {
            (0, 0, 0)
        } else {
            let prev = time.col_range(stage - 1, core).map_err(convert_smps_err)?;
            (prev.len(), prev.start, prev.end)
        };

        let var_names = core.col_name_map.names()[col_range.clone()].to_vec();
        let row_names = core.row_name_map.names()[row_range.clone()].to_vec();

        let lb = core.lower_bounds[col_range.clone()].to_vec();
        let ub = core.upper_bounds[col_range.clone()].to_vec();
        let rhs_bar = core.rhs_coefficients[row_range.clone()].to_vec();

        let mut inequality_directions = Vec::with_capacity(nrows);
        for (offset, rt) in core.row_types[row_range.clone()].iter().enumerate() {
            inequality_directions.push(sense_from_row_type(*rt, "cor", row_range.start + offset)?);
        }

        let obj_row_idx = core
            .row_types
            .iter()
            .position(|rt| *rt == RowType::Objective)
            .ok_or_else(|| TwosdError::parse("cor", 0, "no objective row declared"))?;

        let mut cost_coefficients = vec![0.0; nvars_current];
        let mut current_block = SparseMatrix::<f64>::new(nrows, nvars_current);
        let mut transfer_block = SparseMatrix::<f64>::new(nrows, nvars_last);

        for &(r, c, v) in &core.lp_coefficients {
            if r == obj_row_idx {
                if col_range.contains(&c) {
                    cost_coefficients[c - col_range.start] += v;
                }
                continue;
            }
            if !row_range.contains(&r) {
                continue;
            }
            if col_range.contains(&c) {
                current_block.add(r - row_range.start, c - col_range.start, v)?;
            } else if nvars_last > 0 && c >= prev_col_start && c < prev_col_end {
                transfer_block.add(r - row_range.start, c - prev_col_start, v)?;
            }
        }

        let bounds = BoundClassification::build(&lb, &ub);
        let stage_stoc_pattern = full_pattern.filter_by_stage(stage);

        Ok(Self {
            nvars_last,
            nvars_current,
            nrows,
            var_names,
            row_names,
            transfer_block,
            current_block,
            lb,
            ub,
            rhs_bar,
            inequality_directions,
            cost_coefficients,
            stage_stoc_pattern,
            shift: ShiftState::default(),
            bounds,
            solver: None,
        })
    }

    pub fn nvars_current(&self) -> usize {
        self.nvars_current
    }

    pub fn nvars_last(&self) -> usize {
        self.nvars_last
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn cost_coefficients(&self) -> &[f64] {
        &self.cost_coefficients
    }

    pub fn transfer_block(&self) -> &SparseMatrix<f64> {
        &self.transfer_block
    }

    pub fn rhs_bar(&self) -> &[f64] {
        &self.rhs_bar
    }

    pub fn lb(&self) -> &[f64] {
        &self.lb
    }

    pub fn ub(&self) -> &[f64] {
        &self.ub
    }

    pub fn stage_stoc_pattern(&self) -> &StageStochasticPattern {
        &self.stage_stoc_pattern
    }

    pub fn dual_layout(&self) -> DualLayout<'_> {
        DualLayout {
            nrows: self.nrows,
            fixed_idx: &self.bounds.fixed_idx,
            lb_idx: &self.bounds.lb_idx,
            ub_idx: &self.bounds.ub_idx,
        }
    }

    pub fn has_solver(&self) -> bool {
        self.solver.is_some()
    }

    /// (Re)creates the backend model from the template, per §4.3.
    pub fn attach_solver(&mut self) -> TwosdResult<()> {
        let cost = self.cost_coefficients.clone();
        self.attach_solver_with(&cost, None)
    }

    /// Builds the backend model with a caller-supplied cost vector and
    /// optional diagonal quadratic, used by the projection specialization
    /// to strip the linear objective (§4.4).
    pub(crate) fn attach_solver_with(&mut self, cost: &[f64], gamma: Option<f64>) -> TwosdResult<()> {
        let mut backend = B::new_model(self.nvars_current, cost, &self.lb, &self.ub);
        let csr = self.current_block.to_csr();
        backend.add_rows(&csr, &self.inequality_directions, &self.rhs_bar)?;
        backend.set_names(&self.row_names, &self.var_names);
        if let Some(gamma) = gamma {
            backend.add_diagonal_quadratic(gamma);
        }
        self.solver = Some(backend);
        Ok(())
    }

    fn push_shifted_bounds(&mut self) -> TwosdResult<()> {
        let lb = self.lb.clone();
        let ub = self.ub.clone();
        let x_base = self.shift.x_base.clone();
        if let Some(solver) = self.solver.as_mut() {
            for i in 0..lb.len() {
                if lb[i].is_finite() {
                    solver.set_lower_bound(i, lb[i] - x_base[i])?;
                }
                if ub[i].is_finite() {
                    solver.set_upper_bound(i, ub[i] - x_base[i])?;
                }
            }
        }
        Ok(())
    }

    /// Applies a scenario's perturbed right-hand side against previous-stage
    /// decision `z`, per §4.3.
    pub fn apply_scenario_rhs(&mut self, z: &[f64], omega: &[f64]) -> TwosdResult<()> {
        if z.len() != self.nvars_last {
            return Err(TwosdError::shape_mismatch("apply_scenario_rhs(z)", self.nvars_last, z.len()));
        }

        let mut new_rhs = self.rhs_bar.clone();
        if self.nvars_last > 0 {
            self.transfer_block.multiply_subtract_into(z, &mut new_rhs)?;
        }
        if self.shift.enabled {
            for (r, s) in new_rhs.iter_mut().zip(self.shift.rhs_shift.iter()) {
                *r -= s;
            }
        }

        for (cell, &scenario_idx) in self
            .stage_stoc_pattern
            .cells()
            .iter()
            .zip(self.stage_stoc_pattern.indices_in_scenario())
        {
            let delta = omega[scenario_idx] - cell.reference_value;
            let row = cell.row_index as usize;
            if cell.col_index == -1 {
                new_rhs[row] += delta;
            } else {
                new_rhs[row] -= delta * z[cell.col_index as usize];
            }
        }

        self.solver
            .as_mut()
            .ok_or_else(|| TwosdError::backend_failure("no solver attached", "apply_scenario_rhs"))?
            .set_rhs(&new_rhs)?;

        if self.shift.enabled {
            self.push_shifted_bounds()?;
        }
        Ok(())
    }

    /// As `apply_scenario_rhs`, but without a transfer term or scenario
    /// deviations — used for the root stage, which has no predecessor.
    pub fn apply_root_stage_rhs(&mut self) -> TwosdResult<()> {
        let mut new_rhs = self.rhs_bar.clone();
        if self.shift.enabled {
            for (r, s) in new_rhs.iter_mut().zip(self.shift.rhs_shift.iter()) {
                *r -= s;
            }
        }
        self.solver
            .as_mut()
            .ok_or_else(|| TwosdError::backend_failure("no solver attached", "apply_root_stage_rhs"))?
            .set_rhs(&new_rhs)?;

        if self.shift.enabled {
            self.push_shifted_bounds()?;
        }
        Ok(())
    }

    /// Enables the `d = x - x0` shift and recomputes `rhs_shift`/`cost_shift`.
    pub fn set_x_base(&mut self, x0: &[f64]) -> TwosdResult<()> {
        if x0.len() != self.nvars_current {
            return Err(TwosdError::shape_mismatch("set_x_base", self.nvars_current, x0.len()));
        }
        let mut rhs_shift = vec![0.0; self.nrows];
        self.current_block.multiply_into(x0, &mut rhs_shift)?;
        let cost_shift = self.cost_coefficients.iter().zip(x0.iter()).map(|(c, x)| c * x).sum();

        self.shift = ShiftState {
            enabled: true,
            x_base: x0.to_vec(),
            rhs_shift,
            cost_shift,
        };
        Ok(())
    }

    /// Disables the shift, zeroing `rhs_shift`/`cost_shift` and restoring
    /// the original bounds on the attached solver, if any (§9's resolved
    /// Open Question: always restore consistently).
    pub fn unset_x_base(&mut self) -> TwosdResult<()> {
        self.shift = ShiftState::default();
        let lb = self.lb.clone();
        let ub = self.ub.clone();
        if let Some(solver) = self.solver.as_mut() {
            for i in 0..lb.len() {
                if lb[i].is_finite() {
                    solver.set_lower_bound(i, lb[i])?;
                }
                if ub[i].is_finite() {
                    solver.set_upper_bound(i, ub[i])?;
                }
            }
        }
        Ok(())
    }

    pub fn cost_shift(&self) -> f64 {
        self.shift.cost_shift
    }

    pub fn shift_enabled(&self) -> bool {
        self.shift.enabled
    }

    /// Invokes the backend and returns `(obj_value, primal, dual)`, with
    /// `dual` laid out per §4.3/§4.5 when `require_dual` is set.
    pub fn solve(&mut self, require_dual: bool) -> TwosdResult<(f64, Vec<f64>, Option<Vec<f64>>)> {
        let solver = self.solver.as_mut().ok_or_else(|| TwosdError::backend_failure("no solver attached", "solve"))?;
        solver.optimize()?;
        let primal = solver.get_primal();
        let obj_value = self.cost_coefficients.iter().zip(primal.iter()).map(|(c, d)| c * d).sum::<f64>() + self.shift.cost_shift;

        if !require_dual {
            return Ok((obj_value, primal, None));
        }

        let solver = self.solver.as_ref().expect("checked above");
        let mut dual = solver.get_dual_rows();
        for &k in &self.bounds.fixed_idx {
            dual.push(solver.get_reduced_cost(k));
        }
        for &k in &self.bounds.lb_idx {
            let at_lower = approx_equal(primal[k], solver.get_lower_bound(k));
            dual.push(if at_lower { solver.get_reduced_cost(k) } else { 0.0 });
        }
        for &k in &self.bounds.ub_idx {
            let at_upper = approx_equal(primal[k], solver.get_upper_bound(k));
            dual.push(if at_upper { solver.get_reduced_cost(k) } else { 0.0 });
        }

        Ok((obj_value, primal, Some(dual)))
    }

    pub fn add_quadratic_term(&mut self, gamma: f64) {
        if let Some(solver) = self.solver.as_mut() {
            solver.add_diagonal_quadratic(gamma);
        }
    }

    pub fn remove_quadratic_term(&mut self) {
        if let Some(solver) = self.solver.as_mut() {
            solver.remove_quadratic();
        }
    }

    /// Checks bound and row feasibility of `x` against this stage's own
    /// template (current_block/rhs_bar), used by the projection
    /// specialization's `is_feasible` gate (§4.4).
    pub fn is_feasible(&self, x: &[f64]) -> TwosdResult<bool> {
        if x.len() != self.nvars_current {
            return Err(TwosdError::shape_mismatch("is_feasible", self.nvars_current, x.len()));
        }
        for i in 0..self.nvars_current {
            if x[i] < self.lb[i] - crate::util::APPROX_TOLERANCE || x[i] > self.ub[i] + crate::util::APPROX_TOLERANCE {
                return Ok(false);
            }
        }
        let mut row_vals = vec![0.0; self.nrows];
        self.current_block.multiply_into(x, &mut row_vals)?;
        for i in 0..self.nrows {
            let ok = match self.inequality_directions[i] {
                Sense::Greater => row_vals[i] >= self.rhs_bar[i] - crate::util::APPROX_TOLERANCE,
                Sense::Less => row_vals[i] <= self.rhs_bar[i] + crate::util::APPROX_TOLERANCE,
                Sense::Equal => approx_equal(row_vals[i], self.rhs_bar[i]),
            };
            if !ok {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ipm::MehrotraSolver;

    const LANDS_COR: &str = include_str!("../smps-io/tests/fixtures/lands/lands.cor");
    const LANDS_TIM: &str = include_str!("../smps-io/tests/fixtures/lands/lands.tim");
    const LANDS_STO: &str = include_str!("../smps-io/tests/fixtures/lands/lands.sto");

    fn load() -> (Core, Time, smps_io::sto::Stoch) {
        let core = Core::parse(LANDS_COR, "lands.cor").unwrap();
        let time = Time::parse(LANDS_TIM, "lands.tim").unwrap();
        let stoch = smps_io::sto::Stoch::parse(LANDS_STO, "lands.sto").unwrap();
        (core, time, stoch)
    }

    #[test]
    fn stage_zero_matches_reference_sizes() {
        let (core, time, stoch) = load();
        let pattern = build_stochastic_pattern(&core, &time, &stoch).unwrap();
        let stage0 = StageProblem::<MehrotraSolver>::from_smps(&core, &time, &pattern, 0).unwrap();

        assert_eq!(stage0.nvars_current(), 4);
        assert_eq!(stage0.nrows(), 2);
        assert_eq!(stage0.var_names, vec!["X1", "X2", "X3", "X4"]);
        assert_eq!(stage0.row_names, vec!["S1C1", "S1C2"]);
        assert_eq!(stage0.rhs_bar, vec![12.0, 120.0]);
        assert_eq!(stage0.cost_coefficients, vec![10.0, 7.0, 16.0, 6.0]);
    }

    #[test]
    fn stage_one_transfer_block_matches_scenario_five() {
        let (core, time, stoch) = load();
        let pattern = build_stochastic_pattern(&core, &time, &stoch).unwrap();
        let stage1 = StageProblem::<MehrotraSolver>::from_smps(&core, &time, &pattern, 1).unwrap();

        assert_eq!(stage1.nvars_last(), 4);
        assert_eq!(stage1.nrows(), 7);

        let z = [1.0, 2.0, 3.0, 4.0];
        let mut new_rhs = stage1.rhs_bar.clone();
        stage1.transfer_block.multiply_subtract_into(&z, &mut new_rhs).unwrap();
        // rhs_bar is zero for the capacity rows and -T[i][i] = 1, so
        // new_rhs[0..4] should equal z before any scenario delta is applied.
        assert_eq!(&new_rhs[0..4], &z);
    }

    #[test]
    fn bound_classification_is_independent() {
        let (core, time, stoch) = load();
        let pattern = build_stochastic_pattern(&core, &time, &stoch).unwrap();
        let stage0 = StageProblem::<MehrotraSolver>::from_smps(&core, &time, &pattern, 0).unwrap();
        // Default bounds (lb=0, ub=+inf) are "trivial" and excluded from both lists.
        assert!(stage0.bounds.lb_idx.is_empty());
        assert!(stage0.bounds.ub_idx.is_empty());
        assert!(stage0.bounds.fixed_idx.is_empty());
    }

    #[test]
    fn set_and_unset_x_base_round_trips() {
        let (core, time, stoch) = load();
        let pattern = build_stochastic_pattern(&core, &time, &stoch).unwrap();
        let mut stage0 = StageProblem::<MehrotraSolver>::from_smps(&core, &time, &pattern, 0).unwrap();
        stage0.attach_solver().unwrap();

        stage0.set_x_base(&[10.0, 20.0, 30.0, 40.0]).unwrap();
        assert!((stage0.cost_shift() - 960.0).abs() < 1e-9);
        stage0.apply_root_stage_rhs().unwrap();

        stage0.unset_x_base().unwrap();
        assert_eq!(stage0.cost_shift(), 0.0);
        assert!(!stage0.shift_enabled());
    }
}
