//! Solver adapter (component E): the capability set a stage problem needs
//! from an LP/QP backend. §4.6 treats this as an opaque facade — the core
//! does not prescribe simplex vs interior-point — so this trait is the only
//! thing `stage::StageProblem` depends on, with [`ipm::MehrotraSolver`] as
//! the one concrete implementation this repository ships.

pub mod ipm;

use crate::error::TwosdResult;
use crate::sparse::Csr;

/// Row sense, as read from the COR file's ROWS section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sense {
    Greater,
    Less,
    Equal,
}

/// The LP/QP backend contract required by §4.6. Every call either succeeds
/// or returns a `TwosdError::BackendFailure`; the adapter never retries.
pub trait Backend {
    fn new_model(n_vars: usize, cost: &[f64], lb: &[f64], ub: &[f64]) -> Self
    where
        Self: Sized;

    /// Adds every row at once from a CSR snapshot of the current block.
    fn add_rows(&mut self, csr: &Csr<f64>, sense: &[Sense], rhs: &[f64]) -> TwosdResult<()>;

    fn set_names(&mut self, rows: &[String], cols: &[String]);

    fn set_rhs(&mut self, new_rhs: &[f64]) -> TwosdResult<()>;

    fn set_lower_bound(&mut self, i: usize, v: f64) -> TwosdResult<()>;
    fn set_upper_bound(&mut self, i: usize, v: f64) -> TwosdResult<()>;

    fn add_diagonal_quadratic(&mut self, gamma: f64);
    fn remove_quadratic(&mut self);

    fn optimize(&mut self) -> TwosdResult<()>;

    fn get_primal(&self) -> Vec<f64>;
    fn get_dual_rows(&self) -> Vec<f64>;
    fn get_reduced_cost(&self, i: usize) -> f64;
    fn get_variable_value(&self, i: usize) -> f64;
    fn get_lower_bound(&self, i: usize) -> f64;
    fn get_upper_bound(&self, i: usize) -> f64;

    /// Diagnostic dump of the current model, for debugging failed solves.
    fn write_lp(&self, path: &str) -> TwosdResult<()>;
}
