//! Sampling-based decomposition for two-stage stochastic linear programs
//! specified in SMPS format.
//!
//! Component layout mirrors the decomposition-and-descent pipeline: a
//! [`sparse::SparseMatrix`] backs every LP template, [`pattern`] classifies
//! random cells against stage boundaries, [`stage::StageProblem`] applies
//! per-scenario perturbations to a template and extracts primal/dual
//! solutions through a pluggable [`backend::Backend`], [`cut`] turns duals
//! into affine cost-to-go bounds, [`scs`] accumulates those into a single
//! descent direction, and [`driver::TwoStageDriver`] drives the parallel
//! sample sweep and bisection line search that ties the rest together.

pub mod backend;
pub mod callback;
pub mod cut;
pub mod driver;
pub mod error;
pub mod pattern;
pub mod projection;
pub mod scs;
pub mod sparse;
pub mod stage;
pub mod terminators;
pub mod util;

/// Outcome of a driver run or a single terminator check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// The driver is still iterating.
    InProgress,
    /// The iteration cap was reached without a terminator firing.
    IterationLimit,
    /// A `TimeOutTerminator` fired.
    TimeLimit,
    /// An `InterruptTerminator` fired (Ctrl-C or a programmatic interrupt).
    Interrupted,
}
