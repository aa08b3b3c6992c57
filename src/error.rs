//! Error taxonomy for the decomposition engine.
//!
//! Every leaf module returns `Result<_, TwosdError>`; the driver and CLI
//! convert into `problemo::Problem` at the boundary via `IntoCommonProblem`,
//! matching the `.gloss()` idiom used throughout the solver-adapter and
//! loader layers.

use derive_more::{Display, Error};
use problemo::Problem;
use problemo::common::IntoCommonProblem;

#[derive(Debug, Display, Error, PartialEq)]
pub enum TwosdError {
    /// A malformed or unsupported SMPS construct, tagged with the file and
    /// line number it was found on.
    #[display("parse error in {file}:{line}: {reason}")]
    ParseError {
        file: String,
        line: usize,
        reason: String,
    },

    /// A random cell whose position the decomposition cannot classify (cost
    /// row, RHS-of-cost, off-adjacent-stage transfer, BLOCKS, >2 stages).
    #[display("unsupported randomness: {reason}")]
    UnsupportedRandomness { reason: String },

    /// A programming error: a caller-supplied vector does not match the
    /// dimension the operation requires.
    #[display("shape mismatch in {operation}: expected {expected}, got {got}")]
    ShapeMismatch {
        operation: String,
        expected: usize,
        got: usize,
    },

    /// The LP/QP backend rejected or failed to solve a model.
    #[display("backend failure during {operation}: {code}")]
    BackendFailure { code: String, operation: String },

    /// The projection QP came back infeasible; the first-stage constraints
    /// are inconsistent with each other.
    #[display("projection problem is infeasible")]
    InfeasibleProjection,
}

impl TwosdError {
    pub fn parse(file: impl Into<String>, line: usize, reason: impl Into<String>) -> Self {
        TwosdError::ParseError {
            file: file.into(),
            line,
            reason: reason.into(),
        }
    }

    pub fn unsupported_randomness(reason: impl Into<String>) -> Self {
        TwosdError::UnsupportedRandomness {
            reason: reason.into(),
        }
    }

    pub fn shape_mismatch(operation: impl Into<String>, expected: usize, got: usize) -> Self {
        TwosdError::ShapeMismatch {
            operation: operation.into(),
            expected,
            got,
        }
    }

    pub fn backend_failure(code: impl Into<String>, operation: impl Into<String>) -> Self {
        TwosdError::BackendFailure {
            code: code.into(),
            operation: operation.into(),
        }
    }
}

impl From<TwosdError> for Problem {
    fn from(err: TwosdError) -> Self {
        err.to_string().gloss()
    }
}

pub type TwosdResult<T> = Result<T, TwosdError>;
