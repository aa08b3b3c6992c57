//! Per-iteration reporting hook for [`driver::TwoStageDriver`](crate::driver::TwoStageDriver).
//!
//! Follows the teacher's `callback::Callback` shape (a trait with one `call`
//! method invoked once per iteration) without the proc-macro-generated
//! options registry: `twosd` has one driver, not a family of solvers
//! selectable at runtime, so a plain trait object is enough.

use serde::Serialize;

/// Snapshot of driver state reported once per iteration.
#[derive(Debug, Clone, Serialize)]
pub struct IterationReport {
    pub iteration: usize,
    pub objective: f64,
    pub direction_norm_sq: f64,
    pub step_size: f64,
}

/// Hook invoked once per driver iteration for logging or monitoring.
pub trait Callback {
    fn call(&mut self, report: &IterationReport);
}

/// A callback that does nothing. Use when no per-iteration output is needed.
pub struct NoOpCallback;

impl Callback for NoOpCallback {
    fn call(&mut self, _report: &IterationReport) {}
}

/// Prints iteration/objective/direction-norm/step-size to stdout each
/// iteration, matching the teacher's `nlp::ipm` convergence print register.
pub struct ConvergenceOutput;

impl Callback for ConvergenceOutput {
    fn call(&mut self, report: &IterationReport) {
        println!(
            "| {:4} | {:<12.6e} | {:<12.6e} | {:<8.4} |",
            report.iteration, report.objective, report.direction_norm_sq, report.step_size
        );
    }
}

/// Emits one JSON object per iteration on stdout, for consumption by an
/// external monitoring pipeline.
pub struct JsonCallback;

impl Callback for JsonCallback {
    fn call(&mut self, report: &IterationReport) {
        match serde_json::to_string(report) {
            Ok(line) => println!("{line}"),
            Err(e) => eprintln!("twosd: failed to serialize iteration report: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_callback_emits_valid_json() {
        let mut cb = JsonCallback;
        let report = IterationReport {
            iteration: 3,
            objective: 42.5,
            direction_norm_sq: 1.0,
            step_size: 0.5,
        };
        cb.call(&report);
    }

    #[test]
    fn no_op_callback_does_not_panic() {
        NoOpCallback.call(&IterationReport {
            iteration: 0,
            objective: 0.0,
            direction_norm_sq: 0.0,
            step_size: 0.0,
        });
    }
}
