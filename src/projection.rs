//! Projection problem (component D): a [`StageProblem`] specialization that
//! replaces the linear objective with ½‖d‖² to project an infeasible
//! first-stage point back onto the feasible polyhedron, grounded in
//! `original_source/include/projection.h` and `src/projection.cpp`.

use crate::backend::Backend;
use crate::error::TwosdResult;
use crate::stage::StageProblem;

/// Diagonal quadratic coefficient installed in place of the stripped linear
/// objective, per §4.4.
const GAMMA: f64 = 0.5;

pub struct ProjectionProblem<B: Backend> {
    stage: StageProblem<B>,
}

impl<B: Backend> ProjectionProblem<B> {
    pub fn new(stage: StageProblem<B>) -> Self {
        Self { stage }
    }

    pub fn stage(&self) -> &StageProblem<B> {
        &self.stage
    }

    /// Builds the backend model with a zero linear objective and the
    /// projection's diagonal quadratic, instead of the stage's own cost.
    pub fn attach_solver(&mut self) -> TwosdResult<()> {
        let zero_cost = vec![0.0; self.stage.nvars_current()];
        self.stage.attach_solver_with(&zero_cost, Some(GAMMA))
    }

    /// Projects `x0` onto the first-stage feasible region. Returns `None`
    /// when `x0` is already feasible (the "Empty" sentinel of §4.4);
    /// otherwise returns the adjustment `d`, so the caller's projected point
    /// is `x0 + d`.
    pub fn project(&mut self, x0: &[f64]) -> TwosdResult<Option<Vec<f64>>> {
        if self.stage.is_feasible(x0)? {
            return Ok(None);
        }

        self.stage.set_x_base(x0)?;
        self.stage.apply_root_stage_rhs()?;
        let (_, d, _) = self.stage.solve(false)?;
        Ok(Some(d))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ipm::MehrotraSolver;
    use crate::stage::build_stochastic_pattern;
    use smps_io::cor::Core;
    use smps_io::sto::Stoch;
    use smps_io::tim::Time;

    const LANDS_COR: &str = include_str!("../smps-io/tests/fixtures/lands/lands.cor");
    const LANDS_TIM: &str = include_str!("../smps-io/tests/fixtures/lands/lands.tim");
    const LANDS_STO: &str = include_str!("../smps-io/tests/fixtures/lands/lands.sto");

    fn stage0() -> StageProblem<MehrotraSolver> {
        let core = Core::parse(LANDS_COR, "lands.cor").unwrap();
        let time = Time::parse(LANDS_TIM, "lands.tim").unwrap();
        let stoch = Stoch::parse(LANDS_STO, "lands.sto").unwrap();
        let pattern = build_stochastic_pattern(&core, &time, &stoch).unwrap();
        StageProblem::from_smps(&core, &time, &pattern, 0).unwrap()
    }

    #[test]
    fn feasible_point_needs_no_projection() {
        let mut projection = ProjectionProblem::new(stage0());
        projection.attach_solver().unwrap();
        // sum(x) = 12 >= 12, cost.x = 7*12 = 84 <= 120.
        let result = projection.project(&[0.0, 12.0, 0.0, 0.0]).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn infeasible_point_with_slack_capacity_shifts_only_the_deficient_coordinate() {
        let mut projection = ProjectionProblem::new(stage0());
        projection.attach_solver().unwrap();
        // sum(x) = 12, already at the capacity floor, but x1 = -1 violates its
        // lower bound; the nearest feasible point adds exactly 1 to x1.
        let result = projection.project(&[-1.0, 13.0, 0.0, 0.0]).unwrap().unwrap();
        assert!((result[0] - 1.0).abs() < 1e-3);
        assert!(result[1].abs() < 1e-3);
        assert!(result[2].abs() < 1e-3);
        assert!(result[3].abs() < 1e-3);
    }
}
