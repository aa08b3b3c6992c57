//! Sequential convex subgradient direction accumulator (component G).
//!
//! Two-state machine: `Uninitialized` until the first `update`, then
//! `Running` with a direction that shrinks in norm on every subsequent
//! update. The two states are modeled as a sum type rather than a
//! `bool + default-constructed vector` pair, per the guidance in §9 of the
//! design notes.

/// Sufficient-decrease constant for the L condition.
pub const M1: f64 = 0.4;
/// Curvature constant for the R condition.
pub const M2: f64 = 0.2;

#[derive(Debug, Clone)]
pub enum Scs {
    Uninitialized,
    Running { direction: Vec<f64>, norm_sq: f64 },
}

impl Default for Scs {
    fn default() -> Self {
        Scs::Uninitialized
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

impl Scs {
    pub fn new() -> Self {
        Scs::Uninitialized
    }

    /// `clamp(a/b, 0, 1)`, returning 1.0 when `b == 0` (degenerate segment).
    pub fn optimal_lambda(a: f64, b: f64) -> f64 {
        if b == 0.0 {
            return 1.0;
        }
        (a / b).clamp(0.0, 1.0)
    }

    /// Accumulates subgradient `g` into the running direction.
    pub fn update(&mut self, g: &[f64]) {
        match self {
            Scs::Uninitialized => {
                let norm_sq = dot(g, g);
                *self = Scs::Running {
                    direction: g.to_vec(),
                    norm_sq,
                };
            }
            Scs::Running { direction, norm_sq } => {
                let gg = dot(g, g);
                let gd = dot(g, direction);
                let a = gg - gd;
                let b = *norm_sq - 2.0 * gd + gg;
                let lambda = Self::optimal_lambda(a, b);

                for (d_i, g_i) in direction.iter_mut().zip(g.iter()) {
                    *d_i = lambda * *d_i + (1.0 - lambda) * g_i;
                }
                *norm_sq = dot(direction, direction);
            }
        }
    }

    pub fn direction(&self) -> Option<&[f64]> {
        match self {
            Scs::Uninitialized => None,
            Scs::Running { direction, .. } => Some(direction),
        }
    }

    pub fn norm_sq(&self) -> Option<f64> {
        match self {
            Scs::Uninitialized => None,
            Scs::Running { norm_sq, .. } => Some(*norm_sq),
        }
    }

    /// L condition (sufficient decrease): `f_new <= f_old - m1 * t * norm_sq`.
    pub fn satisfies_l_condition(&self, f_old: f64, f_new: f64, t: f64, m1: f64) -> bool {
        let norm_sq = self.norm_sq().unwrap_or(0.0);
        f_new <= f_old - m1 * t * norm_sq
    }

    /// R condition (curvature): `g_new . d >= -m2 * norm_sq`.
    pub fn satisfies_r_condition(&self, g_new: &[f64], m2: f64) -> bool {
        let direction = match self.direction() {
            Some(d) => d,
            None => return true,
        };
        let norm_sq = self.norm_sq().unwrap_or(0.0);
        dot(g_new, direction) >= -m2 * norm_sq
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_update_sets_direction_to_gradient() {
        let mut scs = Scs::new();
        scs.update(&[3.0, 4.0]);
        assert_eq!(scs.direction(), Some([3.0, 4.0].as_slice()));
        assert_eq!(scs.norm_sq(), Some(25.0));
    }

    #[test]
    fn optimal_lambda_is_clamped() {
        assert_eq!(Scs::optimal_lambda(1.0, 0.0), 1.0);
        assert_eq!(Scs::optimal_lambda(-5.0, 1.0), 0.0);
        assert_eq!(Scs::optimal_lambda(10.0, 1.0), 1.0);
        assert_eq!(Scs::optimal_lambda(0.5, 2.0), 0.25);
    }

    #[test]
    fn norm_shrinks_monotonically_after_update() {
        let mut scs = Scs::new();
        scs.update(&[1.0, 0.0]);
        let n0 = scs.norm_sq().unwrap();
        scs.update(&[0.0, 1.0]);
        let n1 = scs.norm_sq().unwrap();
        scs.update(&[-1.0, 0.5]);
        let n2 = scs.norm_sq().unwrap();
        assert!(n1 <= n0 + 1e-12);
        assert!(n2 <= n1 + 1e-12);
    }

    #[test]
    fn repeated_identical_gradients_leave_direction_unchanged() {
        let mut scs = Scs::new();
        scs.update(&[2.0, -1.0]);
        scs.update(&[2.0, -1.0]);
        assert_eq!(scs.direction(), Some([2.0, -1.0].as_slice()));
    }
}
