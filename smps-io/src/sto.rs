//! STO (stochastic) file tokenizer, `INDEP` section only: `DISCRETE`
//! (enumerated value/probability pairs), `NORMAL` (mean, stddev), and
//! `UNIFORM` (lower, upper) sub-types, one distribution per `(column, row)`
//! position.
//!
//! Grounded on `smps::SMPSStoch` (declared in `include/smps.h` as the third
//! tokenizer alongside `SMPSCore`/`SMPSImplicitTime`, consumed by
//! `StochasticPattern::from_smps` as a stream of `(col_name, row_name)`
//! positions) — the reference repository's own `.sto` reader was not in the
//! retrieved source, so the line grammar below follows the textual
//! convention `spec.md` §6 describes directly: each `INDEP <SUBTYPE>`
//! header governs the data lines until the next header or `ENDATA`.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum Distribution {
    /// Enumerated `(value, probability)` support; probabilities must be
    /// positive and need not be pre-normalized (they are normalized once at
    /// sampling time against their sum).
    Discrete(Vec<(f64, f64)>),
    Normal { mean: f64, stddev: f64 },
    Uniform { lower: f64, upper: f64 },
}

/// One random position: the `(column, row)` name pair `StochasticPattern`
/// classifies against the TIM stage boundaries, plus its sampling rule.
#[derive(Debug, Clone, PartialEq)]
pub struct StochPosition {
    pub col_name: String,
    pub row_name: String,
    pub distribution: Distribution,
}

#[derive(Debug, Clone)]
pub struct Stoch {
    pub problem_name: String,
    positions: Vec<StochPosition>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Subtype {
    Discrete,
    Normal,
    Uniform,
}

impl Stoch {
    pub fn parse(text: &str, file: &str) -> Result<Self> {
        let mut problem_name = String::new();
        let mut positions: Vec<StochPosition> = Vec::new();
        let mut subtype: Option<Subtype> = None;

        for (line_no0, raw_line) in text.lines().enumerate() {
            let line_number = line_no0 + 1;
            if raw_line.is_empty() || raw_line.starts_with('*') {
                continue;
            }
            let tokens: Vec<&str> = raw_line.split_whitespace().collect();
            if tokens.is_empty() {
                continue;
            }

            match tokens[0] {
                "STOCH" => {
                    problem_name = tokens.get(1).map(|s| s.to_string()).unwrap_or_default();
                }
                "INDEP" => {
                    subtype = Some(match tokens.get(1).copied() {
                        Some("DISCRETE") => Subtype::Discrete,
                        Some("NORMAL") => Subtype::Normal,
                        Some("UNIFORM") => Subtype::Uniform,
                        Some(other) => {
                            return Err(Error::unsupported(file, line_number, format!("unsupported INDEP subtype '{other}'")));
                        }
                        None => return Err(Error::parse(file, line_number, "INDEP requires a subtype")),
                    });
                }
                "BLOCKS" | "SCENARIOS" => {
                    return Err(Error::unsupported(
                        file,
                        line_number,
                        format!("'{}' sections are not supported, only INDEP", tokens[0]),
                    ));
                }
                "ENDATA" => break,
                _ => {
                    let Some(subtype) = subtype else {
                        return Err(Error::parse(file, line_number, "data line outside any INDEP section"));
                    };
                    if tokens.len() != 4 {
                        return Err(Error::parse(file, line_number, "INDEP data line must have column, row, and two numbers"));
                    }
                    let col_name = tokens[0].to_string();
                    let row_name = tokens[1].to_string();
                    let a: f64 = tokens[2]
                        .parse()
                        .map_err(|_| Error::parse(file, line_number, format!("invalid number '{}'", tokens[2])))?;
                    let b: f64 = tokens[3]
                        .parse()
                        .map_err(|_| Error::parse(file, line_number, format!("invalid number '{}'", tokens[3])))?;

                    match subtype {
                        Subtype::Discrete => {
                            if let Some(existing) = positions
                                .iter_mut()
                                .find(|p| p.col_name == col_name && p.row_name == row_name)
                            {
                                if let Distribution::Discrete(pairs) = &mut existing.distribution {
                                    pairs.push((a, b));
                                } else {
                                    return Err(Error::parse(file, line_number, "position already declared with a different distribution"));
                                }
                            } else {
                                positions.push(StochPosition {
                                    col_name,
                                    row_name,
                                    distribution: Distribution::Discrete(vec![(a, b)]),
                                });
                            }
                        }
                        Subtype::Normal => positions.push(StochPosition {
                            col_name,
                            row_name,
                            distribution: Distribution::Normal { mean: a, stddev: b },
                        }),
                        Subtype::Uniform => positions.push(StochPosition {
                            col_name,
                            row_name,
                            distribution: Distribution::Uniform { lower: a, upper: b },
                        }),
                    }
                }
            }
        }

        Ok(Stoch {
            problem_name,
            positions,
        })
    }

    pub fn positions(&self) -> &[StochPosition] {
        &self.positions
    }

    fn sample_one(dist: &Distribution, rng: &mut SmallRng) -> f64 {
        match dist {
            Distribution::Discrete(pairs) => {
                let total: f64 = pairs.iter().map(|(_, p)| p).sum();
                let mut draw = rng.gen::<f64>() * total;
                for &(value, prob) in pairs {
                    if draw < prob {
                        return value;
                    }
                    draw -= prob;
                }
                pairs.last().map(|(v, _)| *v).unwrap_or(0.0)
            }
            Distribution::Normal { mean, stddev } => {
                // Box-Muller transform; avoids a dependency on rand_distr for
                // a single-use generator.
                let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
                let u2: f64 = rng.gen::<f64>();
                let z = (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos();
                mean + stddev * z
            }
            Distribution::Uniform { lower, upper } => rng.gen_range(*lower..*upper),
        }
    }

    /// Draws one realization per declared position, in declaration order —
    /// the order `StochasticPattern::from_smps` consumes via
    /// `StochPosition`'s implied index into the scenario vector.
    pub fn generate_scenario(&self, rng: &mut SmallRng) -> Vec<f64> {
        self.positions.iter().map(|p| Self::sample_one(&p.distribution, rng)).collect()
    }

    /// Draws a fixed ensemble of `n` scenarios from a single seed, the pool
    /// the driver samples from at construction time (`spec.md` §4.8).
    pub fn sample_pool(&self, n: usize, seed: u64) -> Vec<Vec<f64>> {
        let mut rng = SmallRng::seed_from_u64(seed);
        (0..n).map(|_| self.generate_scenario(&mut rng)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LANDS_STO: &str = include_str!("../tests/fixtures/lands/lands.sto");

    #[test]
    fn parses_discrete_positions() {
        let sto = Stoch::parse(LANDS_STO, "lands.sto").unwrap();
        assert_eq!(sto.problem_name, "LandS");
        assert_eq!(sto.positions().len(), 1);
        let pos = &sto.positions()[0];
        assert_eq!(pos.col_name, "RHS");
        assert_eq!(pos.row_name, "S2C5");
        match &pos.distribution {
            Distribution::Discrete(pairs) => assert_eq!(pairs.len(), 3),
            other => panic!("expected discrete distribution, got {other:?}"),
        }
    }

    #[test]
    fn discrete_draws_a_declared_value() {
        let sto = Stoch::parse(LANDS_STO, "lands.sto").unwrap();
        let mut rng = SmallRng::seed_from_u64(0);
        let scenario = sto.generate_scenario(&mut rng);
        assert_eq!(scenario.len(), 1);
        assert!(scenario[0] == 3.0 || scenario[0] == 5.0 || scenario[0] == 7.0);
    }

    #[test]
    fn sample_pool_has_requested_size() {
        let sto = Stoch::parse(LANDS_STO, "lands.sto").unwrap();
        let pool = sto.sample_pool(20, 42);
        assert_eq!(pool.len(), 20);
        assert!(pool.iter().all(|s| s.len() == 1));
    }

    #[test]
    fn blocks_section_is_rejected() {
        let text = "STOCH T\nBLOCKS\nENDATA\n";
        let err = Stoch::parse(text, "t.sto").unwrap_err();
        assert!(matches!(err, Error::Unsupported { .. }));
    }
}
