//! Tokenizer for the SMPS (Stochastic MPS) `.cor`/`.tim`/`.sto` triple.
//!
//! Mirrors the three-reader split of `smps::SMPSCore`/`SMPSImplicitTime`/
//! `SMPSStoch`: [`cor`] reads the deterministic LP, [`tim`] classifies every
//! row/column into its stage via the implicit `PERIODS` form, and [`sto`]
//! reads the `INDEP` randomness declarations. None of the three know about
//! each other's data structures beyond `Core`'s name maps, which `tim`
//! borrows to resolve stage boundaries.

pub mod cor;
pub mod error;
pub mod sto;
pub mod tim;
pub mod util;

pub use cor::Core;
pub use error::{Error, Result};
pub use sto::Stoch;
pub use tim::Time;

use std::path::Path;

/// An SMPS instance's three parsed files, named `<problem_name>.cor`,
/// `.tim`, and `.sto` under `<base_path>/<problem_name>/`, the layout the
/// `twosd` binary's command line expects.
#[derive(Debug, Clone)]
pub struct Instance {
    pub core: Core,
    pub time: Time,
    pub stoch: Stoch,
}

impl Instance {
    pub fn load(base_path: &Path, problem_name: &str) -> Result<Self> {
        let dir = base_path.join(problem_name);

        let cor_path = dir.join(format!("{problem_name}.cor"));
        let tim_path = dir.join(format!("{problem_name}.tim"));
        let sto_path = dir.join(format!("{problem_name}.sto"));

        let cor_text = std::fs::read_to_string(&cor_path)
            .map_err(|e| Error::parse(cor_path.display().to_string(), 0, format!("could not read file: {e}")))?;
        let tim_text = std::fs::read_to_string(&tim_path)
            .map_err(|e| Error::parse(tim_path.display().to_string(), 0, format!("could not read file: {e}")))?;
        let sto_text = std::fs::read_to_string(&sto_path)
            .map_err(|e| Error::parse(sto_path.display().to_string(), 0, format!("could not read file: {e}")))?;

        let core = Core::parse(&cor_text, &cor_path.display().to_string())?;
        let time = Time::parse(&tim_text, &tim_path.display().to_string())?;
        let stoch = Stoch::parse(&sto_text, &sto_path.display().to_string())?;

        Ok(Instance { core, time, stoch })
    }
}
