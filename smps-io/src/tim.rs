//! TIM (time) file tokenizer, implicit form only: a `PERIODS` section of
//! `(first_column, first_row, period_label)` triples, one per stage.
//!
//! Grounded on `smps::SMPSImplicitTime`: a row/column belongs to the stage
//! whose declared first-row/first-column name is the closest one at or
//! before it in declaration order. `OBJ`/`obj` and `RHS`/`rhs` are reserved
//! names meaning "not a stage row" / "not a stage column" respectively,
//! returned as stage `-1`.

use crate::cor::Core;
use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct Time {
    pub problem_name: String,
    /// Declared first-column name, one per stage, in PERIODS order.
    first_column: Vec<String>,
    /// Declared first-row name, one per stage, in PERIODS order.
    first_row: Vec<String>,
}

impl Time {
    pub fn parse(text: &str, file: &str) -> Result<Self> {
        let mut problem_name = String::new();
        let mut first_column = Vec::new();
        let mut first_row = Vec::new();
        let mut in_periods = false;

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
                "TIME" => {
                    if tokens.len() != 2 {
                        return Err(Error::parse(file, line_number, "TIME line must have exactly one name"));
                    }
                    problem_name = tokens[1].to_string();
                }
                "PERIODS" => in_periods = true,
                "ENDATA" => break,
                _ if in_periods => {
                    if tokens.len() != 3 {
                        return Err(Error::unsupported(
                            file,
                            line_number,
                            "only the implicit PERIODS triple form is supported (BLOCKS/explicit TIME is not)",
                        ));
                    }
                    first_column.push(tokens[0].to_string());
                    first_row.push(tokens[1].to_string());
                }
                other => return Err(Error::parse(file, line_number, format!("unexpected token '{other}' outside PERIODS"))),
            }
        }

        if first_row.len() < 2 {
            return Err(Error::unsupported(file, 0, "fewer than two periods (not a two-stage instance)"));
        }

        Ok(Time {
            problem_name,
            first_column,
            first_row,
        })
    }

    pub fn num_stages(&self) -> usize {
        self.first_row.len()
    }

    fn row_boundaries(&self, core: &Core) -> Result<Vec<usize>> {
        let mut boundaries = Vec::with_capacity(self.first_row.len() + 1);
        for name in &self.first_row {
            let idx = core
                .row_name_map
                .get_index(name)
                .ok_or_else(|| Error::parse("tim", 0, format!("first-row name '{name}' not found in COR rows")))?;
            boundaries.push(idx);
        }
        boundaries.push(core.num_rows);
        Ok(boundaries)
    }

    fn col_boundaries(&self, core: &Core) -> Result<Vec<usize>> {
        let mut boundaries = Vec::with_capacity(self.first_column.len() + 1);
        for name in &self.first_column {
            let idx = core
                .col_name_map
                .get_index(name)
                .ok_or_else(|| Error::parse("tim", 0, format!("first-column name '{name}' not found in COR columns")))?;
            boundaries.push(idx);
        }
        boundaries.push(core.num_cols);
        Ok(boundaries)
    }

    /// Returns `(stage, index_in_stage)`, or `(-1, -1)` for the objective row.
    pub fn row_stage(&self, row_name: &str, core: &Core) -> Result<(i64, i64)> {
        if row_name.eq_ignore_ascii_case("OBJ") {
            return Ok((-1, -1));
        }
        let abs = core
            .row_name_map
            .get_index(row_name)
            .ok_or_else(|| Error::parse("tim", 0, format!("row '{row_name}' not found")))?;
        let boundaries = self.row_boundaries(core)?;
        for stage in 0..boundaries.len() - 1 {
            if abs >= boundaries[stage] && abs < boundaries[stage + 1] {
                return Ok((stage as i64, (abs - boundaries[stage]) as i64));
            }
        }
        Err(Error::parse("tim", 0, format!("row '{row_name}' falls outside all declared stages")))
    }

    /// Returns `(stage, index_in_stage)`, or `(-1, -1)` for the RHS marker.
    pub fn col_stage(&self, col_name: &str, core: &Core) -> Result<(i64, i64)> {
        if col_name.eq_ignore_ascii_case("RHS") {
            return Ok((-1, -1));
        }
        let abs = core
            .col_name_map
            .get_index(col_name)
            .ok_or_else(|| Error::parse("tim", 0, format!("column '{col_name}' not found")))?;
        let boundaries = self.col_boundaries(core)?;
        for stage in 0..boundaries.len() - 1 {
            if abs >= boundaries[stage] && abs < boundaries[stage + 1] {
                return Ok((stage as i64, (abs - boundaries[stage]) as i64));
            }
        }
        Err(Error::parse("tim", 0, format!("column '{col_name}' falls outside all declared stages")))
    }

    pub fn nrows(&self, stage: usize, core: &Core) -> Result<usize> {
        let boundaries = self.row_boundaries(core)?;
        Ok(boundaries[stage + 1] - boundaries[stage])
    }

    pub fn ncols(&self, stage: usize, core: &Core) -> Result<usize> {
        let boundaries = self.col_boundaries(core)?;
        Ok(boundaries[stage + 1] - boundaries[stage])
    }

    /// Absolute row index range `[start, end)` occupied by `stage`.
    pub fn row_range(&self, stage: usize, core: &Core) -> Result<std::ops::Range<usize>> {
        let boundaries = self.row_boundaries(core)?;
        Ok(boundaries[stage]..boundaries[stage + 1])
    }

    /// Absolute column index range `[start, end)` occupied by `stage`.
    pub fn col_range(&self, stage: usize, core: &Core) -> Result<std::ops::Range<usize>> {
        let boundaries = self.col_boundaries(core)?;
        Ok(boundaries[stage]..boundaries[stage + 1])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LANDS_COR: &str = include_str!("../tests/fixtures/lands/lands.cor");
    const LANDS_TIM: &str = include_str!("../tests/fixtures/lands/lands.tim");

    fn lands() -> (Core, Time) {
        let core = Core::parse(LANDS_COR, "lands.cor").unwrap();
        let tim = Time::parse(LANDS_TIM, "lands.tim").unwrap();
        (core, tim)
    }

    #[test]
    fn classifies_rows_and_columns() {
        let (core, tim) = lands();
        assert_eq!(tim.row_stage("OBJ", &core).unwrap(), (-1, -1));
        assert_eq!(tim.row_stage("S1C1", &core).unwrap(), (0, 0));
        assert_eq!(tim.row_stage("S1C2", &core).unwrap(), (0, 1));
        assert_eq!(tim.row_stage("S2C1", &core).unwrap(), (1, 0));
        assert_eq!(tim.row_stage("S2C7", &core).unwrap(), (1, 6));

        assert_eq!(tim.col_stage("RHS", &core).unwrap(), (-1, -1));
        assert_eq!(tim.col_stage("X1", &core).unwrap(), (0, 0));
        assert_eq!(tim.col_stage("X4", &core).unwrap(), (0, 3));
        assert_eq!(tim.col_stage("Y11", &core).unwrap(), (1, 0));
    }

    #[test]
    fn reports_stage_sizes() {
        let (core, tim) = lands();
        assert_eq!(tim.nrows(0, &core).unwrap(), 2);
        assert_eq!(tim.nrows(1, &core).unwrap(), 7);
        assert_eq!(tim.ncols(0, &core).unwrap(), 4);
        assert_eq!(tim.ncols(1, &core).unwrap(), 12);
    }

    #[test]
    fn rejects_single_stage_instance() {
        let text = "TIME T\nPERIODS\n X1 S1C1 P1\nENDATA\n";
        let err = Time::parse(text, "t.tim").unwrap_err();
        assert!(matches!(err, Error::Unsupported { .. }));
    }
}
