//! COR (core) file tokenizer: NAME, ROWS, COLUMNS, RHS, BOUNDS, ENDATA.
//!
//! Grounded on `smps::SMPSCore`'s line-oriented reader: section lines start
//! in column 1, data lines are indented. Comment lines start with `*` and
//! are skipped, as are blank lines.

use crate::error::{Error, Result};
use crate::util::NameIndexMap;

/// Row sense as read from the ROWS section. `N` marks the (single) objective
/// row and is not counted as a constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowType {
    Objective,
    Greater,
    Less,
    Equal,
}

impl RowType {
    fn from_code(code: &str, file: &str, line: usize) -> Result<Self> {
        match code {
            "N" => Ok(RowType::Objective),
            "G" => Ok(RowType::Greater),
            "L" => Ok(RowType::Less),
            "E" => Ok(RowType::Equal),
            other => Err(Error::parse(file, line, format!("unsupported row type '{other}'"))),
        }
    }
}

/// A fully tokenized COR file. `row_name_map`/`col_name_map` include every
/// row (including the objective row, at whatever index it was declared) and
/// every column in declaration order, matching `smps::SMPSCore`.
#[derive(Debug, Clone)]
pub struct Core {
    pub problem_name: String,
    pub num_rows: usize,
    pub num_cols: usize,
    pub row_name_map: NameIndexMap,
    pub col_name_map: NameIndexMap,
    pub row_types: Vec<RowType>,
    /// Triplets `(row, col, value)` over the full matrix, including the
    /// objective row (`row_types[row] == Objective`).
    pub lp_coefficients: Vec<(usize, usize, f64)>,
    pub rhs_coefficients: Vec<f64>,
    pub lower_bounds: Vec<f64>,
    pub upper_bounds: Vec<f64>,
}

impl Core {
    pub fn parse(text: &str, file: &str) -> Result<Self> {
        let mut problem_name = String::new();
        let mut row_name_map = NameIndexMap::new();
        let mut col_name_map = NameIndexMap::new();
        let mut row_types: Vec<RowType> = Vec::new();
        let mut lp_coefficients: Vec<(usize, usize, f64)> = Vec::new();
        let mut rhs_coefficients: Vec<f64> = Vec::new();
        let mut lower_bounds: Vec<f64> = Vec::new();
        let mut upper_bounds: Vec<f64> = Vec::new();

        let mut section = String::new();

        for (line_no0, raw_line) in text.lines().enumerate() {
            let line_number = line_no0 + 1;
            if raw_line.is_empty() || raw_line.starts_with('*') {
                continue;
            }

            let is_section_line = !raw_line.starts_with(' ') && !raw_line.starts_with('\t');
            let tokens: Vec<&str> = raw_line.split_whitespace().collect();
            if tokens.is_empty() {
                continue;
            }

            if is_section_line {
                section = tokens[0].to_string();
                if section == "NAME" {
                    problem_name = tokens.get(1).map(|s| s.to_string()).unwrap_or_default();
                    if problem_name.is_empty() {
                        return Err(Error::parse(file, line_number, "NAME section requires a problem name"));
                    }
                }
                continue;
            }

            match section.as_str() {
                "ROWS" => {
                    if tokens.len() != 2 {
                        return Err(Error::parse(file, line_number, "ROWS line must have type and name"));
                    }
                    let row_type = RowType::from_code(tokens[0], file, line_number)?;
                    row_name_map.add(tokens[1]);
                    row_types.push(row_type);
                    rhs_coefficients.push(0.0);
                }
                "COLUMNS" => {
                    if tokens.len() < 3 || (tokens.len() - 1) % 2 != 0 {
                        return Err(Error::parse(file, line_number, "COLUMNS line must have 1 or 2 (row, value) pairs"));
                    }
                    let col_name = tokens[0];
                    let is_new = col_name_map.get_index(col_name).is_none();
                    let col_index = col_name_map.add(col_name);
                    if is_new {
                        lower_bounds.push(0.0);
                        upper_bounds.push(f64::INFINITY);
                    }

                    let mut pairs = tokens[1..].chunks_exact(2);
                    for pair in &mut pairs {
                        let row_name = pair[0];
                        let value: f64 = pair[1]
                            .parse()
                            .map_err(|_| Error::parse(file, line_number, format!("invalid coefficient '{}'", pair[1])))?;
                        let row_index = row_name_map
                            .get_index(row_name)
                            .ok_or_else(|| Error::parse(file, line_number, format!("row '{row_name}' not declared in ROWS")))?;
                        lp_coefficients.push((row_index, col_index, value));
                    }
                }
                "RHS" => {
                    // Standard form: RHS-vector-name row value [row value].
                    if tokens.len() < 3 || (tokens.len() - 1) % 2 != 0 {
                        return Err(Error::parse(file, line_number, "RHS line must have 1 or 2 (row, value) pairs"));
                    }
                    let mut pairs = tokens[1..].chunks_exact(2);
                    for pair in &mut pairs {
                        let row_name = pair[0];
                        let value: f64 = pair[1]
                            .parse()
                            .map_err(|_| Error::parse(file, line_number, format!("invalid RHS value '{}'", pair[1])))?;
                        let row_index = row_name_map
                            .get_index(row_name)
                            .ok_or_else(|| Error::parse(file, line_number, format!("row '{row_name}' not declared in ROWS")))?;
                        rhs_coefficients[row_index] = value;
                    }
                }
                "BOUNDS" => {
                    if tokens.len() != 4 {
                        return Err(Error::parse(file, line_number, "BOUNDS line must have type, vector name, column, value"));
                    }
                    let bound_type = tokens[0];
                    let col_name = tokens[2];
                    let col_index = col_name_map
                        .get_index(col_name)
                        .ok_or_else(|| Error::parse(file, line_number, format!("column '{col_name}' not declared in COLUMNS")))?;
                    let value: f64 = tokens[3]
                        .parse()
                        .map_err(|_| Error::parse(file, line_number, format!("invalid bound value '{}'", tokens[3])))?;
                    match bound_type {
                        "UP" => upper_bounds[col_index] = value,
                        "LO" => lower_bounds[col_index] = value,
                        "FX" => {
                            lower_bounds[col_index] = value;
                            upper_bounds[col_index] = value;
                        }
                        "FR" => {
                            lower_bounds[col_index] = f64::NEG_INFINITY;
                            upper_bounds[col_index] = f64::INFINITY;
                        }
                        other => {
                            return Err(Error::parse(file, line_number, format!("unsupported bound type '{other}'")));
                        }
                    }
                }
                "ENDATA" => break,
                other => return Err(Error::parse(file, line_number, format!("unsupported section '{other}'"))),
            }
        }

        Ok(Core {
            problem_name,
            num_rows: row_name_map.len(),
            num_cols: col_name_map.len(),
            row_name_map,
            col_name_map,
            row_types,
            lp_coefficients,
            rhs_coefficients,
            lower_bounds,
            upper_bounds,
        })
    }

    pub fn inequality_direction(&self, row: usize) -> Option<RowType> {
        self.row_types.get(row).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LANDS_COR: &str = include_str!("../tests/fixtures/lands/lands.cor");

    #[test]
    fn parses_lands_core_structure() {
        let core = Core::parse(LANDS_COR, "lands.cor").unwrap();
        assert_eq!(core.problem_name, "LandS");
        assert_eq!(core.row_name_map.get_name(0), Some("OBJ"));
        assert_eq!(core.row_name_map.get_name(1), Some("S1C1"));
        assert_eq!(core.col_name_map.get_name(0), Some("X1"));
        assert_eq!(core.rhs_coefficients[1], 12.0);
        assert_eq!(core.rhs_coefficients[2], 120.0);
        assert_eq!(core.row_types[0], RowType::Objective);
        assert_eq!(core.row_types[1], RowType::Greater);
        assert_eq!(core.row_types[2], RowType::Less);
        assert_eq!(core.lower_bounds[0], 0.0);
        assert_eq!(core.upper_bounds[0], f64::INFINITY);
    }

    #[test]
    fn rejects_undeclared_row_reference() {
        let text = "NAME T\nROWS\n N OBJ\nCOLUMNS\n    X1 OBJ 1.0 GHOST 2.0\nENDATA\n";
        let err = Core::parse(text, "t.cor").unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
    }

    #[test]
    fn fx_bound_fixes_both_sides() {
        let text = "NAME T\nROWS\n N OBJ\nCOLUMNS\n    X1 OBJ 1.0\nBOUNDS\n FX BND X1 5.0\nENDATA\n";
        let core = Core::parse(text, "t.cor").unwrap();
        assert_eq!(core.lower_bounds[0], 5.0);
        assert_eq!(core.upper_bounds[0], 5.0);
    }
}
