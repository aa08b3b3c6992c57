//! Small shared helpers: a bidirectional name/index map and a tolerance-based
//! floating point comparison, used throughout the stage-problem and SMPS
//! layers instead of scattering ad-hoc `HashMap<String, usize>`s.

use std::collections::HashMap;

/// Bidirectional mapping between human-readable names (row/column labels from
/// an SMPS file) and their dense zero-based index.
#[derive(Debug, Clone, Default)]
pub struct NameIndexMap {
    names: Vec<String>,
    index: HashMap<String, usize>,
}

impl NameIndexMap {
    pub fn new() -> Self {
        Self {
            names: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Inserts `name` if it is not already present and returns its index.
    pub fn add(&mut self, name: &str) -> usize {
        if let Some(&i) = self.index.get(name) {
            return i;
        }
        let i = self.names.len();
        self.names.push(name.to_string());
        self.index.insert(name.to_string(), i);
        i
    }

    pub fn get_index(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn get_name(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}

/// Absolute tolerance comparison used everywhere the spec calls for
/// `approx_equal` (bound/row feasibility checks, cut validity tests).
pub const APPROX_TOLERANCE: f64 = 1e-6;

pub fn approx_equal(a: f64, b: f64) -> bool {
    (a - b).abs() < APPROX_TOLERANCE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_index_map_round_trips() {
        let mut m = NameIndexMap::new();
        assert_eq!(m.add("X1"), 0);
        assert_eq!(m.add("X2"), 1);
        assert_eq!(m.add("X1"), 0);
        assert_eq!(m.get_index("X2"), Some(1));
        assert_eq!(m.get_name(0), Some("X1"));
        assert_eq!(m.get_name(5), None);
        assert_eq!(m.len(), 2);
    }

    #[test]
    fn approx_equal_uses_absolute_tolerance() {
        assert!(approx_equal(1.0, 1.0 + 1e-9));
        assert!(!approx_equal(1.0, 1.0 + 1e-3));
    }
}
