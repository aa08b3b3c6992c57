//! Bidirectional name/index map, local to this crate (the `BijectiveMap` of
//! `include/utils.h`) — kept independent of `twosd::util::NameIndexMap` so
//! this crate has no dependency back onto its consumer.

use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct NameIndexMap {
    names: Vec<String>,
    index: HashMap<String, usize>,
}

impl NameIndexMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `name` if absent and returns its index; re-adding an existing
    /// name returns its existing index unchanged.
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_name_and_index() {
        let mut m = NameIndexMap::new();
        assert_eq!(m.add("OBJ"), 0);
        assert_eq!(m.add("S1C1"), 1);
        assert_eq!(m.add("OBJ"), 0);
        assert_eq!(m.get_name(1), Some("S1C1"));
        assert_eq!(m.get_index("S1C1"), Some(1));
        assert_eq!(m.len(), 2);
    }
}
