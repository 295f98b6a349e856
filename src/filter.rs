use std::collections::{BTreeMap, BTreeSet};

use crate::record::{Auxiliary, Record};
use crate::schema::TableSchema;

/// Selected values per filter dimension. A dimension with no selected
/// values does not filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FilterSelection {
    selected: BTreeMap<String, BTreeSet<String>>,
}

impl FilterSelection {
    /// Returns true if `value` is selected after the toggle.
    pub fn toggle(&mut self, dimension: &str, value: &str) -> bool {
        let values = self.selected.entry(dimension.to_string()).or_default();
        let selected = if values.remove(value) {
            false
        } else {
            values.insert(value.to_string());
            true
        };
        if values.is_empty() {
            self.selected.remove(dimension);
        }
        selected
    }

    pub fn clear(&mut self) {
        self.selected.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn values(&self, dimension: &str) -> Option<&BTreeSet<String>> {
        self.selected.get(dimension)
    }

    pub fn is_selected(&self, dimension: &str, value: &str) -> bool {
        self.values(dimension).is_some_and(|v| v.contains(value))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &BTreeSet<String>)> {
        self.selected.iter().filter(|(_, v)| !v.is_empty())
    }

    /// AND across dimensions, OR within one.
    pub fn passes(&self, record: &Record, schema: &TableSchema, aux: &Auxiliary) -> bool {
        self.iter().all(|(dimension, values)| {
            let value = schema.filter_source(dimension).text(record, aux);
            values.contains(&value)
        })
    }
}
