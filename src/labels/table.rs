//! Immutable label → ID table.

use indexmap::IndexMap;

use crate::error::{LookupError, Result};

/// A resolved enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelTable {
    /// Enumeration name, used in error messages.
    name: String,
    /// Label → ID.
    entries: IndexMap<String, i64>,
}

impl LabelTable {
    /// Creates a table from (label, id) pairs.
    #[must_use]
    pub fn new<I, S>(name: impl Into<String>, entries: I) -> Self
    where
        I: IntoIterator<Item = (S, i64)>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            entries: entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    /// Enumeration name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Looks up a label.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError::UnknownLabel`] if the label is not present.
    pub fn get(&self, label: &str) -> Result<i64> {
        self.entries
            .get(label)
            .copied()
            .ok_or_else(|| LookupError::unknown_label(&self.name, label).into())
    }

    /// Looks up several labels, preserving order.
    ///
    /// # Errors
    ///
    /// Fails on the first unknown label.
    pub fn get_many<S: AsRef<str>>(&self, labels: &[S]) -> Result<Vec<i64>> {
        labels.iter().map(|l| self.get(l.as_ref())).collect()
    }

    /// Number of labels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the table has no labels.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over (label, id) pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, i64)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_many_preserves_order() {
        let table = LabelTable::new("push target", [("cdn", 4), ("cdn_stage", 5), ("ftp", 3)]);
        assert_eq!(table.get_many(&["cdn_stage", "ftp", "cdn"]).expect("ids"), vec![5, 3, 4]);
    }

    #[test]
    fn test_unknown_label() {
        let table = LabelTable::new("push target", [("cdn", 4)]);
        let err = table.get("does-not-exist").expect_err("should fail");
        assert_eq!(
            err.to_string(),
            "Lookup error: unknown push target label 'does-not-exist'"
        );
        assert!(table.get_many(&["cdn", "does-not-exist"]).is_err());
    }
}
