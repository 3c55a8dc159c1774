//! Settings differ.
//!
//! Compares a live settings map against a desired one. Only keys in the
//! desired map are considered; list values are compared as sets.

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeSet;
use tracing::trace;

use crate::error::{LookupError, Result};

use super::Settings;

/// A single changed setting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Difference {
    /// Setting name.
    pub key: String,
    /// Value currently stored on the server.
    pub old: Value,
    /// Value we want.
    pub new: Value,
}

impl Difference {
    /// Creates a new difference triple.
    #[must_use]
    pub fn new(key: impl Into<String>, old: Value, new: Value) -> Self {
        Self {
            key: key.into(),
            old,
            new,
        }
    }
}

/// Diffs the live `current` settings against the `desired` settings.
///
/// Returns one [`Difference`] per key of `desired` whose value is not equal
/// to the value in `current`, in the iteration order of `desired`. When the
/// desired value is a list, the comparison ignores order and duplicates, but
/// the reported values are the original lists.
///
/// # Errors
///
/// Returns [`LookupError::MissingSetting`] if a desired key is absent from
/// `current`.
pub fn diff_settings(current: &Settings, desired: &Settings) -> Result<Vec<Difference>> {
    let mut differences = Vec::new();

    for (key, new_value) in desired {
        let current_value = current
            .get(key)
            .ok_or_else(|| LookupError::missing_setting(key))?;

        let changed = match new_value {
            Value::Array(_) => as_set(current_value) != as_set(new_value),
            _ => current_value != new_value,
        };

        if changed {
            trace!("{key} differs: {current_value} -> {new_value}");
            differences.push(Difference::new(
                key.clone(),
                current_value.clone(),
                new_value.clone(),
            ));
        }
    }

    Ok(differences)
}

/// Removes every `null` value from a desired settings map.
///
/// A `null` in desired state means "not managed", so it must never be diffed.
#[must_use]
pub fn drop_nulls(settings: &Settings) -> Settings {
    settings
        .iter()
        .filter(|(_, value)| !value.is_null())
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// Canonical set form of a list value. Non-lists have no set form.
fn as_set(value: &Value) -> Option<BTreeSet<String>> {
    match value {
        Value::Array(items) => Some(items.iter().map(Value::to_string).collect()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::settings_from_json;
    use serde_json::json;

    #[test]
    fn test_identical_settings_have_no_differences() {
        let settings = settings_from_json(json!({
            "active": true,
            "push_targets": ["cdn", "cdn_stage"],
            "description": "Red Hat Ceph Storage",
            "default_docs_reviewer": null,
        }));
        let differences = diff_settings(&settings, &settings).expect("diff failed");
        assert!(differences.is_empty());
    }

    #[test]
    fn test_scalar_change() {
        let current = settings_from_json(json!({"active": false, "push_targets": ["cdn"]}));
        let desired = settings_from_json(json!({"active": true, "push_targets": ["cdn"]}));
        let differences = diff_settings(&current, &desired).expect("diff failed");
        assert_eq!(
            differences,
            vec![Difference::new("active", json!(false), json!(true))]
        );
    }

    #[test]
    fn test_list_order_is_ignored() {
        let current = settings_from_json(json!({"a": ["x", "y"]}));
        let desired = settings_from_json(json!({"a": ["y", "x"]}));
        assert!(diff_settings(&current, &desired).expect("diff failed").is_empty());
    }

    #[test]
    fn test_list_duplicates_are_ignored() {
        let current = settings_from_json(json!({"a": ["x", "y"]}));
        let desired = settings_from_json(json!({"a": ["x", "y", "x"]}));
        assert!(diff_settings(&current, &desired).expect("diff failed").is_empty());
    }

    #[test]
    fn test_list_change_reports_original_lists() {
        let current = settings_from_json(json!({"active": true, "push_targets": ["cdn"]}));
        let desired =
            settings_from_json(json!({"active": true, "push_targets": ["cdn", "cdn_stage"]}));
        let differences = diff_settings(&current, &desired).expect("diff failed");
        assert_eq!(
            differences,
            vec![Difference::new(
                "push_targets",
                json!(["cdn"]),
                json!(["cdn", "cdn_stage"])
            )]
        );
    }

    #[test]
    fn test_list_against_null_is_a_change() {
        let current = settings_from_json(json!({"brew_tags": null}));
        let desired = settings_from_json(json!({"brew_tags": []}));
        let differences = diff_settings(&current, &desired).expect("diff failed");
        assert_eq!(differences.len(), 1);
    }

    #[test]
    fn test_keys_only_in_current_are_ignored() {
        let current = settings_from_json(json!({"id": 1, "active": true, "extra": "x"}));
        let desired = settings_from_json(json!({"active": true}));
        assert!(diff_settings(&current, &desired).expect("diff failed").is_empty());
    }

    #[test]
    fn test_missing_current_key_fails() {
        let current = settings_from_json(json!({"active": true}));
        let desired = settings_from_json(json!({"active": true, "internal": false}));
        let err = diff_settings(&current, &desired).expect_err("should fail");
        assert!(matches!(
            err,
            crate::error::ErrataError::Lookup(LookupError::MissingSetting { ref key }) if key == "internal"
        ));
    }

    #[test]
    fn test_drop_nulls() {
        let settings = settings_from_json(json!({"a": null, "b": 1, "c": ""}));
        let dropped = drop_nulls(&settings);
        assert_eq!(dropped.len(), 2);
        assert!(!dropped.contains_key("a"));
    }
}
