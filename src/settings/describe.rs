//! Change describer.
//!
//! Renders differences as report lines, and builds the before/after
//! structure a diff viewer shows for a created or modified resource.

use serde::Serialize;
use serde_json::Value;

use super::{Difference, Settings};

/// Identifier field that never belongs in a displayed diff.
const ID_FIELD: &str = "id";

/// Before/after display data for one resource.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskDiff {
    /// Settings before the change (empty for a new resource).
    pub before: Settings,
    /// Settings after the change.
    pub after: Settings,
    /// Header shown above `before`.
    pub before_header: String,
    /// Header shown above `after`.
    pub after_header: String,
}

/// Human-readable change lines, one per difference, in input order.
#[must_use]
pub fn describe_changes(differences: &[Difference]) -> Vec<String> {
    differences
        .iter()
        .map(|d| {
            format!(
                "changing {} from {} to {}",
                d.key,
                render_value(&d.old),
                render_value(&d.new)
            )
        })
        .collect()
}

/// Builds the diff-viewer payload for a resource.
///
/// A `before` of `None` describes a creation. Otherwise, each of
/// `keys_to_copy` missing from `after` is copied over from `before`, and each
/// of `keys_to_omit` (and the `id` field) missing from `after` is removed
/// from `before`.
#[must_use]
pub fn task_diff(
    before: Option<&Settings>,
    after: &Settings,
    item_name: &str,
    item_type: &str,
    keys_to_copy: &[&str],
    keys_to_omit: &[&str],
) -> TaskDiff {
    let Some(before) = before else {
        return TaskDiff {
            before: Settings::new(),
            after: after.clone(),
            before_header: String::from("Not present"),
            after_header: format!("New {item_type} '{item_name}'"),
        };
    };

    let mut after = after.clone();
    for key in keys_to_copy {
        if !after.contains_key(*key)
            && let Some(value) = before.get(*key)
        {
            after.insert((*key).to_string(), value.clone());
        }
    }

    let mut before = before.clone();
    for key in keys_to_omit.iter().chain(std::iter::once(&ID_FIELD)) {
        if !after.contains_key(*key) {
            before.shift_remove(*key);
        }
    }

    TaskDiff {
        before,
        after,
        before_header: format!("Original {item_type} '{item_name}'"),
        after_header: format!("Modified {item_type} '{item_name}'"),
    }
}

/// Renders a value the way the report lines have always shown it:
/// `True`/`False` for booleans, `None` for null, bare strings, and quoted
/// strings inside lists and maps.
#[must_use]
pub fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => render_nested(other),
    }
}

fn render_nested(value: &Value) -> String {
    match value {
        Value::Null => String::from("None"),
        Value::Bool(true) => String::from("True"),
        Value::Bool(false) => String::from("False"),
        Value::Number(n) => n.to_string(),
        Value::String(s) => format!("'{s}'"),
        Value::Array(items) => {
            let inner: Vec<String> = items.iter().map(render_nested).collect();
            format!("[{}]", inner.join(", "))
        }
        Value::Object(map) => {
            let inner: Vec<String> = map
                .iter()
                .map(|(k, v)| format!("'{k}': {}", render_nested(v)))
                .collect();
            format!("{{{}}}", inner.join(", "))
        }
    }
}
