//! Settings comparison and change reporting.
//!
//! Every resource is reduced to a flat [`Settings`] map before it is compared.
//! This module computes the per-key differences between the live and the
//! desired map and renders them for humans and for diff viewers.

mod describe;
mod diff;

pub use describe::{describe_changes, render_value, task_diff, TaskDiff};
pub use diff::{diff_settings, drop_nulls, Difference};

/// A flat mapping from field name to value, in insertion order.
pub type Settings = indexmap::IndexMap<String, serde_json::Value>;

/// Builds a [`Settings`] map from a JSON object literal.
///
/// Non-object values yield an empty map.
#[must_use]
pub fn settings_from_json(value: serde_json::Value) -> Settings {
    match value {
        serde_json::Value::Object(map) => map.into_iter().collect(),
        _ => Settings::new(),
    }
}
