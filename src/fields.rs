//! Declarative field-name mapping between the API and our settings.
//!
//! The REST API is inconsistent about names (`isactive`, `is_active`,
//! `is_internal`, `disable_acl`...). Each resource declares a [`FieldMap`]
//! that translates live data into logical names on the way in and logical
//! names into wire names on the way out.

use serde_json::Value;

use crate::settings::Settings;

/// When a rule applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Rename when reading and when writing.
    Both,
    /// Rename only when reading live data.
    Read,
    /// Rename only when building a request body.
    Write,
}

/// Value conversion applied when writing (and undone when reading).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    /// Copy the value unchanged.
    Identity,
    /// Invert a boolean (`supports_component_acl` vs `disable_acl`).
    NegateBool,
    /// Join a list of strings with commas.
    JoinComma,
}

/// A single wire ↔ logical rule.
#[derive(Debug, Clone, Copy)]
pub struct FieldRule {
    /// Name used in our settings and in the manifest.
    pub logical: &'static str,
    /// Name used by the API.
    pub wire: &'static str,
    /// When this rule applies.
    pub direction: Direction,
    /// Value conversion.
    pub transform: Transform,
}

impl FieldRule {
    /// A plain rename in both directions.
    #[must_use]
    pub const fn rename(logical: &'static str, wire: &'static str) -> Self {
        Self {
            logical,
            wire,
            direction: Direction::Both,
            transform: Transform::Identity,
        }
    }

    /// A rename applied only to live data.
    #[must_use]
    pub const fn read(logical: &'static str, wire: &'static str) -> Self {
        Self {
            logical,
            wire,
            direction: Direction::Read,
            transform: Transform::Identity,
        }
    }

    /// A rename applied only to request bodies.
    #[must_use]
    pub const fn write(logical: &'static str, wire: &'static str) -> Self {
        Self {
            logical,
            wire,
            direction: Direction::Write,
            transform: Transform::Identity,
        }
    }

    /// Sets the value conversion.
    #[must_use]
    pub const fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    const fn reads(&self) -> bool {
        matches!(self.direction, Direction::Both | Direction::Read)
    }

    const fn writes(&self) -> bool {
        matches!(self.direction, Direction::Both | Direction::Write)
    }
}

/// An ordered table of field rules for one resource type.
#[derive(Debug, Clone, Copy)]
pub struct FieldMap {
    rules: &'static [FieldRule],
}

impl FieldMap {
    /// Creates a map from a static rule table.
    #[must_use]
    pub const fn new(rules: &'static [FieldRule]) -> Self {
        Self { rules }
    }

    /// A map with no rules.
    #[must_use]
    pub const fn empty() -> Self {
        Self { rules: &[] }
    }

    /// Translates live API attributes into logical settings.
    ///
    /// Rules whose wire name is absent are skipped.
    #[must_use]
    pub fn to_logical(&self, mut settings: Settings) -> Settings {
        for rule in self.rules.iter().filter(|r| r.reads()) {
            if let Some(value) = settings.shift_remove(rule.wire) {
                settings.insert(rule.logical.to_string(), unapply(rule.transform, value));
            }
        }
        settings
    }

    /// Translates logical settings into an API request body.
    ///
    /// Rules whose logical name is absent are skipped.
    #[must_use]
    pub fn to_wire(&self, mut settings: Settings) -> Settings {
        for rule in self.rules.iter().filter(|r| r.writes()) {
            if let Some(value) = settings.shift_remove(rule.logical) {
                settings.insert(rule.wire.to_string(), apply(rule.transform, value));
            }
        }
        settings
    }
}

fn apply(transform: Transform, value: Value) -> Value {
    match (transform, value) {
        (Transform::NegateBool, Value::Bool(b)) => Value::Bool(!b),
        (Transform::JoinComma, Value::Array(items)) => {
            let joined: Vec<String> = items
                .iter()
                .map(|v| v.as_str().map_or_else(|| v.to_string(), str::to_string))
                .collect();
            Value::String(joined.join(","))
        }
        (_, value) => value,
    }
}

fn unapply(transform: Transform, value: Value) -> Value {
    match (transform, value) {
        (Transform::NegateBool, Value::Bool(b)) => Value::Bool(!b),
        (Transform::JoinComma, Value::String(s)) => Value::Array(
            s.split(',')
                .filter(|part| !part.is_empty())
                .map(|part| Value::String(part.to_string()))
                .collect(),
        ),
        (_, value) => value,
    }
}
