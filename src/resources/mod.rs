//! Managed Errata Tool resources.
//!
//! Each submodule knows how to read one resource type into a flat
//! [`Settings`] map, and how to create or edit it. The generic fetch, diff,
//! apply cycle lives in [`crate::reconciler`].

mod cdn_repo;
mod product;
mod product_version;
mod release;
mod request;
mod rhel_release;
mod user;
mod variant;

pub use cdn_repo::{normalize_packages, CdnRepo, PackageTags, PACKAGE_TAG_PAGE_SIZE};
pub use product::Product;
pub use product_version::ProductVersion;
pub use release::Release;
pub use request::{raw_request, RawResponse};
pub use rhel_release::RhelRelease;
pub use user::{get_user, user_id, user_info, User, UserInfo};
pub use variant::Variant;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::client::ErrataClient;
use crate::error::{ErrataError, LookupError, Result};
use crate::labels::Resolvers;
use crate::settings::{drop_nulls, settings_from_json, Difference, Settings};

/// Everything a reconciliation run shares between resources.
#[derive(Debug)]
pub struct Session {
    /// API client.
    client: ErrataClient,
    /// Label resolvers, populated on first use.
    labels: Resolvers,
    /// Verify referenced accounts even in check mode.
    strict_user_check: bool,
}

impl Session {
    /// Creates a session.
    #[must_use]
    pub const fn new(client: ErrataClient, labels: Resolvers) -> Self {
        Self {
            client,
            labels,
            strict_user_check: false,
        }
    }

    /// Enables strict account checks in check mode.
    #[must_use]
    pub const fn with_strict_user_check(mut self, strict: bool) -> Self {
        self.strict_user_check = strict;
        self
    }

    /// The API client.
    #[must_use]
    pub const fn client(&self) -> &ErrataClient {
        &self.client
    }

    /// The label resolvers.
    #[must_use]
    pub const fn labels(&self) -> &Resolvers {
        &self.labels
    }

    /// Whether strict account checks are enabled.
    #[must_use]
    pub const fn strict_user_check(&self) -> bool {
        self.strict_user_check
    }
}

/// Labels for the before/after diff payload.
#[derive(Debug, Clone)]
pub struct DiffLabels {
    /// Resource type shown in headers, e.g. `product version`.
    pub item_type: &'static str,
    /// Resource name shown in headers.
    pub item_name: String,
    /// Keys copied from before into after when after lacks them.
    pub keys_to_copy: &'static [&'static str],
    /// Keys dropped from before when after lacks them.
    pub keys_to_omit: &'static [&'static str],
}

/// A resource whose live state can be brought to a desired state.
#[async_trait]
pub trait ManagedResource: Send + Sync {
    /// Resource type, e.g. `product`.
    fn kind(&self) -> &'static str;

    /// Name identifying this instance.
    fn name(&self) -> &str;

    /// Desired settings, with unset values already removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the spec cannot be represented as settings.
    fn desired(&self) -> Result<Settings>;

    /// Message reported when the resource does not exist yet.
    fn creation_message(&self) -> String {
        format!("created {}", self.name())
    }

    /// Headers for the diff payload, or `None` if no diff is reported.
    fn diff_labels(&self) -> Option<DiffLabels> {
        None
    }

    /// Reads the live state, or `None` if the resource does not exist.
    async fn fetch(&self, session: &Session, check_mode: bool) -> Result<Option<Settings>>;

    /// Creates the resource. Returns the created state when the server
    /// echoes it back and further reconciliation should use it.
    async fn create(&self, session: &Session, desired: &Settings) -> Result<Option<Settings>>;

    /// Sends only the changed settings.
    async fn edit(&self, session: &Session, current: &Settings, changes: &Settings) -> Result<()>;

    /// Differences that must accompany any edit even when unchanged.
    fn mandatory_edit_fields(
        &self,
        _current: &Settings,
        _desired: &Settings,
        _differences: &[Difference],
    ) -> Vec<Difference> {
        Vec::new()
    }

    /// Reconciles state stored outside the main object.
    async fn reconcile_children(&self, _session: &Session, _check_mode: bool) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    /// Extra checks after the diff has been computed.
    async fn verify(&self, _session: &Session, _changed: bool, _check_mode: bool) -> Result<()> {
        Ok(())
    }
}

/// Serializes a spec into settings, dropping unset values.
pub(crate) fn spec_settings<T: Serialize>(spec: &T) -> Result<Settings> {
    let value = serde_json::to_value(spec)
        .map_err(|e| ErrataError::internal(format!("cannot serialize spec: {e}")))?;
    Ok(drop_nulls(&settings_from_json(value)))
}

/// Turns settings into a JSON object request body.
pub(crate) fn settings_body(settings: &Settings) -> Value {
    Value::Object(settings.clone().into_iter().collect())
}

/// Builds a key → new value map from differences.
#[must_use]
pub fn changes_of(differences: &[Difference]) -> Settings {
    differences
        .iter()
        .map(|d| (d.key.clone(), d.new.clone()))
        .collect()
}

/// Returns the numeric `id` of a live object.
pub(crate) fn id_of(current: &Settings) -> Result<i64> {
    current
        .get("id")
        .and_then(Value::as_i64)
        .ok_or_else(|| LookupError::missing_setting("id").into())
}

/// Picks the only element of a JSON:API `data` list.
///
/// Returns `None` for an empty list.
pub(crate) fn single_match(
    body: &Value,
    path: &str,
    resource_type: &str,
    name: &str,
) -> Result<Option<Value>> {
    let data = body
        .get("data")
        .and_then(Value::as_array)
        .ok_or_else(|| LookupError::MissingField {
            path: path.to_string(),
            field: String::from("data"),
        })?;

    match data.as_slice() {
        [] => Ok(None),
        [only] => Ok(Some(only.clone())),
        many => Err(LookupError::Ambiguous {
            resource_type: resource_type.to_string(),
            name: name.to_string(),
            count: many.len(),
        }
        .into()),
    }
}

/// Copies a JSON object into settings.
pub(crate) fn object_settings(value: Option<&Value>) -> Settings {
    value.cloned().map(settings_from_json).unwrap_or_default()
}

/// Reads `relationship[field]`, or null when the relationship is null.
pub(crate) fn related(relationships: &Value, relationship: &str, field: &str) -> Value {
    relationships
        .get(relationship)
        .and_then(|r| r.get(field))
        .cloned()
        .unwrap_or(Value::Null)
}

/// Reads the `name` of every object in a relationship list.
pub(crate) fn related_names(relationships: &Value, relationship: &str) -> Value {
    let names = relationships
        .get(relationship)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.get("name").cloned())
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();
    Value::Array(names)
}

/// A session against a mock server.
#[cfg(test)]
pub(crate) fn test_session(uri: &str) -> Session {
    let client = ErrataClient::anonymous(uri).expect("client");
    let labels = Resolvers::from_config(&client, &crate::config::LabelsConfig::default());
    Session::new(client, labels)
}
