//! RHEL releases.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::info;

use crate::config::RhelReleaseSpec;
use crate::error::Result;
use crate::settings::Settings;

use super::{
    id_of, object_settings, settings_body, single_match, spec_settings, DiffLabels, ManagedResource,
    Session,
};

const ENDPOINT: &str = "api/v1/rhel_releases";

/// A RHEL release, keyed by name.
#[derive(Debug, Clone)]
pub struct RhelRelease {
    spec: RhelReleaseSpec,
}

impl RhelRelease {
    /// Wraps a RHEL release spec.
    #[must_use]
    pub const fn new(spec: RhelReleaseSpec) -> Self {
        Self { spec }
    }
}

#[async_trait]
impl ManagedResource for RhelRelease {
    fn kind(&self) -> &'static str {
        "rhel release"
    }

    fn name(&self) -> &str {
        &self.spec.name
    }

    fn desired(&self) -> Result<Settings> {
        spec_settings(&self.spec)
    }

    fn diff_labels(&self) -> Option<DiffLabels> {
        Some(DiffLabels {
            item_type: "rhel_release",
            item_name: self.spec.name.clone(),
            keys_to_copy: &[],
            keys_to_omit: &[],
        })
    }

    async fn fetch(&self, session: &Session, _check_mode: bool) -> Result<Option<Settings>> {
        let response = session
            .client()
            .get_with_query(ENDPOINT, &[("filter[name]", self.spec.name.clone())])
            .await?
            .error_for_status()?;
        let body: Value = response.json()?;

        Ok(single_match(&body, ENDPOINT, "rhel release", &self.spec.name)?.map(|data| {
            let mut rhel_release = object_settings(data.get("attributes"));
            rhel_release.insert(String::from("id"), data.get("id").cloned().unwrap_or(Value::Null));
            rhel_release
        }))
    }

    async fn create(&self, session: &Session, desired: &Settings) -> Result<Option<Settings>> {
        info!("Creating RHEL release {}", self.spec.name);
        // Creation takes a bare object, unlike edits.
        let body = settings_body(desired);
        session
            .client()
            .post_json(ENDPOINT, &body)
            .await?
            .expect_status(201)?;
        Ok(None)
    }

    async fn edit(&self, session: &Session, current: &Settings, changes: &Settings) -> Result<()> {
        let id = id_of(current)?;
        info!("Editing RHEL release {} ({id})", self.spec.name);
        session
            .client()
            .put_json(&format!("{ENDPOINT}/{id}"), &json!({ "rhel_release": changes }))
            .await?
            .expect_status(200)?;
        Ok(())
    }
}
