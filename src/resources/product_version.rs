//! Product versions.

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::{debug, info};

use crate::config::ProductVersionSpec;
use crate::error::Result;
use crate::settings::Settings;

use super::{
    id_of, object_settings, related, related_names, single_match, spec_settings, DiffLabels,
    ManagedResource, Session,
};

/// A product version, keyed by product and name.
#[derive(Debug, Clone)]
pub struct ProductVersion {
    spec: ProductVersionSpec,
}

impl ProductVersion {
    /// Wraps a product version spec.
    #[must_use]
    pub const fn new(spec: ProductVersionSpec) -> Self {
        Self { spec }
    }

    fn collection_path(&self) -> String {
        format!("api/v1/products/{}/product_versions", self.spec.product)
    }

    /// The creation body. Flags are sent as 0/1.
    fn create_body(&self) -> Value {
        let spec = &self.spec;
        let flag = |value: bool| json!(i32::from(value));

        let mut pv = Map::new();
        pv.insert(String::from("name"), json!(spec.name));
        pv.insert(String::from("description"), json!(spec.description));
        pv.insert(String::from("allow_rhn_debuginfo"), flag(spec.allow_rhn_debuginfo));
        pv.insert(String::from("default_brew_tag"), json!(spec.default_brew_tag));
        pv.insert(String::from("enabled"), flag(spec.enabled));
        pv.insert(String::from("is_oval_product"), flag(spec.is_oval_product));
        pv.insert(String::from("is_rhel_addon"), flag(spec.is_rhel_addon));
        pv.insert(String::from("is_server_only"), flag(spec.is_server_only));
        pv.insert(String::from("brew_tags"), json!(spec.brew_tags));
        pv.insert(String::from("rhel_release_name"), json!(spec.rhel_release_name));
        pv.insert(String::from("sig_key_name"), json!(spec.sig_key_name));
        pv.insert(String::from("ima_sig_key_name"), json!(spec.ima_sig_key_name));
        pv.insert(String::from("allow_buildroot_push"), json!(spec.allow_buildroot_push));
        pv.insert(String::from("push_targets"), json!(spec.push_targets));
        json!({ "product_version": pv })
    }
}

/// Flattens a product version document into settings.
fn product_version_settings(data: &Value, product: &str) -> Settings {
    let mut pv = object_settings(data.get("attributes"));
    let relationships = data.get("relationships").cloned().unwrap_or(Value::Null);

    pv.insert(String::from("brew_tags"), data.get("brew_tags").cloned().unwrap_or(Value::Null));
    pv.insert(String::from("rhel_release_name"), related(&relationships, "rhel_release", "name"));
    pv.insert(String::from("sig_key_name"), related(&relationships, "sig_key", "name"));
    pv.insert(String::from("ima_sig_key_name"), related(&relationships, "ima_sig_key", "name"));
    pv.insert(String::from("push_targets"), related_names(&relationships, "push_targets"));
    pv.insert(String::from("product"), json!(product));
    pv.insert(String::from("id"), data.get("id").cloned().unwrap_or(Value::Null));
    pv
}

#[async_trait]
impl ManagedResource for ProductVersion {
    fn kind(&self) -> &'static str {
        "product version"
    }

    fn name(&self) -> &str {
        &self.spec.name
    }

    fn desired(&self) -> Result<Settings> {
        spec_settings(&self.spec)
    }

    fn creation_message(&self) -> String {
        format!("created {} product version", self.spec.name)
    }

    fn diff_labels(&self) -> Option<DiffLabels> {
        Some(DiffLabels {
            item_type: "product version",
            item_name: self.spec.name.clone(),
            keys_to_copy: &[],
            keys_to_omit: &[],
        })
    }

    async fn fetch(&self, session: &Session, check_mode: bool) -> Result<Option<Settings>> {
        // Names may contain dots, so the collection is filtered instead of
        // addressing the version directly.
        let path = format!("{}/", self.collection_path());
        let response = session
            .client()
            .get_with_query(&path, &[("filter[name]", self.spec.name.clone())])
            .await?;

        // In check mode the product may only be created later in the run.
        if response.status == 404 && check_mode {
            debug!("Product {} not found; assuming it will be created", self.spec.product);
            return Ok(None);
        }

        let body: Value = response.error_for_status()?.json()?;
        Ok(single_match(&body, &path, "product version", &self.spec.name)?
            .map(|data| product_version_settings(&data, &self.spec.product)))
    }

    async fn create(&self, session: &Session, _desired: &Settings) -> Result<Option<Settings>> {
        info!("Creating product version {}", self.spec.name);
        session
            .client()
            .post_json(&self.collection_path(), &self.create_body())
            .await?
            .expect_status(201)?;
        Ok(None)
    }

    async fn edit(&self, session: &Session, current: &Settings, changes: &Settings) -> Result<()> {
        if changes.is_empty() {
            return Ok(());
        }
        let id = id_of(current)?;
        info!("Editing product version {} ({id})", self.spec.name);
        session
            .client()
            .put_json(
                &format!("{}/{id}", self.collection_path()),
                &json!({ "product_version": changes }),
            )
            .await?
            .expect_status(200)?;
        Ok(())
    }
}
