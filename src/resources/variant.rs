//! Variants.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::info;

use crate::config::VariantSpec;
use crate::error::Result;
use crate::settings::Settings;

use super::{
    id_of, object_settings, related, related_names, single_match, spec_settings, DiffLabels,
    ManagedResource, Session,
};

const ENDPOINT: &str = "api/v1/variants";

/// A variant, keyed by name.
#[derive(Debug, Clone)]
pub struct Variant {
    spec: VariantSpec,
}

impl Variant {
    /// Wraps a variant spec.
    #[must_use]
    pub const fn new(spec: VariantSpec) -> Self {
        Self { spec }
    }
}

/// Flattens a variant document. This endpoint nests `relationships` inside
/// `attributes`.
fn variant_settings(data: &Value) -> Settings {
    let mut variant = Settings::new();
    variant.insert(String::from("id"), data.get("id").cloned().unwrap_or(Value::Null));
    variant.extend(object_settings(data.get("attributes")));

    let relationships = variant.shift_remove("relationships").unwrap_or(Value::Null);
    variant.insert(String::from("product"), related(&relationships, "product", "short_name"));
    variant.insert(
        String::from("product_version"),
        related(&relationships, "product_version", "name"),
    );
    variant.insert(String::from("rhel_variant"), related(&relationships, "rhel_variant", "name"));
    variant.insert(String::from("push_targets"), related_names(&relationships, "push_targets"));
    variant
}

#[async_trait]
impl ManagedResource for Variant {
    fn kind(&self) -> &'static str {
        "variant"
    }

    fn name(&self) -> &str {
        &self.spec.name
    }

    fn desired(&self) -> Result<Settings> {
        spec_settings(&self.spec)
    }

    fn creation_message(&self) -> String {
        format!("created {} variant", self.spec.name)
    }

    fn diff_labels(&self) -> Option<DiffLabels> {
        Some(DiffLabels {
            item_type: "variant",
            item_name: self.spec.name.clone(),
            // Live data carries both; the manifest usually sets only one.
            keys_to_copy: &["tps_stream", "rhel_variant"],
            keys_to_omit: &["product"],
        })
    }

    async fn fetch(&self, session: &Session, _check_mode: bool) -> Result<Option<Settings>> {
        let response = session
            .client()
            .get_with_query(ENDPOINT, &[("filter[name]", self.spec.name.clone())])
            .await?
            .error_for_status()?;
        let body: Value = response.json()?;
        Ok(single_match(&body, ENDPOINT, "variant", &self.spec.name)?
            .as_ref()
            .map(variant_settings))
    }

    async fn create(&self, session: &Session, desired: &Settings) -> Result<Option<Settings>> {
        info!("Creating variant {}", self.spec.name);
        session
            .client()
            .post_json(ENDPOINT, &json!({ "variant": desired }))
            .await?
            .expect_status(201)?;
        Ok(None)
    }

    async fn edit(&self, session: &Session, current: &Settings, changes: &Settings) -> Result<()> {
        let id = id_of(current)?;
        info!("Editing variant {} ({id})", self.spec.name);
        session
            .client()
            .put_json(&format!("{ENDPOINT}/{id}"), &json!({ "variant": changes }))
            .await?
            .expect_status(200)?;
        Ok(())
    }
}
