//! Products.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::config::ProductSpec;
use crate::error::{ConfigError, ErrataError, Result};
use crate::fields::{FieldMap, FieldRule};
use crate::settings::Settings;

use super::{
    get_user, id_of, object_settings, related, related_names, spec_settings, DiffLabels,
    ManagedResource, Session,
};

/// The API drops the verb on some booleans and keeps it on others.
const FIELDS: FieldMap = FieldMap::new(&[
    FieldRule::rename("active", "isactive"),
    FieldRule::rename("internal", "is_internal"),
]);

/// A product, keyed by short name.
#[derive(Debug, Clone)]
pub struct Product {
    spec: ProductSpec,
}

impl Product {
    /// Wraps a product spec.
    #[must_use]
    pub const fn new(spec: ProductSpec) -> Self {
        Self { spec }
    }

    fn path(short_name: &str) -> String {
        format!("api/v1/products/{short_name}")
    }
}

/// Flattens a product document into settings.
fn product_settings(data: &Value) -> Settings {
    let mut product = FIELDS.to_logical(object_settings(data.get("attributes")));
    product.insert(String::from("id"), data.get("id").cloned().unwrap_or(Value::Null));

    let relationships = data.get("relationships").cloned().unwrap_or(Value::Null);
    product.insert(
        String::from("default_docs_reviewer"),
        related(&relationships, "default_docs_reviewer", "login_name"),
    );
    product.insert(
        String::from("default_solution"),
        related(&relationships, "default_solution", "title"),
    );
    product.insert(String::from("push_targets"), related_names(&relationships, "push_targets"));
    product.insert(
        String::from("state_machine_rule_set"),
        related(&relationships, "state_machine_rule_set", "name"),
    );
    product.insert(
        String::from("exd_org_group"),
        related(&relationships, "exd_org_group", "name"),
    );
    product
}

#[async_trait]
impl ManagedResource for Product {
    fn kind(&self) -> &'static str {
        "product"
    }

    fn name(&self) -> &str {
        &self.spec.short_name
    }

    fn desired(&self) -> Result<Settings> {
        spec_settings(&self.spec)
    }

    fn creation_message(&self) -> String {
        format!("created {} product", self.spec.short_name)
    }

    fn diff_labels(&self) -> Option<DiffLabels> {
        Some(DiffLabels {
            item_type: "product",
            item_name: self.spec.short_name.clone(),
            keys_to_copy: &[],
            keys_to_omit: &[],
        })
    }

    async fn fetch(&self, session: &Session, _check_mode: bool) -> Result<Option<Settings>> {
        let response = session.client().get(&Self::path(&self.spec.short_name)).await?;
        if response.status != 200 {
            debug!("Product {} not found (HTTP {})", self.spec.short_name, response.status);
            return Ok(None);
        }
        let body: Value = response.json()?;
        Ok(body.get("data").map(product_settings))
    }

    async fn create(&self, session: &Session, desired: &Settings) -> Result<Option<Settings>> {
        info!("Creating product {}", self.spec.short_name);
        let body = json!({ "product": FIELDS.to_wire(desired.clone()) });
        session
            .client()
            .post_json("api/v1/products", &body)
            .await?
            .expect_status(201)?;
        Ok(None)
    }

    async fn edit(&self, session: &Session, current: &Settings, changes: &Settings) -> Result<()> {
        let id = id_of(current)?;
        info!("Editing product {} ({id})", self.spec.short_name);
        let body = json!({ "product": FIELDS.to_wire(changes.clone()) });
        session
            .client()
            .put_json(&format!("api/v1/products/{id}"), &body)
            .await?
            .expect_status(200)?;
        Ok(())
    }

    async fn verify(&self, session: &Session, changed: bool, check_mode: bool) -> Result<()> {
        let Some(reviewer) = &self.spec.default_docs_reviewer else {
            return Ok(());
        };
        if !(check_mode && changed && session.strict_user_check()) {
            return Ok(());
        }

        let Some(user) = get_user(session.client(), reviewer, false).await? else {
            return Err(docs_reviewer_error(format!("{reviewer} account not found")));
        };

        let has_docs_role = user
            .get("roles")
            .and_then(Value::as_array)
            .is_some_and(|roles| roles.iter().any(|r| r.as_str() == Some("docs")));
        if !has_docs_role {
            return Err(ErrataError::Config(ConfigError::validation(
                format!("User {reviewer} does not have 'docs' role in ET"),
                "default_docs_reviewer",
            )));
        }

        if !user.get("enabled").and_then(Value::as_bool).unwrap_or(false) {
            return Err(docs_reviewer_error(format!("{reviewer} is not enabled")));
        }

        Ok(())
    }
}

fn docs_reviewer_error(message: String) -> ErrataError {
    ErrataError::Config(ConfigError::validation(
        format!("default_docs_reviewer {message}"),
        "default_docs_reviewer",
    ))
}
