//! CDN repositories and their package tag templates.
//!
//! The repository object itself only lists package names. Tag templates for
//! each package live in a separate collection, `api/v1/cdn_repo_package_tags`,
//! and are reconciled one template at a time after the repository is in
//! place.

use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::{json, Value};
use tracing::info;

use crate::client::ErrataClient;
use crate::config::{CdnRepoSpec, PackageTag};
use crate::error::{LookupError, Result};
use crate::fields::{FieldMap, FieldRule};
use crate::settings::Settings;

use super::{id_of, object_settings, related, related_names, single_match, ManagedResource, Session};

const ENDPOINT: &str = "api/v1/cdn_repos";
const TAGS_ENDPOINT: &str = "api/v1/cdn_repo_package_tags";

/// Page size used when listing package tags.
pub const PACKAGE_TAG_PAGE_SIZE: usize = 100;

const FIELDS: FieldMap = FieldMap::new(&[
    FieldRule::write("arch", "arch_name"),
    FieldRule::write("variants", "variant_names"),
]);

/// Package name → tag template → variant restriction.
pub type PackageTags = IndexMap<String, IndexMap<String, Option<String>>>;

/// Normalizes manifest tag lists into a tag template map per package.
///
/// Repeated templates collapse into one; the last restriction wins.
#[must_use]
pub fn normalize_packages(packages: &IndexMap<String, Vec<PackageTag>>) -> PackageTags {
    packages
        .iter()
        .map(|(package, tags)| {
            let mut templates = IndexMap::new();
            for tag in tags {
                match tag {
                    PackageTag::Template(template) => {
                        templates.insert(template.clone(), None);
                    }
                    PackageTag::Restricted(restricted) => {
                        if let Some((template, restriction)) = restricted.first() {
                            templates.insert(template.clone(), restriction.variant.clone());
                        }
                    }
                }
            }
            (package.clone(), templates)
        })
        .collect()
}

/// A tag template as stored on the server.
#[derive(Debug, Clone, PartialEq, Eq)]
struct LiveTag {
    id: i64,
    variant: Option<String>,
}

type LiveTags = IndexMap<String, IndexMap<String, LiveTag>>;

/// Lists every package tag of a repository, page by page.
async fn live_package_tags(client: &ErrataClient, repo_name: &str) -> Result<LiveTags> {
    let mut packages = LiveTags::new();
    let mut page_number = 1;

    loop {
        let query = [
            ("page[size]", PACKAGE_TAG_PAGE_SIZE.to_string()),
            ("page[number]", page_number.to_string()),
            ("filter[cdn_repo_name]", repo_name.to_string()),
        ];
        let body: Value = client
            .get_with_query(TAGS_ENDPOINT, &query)
            .await?
            .error_for_status()?
            .json()?;
        let elements = body.get("data").and_then(Value::as_array).ok_or_else(|| {
            LookupError::MissingField {
                path: String::from(TAGS_ENDPOINT),
                field: String::from("data"),
            }
        })?;

        for element in elements {
            let id = element.get("id").and_then(Value::as_i64).ok_or_else(|| {
                LookupError::MissingField {
                    path: String::from(TAGS_ENDPOINT),
                    field: String::from("id"),
                }
            })?;
            let relationships = element.get("relationships").cloned().unwrap_or(Value::Null);
            let package_name = related(&relationships, "package", "name");
            let package = package_name.as_str().ok_or_else(|| LookupError::MissingField {
                path: format!("{TAGS_ENDPOINT} (tag {id})"),
                field: String::from("package"),
            })?;
            let template = element
                .pointer("/attributes/tag_template")
                .and_then(Value::as_str)
                .ok_or_else(|| LookupError::MissingField {
                    path: format!("{TAGS_ENDPOINT} (tag {id})"),
                    field: String::from("tag_template"),
                })?;
            let variant = related(&relationships, "variant", "name")
                .as_str()
                .map(str::to_string);

            packages
                .entry(package.to_string())
                .or_default()
                .insert(template.to_string(), LiveTag { id, variant });
        }

        if elements.len() < PACKAGE_TAG_PAGE_SIZE {
            break;
        }
        page_number += 1;
    }

    Ok(packages)
}

/// Describes a change to one template's variant restriction.
fn describe_variant_change(
    package: &str,
    template: &str,
    current: Option<&str>,
    desired: Option<&str>,
) -> Option<String> {
    match (current, desired) {
        (current, desired) if current == desired => None,
        (Some(current), None) => Some(format!(
            "removing \"{current}\" variant from {package} \"{template}\" tag template"
        )),
        (None, Some(desired)) => Some(format!(
            "adding \"{desired}\" variant to {package} \"{template}\" tag template"
        )),
        (Some(current), Some(desired)) => Some(format!(
            "changing {package} \"{template}\" variant from \"{current}\" to \"{desired}\""
        )),
        (None, None) => None,
    }
}

/// A CDN repository, keyed by name.
#[derive(Debug, Clone)]
pub struct CdnRepo {
    spec: CdnRepoSpec,
    packages: PackageTags,
}

impl CdnRepo {
    /// Wraps a CDN repository spec.
    #[must_use]
    pub fn new(spec: CdnRepoSpec) -> Self {
        let packages = normalize_packages(&spec.packages);
        Self { spec, packages }
    }

    /// Reconciles the tag templates of one package.
    async fn reconcile_package(
        &self,
        client: &ErrataClient,
        package: &str,
        current: &IndexMap<String, LiveTag>,
        desired: &IndexMap<String, Option<String>>,
        check_mode: bool,
    ) -> Result<Vec<String>> {
        let mut changes = Vec::new();

        for (template, tag) in current.iter().filter(|(t, _)| !desired.contains_key(*t)) {
            changes.push(format!("removing \"{template}\" tag template from \"{package}\""));
            if check_mode {
                continue;
            }
            client
                .delete(&format!("{TAGS_ENDPOINT}/{}", tag.id))
                .await?
                .expect_status(204)?;
        }

        for (template, tag) in current {
            let Some(variant) = desired.get(template) else {
                continue;
            };
            let Some(change) =
                describe_variant_change(package, template, tag.variant.as_deref(), variant.as_deref())
            else {
                continue;
            };
            changes.push(change);
            if check_mode {
                continue;
            }
            let settings = match variant {
                Some(variant) => json!({ "variant_name": variant }),
                None => json!({ "variant_id": null }),
            };
            client
                .put_json(
                    &format!("{TAGS_ENDPOINT}/{}", tag.id),
                    &json!({ "cdn_repo_package_tag": settings }),
                )
                .await?
                .expect_status(200)?;
        }

        for (template, variant) in desired.iter().filter(|(t, _)| !current.contains_key(*t)) {
            changes.push(format!("adding \"{template}\" tag template to \"{package}\""));
            if check_mode {
                continue;
            }
            let mut tag = json!({
                "cdn_repo_name": self.spec.name,
                "package_name": package,
                "tag_template": template,
            });
            if let Some(variant) = variant {
                tag["variant_name"] = json!(variant);
            }
            client
                .post_json(TAGS_ENDPOINT, &json!({ "cdn_repo_package_tag": tag }))
                .await?
                .expect_status(201)?;
        }

        Ok(changes)
    }
}

/// Flattens a CDN repository document into settings.
fn cdn_repo_settings(data: &Value) -> Settings {
    let mut cdn_repo = Settings::new();
    cdn_repo.insert(String::from("id"), data.get("id").cloned().unwrap_or(Value::Null));
    cdn_repo.extend(object_settings(data.get("attributes")));

    let relationships = data.get("relationships").cloned().unwrap_or(Value::Null);
    cdn_repo.insert(String::from("arch"), related(&relationships, "arch", "name"));
    cdn_repo.insert(String::from("variants"), related_names(&relationships, "variants"));
    cdn_repo.insert(String::from("package_names"), related_names(&relationships, "packages"));
    cdn_repo
}

#[async_trait]
impl ManagedResource for CdnRepo {
    fn kind(&self) -> &'static str {
        "cdn repo"
    }

    fn name(&self) -> &str {
        &self.spec.name
    }

    fn desired(&self) -> Result<Settings> {
        let spec = &self.spec;
        let mut desired = Settings::new();
        desired.insert(String::from("name"), json!(spec.name));
        desired.insert(String::from("release_type"), json!(spec.release_type));
        desired.insert(String::from("content_type"), json!(spec.content_type));
        desired.insert(String::from("arch"), json!(spec.effective_arch()));
        desired.insert(String::from("use_for_tps"), json!(spec.use_for_tps));
        desired.insert(String::from("variants"), json!(spec.variants));
        desired.insert(
            String::from("package_names"),
            json!(spec.packages.keys().collect::<Vec<_>>()),
        );
        Ok(desired)
    }

    async fn fetch(&self, session: &Session, _check_mode: bool) -> Result<Option<Settings>> {
        let body: Value = session
            .client()
            .get_with_query(ENDPOINT, &[("filter[name]", self.spec.name.clone())])
            .await?
            .error_for_status()?
            .json()?;
        Ok(single_match(&body, ENDPOINT, "cdn_repo", &self.spec.name)?
            .as_ref()
            .map(cdn_repo_settings))
    }

    /// Returns the created repository so its settings and tags can be
    /// reconciled in the same run.
    async fn create(&self, session: &Session, desired: &Settings) -> Result<Option<Settings>> {
        info!("Creating CDN repo {}", self.spec.name);
        let body = json!({ "cdn_repo": FIELDS.to_wire(desired.clone()) });
        let response = session
            .client()
            .post_json(ENDPOINT, &body)
            .await?
            .expect_status(201)?;
        let created: Value = response.json()?;
        Ok(created.get("data").map(cdn_repo_settings))
    }

    async fn edit(&self, session: &Session, current: &Settings, changes: &Settings) -> Result<()> {
        let id = id_of(current)?;
        info!("Editing CDN repo {} ({id})", self.spec.name);
        let body = json!({ "cdn_repo": FIELDS.to_wire(changes.clone()) });
        session
            .client()
            .put_json(&format!("{ENDPOINT}/{id}"), &body)
            .await?
            .expect_status(200)?;
        Ok(())
    }

    async fn reconcile_children(&self, session: &Session, check_mode: bool) -> Result<Vec<String>> {
        if self.packages.is_empty() {
            return Ok(Vec::new());
        }

        let client = session.client();
        let mut live = live_package_tags(client, &self.spec.name).await?;
        let mut changes = Vec::new();
        for (package, desired) in &self.packages {
            let current = live.shift_remove(package).unwrap_or_default();
            changes.extend(
                self.reconcile_package(client, package, &current, desired, check_mode)
                    .await?,
            );
        }
        Ok(changes)
    }
}
