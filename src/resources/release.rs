//! Releases.
//!
//! Releases refer to products, product versions, program managers and
//! workflow rule sets by ID when written, but are compared by name. The
//! name → ID conversion happens in [`Release::api_body`].

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::{debug, info};

use crate::config::ReleaseSpec;
use crate::error::{LookupError, Result};
use crate::fields::{FieldMap, FieldRule, Transform};
use crate::settings::{Difference, Settings};

use super::{
    id_of, object_settings, related, related_names, single_match, spec_settings, user_id,
    ManagedResource, Session,
};

const ENDPOINT: &str = "api/v1/releases";

const FIELDS: FieldMap = FieldMap::new(&[
    FieldRule::read("active", "is_active"),
    FieldRule::write("active", "isactive"),
    FieldRule::write("supports_component_acl", "disable_acl").with_transform(Transform::NegateBool),
    FieldRule::write("blocker_flags", "blocker_flags").with_transform(Transform::JoinComma),
]);

/// A release, keyed by name.
#[derive(Debug, Clone)]
pub struct Release {
    spec: ReleaseSpec,
}

impl Release {
    /// Wraps a release spec.
    #[must_use]
    pub const fn new(spec: ReleaseSpec) -> Self {
        Self { spec }
    }

    /// Builds the request body for a create or an edit.
    async fn api_body(&self, session: &Session, settings: &Settings) -> Result<Value> {
        let client = session.client();
        let mut release = settings.clone();

        if let Some(product) = release.shift_remove("product")
            && let Some(name) = product.as_str()
        {
            release.insert(String::from("product_id"), json!(product_id(session, name).await?));
        }

        if let Some(manager) = release.shift_remove("program_manager")
            && let Some(login_name) = manager.as_str()
        {
            release.insert(
                String::from("program_manager_id"),
                json!(user_id(client, login_name).await?),
            );
        }

        if let Some(product_versions) = release.shift_remove("product_versions") {
            let mut ids = Vec::new();
            for name in product_versions.as_array().into_iter().flatten().filter_map(Value::as_str) {
                ids.push(product_version_id(session, name).await?);
            }
            release.insert(String::from("product_version_ids"), json!(ids));
        }

        if let Some(rule_set) = release.shift_remove("state_machine_rule_set") {
            let id = match rule_set.as_str().filter(|name| !name.is_empty()) {
                Some(name) => json!(session.labels().workflow_rules.resolve(name).await?),
                None => Value::Null,
            };
            release.insert(String::from("state_machine_rule_set_id"), id);
        }

        let mut body = Map::new();
        body.insert(
            String::from("release"),
            Value::Object(FIELDS.to_wire(release).into_iter().collect()),
        );
        if let Some(release_type) = settings.get("type") {
            body.insert(String::from("type"), release_type.clone());
        }
        Ok(Value::Object(body))
    }
}

async fn product_id(session: &Session, short_name: &str) -> Result<i64> {
    let path = format!("api/v1/products/{short_name}");
    let body: Value = session.client().get(&path).await?.error_for_status()?.json()?;
    body.pointer("/data/id").and_then(Value::as_i64).ok_or_else(|| {
        LookupError::MissingField {
            path,
            field: String::from("data.id"),
        }
        .into()
    })
}

/// Product versions are looked up through the older JSON endpoint, which
/// works for releases without a product.
async fn product_version_id(session: &Session, name: &str) -> Result<i64> {
    let path = format!("product_versions/{name}.json");
    let body: Value = session.client().get(&path).await?.error_for_status()?.json()?;
    body.get("id").and_then(Value::as_i64).ok_or_else(|| {
        LookupError::MissingField {
            path,
            field: String::from("id"),
        }
        .into()
    })
}

/// Flattens a release document into settings.
fn release_settings(data: &Value) -> Settings {
    let mut release = Settings::new();
    release.insert(String::from("id"), data.get("id").cloned().unwrap_or(Value::Null));
    release.extend(FIELDS.to_logical(object_settings(data.get("attributes"))));

    let relationships = data.get("relationships").cloned().unwrap_or(Value::Null);
    release.insert(String::from("product"), related(&relationships, "product", "short_name"));
    release.insert(
        String::from("program_manager"),
        related(&relationships, "program_manager", "login_name"),
    );
    release.insert(
        String::from("state_machine_rule_set"),
        related(&relationships, "state_machine_rule_set", "name"),
    );
    release.insert(
        String::from("brew_tags"),
        relationships.get("brew_tags").cloned().unwrap_or(Value::Null),
    );
    release.insert(
        String::from("product_versions"),
        related_names(&relationships, "product_versions"),
    );

    // Timestamps are compared as dates.
    if let Some(Value::String(ship_date)) = release.get_mut("ship_date") {
        ship_date.truncate(10);
    }
    release
}

#[async_trait]
impl ManagedResource for Release {
    fn kind(&self) -> &'static str {
        "release"
    }

    fn name(&self) -> &str {
        &self.spec.name
    }

    fn desired(&self) -> Result<Settings> {
        let mut desired = spec_settings(&self.spec)?;
        // An empty rule set name resets the rule set.
        if self.spec.state_machine_rule_set.as_deref() == Some("") {
            desired.insert(String::from("state_machine_rule_set"), Value::Null);
        }
        Ok(desired)
    }

    async fn fetch(&self, session: &Session, _check_mode: bool) -> Result<Option<Settings>> {
        let response = session
            .client()
            .get_with_query(ENDPOINT, &[("filter[name]", self.spec.name.clone())])
            .await?
            .error_for_status()?;
        let body: Value = response.json()?;
        let release = single_match(&body, ENDPOINT, "release", &self.spec.name)?;
        if release.is_none() {
            debug!("Release {} not found", self.spec.name);
        }
        Ok(release.as_ref().map(release_settings))
    }

    async fn create(&self, session: &Session, desired: &Settings) -> Result<Option<Settings>> {
        info!("Creating release {}", self.spec.name);
        let body = self.api_body(session, desired).await?;
        session
            .client()
            .post_json(ENDPOINT, &body)
            .await?
            .expect_status(201)?;
        Ok(None)
    }

    async fn edit(&self, session: &Session, current: &Settings, changes: &Settings) -> Result<()> {
        let id = id_of(current)?;
        info!("Editing release {} ({id})", self.spec.name);
        let body = self.api_body(session, changes).await?;
        session
            .client()
            .put_json(&format!("{ENDPOINT}/{id}"), &body)
            .await?
            .expect_status(200)?;
        Ok(())
    }

    /// The server clears product versions on any edit that omits them.
    fn mandatory_edit_fields(
        &self,
        _current: &Settings,
        desired: &Settings,
        differences: &[Difference],
    ) -> Vec<Difference> {
        if differences.iter().any(|d| d.key == "product_versions") {
            return Vec::new();
        }
        let product_versions = desired.get("product_versions").cloned().unwrap_or(Value::Null);
        vec![Difference::new("product_versions", product_versions.clone(), product_versions)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::test_session;
    use crate::settings::{diff_settings, settings_from_json};
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn release_document() -> Value {
        json!({
            "data": [{
                "id": 1017,
                "type": "releases",
                "attributes": {
                    "name": "rhceph-4.0",
                    "description": "Red Hat Ceph Storage 4.0",
                    "type": "QuarterlyUpdate",
                    "allow_pkg_dupes": true,
                    "ship_date": "2020-01-31T00:00:00Z",
                    "pelc_product_version_name": "",
                    "is_active": true,
                    "enabled": true,
                    "enable_batching": false,
                    "is_async": false,
                    "is_deferred": false,
                    "allow_shadow": false,
                    "allow_blocker": false,
                    "allow_exception": false,
                    "limit_bugs_by_product": false,
                    "supports_component_acl": true,
                    "blocker_flags": ["ceph-4"],
                    "internal_target_release": "",
                    "zstream_target_release": null
                },
                "relationships": {
                    "brew_tags": [],
                    "product": {"id": 104, "short_name": "RHCEPH"},
                    "program_manager": {"id": 123456, "login_name": "coolmanager@redhat.com"},
                    "product_versions": [
                        {"id": 929, "name": "RHCEPH-4.0-RHEL-8"},
                        {"id": 1108, "name": "RHEL-7-RHCEPH-4.0"}
                    ],
                    "state_machine_rule_set": null
                }
            }]
        })
    }

    fn spec() -> ReleaseSpec {
        serde_yaml::from_str(
            r"
product: RHCEPH
name: rhceph-4.0
type: QuarterlyUpdate
description: Red Hat Ceph Storage 4.0
product_versions: [RHCEPH-4.0-RHEL-8, RHEL-7-RHCEPH-4.0]
enable_batching: false
program_manager: coolmanager@redhat.com
blocker_flags: [ceph-4]
internal_target_release: ''
ship_date: '2020-01-31'
allow_pkg_dupes: true
supports_component_acl: true
",
        )
        .expect("spec")
    }

    async fn mount_lookups(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/api/v1/products/RHCEPH"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"id": 104}})))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/user/coolmanager@redhat.com"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 123_456})))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/product_versions/RHCEPH-4.0-RHEL-8.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 929})))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/product_versions/RHEL-7-RHCEPH-4.0.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 1108})))
            .mount(server)
            .await;
    }

    #[test]
    fn test_release_settings() {
        let release = release_settings(&release_document()["data"][0]);
        assert_eq!(release["id"], json!(1017));
        assert_eq!(release["active"], json!(true));
        assert!(!release.contains_key("is_active"));
        assert_eq!(release["ship_date"], json!("2020-01-31"));
        assert_eq!(release["product"], json!("RHCEPH"));
        assert_eq!(release["program_manager"], json!("coolmanager@redhat.com"));
        assert_eq!(release["state_machine_rule_set"], Value::Null);
        assert_eq!(release["brew_tags"], json!([]));
        assert_eq!(
            release["product_versions"],
            json!(["RHCEPH-4.0-RHEL-8", "RHEL-7-RHCEPH-4.0"])
        );
    }

    #[test]
    fn test_matching_release_has_no_differences() {
        let current = release_settings(&release_document()["data"][0]);
        let desired = Release::new(spec()).desired().expect("desired");
        assert!(diff_settings(&current, &desired).expect("diff").is_empty());
    }

    #[test]
    fn test_empty_rule_set_means_null() {
        let release = Release::new(ReleaseSpec {
            state_machine_rule_set: Some(String::new()),
            ..spec()
        });
        assert_eq!(release.desired().expect("desired")["state_machine_rule_set"], Value::Null);

        let unset = Release::new(spec()).desired().expect("desired");
        assert!(!unset.contains_key("state_machine_rule_set"));
    }

    #[tokio::test]
    async fn test_fetch_by_name() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/releases"))
            .and(query_param("filter[name]", "rhceph-4.0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(release_document()))
            .mount(&server)
            .await;

        let session = test_session(&server.uri());
        let release = Release::new(spec()).fetch(&session, false).await.expect("fetch");
        assert_eq!(release.expect("present")["id"], json!(1017));
    }

    #[tokio::test]
    async fn test_create_release() {
        let server = MockServer::start().await;
        mount_lookups(&server).await;
        Mock::given(method("POST"))
            .and(path("/api/v1/releases"))
            .and(body_json(json!({
                "release": {
                    "name": "rhceph-4.0",
                    "description": "Red Hat Ceph Storage 4.0",
                    "type": "QuarterlyUpdate",
                    "enabled": true,
                    "enable_batching": false,
                    "internal_target_release": "",
                    "ship_date": "2020-01-31",
                    "allow_shadow": false,
                    "allow_blocker": false,
                    "allow_exception": false,
                    "allow_pkg_dupes": true,
                    "limit_bugs_by_product": false,
                    "brew_tags": [],
                    "product_id": 104,
                    "program_manager_id": 123_456,
                    "product_version_ids": [929, 1108],
                    "isactive": true,
                    "disable_acl": false,
                    "blocker_flags": "ceph-4"
                },
                "type": "QuarterlyUpdate"
            })))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let session = test_session(&server.uri());
        let release = Release::new(spec());
        let desired = release.desired().expect("desired");
        release.create(&session, &desired).await.expect("create");
    }

    #[tokio::test]
    async fn test_edit_resets_rule_set() {
        let server = MockServer::start().await;
        mount_lookups(&server).await;
        Mock::given(method("PUT"))
            .and(path("/api/v1/releases/1017"))
            .and(body_json(json!({
                "release": {
                    "state_machine_rule_set_id": null,
                    "product_version_ids": [929, 1108]
                }
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let session = test_session(&server.uri());
        let current = settings_from_json(json!({"id": 1017}));
        let changes = settings_from_json(json!({
            "state_machine_rule_set": null,
            "product_versions": ["RHCEPH-4.0-RHEL-8", "RHEL-7-RHCEPH-4.0"]
        }));
        Release::new(spec()).edit(&session, &current, &changes).await.expect("edit");
    }

    #[test]
    fn test_edits_always_carry_product_versions() {
        let release = Release::new(spec());
        let desired = release.desired().expect("desired");
        let differences = vec![Difference::new("enabled", json!(false), json!(true))];
        let extra = release.mandatory_edit_fields(&Settings::new(), &desired, &differences);
        assert_eq!(extra.len(), 1);
        assert_eq!(extra[0].key, "product_versions");
        assert_eq!(extra[0].new, json!(["RHCEPH-4.0-RHEL-8", "RHEL-7-RHCEPH-4.0"]));

        let differences = vec![Difference::new("product_versions", json!([]), json!(["x"]))];
        assert!(release.mandatory_edit_fields(&Settings::new(), &desired, &differences).is_empty());
    }
}
