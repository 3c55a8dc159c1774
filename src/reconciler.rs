//! Reconciler for maintaining desired state.
//!
//! This module implements the fetch, diff, apply cycle shared by every
//! resource type. Each resource supplies its own fetch, create and edit
//! operations through [`ManagedResource`]; the reconciler decides which of
//! them to call and reports what changed.

use serde::Serialize;
use tracing::{debug, info};

use crate::config::Manifest;
use crate::error::Result;
use crate::resources::{
    changes_of, CdnRepo, ManagedResource, Product, ProductVersion, Release, RhelRelease, Session,
    User, Variant,
};
use crate::settings::{describe_changes, diff_settings, task_diff, Settings, TaskDiff};

/// What a single reconciliation did, or would do in check mode.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReconcileOutcome {
    /// Whether anything changed.
    pub changed: bool,
    /// Human-readable change lines.
    pub stdout_lines: Vec<String>,
    /// Before/after data for diff viewers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff: Option<TaskDiff>,
}

/// Outcome of one resource within a manifest run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Resource type.
    pub kind: String,
    /// Resource name.
    pub name: String,
    /// What happened.
    #[serde(flatten)]
    pub outcome: ReconcileOutcome,
}

/// Reconciler for maintaining desired state.
#[derive(Debug)]
pub struct Reconciler<'a> {
    /// Shared client, label resolvers and options.
    session: &'a Session,
}

impl<'a> Reconciler<'a> {
    /// Creates a new reconciler.
    #[must_use]
    pub const fn new(session: &'a Session) -> Self {
        Self { session }
    }

    /// Brings one resource to its desired state.
    ///
    /// In check mode, reports what would change without sending any write.
    ///
    /// # Errors
    ///
    /// Returns the first lookup, transport or remote error encountered.
    pub async fn ensure(
        &self,
        resource: &dyn ManagedResource,
        check_mode: bool,
    ) -> Result<ReconcileOutcome> {
        let desired = resource.desired()?;
        let mut outcome = ReconcileOutcome::default();

        debug!("Reconciling {} {}", resource.kind(), resource.name());

        let current = match resource.fetch(self.session, check_mode).await? {
            Some(current) => current,
            None => {
                outcome.changed = true;
                outcome.stdout_lines.push(resource.creation_message());
                outcome.diff = diff_payload(resource, None, &desired);
                if check_mode {
                    resource.verify(self.session, true, check_mode).await?;
                    return Ok(outcome);
                }

                info!("Creating {} {}", resource.kind(), resource.name());
                match resource.create(self.session, &desired).await? {
                    Some(created) => created,
                    None => return Ok(outcome),
                }
            }
        };

        let differences = diff_settings(&current, &desired)?;
        if !differences.is_empty() {
            outcome.changed = true;
            outcome.stdout_lines.extend(describe_changes(&differences));
            outcome.diff = diff_payload(resource, Some(&current), &desired);

            if !check_mode {
                let mut edits = differences.clone();
                edits.extend(resource.mandatory_edit_fields(&current, &desired, &differences));
                info!(
                    "Updating {} {} ({} changes)",
                    resource.kind(),
                    resource.name(),
                    edits.len()
                );
                resource.edit(self.session, &current, &changes_of(&edits)).await?;
            }
        }

        resource.verify(self.session, outcome.changed, check_mode).await?;

        let child_changes = resource.reconcile_children(self.session, check_mode).await?;
        if !child_changes.is_empty() {
            outcome.changed = true;
            outcome.stdout_lines.extend(child_changes);
        }

        Ok(outcome)
    }

    /// Reconciles every resource in a manifest, in dependency order.
    ///
    /// # Errors
    ///
    /// Stops at and returns the first failure.
    pub async fn apply_manifest(
        &self,
        manifest: &Manifest,
        check_mode: bool,
    ) -> Result<Vec<RunReport>> {
        let resources = manifest_resources(manifest);
        info!(
            "Reconciling {} resources{}",
            resources.len(),
            if check_mode { " (check mode)" } else { "" }
        );

        let mut reports = Vec::with_capacity(resources.len());
        for resource in &resources {
            let outcome = self.ensure(resource.as_ref(), check_mode).await?;
            if outcome.changed {
                info!("{} {} changed", resource.kind(), resource.name());
            }
            reports.push(RunReport {
                kind: resource.kind().to_string(),
                name: resource.name().to_string(),
                outcome,
            });
        }

        Ok(reports)
    }
}

/// Every resource in a manifest: users, RHEL releases, products, product
/// versions, variants, releases, then CDN repositories.
#[must_use]
pub fn manifest_resources(manifest: &Manifest) -> Vec<Box<dyn ManagedResource>> {
    fn boxed<R: ManagedResource + 'static>(resource: R) -> Box<dyn ManagedResource> {
        Box::new(resource)
    }

    let mut resources = Vec::with_capacity(manifest.resource_count());
    resources.extend(manifest.users.iter().cloned().map(User::new).map(boxed));
    resources.extend(manifest.rhel_releases.iter().cloned().map(RhelRelease::new).map(boxed));
    resources.extend(manifest.products.iter().cloned().map(Product::new).map(boxed));
    resources.extend(
        manifest
            .product_versions
            .iter()
            .cloned()
            .map(ProductVersion::new)
            .map(boxed),
    );
    resources.extend(manifest.variants.iter().cloned().map(Variant::new).map(boxed));
    resources.extend(manifest.releases.iter().cloned().map(Release::new).map(boxed));
    resources.extend(manifest.cdn_repos.iter().cloned().map(CdnRepo::new).map(boxed));
    resources
}

fn diff_payload(
    resource: &dyn ManagedResource,
    before: Option<&Settings>,
    after: &Settings,
) -> Option<TaskDiff> {
    resource.diff_labels().map(|labels| {
        task_diff(
            before,
            after,
            &labels.item_name,
            labels.item_type,
            labels.keys_to_copy,
            labels.keys_to_omit,
        )
    })
}

impl RunReport {
    /// Number of reports that changed something.
    #[must_use]
    pub fn changed_count(reports: &[Self]) -> usize {
        reports.iter().filter(|r| r.outcome.changed).count()
    }
}

impl std::fmt::Display for RunReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = if self.outcome.changed { "changed" } else { "ok" };
        writeln!(f, "{} {}: {status}", self.kind, self.name)?;
        for line in &self.outcome.stdout_lines {
            writeln!(f, "  - {line}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ManifestParser;
    use crate::resources::test_session;
    use crate::settings::{settings_from_json, Difference};
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::Mutex;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// An in-memory resource that records edits.
    struct Toggle {
        live: Option<Settings>,
        echo_created: bool,
        extra: Vec<Difference>,
        edits: Mutex<Vec<Settings>>,
        creates: Mutex<usize>,
    }

    impl Toggle {
        fn new(live: Option<Value>) -> Self {
            Self {
                live: live.map(settings_from_json),
                echo_created: false,
                extra: Vec::new(),
                edits: Mutex::new(Vec::new()),
                creates: Mutex::new(0),
            }
        }
    }

    #[async_trait]
    impl ManagedResource for Toggle {
        fn kind(&self) -> &'static str {
            "toggle"
        }

        fn name(&self) -> &str {
            "switch"
        }

        fn desired(&self) -> Result<Settings> {
            Ok(settings_from_json(json!({"active": true})))
        }

        fn diff_labels(&self) -> Option<crate::resources::DiffLabels> {
            Some(crate::resources::DiffLabels {
                item_type: "toggle",
                item_name: String::from("switch"),
                keys_to_copy: &[],
                keys_to_omit: &[],
            })
        }

        async fn fetch(&self, _session: &Session, _check_mode: bool) -> Result<Option<Settings>> {
            Ok(self.live.clone())
        }

        async fn create(&self, _session: &Session, _desired: &Settings) -> Result<Option<Settings>> {
            *self.creates.lock().expect("lock") += 1;
            Ok(self
                .echo_created
                .then(|| settings_from_json(json!({"id": 1, "active": false}))))
        }

        async fn edit(&self, _session: &Session, _current: &Settings, changes: &Settings) -> Result<()> {
            self.edits.lock().expect("lock").push(changes.clone());
            Ok(())
        }

        fn mandatory_edit_fields(
            &self,
            _current: &Settings,
            _desired: &Settings,
            _differences: &[Difference],
        ) -> Vec<Difference> {
            self.extra.clone()
        }
    }

    fn session() -> Session {
        test_session("http://127.0.0.1:9")
    }

    #[tokio::test]
    async fn test_check_mode_reports_without_writing() {
        let session = session();
        let toggle = Toggle::new(Some(json!({"id": 1, "active": false})));
        let outcome = Reconciler::new(&session).ensure(&toggle, true).await.expect("ensure");

        assert!(outcome.changed);
        assert_eq!(outcome.stdout_lines, vec!["changing active from False to True"]);
        let diff = outcome.diff.expect("diff");
        assert_eq!(diff.before_header, "Original toggle 'switch'");
        assert!(!diff.before.contains_key("id"));
        assert!(toggle.edits.lock().expect("lock").is_empty());
    }

    #[tokio::test]
    async fn test_edit_sends_only_changes() {
        let session = session();
        let mut toggle = Toggle::new(Some(json!({"id": 1, "active": false, "name": "x"})));
        toggle.extra = vec![Difference::new("name", json!("x"), json!("x"))];
        let outcome = Reconciler::new(&session).ensure(&toggle, false).await.expect("ensure");

        assert!(outcome.changed);
        let edits = toggle.edits.lock().expect("lock");
        assert_eq!(edits.len(), 1);
        assert_eq!(edits[0], settings_from_json(json!({"active": true, "name": "x"})));
    }

    #[tokio::test]
    async fn test_converged_resource_is_unchanged() {
        let session = session();
        let toggle = Toggle::new(Some(json!({"id": 1, "active": true})));
        let outcome = Reconciler::new(&session).ensure(&toggle, false).await.expect("ensure");
        assert_eq!(outcome, ReconcileOutcome::default());
    }

    #[tokio::test]
    async fn test_creation() {
        let session = session();
        let toggle = Toggle::new(None);
        let reconciler = Reconciler::new(&session);

        let outcome = reconciler.ensure(&toggle, true).await.expect("check");
        assert_eq!(outcome.stdout_lines, vec!["created switch"]);
        assert_eq!(outcome.diff.expect("diff").before_header, "Not present");
        assert_eq!(*toggle.creates.lock().expect("lock"), 0);

        reconciler.ensure(&toggle, false).await.expect("apply");
        assert_eq!(*toggle.creates.lock().expect("lock"), 1);
        assert!(toggle.edits.lock().expect("lock").is_empty());
    }

    #[tokio::test]
    async fn test_created_state_is_reconciled() {
        let session = session();
        let mut toggle = Toggle::new(None);
        toggle.echo_created = true;
        let outcome = Reconciler::new(&session).ensure(&toggle, false).await.expect("ensure");

        assert_eq!(
            outcome.stdout_lines,
            vec!["created switch", "changing active from False to True"]
        );
        assert_eq!(toggle.edits.lock().expect("lock").len(), 1);
    }

    #[tokio::test]
    async fn test_missing_managed_key_is_an_error() {
        let session = session();
        let toggle = Toggle::new(Some(json!({"id": 1})));
        let err = Reconciler::new(&session).ensure(&toggle, true).await.expect_err("lookup");
        assert!(matches!(err, crate::error::ErrataError::Lookup(_)));
    }

    const PRODUCT_YAML: &str = r"
products:
  - short_name: RHCEPH
    name: Red Hat Ceph Storage
    description: Red Hat Ceph Storage
    bugzilla_product_name: ''
    push_targets: [cdn]
    default_solution: enterprise
    state_machine_rule_set: Default
    ftp_subdir: RHCEPH
";

    async fn mount_inactive_product(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/api/v1/products/RHCEPH"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {
                    "id": 104,
                    "attributes": {
                        "name": "Red Hat Ceph Storage",
                        "description": "Red Hat Ceph Storage",
                        "short_name": "RHCEPH",
                        "bugzilla_product_name": "",
                        "valid_bug_states": ["VERIFIED", "MODIFIED"],
                        "ftp_path": "",
                        "ftp_subdir": "RHCEPH",
                        "is_internal": false,
                        "isactive": false,
                        "move_bugs_on_qe": false
                    },
                    "relationships": {
                        "default_docs_reviewer": null,
                        "default_solution": {"id": 2, "title": "enterprise"},
                        "push_targets": [{"id": 4, "name": "cdn"}],
                        "state_machine_rule_set": {"id": 1, "name": "Default"},
                        "exd_org_group": null
                    }
                }
            })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_manifest_check_mode_makes_no_writes() {
        let server = MockServer::start().await;
        mount_inactive_product(&server).await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let manifest = ManifestParser::new().parse_yaml(PRODUCT_YAML, None).expect("manifest");
        let session = test_session(&server.uri());
        let reports = Reconciler::new(&session)
            .apply_manifest(&manifest, true)
            .await
            .expect("plan");

        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].kind, "product");
        assert_eq!(
            reports[0].outcome.stdout_lines,
            vec!["changing active from False to True"]
        );
        assert_eq!(RunReport::changed_count(&reports), 1);
    }

    #[tokio::test]
    async fn test_manifest_apply_sends_one_put() {
        let server = MockServer::start().await;
        mount_inactive_product(&server).await;
        Mock::given(method("PUT"))
            .and(path("/api/v1/products/104"))
            .and(body_json(json!({"product": {"isactive": true}})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let manifest = ManifestParser::new().parse_yaml(PRODUCT_YAML, None).expect("manifest");
        let session = test_session(&server.uri());
        let reports = Reconciler::new(&session)
            .apply_manifest(&manifest, false)
            .await
            .expect("apply");
        assert!(reports[0].outcome.changed);
    }

    #[tokio::test]
    async fn test_plan_checks_docs_reviewer_of_new_product() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/products/RHNEW"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/user/nodocs@redhat.com"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 7,
                "login_name": "nodocs@redhat.com",
                "roles": ["errata"],
                "enabled": true
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201))
            .expect(0)
            .mount(&server)
            .await;

        let yaml = r"
products:
  - short_name: RHNEW
    name: Red Hat New Product
    description: Red Hat New Product
    bugzilla_product_name: ''
    push_targets: [cdn]
    default_solution: enterprise
    state_machine_rule_set: Default
    default_docs_reviewer: nodocs@redhat.com
";
        let manifest = ManifestParser::new().parse_yaml(yaml, None).expect("manifest");

        let lenient = test_session(&server.uri());
        let reports = Reconciler::new(&lenient)
            .apply_manifest(&manifest, true)
            .await
            .expect("plan");
        assert_eq!(reports[0].outcome.stdout_lines, vec!["created RHNEW product"]);

        let strict = test_session(&server.uri()).with_strict_user_check(true);
        let err = Reconciler::new(&strict)
            .apply_manifest(&manifest, true)
            .await
            .expect_err("reviewer lacks docs role");
        assert!(err.to_string().contains("does not have 'docs' role"));
    }

    #[test]
    fn test_manifest_resource_order() {
        let yaml = r"
releases:
  - name: rhceph-4.0
    description: Red Hat Ceph Storage 4.0
    type: QuarterlyUpdate
    product_versions: []
    program_manager: coolmanager@redhat.com
rhel_releases:
  - name: RHEL-8-CEPH-4
    description: Red Hat Ceph Storage 4 for RHEL 8
users:
  - login_name: me@redhat.com
    realname: Me
";
        let manifest = ManifestParser::new().parse_yaml(yaml, None).expect("manifest");
        let kinds: Vec<&str> = manifest_resources(&manifest).iter().map(|r| r.kind()).collect();
        assert_eq!(kinds, vec!["user", "rhel release", "release"]);
    }

    #[test]
    fn test_report_display() {
        let report = RunReport {
            kind: String::from("product"),
            name: String::from("RHCEPH"),
            outcome: ReconcileOutcome {
                changed: true,
                stdout_lines: vec![String::from("changing active from False to True")],
                diff: None,
            },
        };
        assert_eq!(
            report.to_string(),
            "product RHCEPH: changed\n  - changing active from False to True\n"
        );
    }
}
