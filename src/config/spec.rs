//! Manifest specification types.
//!
//! This module defines the structs that map to the `errata.yaml` manifest.
//! Each resource list describes the desired state of objects in the Errata
//! Tool; field names are the logical names used when diffing against live
//! settings, so a spec serializes directly into a settings map.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Default Errata Tool server.
pub const DEFAULT_URL: &str = "https://errata.devel.redhat.com";

/// Default HTTP timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// The root of a desired-state manifest.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Manifest {
    /// Optional server overrides.
    #[serde(default)]
    pub server: ServerSection,
    /// Label source selection.
    #[serde(default)]
    pub labels: LabelsConfig,
    /// User accounts.
    #[serde(default)]
    pub users: Vec<UserSpec>,
    /// RHEL releases.
    #[serde(default)]
    pub rhel_releases: Vec<RhelReleaseSpec>,
    /// Products.
    #[serde(default)]
    pub products: Vec<ProductSpec>,
    /// Product versions.
    #[serde(default)]
    pub product_versions: Vec<ProductVersionSpec>,
    /// Variants.
    #[serde(default)]
    pub variants: Vec<VariantSpec>,
    /// Releases.
    #[serde(default)]
    pub releases: Vec<ReleaseSpec>,
    /// CDN repositories.
    #[serde(default)]
    pub cdn_repos: Vec<CdnRepoSpec>,
}

impl Manifest {
    /// Total number of resources declared.
    #[must_use]
    pub fn resource_count(&self) -> usize {
        self.users.len()
            + self.rhel_releases.len()
            + self.products.len()
            + self.product_versions.len()
            + self.variants.len()
            + self.releases.len()
            + self.cdn_repos.len()
    }
}

/// Server overrides from the manifest. Environment variables win.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerSection {
    /// Base URL.
    #[serde(default)]
    pub url: Option<String>,
    /// Authentication scheme.
    #[serde(default)]
    pub auth: Option<AuthKind>,
    /// Request timeout in seconds.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// Resolved server connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Base URL.
    pub url: String,
    /// Authentication scheme.
    pub auth: AuthKind,
    /// Pre-obtained SPNEGO token for Kerberos authentication.
    pub negotiate_token: Option<String>,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: String::from(DEFAULT_URL),
            auth: AuthKind::Kerberos,
            negotiate_token: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// Authentication schemes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AuthKind {
    /// SPNEGO (Kerberos).
    #[default]
    Kerberos,
    /// No authentication.
    #[serde(alias = "notkerberos")]
    None,
}

impl AuthKind {
    /// Parses the `ERRATA_TOOL_AUTH` value.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "kerberos" => Some(Self::Kerberos),
            "none" | "notkerberos" => Some(Self::None),
            _ => None,
        }
    }
}

/// Where a label enumeration is read from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LabelSourceKind {
    /// Scrape the HTML page.
    #[default]
    Scrape,
    /// Read a JSON API listing.
    Api,
}

/// Label source selection per enumeration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LabelsConfig {
    /// Source for push target IDs.
    #[serde(default)]
    pub push_targets: LabelSourceKind,
    /// API endpoint used when `push_targets` is `api`.
    #[serde(default = "default_push_targets_endpoint")]
    pub push_targets_endpoint: String,
    /// Source for workflow rule set IDs.
    #[serde(default)]
    pub workflow_rules: LabelSourceKind,
    /// API endpoint used when `workflow_rules` is `api`.
    #[serde(default = "default_workflow_rules_endpoint")]
    pub workflow_rules_endpoint: String,
}

impl Default for LabelsConfig {
    fn default() -> Self {
        Self {
            push_targets: LabelSourceKind::default(),
            push_targets_endpoint: default_push_targets_endpoint(),
            workflow_rules: LabelSourceKind::default(),
            workflow_rules_endpoint: default_workflow_rules_endpoint(),
        }
    }
}

/// A product.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProductSpec {
    /// Short name, e.g. `RHCEPH`.
    pub short_name: String,
    /// Full name.
    pub name: String,
    /// Description.
    pub description: String,
    /// Bugzilla product name.
    #[serde(default)]
    pub bugzilla_product_name: String,
    /// Bug states valid for advisories.
    #[serde(default = "default_valid_bug_states")]
    pub valid_bug_states: Vec<String>,
    /// Active for errata filing.
    #[serde(default = "default_true")]
    pub active: bool,
    /// FTP path (`os` for RHEL, usually empty).
    #[serde(default)]
    pub ftp_path: String,
    /// FTP subdirectory.
    #[serde(default)]
    pub ftp_subdir: Option<String>,
    /// Red Hat internal product.
    #[serde(default)]
    pub internal: bool,
    /// Default docs reviewer login name.
    #[serde(default)]
    pub default_docs_reviewer: Option<String>,
    /// Push target names.
    pub push_targets: Vec<String>,
    /// Default solution text.
    pub default_solution: String,
    /// Workflow rule set name.
    pub state_machine_rule_set: String,
    /// Move bugs to `ON_QA` only when the advisory moves to QE.
    #[serde(default)]
    pub move_bugs_on_qe: bool,
    /// Removed from the server; accepted and ignored.
    #[serde(default, skip_serializing)]
    pub text_only_advisories_require_dists: Option<bool>,
    /// EXD org group name.
    #[serde(default)]
    pub exd_org_group: Option<String>,
    /// Warn when a build's package does not match the advisory.
    #[serde(default)]
    pub show_bug_package_mismatch_warning: Option<bool>,
}

/// A release.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReleaseSpec {
    /// Product short name. Async releases have none.
    #[serde(default)]
    pub product: Option<String>,
    /// Release name, e.g. `rhceph-4.0`.
    pub name: String,
    /// Description.
    pub description: String,
    /// `QuarterlyUpdate`, `Zstream` or `Async`.
    #[serde(rename = "type")]
    pub release_type: String,
    /// Product version names.
    pub product_versions: Vec<String>,
    /// Enabled.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Active for errata filing.
    #[serde(default = "default_true")]
    pub active: bool,
    /// Advisories can be batched.
    #[serde(default = "default_true")]
    pub enable_batching: bool,
    /// Program manager login name.
    pub program_manager: String,
    /// Bugzilla blocker flags.
    #[serde(default)]
    pub blocker_flags: Option<Vec<String>>,
    /// Internal target release Bugzilla field.
    #[serde(default)]
    pub internal_target_release: Option<String>,
    /// Zstream target release Bugzilla field.
    #[serde(default)]
    pub zstream_target_release: Option<String>,
    /// Default ship date, `YYYY-MM-DD`.
    #[serde(default)]
    pub ship_date: Option<String>,
    #[serde(default)]
    /// Allow shadow bugs.
    pub allow_shadow: bool,
    #[serde(default)]
    /// Allow blocker bugs.
    pub allow_blocker: bool,
    #[serde(default)]
    /// Allow exception bugs.
    pub allow_exception: bool,
    /// Allow duplicate advisories for packages.
    #[serde(default)]
    pub allow_pkg_dupes: bool,
    /// Consult the Bugzilla approved component list.
    #[serde(default)]
    pub supports_component_acl: bool,
    #[serde(default)]
    /// Only accept bugs filed against the product.
    pub limit_bugs_by_product: bool,
    /// Workflow rule set name. An empty string resets it to null.
    #[serde(default)]
    pub state_machine_rule_set: Option<String>,
    /// PELC product version name.
    #[serde(default)]
    pub pelc_product_version_name: Option<String>,
    /// Brew tags. Empty inherits from the product versions.
    #[serde(default)]
    pub brew_tags: Vec<String>,
}

/// A product version.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProductVersionSpec {
    /// Product short name.
    pub product: String,
    /// Product version name, e.g. `RHCEPH-4.0-RHEL-8`.
    pub name: String,
    /// Description.
    pub description: String,
    /// RHEL release name.
    pub rhel_release_name: String,
    /// Signing key.
    #[serde(default = "default_sig_key_name")]
    pub sig_key_name: String,
    /// IMA signing key.
    #[serde(default)]
    pub ima_sig_key_name: Option<String>,
    /// Default Brew tag.
    pub default_brew_tag: String,
    /// Server-only product version.
    pub is_server_only: bool,
    /// Enabled.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Push debuginfo to RHN.
    pub allow_rhn_debuginfo: bool,
    /// Allow buildroot pushes.
    pub allow_buildroot_push: bool,
    /// Generate OVAL data.
    pub is_oval_product: bool,
    /// RHEL add-on.
    pub is_rhel_addon: bool,
    /// Push target names.
    pub push_targets: Vec<String>,
    /// Brew tags.
    pub brew_tags: Vec<String>,
    /// Deprecated; accepted and ignored.
    #[serde(default, skip_serializing)]
    pub use_quay_for_containers: Option<bool>,
    /// Deprecated; accepted and ignored.
    #[serde(default, skip_serializing)]
    pub use_quay_for_containers_stage: Option<bool>,
    /// Skip filing Jira push request tickets.
    #[serde(default)]
    pub suppress_push_request_jira: Option<bool>,
}

/// A variant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VariantSpec {
    /// Variant name, e.g. `8Base-RHCEPH-4.0-Tools`.
    pub name: String,
    /// Description.
    pub description: String,
    /// CPE identifier.
    #[serde(default)]
    pub cpe: Option<String>,
    /// Enabled.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Buildroot variant.
    #[serde(default)]
    pub buildroot: bool,
    /// Product version name.
    pub product_version: String,
    /// RHEL variant name.
    #[serde(default)]
    pub rhel_variant: Option<String>,
    /// TPS stream. Required when `rhel_variant` is omitted.
    #[serde(default)]
    pub tps_stream: Option<String>,
    /// Push target names.
    pub push_targets: Vec<String>,
    /// FTP base folder override.
    #[serde(default)]
    pub override_ftp_base_folder: Option<String>,
}

/// A user account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserSpec {
    /// Login name, e.g. `kdreyer@redhat.com`.
    pub login_name: String,
    /// Display name.
    pub realname: String,
    /// Organization.
    #[serde(default)]
    pub organization: Option<String>,
    /// Receive mail notifications.
    #[serde(default = "default_true")]
    pub receives_mail: bool,
    /// Role names.
    #[serde(default)]
    pub roles: Option<Vec<String>>,
    /// Enabled.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Email address.
    #[serde(default)]
    pub email_address: Option<String>,
}

/// A RHEL release.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RhelReleaseSpec {
    /// Name, e.g. `RHEL-8.2.0`.
    pub name: String,
    /// Description.
    pub description: String,
    /// Exclude debuginfo from FTP pushes.
    #[serde(default)]
    pub exclude_ftp_debuginfo: Option<bool>,
}

/// A CDN repository.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CdnRepoSpec {
    /// Repository name.
    pub name: String,
    /// `Primary`, `EUS` or `LongLife`.
    pub release_type: String,
    /// `Binary`, `Debuginfo`, `Source` or `Docker`.
    pub content_type: String,
    /// Architecture. Defaults to `multi` for Docker, `x86_64` otherwise.
    #[serde(default)]
    pub arch: Option<String>,
    /// Use for TPS.
    #[serde(default)]
    pub use_for_tps: bool,
    /// Variant names.
    pub variants: Vec<String>,
    /// Package name → tag templates.
    #[serde(default)]
    pub packages: IndexMap<String, Vec<PackageTag>>,
}

impl CdnRepoSpec {
    /// The architecture, with the content-type default applied.
    #[must_use]
    pub fn effective_arch(&self) -> &str {
        match &self.arch {
            Some(arch) => arch,
            None if self.content_type == "Docker" => "multi",
            None => "x86_64",
        }
    }
}

/// A tag template, optionally restricted to one variant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum PackageTag {
    /// An unrestricted template, e.g. `latest`.
    Template(String),
    /// `{template: {variant: name}}`.
    Restricted(IndexMap<String, TagRestriction>),
}

/// Restrictions on a tag template.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TagRestriction {
    /// Variant the tag is restricted to.
    #[serde(default)]
    pub variant: Option<String>,
}

const fn default_true() -> bool {
    true
}

fn default_valid_bug_states() -> Vec<String> {
    vec![String::from("MODIFIED"), String::from("VERIFIED")]
}

fn default_sig_key_name() -> String {
    String::from("redhatrelease2")
}

fn default_push_targets_endpoint() -> String {
    String::from("api/v1/push_targets")
}

fn default_workflow_rules_endpoint() -> String {
    String::from("api/v1/workflow_rules")
}
