//! Manifest validation.
//!
//! Catches values the server would reject (or silently accept and break
//! idempotency with) before any request is sent.

use crate::error::{ConfigError, ErrataError, Result};
use crate::labels::{DEFAULT_SOLUTIONS, EXD_ORG_GROUPS};
use chrono::NaiveDate;
use std::collections::HashSet;
use tracing::debug;

use super::spec::{CdnRepoSpec, Manifest, ProductSpec, ReleaseSpec, VariantSpec};

/// Bugzilla states a product may list as valid.
pub const BUGZILLA_STATES: &[&str] = &[
    "ASSIGNED",
    "CLOSED",
    "MODIFIED",
    "NEW",
    "ON_DEV",
    "ON_QA",
    "POST",
    "RELEASE_PENDING",
    "VERIFIED",
];

/// Release types.
pub const RELEASE_TYPES: &[&str] = &["QuarterlyUpdate", "Zstream", "Async"];

/// CDN repository release types.
pub const CDN_RELEASE_TYPES: &[&str] = &["Primary", "EUS", "LongLife"];

/// CDN repository content types.
pub const CDN_CONTENT_TYPES: &[&str] = &["Binary", "Debuginfo", "Source", "Docker"];

/// Validation result containing all errors found.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// List of validation errors.
    pub errors: Vec<ValidationError>,
    /// List of warnings (non-fatal issues).
    pub warnings: Vec<String>,
}

/// A single validation error.
#[derive(Debug)]
pub struct ValidationError {
    /// The field path that failed validation.
    pub field: String,
    /// The error message.
    pub message: String,
}

impl ValidationError {
    fn invalid(field: String, param: &str, value: &str) -> Self {
        Self {
            field,
            message: format!("invalid {param} value \"{value}\""),
        }
    }
}

/// Validator for manifests.
#[derive(Debug, Default)]
pub struct ManifestValidator;

impl ManifestValidator {
    /// Creates a new validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validates a manifest.
    ///
    /// All problems are collected; the first error is returned.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] if any rule fails.
    pub fn validate(&self, manifest: &Manifest) -> Result<ValidationResult> {
        let result = self.check(manifest);

        if let Some(first_error) = result.errors.first() {
            return Err(ErrataError::Config(ConfigError::ValidationError {
                message: first_error.message.clone(),
                field: Some(first_error.field.clone()),
            }));
        }

        debug!("Manifest validation passed");
        Ok(result)
    }

    /// Runs every rule and returns all errors and warnings.
    #[must_use]
    pub fn check(&self, manifest: &Manifest) -> ValidationResult {
        let mut result = ValidationResult::default();

        if manifest.resource_count() == 0 {
            result.warnings.push(String::from("No resources defined in manifest"));
        }

        check_unique("users", "user", manifest.users.iter().map(|u| u.login_name.as_str()), &mut result);
        check_unique(
            "rhel_releases",
            "RHEL release",
            manifest.rhel_releases.iter().map(|r| r.name.as_str()),
            &mut result,
        );
        check_unique(
            "products",
            "product",
            manifest.products.iter().map(|p| p.short_name.as_str()),
            &mut result,
        );
        check_unique(
            "product_versions",
            "product version",
            manifest.product_versions.iter().map(|p| p.name.as_str()),
            &mut result,
        );
        check_unique("variants", "variant", manifest.variants.iter().map(|v| v.name.as_str()), &mut result);
        check_unique("releases", "release", manifest.releases.iter().map(|r| r.name.as_str()), &mut result);
        check_unique("cdn_repos", "CDN repo", manifest.cdn_repos.iter().map(|r| r.name.as_str()), &mut result);

        for (i, product) in manifest.products.iter().enumerate() {
            Self::validate_product(product, &format!("products[{i}]"), &mut result);
        }
        for (i, release) in manifest.releases.iter().enumerate() {
            Self::validate_release(release, &format!("releases[{i}]"), &mut result);
        }
        for (i, variant) in manifest.variants.iter().enumerate() {
            Self::validate_variant(variant, &format!("variants[{i}]"), &mut result);
        }
        for (i, repo) in manifest.cdn_repos.iter().enumerate() {
            Self::validate_cdn_repo(repo, &format!("cdn_repos[{i}]"), &mut result);
        }
        for (i, user) in manifest.users.iter().enumerate() {
            if !user.login_name.contains('@') {
                result.errors.push(ValidationError {
                    field: format!("users[{i}].login_name"),
                    message: format!("login name '{}' must be an email address", user.login_name),
                });
            }
        }

        result
    }

    fn validate_product(product: &ProductSpec, prefix: &str, result: &mut ValidationResult) {
        for state in &product.valid_bug_states {
            if !BUGZILLA_STATES.contains(&state.as_str()) {
                result.errors.push(ValidationError::invalid(
                    format!("{prefix}.valid_bug_states"),
                    "valid_bug_states",
                    state,
                ));
            }
        }

        let solution = product.default_solution.to_uppercase();
        if !DEFAULT_SOLUTIONS.iter().any(|(name, _)| *name == solution) {
            result.errors.push(ValidationError::invalid(
                format!("{prefix}.default_solution"),
                "default_solution",
                &solution,
            ));
        }

        if let Some(group) = &product.exd_org_group
            && !EXD_ORG_GROUPS.iter().any(|(name, _)| name == group)
        {
            result.errors.push(ValidationError::invalid(
                format!("{prefix}.exd_org_group"),
                "exd_org_group",
                group,
            ));
        }

        if product.push_targets.is_empty() {
            result
                .warnings
                .push(format!("{prefix}.push_targets: product '{}' has no push targets", product.short_name));
        }
    }

    fn validate_release(release: &ReleaseSpec, prefix: &str, result: &mut ValidationResult) {
        if !RELEASE_TYPES.contains(&release.release_type.as_str()) {
            result.errors.push(ValidationError::invalid(
                format!("{prefix}.type"),
                "type",
                &release.release_type,
            ));
        }

        if let Some(ship_date) = &release.ship_date
            && NaiveDate::parse_from_str(ship_date, "%Y-%m-%d").is_err()
        {
            result.errors.push(ValidationError {
                field: format!("{prefix}.ship_date"),
                message: format!("ship_date \"{ship_date}\" is not a YYYY-MM-DD date"),
            });
        }

        if release.release_type == "QuarterlyUpdate" && release.ship_date.is_none() {
            result.warnings.push(format!(
                "{prefix}.ship_date: QuarterlyUpdate release '{}' has no ship date",
                release.name
            ));
        }

        if release.release_type == "Zstream"
            && release.blocker_flags.as_ref().is_none_or(Vec::is_empty)
        {
            result.warnings.push(format!(
                "{prefix}.blocker_flags: Zstream release '{}' has no blocker flags",
                release.name
            ));
        }

        if release.product.is_none() && release.release_type != "Async" {
            result.warnings.push(format!(
                "{prefix}.product: only Async releases usually omit the product"
            ));
        }
    }

    fn validate_variant(variant: &VariantSpec, prefix: &str, result: &mut ValidationResult) {
        if variant.rhel_variant.is_none() && variant.tps_stream.is_none() {
            result.errors.push(ValidationError {
                field: format!("{prefix}.tps_stream"),
                message: format!(
                    "variant '{}' has no rhel_variant, so tps_stream is required",
                    variant.name
                ),
            });
        }
    }

    fn validate_cdn_repo(repo: &CdnRepoSpec, prefix: &str, result: &mut ValidationResult) {
        if !CDN_RELEASE_TYPES.contains(&repo.release_type.as_str()) {
            result.errors.push(ValidationError::invalid(
                format!("{prefix}.release_type"),
                "release_type",
                &repo.release_type,
            ));
        }

        if !CDN_CONTENT_TYPES.contains(&repo.content_type.as_str()) {
            result.errors.push(ValidationError::invalid(
                format!("{prefix}.content_type"),
                "content_type",
                &repo.content_type,
            ));
        }

        if repo.content_type == "Docker" && repo.effective_arch() != "multi" {
            result.errors.push(ValidationError {
                field: format!("{prefix}.arch"),
                message: String::from("arch must be \"multi\" for Docker repos"),
            });
        }

        if repo.content_type != "Docker" && !repo.packages.is_empty() {
            result.warnings.push(format!(
                "{prefix}.packages: package tags are only used by Docker repos"
            ));
        }
    }
}

fn check_unique<'a>(
    section: &str,
    resource_type: &str,
    names: impl Iterator<Item = &'a str>,
    result: &mut ValidationResult,
) {
    let mut seen = HashSet::new();
    for (i, name) in names.enumerate() {
        if name.trim().is_empty() {
            result.errors.push(ValidationError {
                field: format!("{section}[{i}]"),
                message: format!("{resource_type} name cannot be empty"),
            });
        } else if !seen.insert(name) {
            result.errors.push(ValidationError {
                field: format!("{section}[{i}]"),
                message: format!("Duplicate {resource_type} name: {name}"),
            });
        }
    }
}

impl ValidationResult {
    /// Returns true if validation passed (no errors).
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the number of errors.
    #[must_use]
    pub const fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Returns the number of warnings.
    #[must_use]
    pub const fn warning_count(&self) -> usize {
        self.warnings.len()
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}
