//! Configuration module.
//!
//! This module handles all configuration-related functionality:
//! - Parsing and deserializing the `errata.yaml` manifest
//! - Resolving server settings from the environment
//! - Validation of manifest values

mod parser;
mod spec;
mod validator;

pub use parser::{
    find_manifest_file, resolve_server, ManifestParser, DEFAULT_MANIFEST_FILES, ENV_AUTH,
    ENV_NEGOTIATE_TOKEN, ENV_STRICT_USER_CHECK, ENV_TIMEOUT, ENV_URL,
};
pub use spec::{
    AuthKind, CdnRepoSpec, LabelSourceKind, LabelsConfig, Manifest, PackageTag, ProductSpec,
    ProductVersionSpec, ReleaseSpec, RhelReleaseSpec, ServerConfig, ServerSection, TagRestriction,
    UserSpec, VariantSpec, DEFAULT_TIMEOUT_SECS, DEFAULT_URL,
};
pub use validator::{
    ManifestValidator, ValidationError, ValidationResult, BUGZILLA_STATES, CDN_CONTENT_TYPES,
    CDN_RELEASE_TYPES, RELEASE_TYPES,
};
