//! Manifest parser.
//!
//! Loads the desired-state manifest from YAML, the optional `.env` file next
//! to it, and resolves server settings from the environment with the
//! manifest's `server` block as fallback.

use crate::error::{ConfigError, ErrataError, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::spec::{AuthKind, Manifest, ServerConfig, ServerSection, DEFAULT_TIMEOUT_SECS, DEFAULT_URL};

/// Base URL of the server.
pub const ENV_URL: &str = "ERRATA_TOOL_URL";
/// `kerberos`, `none` or `notkerberos`.
pub const ENV_AUTH: &str = "ERRATA_TOOL_AUTH";
/// SPNEGO token obtained by an external Kerberos tool.
pub const ENV_NEGOTIATE_TOKEN: &str = "ERRATA_TOOL_NEGOTIATE_TOKEN";
/// Request timeout in seconds.
pub const ENV_TIMEOUT: &str = "ERRATA_TOOL_TIMEOUT_SECS";
/// Verify docs reviewer accounts in check mode.
pub const ENV_STRICT_USER_CHECK: &str = "ERRATA_STRICT_USER_CHECK_MODE";

/// Manifest parser.
#[derive(Debug, Default)]
pub struct ManifestParser {
    /// Base path for resolving the `.env` file.
    base_path: Option<PathBuf>,
}

impl ManifestParser {
    /// Creates a new parser.
    #[must_use]
    pub const fn new() -> Self {
        Self { base_path: None }
    }

    /// Sets the directory the `.env` file is read from.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Loads a manifest from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<Manifest> {
        let path = path.as_ref();
        info!("Loading manifest from: {}", path.display());

        if !path.exists() {
            return Err(ErrataError::Config(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            ErrataError::Config(ConfigError::ParseError {
                message: format!("Failed to read file: {e}"),
                location: Some(path.display().to_string()),
            })
        })?;

        self.parse_yaml(&content, Some(path))
    }

    /// Parses a manifest from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid.
    pub fn parse_yaml(&self, content: &str, source: Option<&Path>) -> Result<Manifest> {
        debug!("Parsing YAML manifest");

        let manifest: Manifest = serde_yaml::from_str(content).map_err(|e| {
            let location = source.map(|p| p.display().to_string());
            ErrataError::Config(ConfigError::ParseError {
                message: format!("YAML parse error: {e}"),
                location,
            })
        })?;

        debug!("Parsed manifest with {} resources", manifest.resource_count());
        Ok(manifest)
    }

    /// Loads the `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be loaded.
    pub fn load_dotenv(&self) -> Result<()> {
        let env_path = self
            .base_path
            .as_ref()
            .map_or_else(|| PathBuf::from(".env"), |p| p.join(".env"));

        if env_path.exists() {
            info!("Loading environment from: {}", env_path.display());
            dotenvy::from_path(&env_path).map_err(|e| {
                ErrataError::Config(ConfigError::ParseError {
                    message: format!("Failed to load .env file: {e}"),
                    location: Some(env_path.display().to_string()),
                })
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        Ok(())
    }

    /// Resolves server settings from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if an environment variable has an invalid value.
    pub fn server_from_env(section: &ServerSection) -> Result<ServerConfig> {
        resolve_server(section, |name| std::env::var(name).ok())
    }

    /// Returns true if strict user checks are enabled in the environment.
    #[must_use]
    pub fn strict_user_check_from_env() -> bool {
        std::env::var(ENV_STRICT_USER_CHECK)
            .ok()
            .is_some_and(|v| parse_bool(&v))
    }
}

/// Resolves server settings. `lookup` returns environment values by name.
///
/// Environment values win over the manifest's `server` block, which wins
/// over built-in defaults.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidEnvVar`] for unusable values.
pub fn resolve_server<F>(section: &ServerSection, lookup: F) -> Result<ServerConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let url = lookup(ENV_URL)
        .filter(|v| !v.trim().is_empty())
        .or_else(|| section.url.clone())
        .unwrap_or_else(|| String::from(DEFAULT_URL));

    let auth = match lookup(ENV_AUTH) {
        Some(value) => AuthKind::parse(&value).ok_or_else(|| ConfigError::InvalidEnvVar {
            name: String::from(ENV_AUTH),
            value: value.clone(),
        })?,
        None => section.auth.unwrap_or_default(),
    };

    let timeout_secs = match lookup(ENV_TIMEOUT) {
        Some(value) => value
            .trim()
            .parse::<u64>()
            .ok()
            .filter(|secs| *secs > 0)
            .ok_or_else(|| ConfigError::InvalidEnvVar {
                name: String::from(ENV_TIMEOUT),
                value: value.clone(),
            })?,
        None => section.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
    };

    let negotiate_token = lookup(ENV_NEGOTIATE_TOKEN).filter(|t| !t.is_empty());

    debug!("Errata Tool server: {url} (auth: {auth:?})");

    Ok(ServerConfig {
        url,
        auth,
        negotiate_token,
        timeout_secs,
    })
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on" | "y"
    )
}

/// Manifest file names to search for.
pub const DEFAULT_MANIFEST_FILES: &[&str] = &["errata.yaml", "errata.yml"];

/// Finds the manifest in the given directory or its parents.
///
/// # Errors
///
/// Returns an error if no manifest is found.
pub fn find_manifest_file(start_dir: impl AsRef<Path>) -> Result<PathBuf> {
    let start = start_dir.as_ref();
    let mut current = start.to_path_buf();

    loop {
        for filename in DEFAULT_MANIFEST_FILES {
            let candidate = current.join(filename);
            if candidate.exists() {
                info!("Found manifest: {}", candidate.display());
                return Ok(candidate);
            }
        }

        if !current.pop() {
            break;
        }
    }

    Err(ErrataError::Config(ConfigError::FileNotFound {
        path: start.join(DEFAULT_MANIFEST_FILES[0]),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_parse_minimal_manifest() {
        let manifest = ManifestParser::new().parse_yaml("{}", None).expect("parse");
        assert_eq!(manifest.resource_count(), 0);
        assert_eq!(manifest.labels.workflow_rules_endpoint, "api/v1/workflow_rules");
    }

    #[test]
    fn test_parse_full_manifest() {
        let yaml = r"
server:
  url: https://errata.stage.example.com
  auth: none
labels:
  workflow_rules: api
users:
  - login_name: coolmanager@redhat.com
    realname: Cool Manager
products:
  - short_name: RHCEPH
    name: Red Hat Ceph Storage
    description: Red Hat Ceph Storage
    push_targets: [ftp, cdn, cdn_stage]
    default_solution: enterprise
    state_machine_rule_set: Default
releases:
  - product: RHCEPH
    name: rhceph-4.0
    description: Red Hat Ceph Storage 4.0
    type: QuarterlyUpdate
    product_versions: [RHCEPH-4.0-RHEL-8]
    program_manager: coolmanager@redhat.com
    ship_date: '2020-01-31'
";
        let manifest = ManifestParser::new().parse_yaml(yaml, None).expect("parse");
        assert_eq!(manifest.resource_count(), 3);
        assert_eq!(manifest.server.auth, Some(AuthKind::None));
        assert_eq!(manifest.labels.workflow_rules, super::super::spec::LabelSourceKind::Api);
        assert_eq!(manifest.products[0].short_name, "RHCEPH");
        assert_eq!(manifest.releases[0].ship_date.as_deref(), Some("2020-01-31"));
    }

    #[test]
    fn test_parse_error_has_location() {
        let err = ManifestParser::new()
            .parse_yaml("products: {", Some(Path::new("errata.yaml")))
            .expect_err("should fail");
        assert!(matches!(
            err,
            ErrataError::Config(ConfigError::ParseError { location: Some(ref l), .. }) if l == "errata.yaml"
        ));
    }

    #[test]
    fn test_load_file_and_find() {
        let dir = tempfile::tempdir().expect("tempdir");
        let nested = dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested).expect("mkdir");
        std::fs::write(dir.path().join("errata.yaml"), "users: []\n").expect("write");

        let found = find_manifest_file(&nested).expect("find");
        assert_eq!(found, dir.path().join("errata.yaml"));

        let manifest = ManifestParser::new().load_file(&found).expect("load");
        assert!(manifest.users.is_empty());

        let missing = ManifestParser::new().load_file(dir.path().join("nope.yaml"));
        assert!(matches!(
            missing,
            Err(ErrataError::Config(ConfigError::FileNotFound { .. }))
        ));
    }

    #[test]
    fn test_resolve_server_defaults() {
        let server = resolve_server(&ServerSection::default(), env(&[])).expect("resolve");
        assert_eq!(server, ServerConfig::default());
    }

    #[test]
    fn test_env_overrides_manifest() {
        let section = ServerSection {
            url: Some(String::from("https://from-manifest.example.com")),
            auth: Some(AuthKind::Kerberos),
            timeout_secs: Some(5),
        };

        let server = resolve_server(&section, env(&[])).expect("resolve");
        assert_eq!(server.url, "https://from-manifest.example.com");
        assert_eq!(server.timeout_secs, 5);

        let server = resolve_server(
            &section,
            env(&[
                (ENV_URL, "https://errata.dev.example.com"),
                (ENV_AUTH, "notkerberos"),
                (ENV_TIMEOUT, "30"),
                (ENV_NEGOTIATE_TOKEN, "abc"),
            ]),
        )
        .expect("resolve");
        assert_eq!(server.url, "https://errata.dev.example.com");
        assert_eq!(server.auth, AuthKind::None);
        assert_eq!(server.timeout_secs, 30);
        assert_eq!(server.negotiate_token.as_deref(), Some("abc"));
    }

    #[test]
    fn test_invalid_env_values() {
        let err = resolve_server(&ServerSection::default(), env(&[(ENV_AUTH, "basic")]))
            .expect_err("should fail");
        assert!(matches!(
            err,
            ErrataError::Config(ConfigError::InvalidEnvVar { ref name, .. }) if name == ENV_AUTH
        ));

        assert!(resolve_server(&ServerSection::default(), env(&[(ENV_TIMEOUT, "soon")])).is_err());
        assert!(resolve_server(&ServerSection::default(), env(&[(ENV_TIMEOUT, "0")])).is_err());
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("True"));
        assert!(parse_bool("1"));
        assert!(!parse_bool("false"));
        assert!(!parse_bool(""));
    }

    #[test]
    fn test_init_template_is_valid() {
        let manifest = ManifestParser::new()
            .parse_yaml(include_str!("../../templates/errata.yaml"), None)
            .expect("template parses");
        assert_eq!(manifest.resource_count(), 7);
        let result = crate::config::ManifestValidator::new()
            .validate(&manifest)
            .expect("template validates");
        assert!(result.warnings.is_empty());
    }
}
