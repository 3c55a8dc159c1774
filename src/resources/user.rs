//! User accounts and account queries.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::client::ErrataClient;
use crate::config::UserSpec;
use crate::error::{LookupError, Result};
use crate::settings::{Difference, Settings};

use super::{id_of, object_settings, settings_body, spec_settings, ManagedResource, Session};

fn user_path(login_name: &str) -> String {
    format!("api/v1/user/{login_name}")
}

/// True if a 400 payload says the account does not exist.
fn is_not_found(body: &Value, login_name: &str) -> bool {
    let expected = format!("{login_name} not found.");
    match body.pointer("/errors/login_name") {
        Some(Value::String(message)) => *message == expected,
        Some(Value::Array(messages)) => messages.iter().any(|m| m.as_str() == Some(&expected)),
        _ => false,
    }
}

/// Fetches an account by login name.
///
/// Returns `None` when the server reports the account missing, unless
/// `fatal` is set, in which case [`LookupError::UserNotFound`] is returned.
///
/// # Errors
///
/// Returns an error for any other failure, including 400 responses that
/// report something other than a missing account.
pub async fn get_user(client: &ErrataClient, login_name: &str, fatal: bool) -> Result<Option<Value>> {
    let response = client.get(&user_path(login_name)).await?;

    if response.status == 400
        && let Some(body) = response.json_opt()
        && body.get("errors").is_some()
    {
        if is_not_found(&body, login_name) {
            debug!("User {login_name} not found");
            if fatal {
                return Err(LookupError::UserNotFound {
                    login_name: login_name.to_string(),
                }
                .into());
            }
            return Ok(None);
        }
        return Err(response.remote_error().into());
    }

    let response = response.error_for_status()?;
    Ok(Some(response.json()?))
}

/// Converts a login name into the account's numeric ID.
///
/// # Errors
///
/// Returns [`LookupError::UserNotFound`] if the account does not exist.
pub async fn user_id(client: &ErrataClient, login_name: &str) -> Result<i64> {
    let user = get_user(client, login_name, true)
        .await?
        .ok_or_else(|| LookupError::UserNotFound {
            login_name: login_name.to_string(),
        })?;
    user.get("id").and_then(Value::as_i64).ok_or_else(|| {
        LookupError::MissingField {
            path: user_path(login_name),
            field: String::from("id"),
        }
        .into()
    })
}

/// Result of a read-only account query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserInfo {
    /// Whether the account exists.
    pub exists: bool,
    /// The account document, empty when absent.
    pub data: Value,
    /// Warnings for the report.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// Queries an account without changing anything.
///
/// # Errors
///
/// Returns an error if the query fails for a reason other than a missing
/// account.
pub async fn user_info(client: &ErrataClient, login_name: &str, check_mode: bool) -> Result<UserInfo> {
    match get_user(client, login_name, false).await? {
        Some(data) => Ok(UserInfo {
            exists: true,
            data,
            warnings: Vec::new(),
        }),
        None => Ok(UserInfo {
            exists: false,
            data: Value::Object(serde_json::Map::new()),
            warnings: if check_mode {
                vec![format!("User {login_name} does not exist in the Errata Tool")]
            } else {
                Vec::new()
            },
        }),
    }
}

/// A user account, keyed by login name.
#[derive(Debug, Clone)]
pub struct User {
    spec: UserSpec,
}

impl User {
    /// Wraps a user spec.
    #[must_use]
    pub const fn new(spec: UserSpec) -> Self {
        Self { spec }
    }
}

#[async_trait]
impl ManagedResource for User {
    fn kind(&self) -> &'static str {
        "user"
    }

    fn name(&self) -> &str {
        &self.spec.login_name
    }

    fn desired(&self) -> Result<Settings> {
        spec_settings(&self.spec)
    }

    fn creation_message(&self) -> String {
        format!("created {} user", self.spec.login_name)
    }

    async fn fetch(&self, session: &Session, _check_mode: bool) -> Result<Option<Settings>> {
        let user = get_user(session.client(), &self.spec.login_name, false).await?;
        Ok(user.map(|u| object_settings(Some(&u))))
    }

    async fn create(&self, session: &Session, desired: &Settings) -> Result<Option<Settings>> {
        info!("Creating user {}", self.spec.login_name);
        let mut body = desired.clone();
        // The server picks no address on its own when mail is enabled.
        if self.spec.receives_mail && !body.contains_key("email_address") {
            let account = self
                .spec
                .login_name
                .split_once('@')
                .map_or(self.spec.login_name.as_str(), |(account, _)| account);
            body.insert(
                String::from("email_address"),
                Value::String(format!("{account}@redhat.com")),
            );
        }

        let body = settings_body(&body);
        session
            .client()
            .post_json("api/v1/user", &body)
            .await?
            .expect_status(201)?;
        Ok(None)
    }

    async fn edit(&self, session: &Session, current: &Settings, changes: &Settings) -> Result<()> {
        let id = id_of(current)?;
        info!("Editing user {} ({id})", self.spec.login_name);
        let body = settings_body(changes);
        session
            .client()
            .put_json(&format!("api/v1/user/{id}"), &body)
            .await?
            .expect_status(200)?;
        Ok(())
    }

    fn mandatory_edit_fields(
        &self,
        current: &Settings,
        _desired: &Settings,
        differences: &[Difference],
    ) -> Vec<Difference> {
        if !self.spec.receives_mail || differences.iter().any(|d| d.key == "email_address") {
            return Vec::new();
        }
        let email = current.get("email_address").cloned().unwrap_or(Value::Null);
        vec![Difference::new("email_address", Value::String(String::new()), email)]
    }
}
