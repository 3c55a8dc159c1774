//! Errata Tool HTTP client implementation.
//!
//! A thin wrapper around `reqwest` that joins API paths onto a base URL,
//! attaches authentication, and returns every response (successful or not)
//! as an [`ApiResponse`].

use reqwest::{header, Client, Method};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, trace, warn};

use crate::config::{AuthKind, ServerConfig};
use crate::error::{ErrataError, Result, TransportError};

use super::response::ApiResponse;

/// How requests authenticate to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthMode {
    /// No authentication header.
    Anonymous,
    /// SPNEGO token obtained by an external Kerberos tool.
    Negotiate(String),
}

/// Errata Tool API client.
#[derive(Debug, Clone)]
pub struct ErrataClient {
    /// HTTP client.
    client: Client,
    /// Server base URL, without a trailing slash.
    base_url: String,
    /// Authentication mode.
    auth: AuthMode,
}

impl ErrataClient {
    /// Creates a client for the configured server.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(server: &ServerConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(server.timeout_secs))
            .build()
            .map_err(|e| TransportError::Network {
                url: server.url.clone(),
                message: format!("Failed to create HTTP client: {e}"),
            })?;

        let auth = match (server.auth, &server.negotiate_token) {
            (AuthKind::Kerberos, Some(token)) => AuthMode::Negotiate(token.clone()),
            (AuthKind::Kerberos, None) => {
                warn!(
                    "Kerberos authentication selected but no negotiate token is set; \
                     requests will be sent unauthenticated"
                );
                AuthMode::Anonymous
            }
            (AuthKind::None, _) => AuthMode::Anonymous,
        };

        Ok(Self::with_client(client, &server.url, auth))
    }

    /// Creates a client around an existing `reqwest` client.
    #[must_use]
    pub fn with_client(client: Client, base_url: &str, auth: AuthMode) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth,
        }
    }

    /// Creates an unauthenticated client for a base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn anonymous(base_url: &str) -> Result<Self> {
        let server = ServerConfig {
            url: base_url.to_string(),
            auth: AuthKind::None,
            negotiate_token: None,
            timeout_secs: crate::config::DEFAULT_TIMEOUT_SECS,
        };
        Self::new(&server)
    }

    /// Returns the server base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Builds the full URL for an API path.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Sends a GET request.
    ///
    /// # Errors
    ///
    /// Returns an error only if the request could not be sent.
    pub async fn get(&self, path: &str) -> Result<ApiResponse> {
        self.send(Method::GET, path, &[], None).await
    }

    /// Sends a GET request with query parameters.
    ///
    /// # Errors
    ///
    /// Returns an error only if the request could not be sent.
    pub async fn get_with_query(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<ApiResponse> {
        self.send(Method::GET, path, query, None).await
    }

    /// Sends a POST request with a JSON body.
    ///
    /// # Errors
    ///
    /// Returns an error only if the request could not be sent.
    pub async fn post_json(&self, path: &str, body: &Value) -> Result<ApiResponse> {
        self.send(Method::POST, path, &[], Some(body)).await
    }

    /// Sends a PUT request with a JSON body.
    ///
    /// # Errors
    ///
    /// Returns an error only if the request could not be sent.
    pub async fn put_json(&self, path: &str, body: &Value) -> Result<ApiResponse> {
        self.send(Method::PUT, path, &[], Some(body)).await
    }

    /// Sends a DELETE request.
    ///
    /// # Errors
    ///
    /// Returns an error only if the request could not be sent.
    pub async fn delete(&self, path: &str) -> Result<ApiResponse> {
        self.send(Method::DELETE, path, &[], None).await
    }

    /// Sends a request with an arbitrary method name.
    ///
    /// # Errors
    ///
    /// Returns an error if the method name is invalid or the request could
    /// not be sent.
    pub async fn request(&self, method: &str, path: &str) -> Result<ApiResponse> {
        let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
            .map_err(|e| ErrataError::internal(format!("invalid HTTP method {method}: {e}")))?;
        self.send(method, path, &[], None).await
    }

    /// Sends one request. Non-2xx statuses are not errors here.
    async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<ApiResponse> {
        let url = self.url(path);
        debug!("{method} {url}");

        let mut request = self
            .client
            .request(method.clone(), &url)
            .header(header::ACCEPT, "application/json");

        if !query.is_empty() {
            request = request.query(query);
        }

        if let Some(body) = body {
            trace!("Request body: {body}");
            request = request.json(body);
        }

        if let AuthMode::Negotiate(token) = &self.auth {
            request = request.header(header::AUTHORIZATION, format!("Negotiate {token}"));
        }

        let response = request.send().await.map_err(|e| TransportError::Network {
            url: url.clone(),
            message: e.to_string(),
        })?;

        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let text = response.text().await.map_err(|e| TransportError::Decode {
            url: final_url.clone(),
            message: format!("Failed to read response body: {e}"),
        })?;

        trace!("HTTP {status} from {final_url}: {text}");

        Ok(ApiResponse {
            method: method.to_string(),
            path: path.trim_start_matches('/').to_string(),
            url: final_url,
            status,
            text,
        })
    }
}
