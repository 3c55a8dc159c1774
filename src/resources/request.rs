//! Raw API requests.

use serde::Serialize;
use serde_json::Value;

use crate::client::ErrataClient;
use crate::error::Result;

/// Outcome of a raw request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawResponse {
    /// Always true; the request may have changed anything.
    pub changed: bool,
    /// HTTP status code.
    pub status: u16,
    /// Final URL.
    pub url: String,
    /// Raw body, when requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Decoded body, when it is JSON.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json: Option<Value>,
}

/// Sends an arbitrary request and reports the response, whatever its status.
///
/// # Errors
///
/// Returns an error if the method is invalid or the request could not be
/// sent.
pub async fn raw_request(
    client: &ErrataClient,
    method: &str,
    path: &str,
    return_content: bool,
) -> Result<RawResponse> {
    let response = client.request(method, path.trim_start_matches('/')).await?;
    let json = response.json_opt();
    Ok(RawResponse {
        changed: true,
        status: response.status,
        url: response.url,
        content: return_content.then_some(response.text),
        json,
    })
}
