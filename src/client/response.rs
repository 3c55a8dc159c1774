//! Inspectable HTTP responses.

use scraper::{Html, Selector};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{RemoteError, Result, TransportError};

/// A completed HTTP exchange, whatever its status.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    /// HTTP method that was sent.
    pub method: String,
    /// API path, relative to the server base URL.
    pub path: String,
    /// Final URL of the request.
    pub url: String,
    /// HTTP status code.
    pub status: u16,
    /// Raw response body.
    pub text: String,
}

impl ApiResponse {
    /// Returns true for 2xx statuses.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// Decodes the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns a decode error if the body is not valid JSON for `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.text).map_err(|e| {
            TransportError::Decode {
                url: self.url.clone(),
                message: e.to_string(),
            }
            .into()
        })
    }

    /// Decodes the body as JSON, or `None` if it is not JSON.
    #[must_use]
    pub fn json_opt(&self) -> Option<Value> {
        serde_json::from_str(&self.text).ok()
    }

    /// Turns a non-2xx response into a transport error.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Status`] unless the status is 2xx.
    pub fn error_for_status(self) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(TransportError::Status {
                method: self.method,
                url: self.url,
                status: self.status,
                body: self.text,
            }
            .into())
        }
    }

    /// Requires an exact status, turning anything else into a remote error.
    ///
    /// # Errors
    ///
    /// Returns a [`RemoteError`] carrying the server's explanation.
    pub fn expect_status(self, expected: u16) -> Result<Self> {
        if self.status == expected {
            Ok(self)
        } else {
            Err(self.remote_error().into())
        }
    }

    /// Builds a remote validation error from this response.
    #[must_use]
    pub fn remote_error(&self) -> RemoteError {
        RemoteError {
            method: self.method.clone(),
            path: self.path.clone(),
            status: self.status,
            message: extract_error_message(&self.text),
            body: self.text.clone(),
        }
    }
}

/// Extracts the human-readable message from an error payload.
///
/// Understands JSON `errors` (a map of field to messages, a list, or a
/// string), JSON `error`, and HTML pages containing an `errorExplanation`
/// block. Anything else is returned trimmed.
#[must_use]
pub fn extract_error_message(body: &str) -> String {
    if let Ok(json) = serde_json::from_str::<Value>(body) {
        if let Some(errors) = json.get("errors") {
            return flatten_errors(errors);
        }
        if let Some(error) = json.get("error") {
            return error
                .as_str()
                .map_or_else(|| error.to_string(), str::to_string);
        }
        return json.to_string();
    }

    if body.contains("errorExplanation")
        && let Some(text) = html_error_explanation(body)
    {
        return text;
    }

    body.trim().to_string()
}

fn flatten_errors(errors: &Value) -> String {
    match errors {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(flatten_errors)
            .collect::<Vec<_>>()
            .join("; "),
        Value::Object(map) => map
            .iter()
            .map(|(field, messages)| format!("{field}: {}", flatten_errors(messages)))
            .collect::<Vec<_>>()
            .join("; "),
        other => other.to_string(),
    }
}

fn html_error_explanation(body: &str) -> Option<String> {
    let document = Html::parse_document(body);
    let selector = Selector::parse("#errorExplanation, .errorExplanation").ok()?;
    let element = document.select(&selector).next()?;
    let text = element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ");
    (!text.is_empty()).then_some(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: u16, text: &str) -> ApiResponse {
        ApiResponse {
            method: String::from("POST"),
            path: String::from("api/v1/products"),
            url: String::from("https://errata.example.com/api/v1/products"),
            status,
            text: text.to_string(),
        }
    }

    #[test]
    fn test_error_map_is_flattened() {
        let message = extract_error_message(
            r#"{"errors": {"name": ["has already been taken"], "short_name": "is too long"}}"#,
        );
        assert_eq!(message, "name: has already been taken; short_name: is too long");
    }

    #[test]
    fn test_single_error_field() {
        assert_eq!(extract_error_message(r#"{"error": "Some Error Here"}"#), "Some Error Here");
    }

    #[test]
    fn test_html_error_explanation() {
        let body = r#"<html><body>
            <div id="errorExplanation">
              <h2>1 error prohibited this product version from being saved</h2>
              <ul><li>Name has already been taken</li></ul>
            </div></body></html>"#;
        assert_eq!(
            extract_error_message(body),
            "1 error prohibited this product version from being saved Name has already been taken"
        );
    }

    #[test]
    fn test_plain_text_fallback() {
        assert_eq!(extract_error_message("  Internal Server Error\n"), "Internal Server Error");
    }

    #[test]
    fn test_expect_status() {
        assert!(response(201, "{}").expect_status(201).is_ok());

        let err = response(422, r#"{"error": "bad"}"#)
            .expect_status(201)
            .expect_err("should fail");
        match err {
            crate::error::ErrataError::Remote(remote) => {
                assert_eq!(remote.status, 422);
                assert_eq!(remote.message, "bad");
                assert_eq!(remote.method, "POST");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_error_for_status() {
        assert!(response(200, "").error_for_status().is_ok());
        let err = response(500, "boom").error_for_status().expect_err("should fail");
        assert!(matches!(
            err,
            crate::error::ErrataError::Transport(TransportError::Status { status: 500, .. })
        ));
    }
}
