//! `reqwest` adapter for endpoint call functions.
//!
//! Enabled with the `reqwest` feature. Call functions built on `reqwest`
//! can use `?` on transport errors and [`json_response`] on replies and get
//! correctly shaped [`CallError`]s for the classifier.
//!
//! ```no_run
//! use rascl_core::error::CallError;
//! use rascl_core::http::json_response;
//! use serde_json::Value;
//!
//! async fn get_example(client: reqwest::Client) -> Result<Value, CallError> {
//!     let response = client.get("https://example.com/api/fruit").send().await?;
//!     json_response(response).await
//! }
//! ```

use crate::error::CallError;
use serde_json::Value;

impl From<reqwest::Error> for CallError {
    fn from(error: reqwest::Error) -> Self {
        let message = error.to_string();
        if error.is_timeout() {
            return Self::Timeout { message };
        }
        if let Some(status) = error.status() {
            return Self::Http {
                status: Some(status.as_u16()),
                message,
                body: None,
            };
        }
        if error.is_builder() || error.is_decode() || error.is_body() {
            return Self::Other { message };
        }
        Self::Network { message }
    }
}

/// Read a response as JSON, mapping non-2xx statuses to [`CallError::Http`].
///
/// An empty success body reads as `null`. The body of an error response is
/// kept when it parses as JSON.
///
/// # Errors
///
/// - [`CallError::Http`] for a non-success status
/// - [`CallError::Other`] when a success body is not valid JSON
/// - whatever the transport reports while reading the body
pub async fn json_response(response: reqwest::Response) -> Result<Value, CallError> {
    let status = response.status();
    let text = response.text().await?;

    if !status.is_success() {
        return Err(CallError::Http {
            status: Some(status.as_u16()),
            message: status
                .canonical_reason()
                .map_or_else(|| status.to_string(), str::to_string),
            body: serde_json::from_str(&text).ok(),
        });
    }

    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&text).map_err(|e| CallError::other(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_errors_are_generic() {
        let result = reqwest::Client::new().get("not a url").build();
        let error = match result {
            Ok(_) => CallError::Unknown,
            Err(e) => CallError::from(e),
        };
        assert!(matches!(error, CallError::Other { .. }));
    }
}
