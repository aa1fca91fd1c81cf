//! Search transport error types.

use std::fmt;

/// Errors talking to the search provider.
///
/// These are the only failures surfaced to users.
#[derive(Debug)]
pub enum TransportError {
    /// HTTP request failed (network error, timeout, etc.)
    Http(reqwest::Error),

    /// Provider returned a non-success status
    Status { status: u16, message: String },

    /// Response body was not the expected JSON
    Json {
        message: String,
        body: Option<String>,
    },

    /// Stream closed before its `complete` event
    Incomplete { events: usize },

    /// Transport is unavailable (client shut down, nothing scripted, ...)
    Unavailable(String),
}

impl TransportError {
    /// Build a status error from a response body, preferring its `error`
    /// field when the body is JSON.
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
            .unwrap_or_else(|| body.chars().take(500).collect());
        TransportError::Status { status, message }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Http(e) => write!(f, "HTTP error: {e}"),
            TransportError::Status { status, message } => {
                write!(f, "search failed with status {status}")?;
                if !message.is_empty() {
                    write!(f, ": {message}")?;
                }
                Ok(())
            }
            TransportError::Json { message, body } => {
                write!(f, "JSON parse error: {message}")?;
                if let Some(body) = body {
                    write!(f, " (body: {body})")?;
                }
                Ok(())
            }
            TransportError::Incomplete { events } => {
                write!(f, "search stream ended after {events} events without completing")
            }
            TransportError::Unavailable(msg) => write!(f, "transport unavailable: {msg}"),
        }
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TransportError::Http(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        TransportError::Http(err)
    }
}

/// A single stream event that could not be understood. Logged and skipped.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed event ({reason}): {data}")]
pub struct MalformedEvent {
    pub reason: String,
    pub data: String,
}

impl MalformedEvent {
    pub fn new(reason: impl Into<String>, data: &str) -> Self {
        Self {
            reason: reason.into(),
            data: data.chars().take(200).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = TransportError::Status {
            status: 500,
            message: "Internal Server Error".into(),
        };
        assert_eq!(
            err.to_string(),
            "search failed with status 500: Internal Server Error"
        );

        let err = TransportError::Incomplete { events: 3 };
        assert!(err.to_string().contains("without completing"));

        let err = MalformedEvent::new("expected value", "{oops");
        assert_eq!(err.to_string(), "malformed event (expected value): {oops");
    }

    #[test]
    fn status_prefers_json_error_field() {
        let err = TransportError::from_status(
            400,
            r#"{"error": "Missing required fields: origins, destinations, departureDate"}"#,
        );
        assert!(matches!(
            err,
            TransportError::Status { status: 400, ref message } if message.starts_with("Missing required")
        ));

        let err = TransportError::from_status(502, "Bad Gateway");
        assert_eq!(err.to_string(), "search failed with status 502: Bad Gateway");
    }
}
