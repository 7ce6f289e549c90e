//! Error handling module for the catalogue console.
//!
//! Provides centralized error types for gateway calls, with mapping from HTTP
//! status codes and the API's field-keyed validation bodies.

use std::collections::BTreeMap;

use serde_json::Value;

/// Error codes as constants to avoid stringly-typed errors.
pub mod codes {
    pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
    pub const UNAUTHORIZED: &str = "UNAUTHORIZED";
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const CONFLICT: &str = "CONFLICT";
    pub const HTTP_ERROR: &str = "HTTP_ERROR";
    pub const TRANSPORT_ERROR: &str = "TRANSPORT_ERROR";
    pub const DECODE_ERROR: &str = "DECODE_ERROR";
    pub const CANCELLED: &str = "CANCELLED";
    pub const INVALID_URL: &str = "INVALID_URL";
    pub const INVALID_HEADER: &str = "INVALID_HEADER";
}

/// Key used when a 400 body is not a field map.
pub const NON_FIELD_ERRORS: &str = "non_field_errors";

/// Errors raised by gateway calls and propagated through the orchestrators.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// HTTP 400 with per-field messages
    #[error("validation failed: {}", summarize(.fields))]
    Validation { fields: BTreeMap<String, Vec<String>> },

    /// HTTP 401/403
    #[error("not authorized ({status})")]
    Unauthorized { status: u16 },

    /// HTTP 404
    #[error("resource not found: {0}")]
    NotFound(String),

    /// HTTP 409
    #[error("conflict: {0}")]
    Conflict(String),

    /// Any other non-2xx response
    #[error("API error ({status}): {body}")]
    Status { status: u16, body: String },

    /// The HTTP request itself failed (network, DNS, TLS, timeout, ...).
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The response body did not match the expected shape.
    #[error("unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),

    /// A newer fresh load superseded this request before it settled.
    #[error("request superseded by a newer load")]
    Cancelled,

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("invalid header value: {0}")]
    InvalidHeader(String),
}

impl ApiError {
    /// Build the error for a non-2xx response.
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            400 => ApiError::Validation {
                fields: parse_field_errors(&body),
            },
            401 | 403 => ApiError::Unauthorized { status },
            404 => ApiError::NotFound(body),
            409 => ApiError::Conflict(body),
            _ => ApiError::Status { status, body },
        }
    }

    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::Validation { .. } => codes::VALIDATION_ERROR,
            ApiError::Unauthorized { .. } => codes::UNAUTHORIZED,
            ApiError::NotFound(_) => codes::NOT_FOUND,
            ApiError::Conflict(_) => codes::CONFLICT,
            ApiError::Status { .. } => codes::HTTP_ERROR,
            ApiError::Transport(_) => codes::TRANSPORT_ERROR,
            ApiError::Decode(_) => codes::DECODE_ERROR,
            ApiError::Cancelled => codes::CANCELLED,
            ApiError::InvalidUrl(_) => codes::INVALID_URL,
            ApiError::InvalidHeader(_) => codes::INVALID_HEADER,
        }
    }

    /// HTTP status carried by this error, when it came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Validation { .. } => Some(400),
            ApiError::Unauthorized { status } => Some(*status),
            ApiError::NotFound(_) => Some(404),
            ApiError::Conflict(_) => Some(409),
            ApiError::Status { status, .. } => Some(*status),
            ApiError::Transport(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, ApiError::Validation { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ApiError::Cancelled)
    }

    /// One message per field, list messages joined with `.`, ready to route
    /// back into a form.
    pub fn field_messages(&self) -> BTreeMap<String, String> {
        match self {
            ApiError::Validation { fields } => fields
                .iter()
                .map(|(field, messages)| (field.clone(), messages.join(".")))
                .collect(),
            _ => BTreeMap::new(),
        }
    }
}

/// Errors raised while reading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {variable}")]
    Invalid {
        variable: &'static str,
        value: String,
    },
}

/// Parse a 400 body of shape `{field: string | string[]}`.
fn parse_field_errors(body: &str) -> BTreeMap<String, Vec<String>> {
    let mut fields = BTreeMap::new();

    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => {
            for (field, value) in map {
                fields.insert(field, messages_of(value));
            }
        }
        Ok(Value::Array(items)) => {
            fields.insert(
                NON_FIELD_ERRORS.to_string(),
                messages_of(Value::Array(items)),
            );
        }
        Ok(Value::String(message)) => {
            fields.insert(NON_FIELD_ERRORS.to_string(), vec![message]);
        }
        _ => {
            if !body.trim().is_empty() {
                fields.insert(NON_FIELD_ERRORS.to_string(), vec![body.to_string()]);
            }
        }
    }

    fields
}

fn messages_of(value: Value) -> Vec<String> {
    match value {
        Value::String(message) => vec![message],
        Value::Array(items) => items
            .into_iter()
            .flat_map(messages_of)
            .collect(),
        Value::Null => Vec::new(),
        other => vec![other.to_string()],
    }
}

fn summarize(fields: &BTreeMap<String, Vec<String>>) -> String {
    fields
        .iter()
        .map(|(field, messages)| format!("{}: {}", field, messages.join(".")))
        .collect::<Vec<_>>()
        .join("; ")
}
