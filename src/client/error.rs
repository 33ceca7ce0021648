//! Typed errors for API responses.
//!
//! Every non-2xx response is classified by status code. The JSON body (when
//! there is one) travels with the error so the CLI can read fields such as
//! `state`, `message`, `resource` or `errors`.

use reqwest::StatusCode;
use serde_json::Value;

/// Parsed JSON body of an error response. Empty or non-JSON bodies become
/// `Value::Null`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrorPayload(Value);

impl ErrorPayload {
    pub fn new(body: Value) -> Self {
        Self(body)
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(serde_json::from_slice(bytes).unwrap_or(Value::Null))
    }

    /// Read a string field from the payload.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn message(&self) -> Option<&str> {
        self.get("message")
    }

    pub fn raw(&self) -> &Value {
        &self.0
    }

    /// Human readable validation messages.
    ///
    /// `{"errors": [["code_name", "has been already taken"]]}` becomes
    /// `"Code name has been already taken"`. A payload without `errors`
    /// falls back to its `message`.
    pub fn validation_messages(&self) -> Vec<String> {
        let Some(errors) = self.0.get("errors").and_then(Value::as_array) else {
            return self.message().map(|m| vec![m.to_string()]).unwrap_or_default();
        };

        errors
            .iter()
            .filter_map(|error| match error {
                Value::Array(pair) => {
                    let field = pair.first().and_then(Value::as_str)?;
                    let message = pair.get(1).and_then(Value::as_str).unwrap_or_default();
                    Some(format!("{} {}", humanize(field), message).trim().to_string())
                }
                Value::String(message) => Some(message.clone()),
                _ => None,
            })
            .collect()
    }
}

/// `code_name` -> `Code name`
pub fn humanize(field: &str) -> String {
    let spaced = field.trim_end_matches("_id").replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("unauthorized")]
    Unauthorized(ErrorPayload),

    #[error("forbidden")]
    Forbidden(ErrorPayload),

    #[error("{} not found", resource.as_deref().unwrap_or("resource"))]
    NotFound {
        resource: Option<String>,
        id: Option<String>,
        payload: ErrorPayload,
    },

    #[error("conflict")]
    Conflict(ErrorPayload),

    #[error("validation failed")]
    Validation(ErrorPayload),

    #[error("client version not supported")]
    VersionMismatch(ErrorPayload),

    #[error("gateway timeout")]
    GatewayTimeout,

    #[error("API error {status}: {}", payload.message().unwrap_or("no message"))]
    Api {
        status: StatusCode,
        payload: ErrorPayload,
    },

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("invalid response from API: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid API URL: {0}")]
    Url(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ApiError {
    /// Classify a non-successful response.
    pub fn from_status(status: StatusCode, payload: ErrorPayload) -> Self {
        match status {
            StatusCode::UNAUTHORIZED => ApiError::Unauthorized(payload),
            StatusCode::FORBIDDEN => ApiError::Forbidden(payload),
            StatusCode::NOT_FOUND => ApiError::NotFound {
                resource: payload.get("resource").map(str::to_string),
                id: payload.get("id").map(str::to_string),
                payload,
            },
            StatusCode::CONFLICT => ApiError::Conflict(payload),
            StatusCode::PRECONDITION_FAILED => ApiError::VersionMismatch(payload),
            StatusCode::UNPROCESSABLE_ENTITY => ApiError::Validation(payload),
            StatusCode::GATEWAY_TIMEOUT => ApiError::GatewayTimeout,
            _ => ApiError::Api { status, payload },
        }
    }

    pub fn payload(&self) -> Option<&ErrorPayload> {
        match self {
            ApiError::Unauthorized(p)
            | ApiError::Forbidden(p)
            | ApiError::Conflict(p)
            | ApiError::Validation(p)
            | ApiError::VersionMismatch(p) => Some(p),
            ApiError::NotFound { payload, .. } | ApiError::Api { payload, .. } => Some(payload),
            _ => None,
        }
    }

    /// Conflict state reported by the API (`running`, `no_code`, ...).
    pub fn state(&self) -> Option<&str> {
        self.payload().and_then(|p| p.get("state"))
    }

    pub fn message(&self) -> Option<&str> {
        self.payload().and_then(ErrorPayload::message)
    }

    /// True for a 404 whose payload names the given resource.
    pub fn is_not_found(&self, kind: &str) -> bool {
        matches!(self, ApiError::NotFound { resource: Some(r), .. } if r == kind)
    }
}
