use serde_json::Value;
use thiserror::Error;

/// Known remediation discriminators carried by backend error bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorDiscriminator {
    /// `requiresConfig: true`, the media server connection is not set up.
    MissingConfiguration,
    /// `aiProviderUnusable: true`, the configured AI provider rejected requests.
    AiProviderUnusable,
    /// `requiresAiConfig: true`, an AI provider must be configured first.
    AiConfigurationRequired,
    /// Only an `error` or `message` string.
    Message,
    /// Valid JSON of any other shape.
    Unstructured,
    /// Missing or undecodable body.
    Empty,
}

const FLAG_REQUIRES_CONFIG: &str = "requiresConfig";
const FLAG_AI_UNUSABLE: &str = "aiProviderUnusable";
const FLAG_REQUIRES_AI_CONFIG: &str = "requiresAiConfig";

/// Decoded body of a non-success response. The raw JSON is kept untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorBody {
    raw: Option<Value>,
    discriminator: ErrorDiscriminator,
}

impl ErrorBody {
    pub fn empty() -> Self {
        Self {
            raw: None,
            discriminator: ErrorDiscriminator::Empty,
        }
    }

    /// Decodes a response body; anything that is not JSON yields an empty body.
    pub fn decode(bytes: &[u8]) -> Self {
        match serde_json::from_slice::<Value>(bytes) {
            Ok(raw) => Self::from_value(raw),
            Err(_) => Self::empty(),
        }
    }

    pub fn from_value(raw: Value) -> Self {
        let discriminator = classify(&raw);
        Self {
            raw: Some(raw),
            discriminator,
        }
    }

    pub fn raw(&self) -> Option<&Value> {
        self.raw.as_ref()
    }

    pub fn discriminator(&self) -> ErrorDiscriminator {
        self.discriminator
    }

    /// The backend's human message, from `error` or else `message`.
    pub fn message(&self) -> Option<&str> {
        let object = self.raw.as_ref()?.as_object()?;
        object
            .get("error")
            .and_then(Value::as_str)
            .or_else(|| object.get("message").and_then(Value::as_str))
    }

    /// Reads a boolean flag from the body; absent or non-boolean counts as `false`.
    pub fn flag(&self, key: &str) -> bool {
        self.raw
            .as_ref()
            .and_then(|raw| raw.get(key))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn requires_config(&self) -> bool {
        self.flag(FLAG_REQUIRES_CONFIG)
    }
}

impl Default for ErrorBody {
    fn default() -> Self {
        Self::empty()
    }
}

fn classify(raw: &Value) -> ErrorDiscriminator {
    let Some(object) = raw.as_object() else {
        return ErrorDiscriminator::Unstructured;
    };
    let flag = |key: &str| object.get(key).and_then(Value::as_bool).unwrap_or(false);

    if flag(FLAG_REQUIRES_CONFIG) {
        ErrorDiscriminator::MissingConfiguration
    } else if flag(FLAG_AI_UNUSABLE) {
        ErrorDiscriminator::AiProviderUnusable
    } else if flag(FLAG_REQUIRES_AI_CONFIG) {
        ErrorDiscriminator::AiConfigurationRequired
    } else if ["error", "message"]
        .iter()
        .any(|key| object.get(*key).is_some_and(Value::is_string))
    {
        ErrorDiscriminator::Message
    } else {
        ErrorDiscriminator::Unstructured
    }
}

/// Failure of one call through the request executor.
///
/// Cloneable so that a coalesced result can be handed to every attached caller.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ApiError {
    #[error("{endpoint}: deadline exceeded after {elapsed_ms} ms")]
    Timeout { endpoint: String, elapsed_ms: u64 },
    #[error("{endpoint}: cancelled by caller")]
    Cancelled { endpoint: String },
    #[error("{endpoint}: http status {status}{}", .body.message().map(|m| format!(": {m}")).unwrap_or_default())]
    HttpStatus {
        endpoint: String,
        status: u16,
        body: ErrorBody,
    },
    #[error("{endpoint}: malformed response body: {message}")]
    DecodeFailure { endpoint: String, message: String },
    #[error("{endpoint}: network error: {message}")]
    Network { endpoint: String, message: String },
    #[error("{endpoint}: invalid endpoint: {message}")]
    InvalidEndpoint { endpoint: String, message: String },
}

impl ApiError {
    pub fn endpoint(&self) -> &str {
        match self {
            ApiError::Timeout { endpoint, .. }
            | ApiError::Cancelled { endpoint }
            | ApiError::HttpStatus { endpoint, .. }
            | ApiError::DecodeFailure { endpoint, .. }
            | ApiError::Network { endpoint, .. }
            | ApiError::InvalidEndpoint { endpoint, .. } => endpoint,
        }
    }

    /// Structured body of an HTTP failure, if any.
    pub fn body(&self) -> Option<&ErrorBody> {
        match self {
            ApiError::HttpStatus { body, .. } => Some(body),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ApiError::Timeout { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ApiError::Cancelled { .. })
    }

    pub(crate) fn from_reqwest(endpoint: &str, err: reqwest::Error, elapsed_ms: u64) -> Self {
        if err.is_timeout() {
            return ApiError::Timeout {
                endpoint: endpoint.to_string(),
                elapsed_ms,
            };
        }
        if err.is_decode() {
            return ApiError::DecodeFailure {
                endpoint: endpoint.to_string(),
                message: err.to_string(),
            };
        }
        ApiError::Network {
            endpoint: endpoint.to_string(),
            message: err.to_string(),
        }
    }
}
