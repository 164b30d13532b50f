//! Error types for the Frame Sentinel service.
//!
//! Everything up to and including the vision call surfaces to the caller
//! through [`SentinelError`]. Notification failures live in
//! [`DispatchError`] and never leave the dispatcher.

use std::fmt;

use crate::classifier::Category;

/// Main error type returned by the request path.
#[derive(Debug)]
pub enum SentinelError {
    /// Malformed or missing request fields.
    Validation(ValidationError),

    /// Image decoding or encoding failed.
    Codec(CodecError),

    /// The vision service call failed.
    Vision(VisionError),

    /// Configuration and setup errors.
    Config(ConfigError),
}

/// Errors caused by the shape of the inbound request.
#[derive(Debug)]
pub enum ValidationError {
    /// A required field is absent or blank.
    MissingField { field: String },

    /// The image payload is not usable base64 data.
    InvalidImageData { reason: String },

    /// Neither the request nor the process supplied a credential.
    MissingApiKey,
}

/// Errors raised by the frame codec.
#[derive(Debug)]
pub enum CodecError {
    /// Bytes are not a recognizable image, or the image has no pixels.
    Decode { reason: String },

    /// JPEG compression failed.
    Encode { reason: String },
}

/// Errors raised by the vision client.
#[derive(Debug)]
pub enum VisionError {
    /// Non rate-limit HTTP failure status from the service.
    Upstream { status: u16, message: String },

    /// Connection-level failure.
    Network { reason: String },

    /// The request did not complete in time.
    Timeout { timeout_seconds: u64 },

    /// Rate limited, but the message carried no usable wait duration.
    RateLimitUnparseable { message: String },

    /// Rate limited more often, or for longer, than the retry budget allows.
    RateLimitExhausted { attempts: u32, waited_seconds: u64 },

    /// The response body could not be interpreted.
    Parse { reason: String },

    /// The service answered with an explicit error object.
    Service { message: String },
}

/// Errors inside the notification path. Logged, never surfaced.
#[derive(Debug)]
pub enum DispatchError {
    /// No channel is configured for the category.
    ChannelNotConfigured { category: Category },

    /// Session construction or identity verification failed.
    Handshake { reason: String },

    /// A send step failed and no fallback applied.
    SendFailed { step: &'static str, reason: String },

    /// Photo delivery failed and so did the text fallback.
    FallbackFailed { photo_reason: String, reason: String },
}

/// Errors related to configuration and application setup.
#[derive(Debug)]
pub enum ConfigError {
    /// Required environment variable is missing.
    MissingEnvVar { var_name: String },

    /// Invalid configuration values provided.
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

impl SentinelError {
    /// Whether the failure originates with the caller or with a service that
    /// rejected the request, as opposed to a transport or internal failure.
    pub fn is_client_error(&self) -> bool {
        match self {
            SentinelError::Validation(_) | SentinelError::Codec(_) => true,
            SentinelError::Vision(e) => match e {
                VisionError::Upstream { status, .. } => (400..500).contains(status),
                VisionError::Service { .. }
                | VisionError::RateLimitUnparseable { .. }
                | VisionError::RateLimitExhausted { .. } => true,
                VisionError::Network { .. }
                | VisionError::Timeout { .. }
                | VisionError::Parse { .. } => false,
            },
            SentinelError::Config(_) => false,
        }
    }
}

impl fmt::Display for SentinelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SentinelError::Validation(e) => write!(f, "{}", e),
            SentinelError::Codec(e) => write!(f, "Image error: {}", e),
            SentinelError::Vision(e) => write!(f, "Vision service error: {}", e),
            SentinelError::Config(e) => write!(f, "Configuration error: {}", e),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::MissingField { field } => {
                write!(f, "Missing required field '{}'", field)
            }
            ValidationError::InvalidImageData { reason } => {
                write!(f, "Invalid image data: {}", reason)
            }
            ValidationError::MissingApiKey => write!(f, "API key is required."),
        }
    }
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::Decode { reason } => write!(f, "Failed to decode image: {}", reason),
            CodecError::Encode { reason } => {
                write!(f, "Could not encode image to JPEG format: {}", reason)
            }
        }
    }
}

impl fmt::Display for VisionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VisionError::Upstream { status, message } => {
                write!(f, "HTTP error occurred (HTTP {}): {}", status, message)
            }
            VisionError::Network { reason } => write!(f, "Request error occurred: {}", reason),
            VisionError::Timeout { timeout_seconds } => write!(
                f,
                "Request timed out after {} seconds. Please try again later.",
                timeout_seconds
            ),
            VisionError::RateLimitUnparseable { message } => write!(
                f,
                "Rate limit exceeded but could not parse wait time from message: {}",
                message
            ),
            VisionError::RateLimitExhausted {
                attempts,
                waited_seconds,
            } => write!(
                f,
                "Rate limit still exceeded after {} retries ({} seconds waited)",
                attempts, waited_seconds
            ),
            VisionError::Parse { reason } => {
                write!(f, "Failed to parse response as JSON: {}", reason)
            }
            VisionError::Service { message } => write!(f, "{}", message),
        }
    }
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchError::ChannelNotConfigured { category } => {
                write!(f, "No alert channel configured for {}", category)
            }
            DispatchError::Handshake { reason } => {
                write!(f, "Messaging session handshake failed: {}", reason)
            }
            DispatchError::SendFailed { step, reason } => {
                write!(f, "Failed to send {}: {}", step, reason)
            }
            DispatchError::FallbackFailed {
                photo_reason,
                reason,
            } => write!(
                f,
                "Photo send failed ({}) and text fallback failed: {}",
                photo_reason, reason
            ),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MissingEnvVar { var_name } => {
                write!(f, "Required environment variable '{}' is not set", var_name)
            }
            ConfigError::InvalidValue {
                field,
                value,
                reason,
            } => {
                write!(
                    f,
                    "Invalid value '{}' for field '{}': {}",
                    value, field, reason
                )
            }
        }
    }
}

impl std::error::Error for SentinelError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SentinelError::Validation(e) => Some(e),
            SentinelError::Codec(e) => Some(e),
            SentinelError::Vision(e) => Some(e),
            SentinelError::Config(e) => Some(e),
        }
    }
}

impl std::error::Error for ValidationError {}
impl std::error::Error for CodecError {}
impl std::error::Error for VisionError {}
impl std::error::Error for DispatchError {}
impl std::error::Error for ConfigError {}

impl From<ValidationError> for SentinelError {
    fn from(err: ValidationError) -> Self {
        SentinelError::Validation(err)
    }
}

impl From<CodecError> for SentinelError {
    fn from(err: CodecError) -> Self {
        SentinelError::Codec(err)
    }
}

impl From<VisionError> for SentinelError {
    fn from(err: VisionError) -> Self {
        SentinelError::Vision(err)
    }
}

impl From<ConfigError> for SentinelError {
    fn from(err: ConfigError) -> Self {
        SentinelError::Config(err)
    }
}

impl From<reqwest::Error> for VisionError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            VisionError::Parse {
                reason: err.to_string(),
            }
        } else if let Some(status) = err.status() {
            VisionError::Upstream {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            VisionError::Network {
                reason: err.to_string(),
            }
        }
    }
}
