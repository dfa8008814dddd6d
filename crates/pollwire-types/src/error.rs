//! Descriptor validation errors.
//!
//! These are the *construction* errors of the taxonomy: they are returned
//! synchronously from `validate()` before any background work is scheduled.
//! The host boundary renders them to plain strings via `Display`.

use thiserror::Error;

/// A request descriptor failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DescriptorError {
    /// The descriptor has no URL.
    #[error("missing url argument")]
    MissingUrl,

    /// The URL could not be parsed.
    #[error("invalid url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// The URL scheme is not accepted by the engine.
    #[error("unsupported scheme '{0}'")]
    UnsupportedScheme(String),

    /// The HTTP method is not in the standard method set.
    #[error("unsupported method '{0}'")]
    UnsupportedMethod(String),

    /// The WebSocket origin could not be parsed or lacks a scheme/host.
    #[error("invalid origin argument '{0}'")]
    InvalidOrigin(String),

    /// The stream descriptor has an empty host.
    #[error("missing host argument")]
    MissingHost,

    /// The stream descriptor has port zero.
    #[error("invalid port 0")]
    InvalidPort,
}
