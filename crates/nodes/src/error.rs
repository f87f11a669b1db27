//! Adapter-level error type.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Normalized failure categories every capability adapter reports.
///
/// The engine uses the kind to decide retry behaviour:
/// - `RateLimited`, `ProviderUnavailable`: transient, retried with back-off.
/// - `InvalidInput`, `AuthExpired`, `ContentRejected`: permanent, recorded immediately.
/// - `Cancelled`: the run was cancelled or ran out of time; never retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterErrorKind {
    RateLimited,
    AuthExpired,
    InvalidInput,
    ProviderUnavailable,
    ContentRejected,
    Cancelled,
}

impl AdapterErrorKind {
    /// Transient kinds: rate limits and provider outages.
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::RateLimited | Self::ProviderUnavailable)
    }
}

impl fmt::Display for AdapterErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RateLimited         => write!(f, "rate_limited"),
            Self::AuthExpired         => write!(f, "auth_expired"),
            Self::InvalidInput        => write!(f, "invalid_input"),
            Self::ProviderUnavailable => write!(f, "provider_unavailable"),
            Self::ContentRejected     => write!(f, "content_rejected"),
            Self::Cancelled           => write!(f, "cancelled"),
        }
    }
}

/// Error returned by an adapter invocation or a node executor.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct AdapterError {
    pub kind: AdapterErrorKind,
    pub message: String,
}

impl AdapterError {
    pub fn new(kind: AdapterErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(AdapterErrorKind::InvalidInput, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(AdapterErrorKind::ProviderUnavailable, message)
    }

    pub fn cancelled() -> Self {
        Self::new(AdapterErrorKind::Cancelled, "operation cancelled")
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind == AdapterErrorKind::Cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transient_kinds_are_retryable() {
        assert!(AdapterErrorKind::RateLimited.is_retryable());
        assert!(AdapterErrorKind::ProviderUnavailable.is_retryable());
        assert!(!AdapterErrorKind::InvalidInput.is_retryable());
        assert!(!AdapterErrorKind::AuthExpired.is_retryable());
        assert!(!AdapterErrorKind::ContentRejected.is_retryable());
        assert!(!AdapterErrorKind::Cancelled.is_retryable());
    }

    #[test]
    fn display_includes_kind_and_message() {
        let err = AdapterError::new(AdapterErrorKind::RateLimited, "slow down");
        assert_eq!(err.to_string(), "rate_limited: slow down");
    }
}
