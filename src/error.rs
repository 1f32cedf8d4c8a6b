use std::time::Duration;

use thiserror::Error;

/// Failure reported by the identity provider's token endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EndpointError {
    /// The code or refresh token was rejected (expired, revoked, already used).
    #[error("invalid grant: {0}")]
    InvalidGrant(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("provider responded with {status}: {message}")]
    Provider { status: u16, message: String },
    #[error("malformed token response: {0}")]
    Malformed(String),
}

/// Errors surfaced by the authorization subsystem.
///
/// The type is `Clone` so that every caller coalesced onto one in-flight
/// flow receives the same outcome.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("authorization was not completed within {}s", .0.as_secs())]
    AuthorizationTimeout(Duration),
    #[error("authorization denied: {0}")]
    AuthorizationDenied(String),
    #[error("authorization code exchange failed: {0}")]
    CodeExchangeFailed(EndpointError),
    #[error("token refresh failed: {0}")]
    RefreshFailed(EndpointError),
    #[error("credential storage failure: {0}")]
    StorageFailure(String),
    #[error("redirect listener unavailable: {0}")]
    ListenerUnavailable(String),
}

impl AuthError {
    /// Whether a caller may retry the same operation with backoff.
    ///
    /// Only network failures qualify; a rejected grant needs a new
    /// authorization instead.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AuthError::CodeExchangeFailed(EndpointError::Network(_))
                | AuthError::RefreshFailed(EndpointError::Network(_))
        )
    }
}
