//! Unified OAuth 2.0 error taxonomy
//!
//! Every failure the engine can surface maps onto a fixed RFC 6749 / RFC 9126
//! error code. The HTTP layer (out of scope here) turns these into JSON error
//! bodies; this crate guarantees it never has to inspect anything beyond
//! [`OAuth2Error::error_code`] and the human-readable description.
//!
//! Internal causes (crypto failures, storage errors) are normalized into the
//! taxonomy at the point of conversion and never leak to clients.

/// Result alias used throughout the workspace.
pub type OAuth2Result<T> = Result<T, OAuth2Error>;

/// Typed OAuth 2.0 protocol error.
///
/// Each variant corresponds to exactly one wire-level `error` code, so the
/// boundary mapping is an exhaustive match the compiler can check.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OAuth2Error {
    /// Malformed or missing required parameter, or a forbidden parameter
    /// combination (e.g. `request_uri` inside a pushed authorization request).
    #[error("invalid_request: {0}")]
    InvalidRequest(String),

    /// Consumed or unknown authorization code, redirect URI mismatch, PKCE
    /// failure, or resource-owner resolution failure.
    #[error("invalid_grant: {0}")]
    InvalidGrant(String),

    /// Client authentication failed or the client is unknown.
    #[error("invalid_client: {0}")]
    InvalidClient(String),

    /// The client is not authorized to use the requested grant type.
    #[error("unauthorized_client: {0}")]
    UnauthorizedClient(String),

    /// Requested scope exceeds the client's registration, or no scope could
    /// be resolved at all.
    #[error("invalid_scope: {0}")]
    InvalidScope(String),

    /// Token introspection failure of any kind: expired, revoked, bad
    /// signature, unknown audience or client.
    #[error("invalid_token: {0}")]
    InvalidToken(String),

    /// Request object failed decryption, signature or claim validation
    /// (RFC 9101).
    #[error("invalid_request_object: {0}")]
    InvalidRequestObject(String),

    /// The `request_uri` is unknown, expired, or otherwise unusable
    /// (RFC 9126). Expired and absent are deliberately indistinguishable.
    #[error("invalid_request_uri: {0}")]
    InvalidRequestUri(String),

    /// Unexpected internal failure; the description is safe to log but the
    /// wire response carries only the code.
    #[error("server_error: {0}")]
    ServerError(String),
}

impl OAuth2Error {
    /// The fixed RFC error code for the wire-level `error` field.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request",
            Self::InvalidGrant(_) => "invalid_grant",
            Self::InvalidClient(_) => "invalid_client",
            Self::UnauthorizedClient(_) => "unauthorized_client",
            Self::InvalidScope(_) => "invalid_scope",
            Self::InvalidToken(_) => "invalid_token",
            Self::InvalidRequestObject(_) => "invalid_request_object",
            Self::InvalidRequestUri(_) => "invalid_request_uri",
            Self::ServerError(_) => "server_error",
        }
    }

    /// Malformed/missing parameter error.
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// Grant redemption error.
    pub fn invalid_grant(msg: impl Into<String>) -> Self {
        Self::InvalidGrant(msg.into())
    }

    /// Unknown or unauthenticated client.
    pub fn invalid_client(msg: impl Into<String>) -> Self {
        Self::InvalidClient(msg.into())
    }

    /// Grant type not authorized for the client.
    pub fn unauthorized_client(msg: impl Into<String>) -> Self {
        Self::UnauthorizedClient(msg.into())
    }

    /// Scope resolution error.
    pub fn invalid_scope(msg: impl Into<String>) -> Self {
        Self::InvalidScope(msg.into())
    }

    /// Introspection/validation error.
    pub fn invalid_token(msg: impl Into<String>) -> Self {
        Self::InvalidToken(msg.into())
    }

    /// Request object validation error.
    pub fn invalid_request_object(msg: impl Into<String>) -> Self {
        Self::InvalidRequestObject(msg.into())
    }

    /// Unknown/expired `request_uri`.
    pub fn invalid_request_uri(msg: impl Into<String>) -> Self {
        Self::InvalidRequestUri(msg.into())
    }

    /// Internal failure.
    pub fn server_error(msg: impl Into<String>) -> Self {
        Self::ServerError(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_are_fixed_rfc_strings() {
        assert_eq!(
            OAuth2Error::invalid_request("x").error_code(),
            "invalid_request"
        );
        assert_eq!(OAuth2Error::invalid_grant("x").error_code(), "invalid_grant");
        assert_eq!(OAuth2Error::invalid_scope("x").error_code(), "invalid_scope");
        assert_eq!(
            OAuth2Error::unauthorized_client("x").error_code(),
            "unauthorized_client"
        );
        assert_eq!(
            OAuth2Error::invalid_request_uri("x").error_code(),
            "invalid_request_uri"
        );
    }

    #[test]
    fn display_carries_code_and_description() {
        let err = OAuth2Error::invalid_grant("Invalid code_verifier");
        assert_eq!(err.to_string(), "invalid_grant: Invalid code_verifier");
    }
}
