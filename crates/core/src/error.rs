//! Error types surfaced to the control channel
//!
//! Controllers match on the kind prefix of the rendered message, so the
//! `Display` strings here are part of the interface and stay stable.

use thiserror::Error;

/// Errors produced by control-surface operations and session plumbing.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("NotConnected: not connected to realm (status: {status})")]
    NotConnected { status: String },

    #[error("ConnectionUnavailable: server connection not available")]
    ConnectionUnavailable,

    #[error("WriteFailed: {0}")]
    WriteFailed(String),

    #[error("InvalidArgument: {0}")]
    InvalidArgument(String),

    #[error("UpstreamUnreachable: {0}")]
    UpstreamUnreachable(String),

    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }
}

impl From<crate::realms::ResolveError> for BridgeError {
    fn from(err: crate::realms::ResolveError) -> Self {
        use crate::realms::ResolveError;
        match err {
            ResolveError::Cancelled(msg) => Self::Cancelled(msg),
            other => Self::UpstreamUnreachable(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_prefixes_are_stable() {
        let err = BridgeError::NotConnected {
            status: "waiting_for_client".to_string(),
        };
        assert!(err.to_string().starts_with("NotConnected:"));

        let err = BridgeError::ConnectionUnavailable;
        assert_eq!(
            err.to_string(),
            "ConnectionUnavailable: server connection not available"
        );

        let err = BridgeError::InvalidArgument("missing field 'message'".to_string());
        assert!(err.to_string().starts_with("InvalidArgument:"));
    }

    #[test]
    fn test_resolve_error_mapping() {
        use crate::realms::ResolveError;

        let err: BridgeError = ResolveError::UnsupportedTransport("no raknet".to_string()).into();
        assert!(err.to_string().starts_with("UpstreamUnreachable:"));

        let err: BridgeError = ResolveError::Cancelled("shutdown".to_string()).into();
        assert!(err.to_string().starts_with("Cancelled:"));
    }
}
