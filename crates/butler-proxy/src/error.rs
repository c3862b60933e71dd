//! Error types for the database service and its clients.
//!
//! [`ProxyError`] covers the service side: anything that stops the service
//! from starting or from serving at all. [`ClientError`] is what a caller of
//! [`DbClient::send_query`](crate::DbClient::send_query) sees, including
//! failures the service reported in its reply.

use butler_db::DbError;

use crate::config::ConfigError;

/// Errors raised while starting or running the database service.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    /// The data layer failed (fatal only at startup).
    #[error("database error: {source}")]
    Database {
        /// The underlying data-layer error.
        #[from]
        source: DbError,
    },

    /// NATS connection or messaging failed.
    #[error("NATS error: {0}")]
    Nats(String),

    /// Serialization or deserialization failure.
    #[error("serde error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: ConfigError,
    },

    /// The tracing subscriber could not be installed.
    #[error("logging error: {0}")]
    Logging(String),
}

/// Errors returned to callers of the database client.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// No service is subscribed to the request subject.
    #[error("database service unavailable")]
    Unavailable,

    /// No reply arrived within the configured request timeout.
    #[error("database service did not reply in time")]
    TimedOut,

    /// The transport failed for another reason.
    #[error("transport error: {0}")]
    Transport(String),

    /// The reply could not be decoded or did not match the request.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The service could not reach the database.
    #[error("database unreachable: {0}")]
    Connectivity(String),

    /// The database rejected the statement.
    #[error("statement failed: {0}")]
    Statement(String),

    /// The service could not decode the request.
    #[error("bad request: {0}")]
    BadRequest(String),
}

impl ClientError {
    /// Whether the failure happened on the transport rather than in the
    /// service or the database.
    pub const fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Unavailable | Self::TimedOut | Self::Transport(_) | Self::Protocol(_)
        )
    }
}

impl From<async_nats::RequestError> for ClientError {
    fn from(err: async_nats::RequestError) -> Self {
        match err.kind() {
            async_nats::RequestErrorKind::NoResponders => Self::Unavailable,
            async_nats::RequestErrorKind::TimedOut => Self::TimedOut,
            async_nats::RequestErrorKind::Other => Self::Transport(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_failures_are_told_apart_from_service_failures() {
        assert!(ClientError::Unavailable.is_transport());
        assert!(ClientError::TimedOut.is_transport());
        assert!(ClientError::Protocol("bad json".to_owned()).is_transport());
        assert!(!ClientError::Statement("syntax".to_owned()).is_transport());
        assert!(!ClientError::Connectivity("down".to_owned()).is_transport());
    }
}
