//! Error types for the data layer.
//!
//! Every failure is sorted into one of the three classes the service acts
//! on: connectivity (reconnect and retry), statement (report, never retry)
//! and configuration (fatal at startup).

use butler_types::FailureKind;

/// Errors that can occur in the data layer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DbError {
    /// The physical session is closed, lost, or could not be established.
    #[error("connectivity error: {0}")]
    Connectivity(String),

    /// The database rejected the statement.
    #[error("statement error: {message}")]
    Statement {
        /// Description of the failure.
        message: String,
        /// `SQLSTATE` code, when the server supplied one.
        code: Option<String>,
    },

    /// The connection parameters are invalid.
    #[error("configuration error: {0}")]
    Config(String),
}

impl DbError {
    /// Build a statement error without a `SQLSTATE` code.
    pub fn statement(message: impl Into<String>) -> Self {
        Self::Statement {
            message: message.into(),
            code: None,
        }
    }

    /// Whether reconnecting could make a retry succeed.
    pub const fn is_connectivity(&self) -> bool {
        matches!(self, Self::Connectivity(_))
    }

    /// How this error is reported across the wire.
    pub const fn failure_kind(&self) -> FailureKind {
        match self {
            Self::Connectivity(_) | Self::Config(_) => FailureKind::Connectivity,
            Self::Statement { .. } => FailureKind::Statement,
        }
    }
}

/// `SQLSTATE` codes outside class `08` that still mean the session is gone.
const SESSION_TERMINATED_CODES: [&str; 3] = ["57P01", "57P02", "57P03"];

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Protocol(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => Self::Connectivity(err.to_string()),
            sqlx::Error::Configuration(_) => Self::Config(err.to_string()),
            sqlx::Error::Database(ref db) => {
                let code = db.code().map(|c| c.into_owned());
                match code.as_deref() {
                    Some(c) if c.starts_with("08") || SESSION_TERMINATED_CODES.contains(&c) => {
                        Self::Connectivity(err.to_string())
                    }
                    _ => Self::Statement {
                        message: db.message().to_owned(),
                        code,
                    },
                }
            }
            other => Self::statement(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_are_connectivity() {
        let err: DbError =
            sqlx::Error::Io(std::io::Error::from(std::io::ErrorKind::BrokenPipe)).into();
        assert!(err.is_connectivity());
        assert_eq!(err.failure_kind(), FailureKind::Connectivity);
    }

    #[test]
    fn decode_errors_are_statement_errors() {
        let err: DbError = sqlx::Error::ColumnNotFound("amount".to_owned()).into();
        assert!(!err.is_connectivity());
        assert_eq!(err.failure_kind(), FailureKind::Statement);
    }

    #[test]
    fn pool_timeouts_are_connectivity() {
        let err: DbError = sqlx::Error::PoolTimedOut.into();
        assert!(err.is_connectivity());
    }
}
