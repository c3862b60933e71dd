//! The tagged reply the database service sends for every request.
//!
//! A reply is either `ok` with an optional row payload or `failed` with a
//! failure kind and message. `rows: null` means the request did not ask for
//! rows; `rows: []` means it did and the statement produced none.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::value::Row;

/// Classification of a failed request, as seen by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The service could not reach the database within its retry budget.
    Connectivity,
    /// The database rejected the statement.
    Statement,
    /// The request message itself could not be decoded.
    BadRequest,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Connectivity => "connectivity",
            Self::Statement => "statement",
            Self::BadRequest => "bad request",
        })
    }
}

/// Reply to a [`QueryRequest`](crate::QueryRequest).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum QueryReply {
    /// The statement ran (and committed, if requested).
    Ok {
        /// ID of the request this answers.
        request_id: Uuid,
        /// Fetched rows when the request asked for them.
        rows: Option<Vec<Row>>,
    },
    /// The request failed.
    Failed {
        /// ID of the request this answers, when it could be decoded.
        request_id: Option<Uuid>,
        /// What went wrong.
        kind: FailureKind,
        /// Human-readable detail.
        message: String,
    },
}

impl QueryReply {
    /// The request ID this reply answers, if known.
    pub const fn request_id(&self) -> Option<Uuid> {
        match self {
            Self::Ok { request_id, .. } => Some(*request_id),
            Self::Failed { request_id, .. } => *request_id,
        }
    }

    /// Whether this reply reports success.
    pub const fn is_ok(&self) -> bool {
        matches!(self, Self::Ok { .. })
    }
}
