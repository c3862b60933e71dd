//! The query request a client sends to the database service.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::value::{Params, Value};

/// One unit of work for the database service.
///
/// The statement uses `%(name)s` placeholders; values travel separately in
/// [`query_data`](Self::query_data) and are bound by the service, never
/// spliced into the statement text.
///
/// Field names match the request message of the service protocol; missing
/// `query_data`, `commit` and `fetch` fields decode as absent/false.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    /// Correlation ID echoed back in the reply.
    #[serde(default = "Uuid::now_v7")]
    pub request_id: Uuid,
    /// Statement text with named placeholders.
    pub query: String,
    /// Named parameter values, if the statement has placeholders.
    #[serde(default)]
    pub query_data: Option<Params>,
    /// Commit the transaction after a successful execution.
    #[serde(default)]
    pub commit: bool,
    /// Return all rows produced by the statement.
    #[serde(default)]
    pub fetch: bool,
}

impl QueryRequest {
    /// Create a request for a statement with no parameters, no fetch and
    /// no commit.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            request_id: Uuid::now_v7(),
            query: query.into(),
            query_data: None,
            commit: false,
            fetch: false,
        }
    }

    /// Bind one named parameter.
    #[must_use]
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.query_data
            .get_or_insert_with(Params::new)
            .insert(name.into(), value.into());
        self
    }

    /// Replace the whole parameter mapping.
    #[must_use]
    pub fn with_params(mut self, params: Params) -> Self {
        self.query_data = Some(params);
        self
    }

    /// Ask for the statement's rows.
    #[must_use]
    pub const fn with_fetch(mut self) -> Self {
        self.fetch = true;
        self
    }

    /// Commit after execution.
    #[must_use]
    pub const fn with_commit(mut self) -> Self {
        self.commit = true;
        self
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn builder_collects_params() {
        let req = QueryRequest::new("SELECT %(a)s, %(b)s")
            .with_param("a", 1)
            .with_param("b", "x")
            .with_fetch();
        let params = req.query_data.as_ref().unwrap();
        assert_eq!(params.get("a"), Some(&Value::Int(1)));
        assert_eq!(params.get("b"), Some(&Value::Text("x".to_owned())));
        assert!(req.fetch);
        assert!(!req.commit);
    }

    #[test]
    fn minimal_wire_message_uses_defaults() {
        let req: QueryRequest = serde_json::from_str(r#"{"query": "SELECT 1"}"#).unwrap();
        assert_eq!(req.query, "SELECT 1");
        assert!(req.query_data.is_none());
        assert!(!req.fetch);
        assert!(!req.commit);
        assert!(!req.request_id.is_nil());
    }
}
