//! Client side of the database service.
//!
//! [`QueryChannel`] is what dialog code talks to. [`DbClient`] implements it
//! over NATS request/reply; [`Loopback`](crate::Loopback) implements it by
//! running the service in the calling process.
//!
//! The client holds no retry logic. If the service is absent, times out or
//! crashes mid-request, the failure surfaces as a [`ClientError`] and the
//! caller decides what to do.

use std::future::Future;

use butler_types::{FailureKind, QueryReply, QueryRequest, Row};
use tracing::{debug, info};
use uuid::Uuid;

use crate::codec;
use crate::config::TransportConfig;
use crate::error::ClientError;

/// A channel that carries one request at a time to the database service.
///
/// The `&mut self` receiver enforces the request/reply alternation: a
/// channel instance cannot have two requests outstanding.
pub trait QueryChannel: Send {
    /// Send a request and wait for its reply.
    ///
    /// Returns the rows when the request fetched, otherwise `None`.
    fn send_query(
        &mut self,
        request: &QueryRequest,
    ) -> impl Future<Output = Result<Option<Vec<Row>>, ClientError>> + Send;

    /// Send a request with `fetch` set and return its rows.
    fn fetch(
        &mut self,
        request: QueryRequest,
    ) -> impl Future<Output = Result<Vec<Row>, ClientError>> + Send {
        async move {
            let rows = self.send_query(&request.with_fetch()).await?;
            Ok(rows.unwrap_or_default())
        }
    }

    /// Send a request for its effect only.
    fn execute(
        &mut self,
        request: QueryRequest,
    ) -> impl Future<Output = Result<(), ClientError>> + Send {
        async move {
            self.send_query(&request).await?;
            Ok(())
        }
    }
}

/// NATS-backed client of the database service.
pub struct DbClient {
    client: async_nats::Client,
    subject: String,
}

impl DbClient {
    /// Connect to the NATS server.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Transport`] if the connection cannot be
    /// established.
    pub async fn connect(transport: &TransportConfig) -> Result<Self, ClientError> {
        info!(
            url = transport.nats_url,
            subject = transport.subject,
            request_timeout_ms = transport.request_timeout_ms,
            "Connecting to database service transport"
        );
        let client = async_nats::ConnectOptions::new()
            .request_timeout(transport.request_timeout())
            .connect(transport.nats_url.as_str())
            .await
            .map_err(|e| {
                ClientError::Transport(format!("failed to connect to {}: {e}", transport.nats_url))
            })?;
        Ok(Self {
            client,
            subject: transport.subject.clone(),
        })
    }

    /// Flush outstanding messages and release the connection.
    ///
    /// Consuming `self` makes a second release impossible. A client that is
    /// dropped without `close` still releases its connection, just without
    /// the flush.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Transport`] if the flush fails.
    pub async fn close(self) -> Result<(), ClientError> {
        self.client
            .flush()
            .await
            .map_err(|e| ClientError::Transport(format!("flush failed: {e}")))
    }
}

impl QueryChannel for DbClient {
    async fn send_query(&mut self, request: &QueryRequest) -> Result<Option<Vec<Row>>, ClientError> {
        let payload = codec::encode_request(request)
            .map_err(|e| ClientError::Protocol(format!("failed to encode request: {e}")))?;
        debug!(
            request_id = %request.request_id,
            subject = self.subject,
            query = %request.query,
            "Sending request"
        );

        let message = self.client.request(self.subject.clone(), payload.into()).await?;
        let reply = codec::decode_reply(&message.payload)
            .map_err(|e| ClientError::Protocol(format!("failed to decode reply: {e}")))?;
        interpret_reply(request.request_id, reply)
    }
}

impl std::fmt::Debug for DbClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbClient")
            .field("subject", &self.subject)
            .finish_non_exhaustive()
    }
}

/// Turn a decoded reply into the caller's result, checking it answers the
/// request that was sent.
pub(crate) fn interpret_reply(
    expected: Uuid,
    reply: QueryReply,
) -> Result<Option<Vec<Row>>, ClientError> {
    if let Some(request_id) = reply.request_id().filter(|id| *id != expected) {
        return Err(ClientError::Protocol(format!(
            "reply for {request_id} does not answer request {expected}"
        )));
    }

    match reply {
        QueryReply::Ok { rows, .. } => Ok(rows),
        QueryReply::Failed { kind, message, .. } => Err(match kind {
            FailureKind::Connectivity => ClientError::Connectivity(message),
            FailureKind::Statement => ClientError::Statement(message),
            FailureKind::BadRequest => ClientError::BadRequest(message),
        }),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use butler_types::Value;

    use super::*;

    #[test]
    fn matching_ok_reply_yields_rows() {
        let id = Uuid::now_v7();
        let rows = interpret_reply(
            id,
            QueryReply::Ok {
                request_id: id,
                rows: Some(vec![vec![Value::Int(1)]]),
            },
        )
        .unwrap();
        assert_eq!(rows, Some(vec![vec![Value::Int(1)]]));
    }

    #[test]
    fn mismatched_reply_is_a_protocol_error() {
        let err = interpret_reply(
            Uuid::now_v7(),
            QueryReply::Ok {
                request_id: Uuid::now_v7(),
                rows: None,
            },
        )
        .unwrap_err();
        assert!(matches!(err, ClientError::Protocol(_)));
    }

    #[test]
    fn failures_map_to_their_kind() {
        let id = Uuid::now_v7();
        let failed = |kind| QueryReply::Failed {
            request_id: Some(id),
            kind,
            message: "boom".to_owned(),
        };
        assert_eq!(
            interpret_reply(id, failed(FailureKind::Statement)),
            Err(ClientError::Statement("boom".to_owned()))
        );
        assert_eq!(
            interpret_reply(id, failed(FailureKind::Connectivity)),
            Err(ClientError::Connectivity("boom".to_owned()))
        );
        // Uncorrelated failures are still reported as failures.
        assert_eq!(
            interpret_reply(
                id,
                QueryReply::Failed {
                    request_id: None,
                    kind: FailureKind::BadRequest,
                    message: "bad".to_owned(),
                }
            ),
            Err(ClientError::BadRequest("bad".to_owned()))
        );
    }
}
