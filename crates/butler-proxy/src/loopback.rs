//! In-process [`QueryChannel`] that owns the database service directly.
//!
//! Requests still go through the wire codec in both directions, so a
//! dialog process configured with `transport.in_process` sees exactly the
//! replies a remote service would send. The process then owns its own
//! physical session instead of sharing the service's.

use butler_db::Connector;
use butler_types::{QueryRequest, Row};

use crate::client::{QueryChannel, interpret_reply};
use crate::codec;
use crate::error::ClientError;
use crate::service::{DbService, ServiceStats};

/// A [`DbService`] reached by function call instead of over the network.
pub struct Loopback<C: Connector> {
    service: DbService<C>,
}

impl<C: Connector> Loopback<C> {
    /// Wrap a started service.
    pub const fn new(service: DbService<C>) -> Self {
        Self { service }
    }

    /// The wrapped service's counters.
    pub const fn stats(&self) -> ServiceStats {
        self.service.stats()
    }
}

impl<C: Connector> QueryChannel for Loopback<C> {
    async fn send_query(&mut self, request: &QueryRequest) -> Result<Option<Vec<Row>>, ClientError> {
        let payload = codec::encode_request(request)
            .map_err(|e| ClientError::Protocol(format!("failed to encode request: {e}")))?;
        let reply = self.service.handle_payload(&payload).await;
        let encoded = codec::encode_reply(&reply)
            .map_err(|e| ClientError::Protocol(format!("failed to encode reply: {e}")))?;
        let reply = codec::decode_reply(&encoded)
            .map_err(|e| ClientError::Protocol(format!("failed to decode reply: {e}")))?;
        interpret_reply(request.request_id, reply)
    }
}
