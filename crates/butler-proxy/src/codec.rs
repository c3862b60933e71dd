//! JSON framing of requests and replies on the wire.
//!
//! Both ends of the channel link this module, so the encoding is whatever
//! `serde_json` makes of the `butler-types` definitions. Decimals travel as
//! strings and floats round-trip exactly.

use butler_types::{QueryReply, QueryRequest};
use uuid::Uuid;

/// Encode a request for sending.
///
/// # Errors
///
/// Returns the `serde_json` error if the request cannot be serialized.
pub fn encode_request(request: &QueryRequest) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(request)
}

/// Decode a received request.
///
/// # Errors
///
/// Returns the `serde_json` error if the payload is not a valid request.
pub fn decode_request(payload: &[u8]) -> Result<QueryRequest, serde_json::Error> {
    serde_json::from_slice(payload)
}

/// Encode a reply for sending.
///
/// # Errors
///
/// Returns the `serde_json` error if the reply cannot be serialized.
pub fn encode_reply(reply: &QueryReply) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(reply)
}

/// Decode a received reply.
///
/// # Errors
///
/// Returns the `serde_json` error if the payload is not a valid reply.
pub fn decode_reply(payload: &[u8]) -> Result<QueryReply, serde_json::Error> {
    serde_json::from_slice(payload)
}

/// Best-effort extraction of `request_id` from a payload that failed to
/// decode as a request, so the failure reply can still be correlated.
pub fn salvage_request_id(payload: &[u8]) -> Option<Uuid> {
    let value: serde_json::Value = serde_json::from_slice(payload).ok()?;
    value.get("request_id")?.as_str()?.parse().ok()
}
