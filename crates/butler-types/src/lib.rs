//! Shared wire types for the Butler database service.
//!
//! Everything that crosses the request/reply channel between a dialog
//! process and the database service is defined here, so that both ends
//! always agree on the serialized shape.
//!
//! # Modules
//!
//! - [`value`] -- Scalar column/parameter values and row aliases
//! - [`request`] -- The query request sent by clients
//! - [`reply`] -- The tagged reply returned by the service

pub mod reply;
pub mod request;
pub mod value;

// Re-export all public types at crate root for convenience.
pub use reply::{FailureKind, QueryReply};
pub use request::QueryRequest;
pub use value::{Params, Row, Value};
