//! Database service and client for the Butler assistant.
//!
//! One long-running service owns the only `PostgreSQL` session and answers
//! query requests from any number of dialog processes over NATS
//! request/reply. Resilience lives entirely in the service: it reconnects
//! and retries on a capped backoff, while clients simply send and wait.
//!
//! # Architecture
//!
//! ```text
//! dialog process                         butler-dbsvc
//! DbClient --(butler.db.query)--> NATS --> DbService --> QueryExecutor --> PostgreSQL
//!          <------- QueryReply ---------/
//! ```
//!
//! # Modules
//!
//! - [`service`] -- Request loop, retry cap, lifecycle and shutdown
//! - [`client`] -- `QueryChannel` and the NATS-backed `DbClient`
//! - [`loopback`] -- In-process channel to a service
//! - [`codec`] -- JSON framing of requests and replies
//! - [`schema`] -- Idempotent table creation and seeding
//! - [`config`] -- YAML configuration with environment overrides
//! - [`logging`] -- Tracing subscriber setup
//! - [`error`] -- Service and client error types

pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod logging;
pub mod loopback;
pub mod schema;
pub mod service;

// Re-export primary types for convenience.
pub use client::{DbClient, QueryChannel};
pub use config::{ConfigError, ProxyConfig};
pub use error::{ClientError, ProxyError};
pub use loopback::Loopback;
pub use schema::{SeedBudget, SeedUser, bootstrap};
pub use service::{DbService, ServiceState, ServiceStats, shutdown_signal};
