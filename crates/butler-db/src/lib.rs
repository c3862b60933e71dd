//! Data layer for the Butler database service (`PostgreSQL`).
//!
//! The service owns exactly one physical session to the database. This
//! crate wraps that session in a health-checked logical connection and runs
//! query requests against it, normalising every outcome into rows, an
//! acknowledgement, or a classified [`DbError`].
//!
//! # Architecture
//!
//! ```text
//! QueryRequest
//!     |
//!     +-- QueryExecutor ------- one unit: execute, then COMMIT or ROLLBACK
//!         |                     (one reconnect + re-run on connectivity)
//!         +-- ResilientConnection -- health check on every cursor
//!             |
//!             +-- Connector / Session (PgConnector, or MockConnector in tests)
//! ```
//!
//! # Modules
//!
//! - [`session`] -- The `Connector`/`Session` seam and transaction status
//! - [`postgres`] -- `PostgreSQL` sessions via `sqlx`
//! - [`params`] -- `%(name)s` placeholder rewriting
//! - [`resilient`] -- Health-checked logical connection
//! - [`executor`] -- Request execution and retry
//! - [`error`] -- Shared error types
//! - `mock` -- Scripted connector (tests, or the `mock` feature)

pub mod error;
pub mod executor;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod params;
pub mod postgres;
pub mod resilient;
pub mod session;

// Re-export primary types for convenience.
pub use error::DbError;
pub use executor::QueryExecutor;
pub use postgres::{PgConnector, PgSession, PostgresConfig};
pub use resilient::{Cursor, ResilientConnection};
pub use session::{Connector, Session, TransactionStatus};
