//! Runs one [`QueryRequest`] against a [`ResilientConnection`].
//!
//! A request is one unit of work: health-checked cursor, the statement with
//! its bound parameters, then `COMMIT` when requested or `ROLLBACK`
//! otherwise, so the session is idle again for the next request.
//!
//! A connectivity failure anywhere in that unit triggers exactly one
//! reconnect and one re-run of the whole unit. Statement failures are
//! returned after a single attempt.

use butler_types::{QueryRequest, Row};
use tracing::{debug, warn};

use crate::error::DbError;
use crate::resilient::ResilientConnection;
use crate::session::Connector;

/// Executes requests one at a time over a single logical connection.
pub struct QueryExecutor<C: Connector> {
    connection: ResilientConnection<C>,
}

impl<C: Connector> QueryExecutor<C> {
    /// Take ownership of the connection the executor will use.
    pub const fn new(connection: ResilientConnection<C>) -> Self {
        Self { connection }
    }

    /// Execute one request.
    ///
    /// Returns the fetched rows (possibly empty) when `fetch` is set,
    /// otherwise `None`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Statement`] if the database rejected the
    /// statement, or [`DbError::Connectivity`] if the unit failed on
    /// connectivity both before and after a reconnect.
    pub async fn execute(&mut self, request: &QueryRequest) -> Result<Option<Vec<Row>>, DbError> {
        match self.run_once(request).await {
            Err(e) if e.is_connectivity() => {
                warn!(
                    request_id = %request.request_id,
                    error = %e,
                    "Connectivity lost during request, reconnecting once"
                );
                self.connection.reconnect().await?;
                self.run_once(request).await
            }
            outcome => outcome,
        }
    }

    async fn run_once(&mut self, request: &QueryRequest) -> Result<Option<Vec<Row>>, DbError> {
        let rows = {
            let mut cursor = self.connection.cursor().await?;
            cursor
                .execute(&request.query, request.query_data.as_ref(), request.fetch)
                .await?
        };

        if request.commit {
            self.connection.commit().await?;
        } else if let Err(e) = self.connection.rollback().await {
            // The result is already in hand; the next health check deals
            // with whatever state the session is left in.
            debug!(request_id = %request.request_id, error = %e, "Post-request rollback failed");
        }

        Ok(rows)
    }

    /// Force a reconnect of the underlying connection.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Connectivity`] if the new session cannot be
    /// opened.
    pub async fn reconnect(&mut self) -> Result<(), DbError> {
        self.connection.reconnect().await
    }

    /// Reconnects performed by the underlying connection.
    pub const fn reconnects(&self) -> u64 {
        self.connection.reconnects()
    }

    /// The underlying connection.
    pub const fn connection(&self) -> &ResilientConnection<C> {
        &self.connection
    }

    /// Close the underlying connection.
    pub async fn close(self) {
        self.connection.close().await;
    }
}
