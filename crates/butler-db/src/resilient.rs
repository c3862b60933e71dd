//! A logical connection that swaps out broken physical sessions.
//!
//! [`ResilientConnection`] owns at most one physical session at a time. Every
//! [`cursor`](ResilientConnection::cursor) call runs a cheap health check
//! against the session's last observed state before handing it out:
//!
//! | Session state              | Action                          |
//! |----------------------------|---------------------------------|
//! | absent or closed           | reconnect                       |
//! | transaction status unknown | close, then reconnect           |
//! | in transaction / in error  | roll back, keep the session     |
//! | idle                       | reuse as-is                     |
//!
//! Reconnection always uses the connector's captured parameters and makes
//! exactly one attempt; a failed attempt surfaces as
//! [`DbError::Connectivity`] and leaves the connection empty so the next
//! acquisition tries again.

use butler_types::{Params, Row};
use tracing::{debug, info, warn};

use crate::error::DbError;
use crate::session::{Connector, Session, TransactionStatus};

/// Health-checked handle over a replaceable physical session.
pub struct ResilientConnection<C: Connector> {
    connector: C,
    session: Option<C::Session>,
    reconnects: u64,
}

impl<C: Connector> ResilientConnection<C> {
    /// Open the first physical session.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Connectivity`] if the session cannot be opened.
    pub async fn connect(connector: C) -> Result<Self, DbError> {
        let session = connector.connect().await?;
        Ok(Self {
            connector,
            session: Some(session),
            reconnects: 0,
        })
    }

    /// Wrap a connector without connecting; the first
    /// [`cursor`](Self::cursor) call opens the session.
    pub const fn lazy(connector: C) -> Self {
        Self {
            connector,
            session: None,
            reconnects: 0,
        }
    }

    /// Health-check the session and return a cursor over it.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Connectivity`] if a needed reconnect fails, or the
    /// rollback's error if returning the session to idle fails.
    pub async fn cursor(&mut self) -> Result<Cursor<'_, C::Session>, DbError> {
        let status = match &self.session {
            None => None,
            Some(session) if session.is_closed() => {
                info!(target_db = %self.connector.target(), "Session closed, reconnecting");
                None
            }
            Some(session) => Some(session.transaction_status()),
        };

        match status {
            None => self.reconnect().await?,
            Some(TransactionStatus::Unknown) => {
                info!(
                    target_db = %self.connector.target(),
                    "Session transaction status unknown, reconnecting"
                );
                self.reconnect().await?;
            }
            Some(s) if s.needs_rollback() => {
                debug!(status = ?s, "Session left mid-transaction, rolling back");
                if let Some(session) = self.session.as_mut() {
                    session.rollback().await?;
                }
            }
            Some(_) => {}
        }

        match self.session.as_mut() {
            Some(session) => Ok(Cursor { session }),
            None => Err(DbError::Connectivity("no session available".to_owned())),
        }
    }

    /// Commit the session's open transaction.
    ///
    /// Not health-checked: a commit only makes sense on the session the
    /// preceding statements ran on.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Connectivity`] if there is no session, or the
    /// session's commit error.
    pub async fn commit(&mut self) -> Result<(), DbError> {
        match self.session.as_mut() {
            Some(session) => session.commit().await,
            None => Err(DbError::Connectivity("no session to commit".to_owned())),
        }
    }

    /// Roll back the session's open transaction, if there is a session.
    ///
    /// # Errors
    ///
    /// Returns the session's rollback error.
    pub async fn rollback(&mut self) -> Result<(), DbError> {
        match self.session.as_mut() {
            Some(session) => session.rollback().await,
            None => Ok(()),
        }
    }

    /// Discard the current session and open a fresh one.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Connectivity`] if the new session cannot be
    /// opened. The connection is left without a session in that case.
    pub async fn reconnect(&mut self) -> Result<(), DbError> {
        if let Some(old) = self.session.take() {
            old.close().await;
        }
        self.reconnects = self.reconnects.saturating_add(1);
        match self.connector.connect().await {
            Ok(session) => {
                self.session = Some(session);
                info!(
                    target_db = %self.connector.target(),
                    reconnects = self.reconnects,
                    "Reconnected"
                );
                Ok(())
            }
            Err(e) => {
                warn!(target_db = %self.connector.target(), error = %e, "Reconnect failed");
                Err(match e {
                    DbError::Connectivity(_) => e,
                    other => DbError::Connectivity(other.to_string()),
                })
            }
        }
    }

    /// Number of reconnects performed since construction.
    pub const fn reconnects(&self) -> u64 {
        self.reconnects
    }

    /// Whether a physical session is currently held.
    pub const fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    /// Close the physical session, if any.
    pub async fn close(mut self) {
        if let Some(session) = self.session.take() {
            session.close().await;
        }
    }
}

/// A borrowed, health-checked session ready for one statement.
pub struct Cursor<'c, S: Session> {
    session: &'c mut S,
}

impl<S: Session> Cursor<'_, S> {
    /// Execute a statement on the checked session.
    ///
    /// # Errors
    ///
    /// Returns the session's [`DbError`].
    pub async fn execute(
        &mut self,
        statement: &str,
        params: Option<&Params>,
        fetch: bool,
    ) -> Result<Option<Vec<Row>>, DbError> {
        self.session.execute(statement, params, fetch).await
    }
}
