//! The seam between the resilient connection and a concrete database.
//!
//! A [`Connector`] knows how to open a physical [`Session`] from parameters
//! it captured at construction. The resilient connection only ever talks to
//! these two traits, which is what lets tests swap `PostgreSQL` for the
//! scripted connector in [`crate::mock`].

use std::future::Future;

use butler_types::{Params, Row};

use crate::error::DbError;

/// Transaction state of a physical session, as last observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionStatus {
    /// No transaction is open.
    Idle,
    /// A transaction is open and healthy.
    InTransaction,
    /// A transaction is open and a statement in it failed.
    InError,
    /// The session's state cannot be known (the server side was lost).
    Unknown,
}

impl TransactionStatus {
    /// Whether a rollback is needed before the session can be reused.
    pub const fn needs_rollback(self) -> bool {
        matches!(self, Self::InTransaction | Self::InError)
    }
}

/// One live physical session to the database.
pub trait Session: Send {
    /// Whether the session has been closed.
    fn is_closed(&self) -> bool;

    /// The session's current transaction state.
    fn transaction_status(&self) -> TransactionStatus;

    /// Execute one statement, binding `params` by name.
    ///
    /// Returns the produced rows when `fetch` is set, otherwise `None`.
    fn execute(
        &mut self,
        statement: &str,
        params: Option<&Params>,
        fetch: bool,
    ) -> impl Future<Output = Result<Option<Vec<Row>>, DbError>> + Send;

    /// Commit the open transaction.
    fn commit(&mut self) -> impl Future<Output = Result<(), DbError>> + Send;

    /// Roll back the open transaction.
    fn rollback(&mut self) -> impl Future<Output = Result<(), DbError>> + Send;

    /// Close the session, discarding any open transaction.
    fn close(self) -> impl Future<Output = ()> + Send
    where
        Self: Sized;
}

/// Opens physical sessions from fixed connection parameters.
pub trait Connector: Send + Sync {
    /// The session type this connector produces.
    type Session: Session;

    /// Open a new session.
    fn connect(&self) -> impl Future<Output = Result<Self::Session, DbError>> + Send;

    /// A loggable description of the target (no credentials).
    fn target(&self) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_open_transactions_need_rollback() {
        assert!(!TransactionStatus::Idle.needs_rollback());
        assert!(TransactionStatus::InTransaction.needs_rollback());
        assert!(TransactionStatus::InError.needs_rollback());
        assert!(!TransactionStatus::Unknown.needs_rollback());
    }
}
