//! Error types for the dialog layer.

use butler_proxy::ClientError;

/// Errors that can occur while handling a conversation turn.
///
/// Any of these ends the current flow with an apology and lands the user
/// back on the menu; none of them stops the assistant.
#[derive(Debug, thiserror::Error)]
pub enum AssistantError {
    /// The database service failed or could not be reached.
    #[error("database client error: {source}")]
    Client {
        /// The underlying client error.
        #[from]
        source: ClientError,
    },

    /// A result row did not have the expected shape.
    #[error("unexpected result row: {0}")]
    InvalidRow(String),
}
