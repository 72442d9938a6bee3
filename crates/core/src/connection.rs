//! The seam between the dispatcher and the database connection.

use async_trait::async_trait;

use crate::notification::Notification;

/// Failure reported by a [`NotifyConnection`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectionError {
    /// The connection can no longer be used (closed, lost, I/O failure).
    /// Channels must be re-subscribed once it recovers.
    #[error("Connection unusable: {0}")]
    Unusable(String),

    /// The server refused a command; the connection itself is healthy.
    #[error("Command rejected: {0}")]
    Rejected(String),
}

impl ConnectionError {
    pub fn is_unusable(&self) -> bool {
        matches!(self, Self::Unusable(_))
    }
}

/// A persistent connection able to subscribe to channels and hand back
/// pending notifications.
#[async_trait]
pub trait NotifyConnection: Send {
    /// Send a textual command (e.g. `LISTEN "x"`) verbatim.
    async fn execute(&mut self, command: &str) -> Result<(), ConnectionError>;

    /// Return every notification received so far, oldest first.
    ///
    /// Must not wait for new notifications: an empty vector means nothing
    /// is pending.
    async fn poll(&mut self) -> Result<Vec<Notification>, ConnectionError>;
}
