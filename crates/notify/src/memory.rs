//! In-memory [`NotifyConnection`].
//!
//! Behaves like a single database session: only channels it is
//! `LISTEN`ing on receive notifications, and breaking the connection
//! drops every registration, just as a lost backend would. Clones share
//! the same session, so a test can keep a handle while the dispatcher
//! owns another.

use std::collections::{BTreeSet, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use gw_core::{ConnectionError, Notification, NotifyConnection};

/// Process id reported for notifications raised through [`MemoryConnection::notify`].
pub const MEMORY_PROCESS_ID: u32 = 4242;

#[derive(Debug, Default)]
struct SessionState {
    listening: BTreeSet<String>,
    pending: Vec<Notification>,
    commands: Vec<String>,
    rejected: HashSet<String>,
    broken: bool,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryConnection {
    session: Arc<Mutex<SessionState>>,
}

impl MemoryConnection {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Raise a notification on `channel`.
    ///
    /// Returns `false` (and drops it) when the session is not listening on
    /// `channel` or the connection is broken.
    pub fn notify(&self, channel: &str, payload: &str) -> bool {
        let mut session = self.lock();
        if session.broken || !session.listening.contains(channel) {
            return false;
        }
        session
            .pending
            .push(Notification::new(MEMORY_PROCESS_ID, channel, payload));
        true
    }

    /// Every command executed so far, in order, including failed ones.
    pub fn commands(&self) -> Vec<String> {
        self.lock().commands.clone()
    }

    /// Channels the session is currently listening on, sorted.
    pub fn listening(&self) -> Vec<String> {
        self.lock().listening.iter().cloned().collect()
    }

    /// Make the server refuse `command` from now on.
    pub fn reject(&self, command: &str) {
        self.lock().rejected.insert(command.to_string());
    }

    /// Simulate a lost backend: registrations and undelivered
    /// notifications are gone, and every call fails until
    /// [`restore`](Self::restore).
    pub fn break_connection(&self) {
        let mut session = self.lock();
        session.broken = true;
        session.listening.clear();
        session.pending.clear();
    }

    pub fn restore(&self) {
        self.lock().broken = false;
    }
}

#[async_trait]
impl NotifyConnection for MemoryConnection {
    async fn execute(&mut self, command: &str) -> Result<(), ConnectionError> {
        let mut session = self.lock();
        session.commands.push(command.to_string());

        if session.broken {
            return Err(ConnectionError::Unusable("connection is closed".into()));
        }
        if session.rejected.contains(command) {
            return Err(ConnectionError::Rejected(format!("permission denied: {command}")));
        }

        if let Some(channel) = command.strip_prefix("LISTEN ") {
            session.listening.insert(unquote(channel));
        } else if let Some(channel) = command.strip_prefix("UNLISTEN ") {
            session.listening.remove(&unquote(channel));
        }
        Ok(())
    }

    async fn poll(&mut self) -> Result<Vec<Notification>, ConnectionError> {
        let mut session = self.lock();
        if session.broken {
            return Err(ConnectionError::Unusable("connection is closed".into()));
        }
        Ok(std::mem::take(&mut session.pending))
    }
}

/// Reverse the identifier quoting applied by `gw_core::channel`.
fn unquote(ident: &str) -> String {
    ident
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(ident)
        .replace("\"\"", "\"")
}

#[cfg(test)]
mod tests {
    use gw_core::channel::{listen_command, unlisten_command};

    use super::*;

    #[tokio::test]
    async fn only_listened_channels_receive_notifications() {
        let mut conn = MemoryConnection::new();
        conn.execute(&listen_command("ws")).await.unwrap();

        assert!(conn.notify("ws", "x"));
        assert!(!conn.notify("other", "y"));

        let pending = conn.poll().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].channel, "ws");
        assert_eq!(pending[0].process_id, MEMORY_PROCESS_ID);
    }

    #[tokio::test]
    async fn unlisten_stops_delivery() {
        let mut conn = MemoryConnection::new();
        conn.execute(&listen_command("ws")).await.unwrap();
        conn.execute(&unlisten_command("ws")).await.unwrap();

        assert!(!conn.notify("ws", "x"));
        assert!(conn.listening().is_empty());
    }

    #[tokio::test]
    async fn quoted_names_round_trip() {
        let mut conn = MemoryConnection::new();
        conn.execute(&listen_command(r#"we"ird"#)).await.unwrap();
        assert_eq!(conn.listening(), [r#"we"ird"#]);
    }

    #[tokio::test]
    async fn broken_connection_fails_until_restored() {
        let mut conn = MemoryConnection::new();
        conn.execute(&listen_command("ws")).await.unwrap();
        conn.break_connection();

        assert!(conn.poll().await.unwrap_err().is_unusable());
        assert!(conn.execute("SELECT 1").await.unwrap_err().is_unusable());

        conn.restore();
        assert!(conn.poll().await.unwrap().is_empty());
        assert!(conn.listening().is_empty());
    }
}
