//! PostgreSQL implementation of [`NotifyConnection`].
//!
//! A [`PgNotifyConnection`] owns one dedicated session (a
//! [`PgListener`]) that is never returned to a pool, since `LISTEN`
//! registrations are tied to the backend process.
//!
//! The listener's own reconnect is disabled: it would silently open a
//! session without our `LISTEN`s. Instead, once the session is found
//! unusable it is dropped and reported as
//! [`ConnectionError::Unusable`], and the next call opens a fresh one.
//! The dispatcher then re-issues `LISTEN` for every channel.

use async_trait::async_trait;
use futures::FutureExt;
use gw_core::{ConnectionError, Notification, NotifyConnection};
use sqlx::postgres::{PgListener, PgNotification};
use sqlx::Executor;

/// Dedicated listening session.
pub struct PgNotifyConnection {
    database_url: String,
    /// `None` after the session was lost, until the next call reopens it.
    listener: Option<PgListener>,
}

impl PgNotifyConnection {
    /// Open a new session against `database_url`.
    pub async fn connect(database_url: &str) -> Result<Self, sqlx::Error> {
        let listener = open_listener(database_url).await?;
        Ok(Self {
            database_url: database_url.to_string(),
            listener: Some(listener),
        })
    }

    /// Whether a session is currently open.
    pub fn is_open(&self) -> bool {
        self.listener.is_some()
    }

    /// Round-trip a trivial query to confirm the session is alive.
    pub async fn health_check(&mut self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(self.session().await?).await?;
        Ok(())
    }

    /// Role the session is authenticated as.
    ///
    /// Server-side functions conventionally `pg_notify(current_user, ...)`,
    /// so this is the default channel to listen on.
    pub async fn current_user(&mut self) -> Result<String, sqlx::Error> {
        sqlx::query_scalar::<_, String>("SELECT current_user::text")
            .fetch_one(self.session().await?)
            .await
    }

    /// Backend process id of the listening session.
    pub async fn backend_pid(&mut self) -> Result<i32, sqlx::Error> {
        sqlx::query_scalar::<_, i32>("SELECT pg_backend_pid()")
            .fetch_one(self.session().await?)
            .await
    }

    /// The open session, reopening it first if it was lost.
    async fn session(&mut self) -> Result<&mut PgListener, sqlx::Error> {
        let listener = match self.listener.take() {
            Some(listener) => listener,
            None => {
                let listener = open_listener(&self.database_url).await?;
                tracing::info!("Reopened listening session");
                listener
            }
        };
        Ok(self.listener.insert(listener))
    }

    /// Drop the session if `error` says it can no longer be used.
    fn note_error(&mut self, error: ConnectionError) -> ConnectionError {
        if error.is_unusable() && self.listener.take().is_some() {
            tracing::warn!(error = %error, "Dropping unusable listening session");
        }
        error
    }
}

async fn open_listener(database_url: &str) -> Result<PgListener, sqlx::Error> {
    let mut listener = PgListener::connect(database_url).await?;
    listener.eager_reconnect(false);
    Ok(listener)
}

#[async_trait]
impl NotifyConnection for PgNotifyConnection {
    async fn execute(&mut self, command: &str) -> Result<(), ConnectionError> {
        let result = match self.session().await {
            // A bare &str goes through the simple query protocol, which is
            // what utility statements like LISTEN expect.
            Ok(listener) => listener.execute(command).await.map(|_| ()),
            Err(e) => Err(e),
        };
        result.map_err(|e| {
            let error = classify(e);
            self.note_error(error)
        })
    }

    async fn poll(&mut self) -> Result<Vec<Notification>, ConnectionError> {
        let listener = match self.session().await {
            Ok(listener) => listener,
            Err(e) => {
                let error = classify(e);
                return Err(self.note_error(error));
            }
        };
        let mut pending = Vec::new();

        // try_recv is cancel-safe; dropping it while pending leaves the
        // stream intact, so polling it once drains without waiting. With
        // eager reconnect off, a closed session yields Ok(None).
        let outcome = loop {
            match listener.try_recv().now_or_never() {
                None => break Ok(()),
                Some(Ok(Some(notification))) => pending.push(convert(&notification)),
                Some(Ok(None)) => {
                    tracing::debug!(
                        dropped = pending.len(),
                        "Listening session lost while draining notifications"
                    );
                    break Err(ConnectionError::Unusable(
                        "connection lost while draining notifications".into(),
                    ));
                }
                Some(Err(e)) => break Err(classify(e)),
            }
        };

        match outcome {
            Ok(()) => Ok(pending),
            Err(error) => Err(self.note_error(error)),
        }
    }
}

fn convert(notification: &PgNotification) -> Notification {
    Notification::new(
        notification.process_id(),
        notification.channel(),
        notification.payload(),
    )
}

/// Split sqlx errors into "the session is gone" and "the server said no".
fn classify(error: sqlx::Error) -> ConnectionError {
    match error {
        sqlx::Error::Database(db) => ConnectionError::Rejected(db.to_string()),
        other @ (sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::Protocol(_)
        | sqlx::Error::PoolClosed
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::WorkerCrashed) => ConnectionError::Unusable(other.to_string()),
        other => ConnectionError::Rejected(other.to_string()),
    }
}
