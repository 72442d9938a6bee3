//! Notification dispatcher.
//!
//! [`Dispatcher`] owns a [`NotifyConnection`], the set of subscribed
//! channels, and a background task that runs [`Dispatcher::poll_cycle`]
//! once per [`POLL_INTERVAL`]. Each cycle:
//!
//! 1. re-issues `LISTEN` for every subscribed channel if the connection
//!    failed earlier,
//! 2. drains pending notifications and walks them newest first,
//! 3. skips empty payloads and payloads equal to the last one seen,
//! 4. parses the rest as [`ActionDescriptor`]s and dispatches them
//!    through the [`HandlerRegistry`].
//!
//! Nothing here is surfaced to the caller as an error: a lost connection
//! is retried on the next tick, malformed payloads are dropped, and
//! handler problems are logged.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use gw_core::channel::{listen_command, unlisten_command};
use gw_core::{ActionDescriptor, ConnectionError, NotifyConnection};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::registry::{DispatchReport, HandlerRegistry};

/// Delay between poll cycles.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// What a single poll cycle did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CycleReport {
    /// Channels were re-subscribed after an earlier connection failure.
    pub resubscribed: bool,
    /// The connection was unusable; a resubscribe is pending.
    pub connection_failed: bool,
    pub received: usize,
    /// Payloads parsed and handed to the registry.
    pub dispatched: usize,
    /// Empty payloads and immediate repeats.
    pub skipped: usize,
    pub malformed: usize,
    pub actions: DispatchReport,
}

impl CycleReport {
    /// Whether anything beyond an empty poll happened.
    pub fn is_quiet(&self) -> bool {
        !self.resubscribed && !self.connection_failed && self.received == 0
    }
}

/// Mutable listening state, guarded together with the connection.
#[derive(Debug, Default)]
struct DispatcherState {
    subscribed: BTreeSet<String>,
    last_payload: Option<String>,
    reconnect_needed: bool,
}

struct Session<C> {
    connection: C,
    state: DispatcherState,
}

struct Shared<C> {
    session: Mutex<Session<C>>,
    registry: Arc<HandlerRegistry>,
}

struct PollTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Bridges database notifications to registered action handlers.
///
/// Foreground calls ([`start_listening`](Self::start_listening),
/// [`stop_listening`](Self::stop_listening)) and the poll loop share the
/// connection through one lock, so a subscribe command never interleaves
/// with a drain.
pub struct Dispatcher<C> {
    shared: Arc<Shared<C>>,
    task: Mutex<Option<PollTask>>,
}

impl<C> Dispatcher<C>
where
    C: NotifyConnection + 'static,
{
    pub fn new(connection: C, registry: Arc<HandlerRegistry>) -> Self {
        Self {
            shared: Arc::new(Shared {
                session: Mutex::new(Session {
                    connection,
                    state: DispatcherState::default(),
                }),
                registry,
            }),
            task: Mutex::new(None),
        }
    }

    /// Subscribe to `channels` and make sure the poll loop is running.
    ///
    /// `channels` replaces the previously subscribed set: channels left out
    /// are `UNLISTEN`ed so the server stops delivering them. A channel the
    /// server refuses is logged and otherwise ignored.
    pub async fn start_listening<I, S>(&self, channels: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let channels: BTreeSet<String> = channels.into_iter().map(Into::into).collect();

        {
            let mut session = self.shared.session.lock().await;
            let Session { connection, state } = &mut *session;

            for channel in state.subscribed.difference(&channels) {
                match connection.execute(&unlisten_command(channel)).await {
                    Ok(()) => tracing::info!(channel = %channel, "Stopped listening on channel"),
                    Err(e) => note_command_failure(&mut state.reconnect_needed, "UNLISTEN", channel, &e),
                }
            }

            for channel in &channels {
                match connection.execute(&listen_command(channel)).await {
                    Ok(()) => tracing::info!(channel = %channel, "Listening on channel"),
                    Err(e) => note_command_failure(&mut state.reconnect_needed, "LISTEN", channel, &e),
                }
            }

            state.subscribed = channels;
        }

        self.ensure_running().await;
    }

    /// Unsubscribe from `channels`.
    ///
    /// The channels are dropped from the subscribed set, so they are not
    /// re-subscribed after a reconnect. Once no channel is left the poll
    /// loop is stopped.
    pub async fn stop_listening<I, S>(&self, channels: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let none_left = {
            let mut session = self.shared.session.lock().await;
            let Session { connection, state } = &mut *session;

            for channel in channels.into_iter().map(Into::into) {
                match connection.execute(&unlisten_command(&channel)).await {
                    Ok(()) => tracing::info!(channel = %channel, "Stopped listening on channel"),
                    Err(e) => note_command_failure(&mut state.reconnect_needed, "UNLISTEN", &channel, &e),
                }
                state.subscribed.remove(&channel);
            }

            state.subscribed.is_empty()
        };

        if none_left {
            self.stop_loop().await;
        }
    }

    /// Stop the poll loop and wait for it to exit. Subscriptions are left
    /// as they are on the server.
    pub async fn shutdown(&self) {
        self.stop_loop().await;
    }

    pub async fn is_running(&self) -> bool {
        self.task
            .lock()
            .await
            .as_ref()
            .is_some_and(|task| !task.handle.is_finished())
    }

    pub async fn subscribed_channels(&self) -> Vec<String> {
        let session = self.shared.session.lock().await;
        session.state.subscribed.iter().cloned().collect()
    }

    /// The most recent non-empty payload seen, dispatched or not.
    pub async fn last_payload(&self) -> Option<String> {
        self.shared.session.lock().await.state.last_payload.clone()
    }

    pub async fn reconnect_needed(&self) -> bool {
        self.shared.session.lock().await.state.reconnect_needed
    }

    /// Run one poll cycle now, independently of the loop.
    pub async fn poll_cycle(&self) -> CycleReport {
        self.shared.poll_cycle().await
    }

    async fn ensure_running(&self) {
        let mut task = self.task.lock().await;
        if task.as_ref().is_some_and(|t| !t.handle.is_finished()) {
            return;
        }

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_poll_loop(Arc::clone(&self.shared), cancel.clone()));
        *task = Some(PollTask { cancel, handle });
    }

    async fn stop_loop(&self) {
        let Some(task) = self.task.lock().await.take() else {
            return;
        };

        task.cancel.cancel();
        if let Err(e) = task.handle.await {
            tracing::error!(error = %e, "Notification poll task ended abnormally");
        }
    }
}

impl<C> Drop for Dispatcher<C> {
    fn drop(&mut self) {
        if let Some(task) = self.task.get_mut().take() {
            task.cancel.cancel();
        }
    }
}

impl<C> Shared<C>
where
    C: NotifyConnection,
{
    async fn poll_cycle(&self) -> CycleReport {
        let mut report = CycleReport::default();
        let mut session = self.session.lock().await;
        let Session { connection, state } = &mut *session;

        if state.reconnect_needed {
            if let Err(e) = resubscribe(connection, &state.subscribed).await {
                tracing::warn!(error = %e, "Resubscribe failed, retrying next cycle");
                report.connection_failed = true;
                return report;
            }
            tracing::info!(
                channels = state.subscribed.len(),
                "Re-subscribed channels after connection failure"
            );
            state.reconnect_needed = false;
            report.resubscribed = true;
        }

        let batch = match connection.poll().await {
            Ok(batch) => batch,
            Err(e) if e.is_unusable() => {
                tracing::warn!(error = %e, "Notification connection unusable, will resubscribe");
                state.reconnect_needed = true;
                report.connection_failed = true;
                return report;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Polling for notifications failed");
                return report;
            }
        };

        report.received = batch.len();

        for notification in batch.into_iter().rev() {
            tracing::info!(
                pid = notification.process_id,
                channel = %notification.channel,
                payload = %notification.payload,
                "Got NOTIFY"
            );

            if !notification.has_payload()
                || state.last_payload.as_deref() == Some(notification.payload.as_str())
            {
                report.skipped += 1;
                continue;
            }

            let descriptor = ActionDescriptor::parse(&notification.payload);
            state.last_payload = Some(notification.payload);

            match descriptor {
                Ok(descriptor) => {
                    report.actions.merge(self.registry.dispatch(&descriptor));
                    report.dispatched += 1;
                }
                Err(e) => {
                    tracing::debug!(error = %e, "Dropping malformed payload");
                    report.malformed += 1;
                }
            }
        }

        report
    }
}

/// Re-issue `LISTEN` for every channel.
///
/// Stops at the first sign the connection is still unusable; individual
/// rejections are logged and skipped.
async fn resubscribe<C>(connection: &mut C, channels: &BTreeSet<String>) -> Result<(), ConnectionError>
where
    C: NotifyConnection,
{
    for channel in channels {
        match connection.execute(&listen_command(channel)).await {
            Ok(()) => {}
            Err(e) if e.is_unusable() => return Err(e),
            Err(e) => tracing::warn!(channel = %channel, error = %e, "LISTEN rejected"),
        }
    }
    Ok(())
}

fn note_command_failure(
    reconnect_needed: &mut bool,
    command: &str,
    channel: &str,
    error: &ConnectionError,
) {
    if error.is_unusable() {
        *reconnect_needed = true;
    }
    tracing::warn!(channel = %channel, error = %error, "{command} failed");
}

async fn run_poll_loop<C>(shared: Arc<Shared<C>>, cancel: CancellationToken)
where
    C: NotifyConnection,
{
    let mut ticker = tokio::time::interval(POLL_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tracing::info!(
        poll_interval_ms = POLL_INTERVAL.as_millis() as u64,
        "Notification poll loop started",
    );

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Notification poll loop stopping");
                break;
            }
            _ = ticker.tick() => {
                let report = shared.poll_cycle().await;
                if !report.is_quiet() {
                    tracing::debug!(?report, "Poll cycle finished");
                }
            }
        }
    }
}
