//! Event log service.
//!
//! [`EventLog`] subscribes to the [`EventBus`](crate::bus::EventBus) and
//! traces every [`MapEvent`](crate::bus::MapEvent). The listener daemon
//! has no map to drive, so this is its only consumer. It shuts down when
//! the bus sender is dropped.

use tokio::sync::broadcast;

use crate::bus::{MapEvent, MapEventEnvelope};

/// Background service that logs map events.
pub struct EventLog;

impl EventLog {
    /// Run the logging loop until the bus is closed.
    ///
    /// Returns the number of events logged.
    pub async fn run(mut receiver: broadcast::Receiver<MapEventEnvelope>) -> u64 {
        let mut logged = 0u64;

        loop {
            match receiver.recv().await {
                Ok(envelope) => {
                    Self::log(&envelope);
                    logged += 1;
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Event log lagged, some map events were not logged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!(logged, "Event bus closed, event log shutting down");
                    break;
                }
            }
        }

        logged
    }

    fn log(envelope: &MapEventEnvelope) {
        let published_at = envelope.published_at.to_rfc3339();
        match &envelope.event {
            MapEvent::SetLayerIndex { table_name } | MapEvent::RefreshAttributeTable { table_name } => {
                tracing::info!(
                    action = envelope.event.kind(),
                    table_name = %table_name,
                    %published_at,
                    "Map event"
                );
            }
            MapEvent::RefreshCanvas => {
                tracing::info!(action = envelope.event.kind(), %published_at, "Map event");
            }
            MapEvent::ShowMessage {
                text,
                level,
                duration_secs,
            } => {
                tracing::info!(
                    action = envelope.event.kind(),
                    level = u8::from(*level),
                    duration_secs,
                    %published_at,
                    "{text}"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::bus::EventBus;

    #[tokio::test]
    async fn counts_events_until_bus_closes() {
        let bus = Arc::new(EventBus::default());
        let handle = tokio::spawn(EventLog::run(bus.subscribe()));

        bus.publish(MapEvent::RefreshCanvas);
        bus.publish(MapEvent::RefreshAttributeTable {
            table_name: "v_edit_node".into(),
        });
        drop(bus);

        let logged = handle.await.expect("event log task should not panic");
        assert_eq!(logged, 2);
    }
}
