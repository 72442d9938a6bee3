//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is the publish/subscribe hub for [`MapEvent`]s. It is
//! designed to be shared via `Arc<EventBus>` between the notification
//! handlers and whatever renders the map.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// MapEvent
// ---------------------------------------------------------------------------

/// Severity of a user-facing message, matching the host's message bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum MessageLevel {
    Info,
    #[default]
    Warning,
    Critical,
    Success,
}

impl TryFrom<u8> for MessageLevel {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Info),
            1 => Ok(Self::Warning),
            2 => Ok(Self::Critical),
            3 => Ok(Self::Success),
            other => Err(format!("message level must be 0..=3, got {other}")),
        }
    }
}

impl From<MessageLevel> for u8 {
    fn from(level: MessageLevel) -> Self {
        match level {
            MessageLevel::Info => 0,
            MessageLevel::Warning => 1,
            MessageLevel::Critical => 2,
            MessageLevel::Success => 3,
        }
    }
}

/// A change the map or its attribute tables should reflect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum MapEvent {
    /// Reload the data provider of the layer backed by `table_name`.
    SetLayerIndex { table_name: String },

    /// Re-read field configuration for the layer backed by `table_name`.
    RefreshAttributeTable { table_name: String },

    /// Repaint every layer.
    RefreshCanvas,

    /// Show `text` in the message bar for `duration_secs`.
    ShowMessage {
        text: String,
        level: MessageLevel,
        duration_secs: u32,
    },
}

impl MapEvent {
    /// Short name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SetLayerIndex { .. } => "set_layer_index",
            Self::RefreshAttributeTable { .. } => "refresh_attribute_table",
            Self::RefreshCanvas => "refresh_canvas",
            Self::ShowMessage { .. } => "show_message",
        }
    }
}

/// A [`MapEvent`] stamped with its publication time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapEventEnvelope {
    pub event: MapEvent,

    /// When the event was published (UTC).
    pub published_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// # Usage
///
/// ```rust
/// use gw_events::bus::{EventBus, MapEvent};
///
/// let bus = EventBus::default();
/// let mut rx = bus.subscribe();
///
/// bus.publish(MapEvent::RefreshCanvas);
/// ```
pub struct EventBus {
    sender: broadcast::Sender<MapEventEnvelope>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full, the oldest un-consumed events are dropped
    /// and slow receivers will observe a `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// If there are no active subscribers the event is silently dropped.
    pub fn publish(&self, event: MapEvent) {
        let envelope = MapEventEnvelope {
            event,
            published_at: Utc::now(),
        };
        // A SendError only means there are zero receivers.
        let _ = self.sender.send(envelope);
    }

    /// Subscribe to all events published on this bus.
    pub fn subscribe(&self) -> broadcast::Receiver<MapEventEnvelope> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_and_receive_single_subscriber() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        bus.publish(MapEvent::SetLayerIndex {
            table_name: "v_edit_arc".into(),
        });

        let received = rx.recv().await.expect("should receive the event");
        assert_eq!(
            received.event,
            MapEvent::SetLayerIndex {
                table_name: "v_edit_arc".into()
            }
        );
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_event() {
        let bus = EventBus::default();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(MapEvent::RefreshCanvas);

        let e1 = rx1.recv().await.expect("subscriber 1 should receive");
        let e2 = rx2.recv().await.expect("subscriber 2 should receive");

        assert_eq!(e1.event, MapEvent::RefreshCanvas);
        assert_eq!(e2.event, MapEvent::RefreshCanvas);
    }

    #[test]
    fn publish_with_no_subscribers_does_not_panic() {
        let bus = EventBus::default();
        bus.publish(MapEvent::RefreshCanvas);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn message_level_accepts_host_range() {
        assert_eq!(MessageLevel::try_from(0), Ok(MessageLevel::Info));
        assert_eq!(MessageLevel::try_from(3), Ok(MessageLevel::Success));
        assert!(MessageLevel::try_from(4).is_err());
    }

    #[test]
    fn events_serialize_with_action_tag() {
        let value = serde_json::to_value(MapEvent::ShowMessage {
            text: "Psector updated".into(),
            level: MessageLevel::Info,
            duration_secs: 10,
        })
        .expect("should serialize");

        assert_eq!(value["action"], "show_message");
        assert_eq!(value["level"], 0);
        assert_eq!(value["duration_secs"], 10);
    }
}
