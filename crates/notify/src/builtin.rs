//! Handlers for the map actions server-side functions emit.
//!
//! Each action is turned into a [`MapEvent`] on the shared [`EventBus`];
//! whatever owns the map subscribes and applies it.
//!
//! | Action                    | Parameters                              |
//! |---------------------------|-----------------------------------------|
//! | `set_layer_index`         | `tableName`                             |
//! | `refresh_attribute_table` | `tableName`                             |
//! | `refresh_canvas`          | none                                    |
//! | `show_message`            | `text`, optional `level`, `duration`    |

use std::sync::Arc;

use gw_events::{EventBus, MapEvent, MessageLevel};
use serde::Deserialize;

use crate::registry::{HandlerRegistry, NoParameters};

pub const SET_LAYER_INDEX: &str = "set_layer_index";
pub const REFRESH_ATTRIBUTE_TABLE: &str = "refresh_attribute_table";
pub const REFRESH_CANVAS: &str = "refresh_canvas";
pub const SHOW_MESSAGE: &str = "show_message";

/// Seconds a message stays in the message bar when `duration` is omitted.
pub const DEFAULT_MESSAGE_DURATION_SECS: u32 = 10;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct TableParams {
    table_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct MessageParams {
    text: String,
    #[serde(default)]
    level: MessageLevel,
    #[serde(default = "default_duration")]
    duration: u32,
}

fn default_duration() -> u32 {
    DEFAULT_MESSAGE_DURATION_SECS
}

/// A registry holding only the built-in map actions.
pub fn builtin_registry(bus: Arc<EventBus>) -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();
    register_builtin(&mut registry, bus);
    registry
}

/// Add the built-in map actions to an existing registry.
pub fn register_builtin(registry: &mut HandlerRegistry, bus: Arc<EventBus>) {
    let b = Arc::clone(&bus);
    registry.register_fn(SET_LAYER_INDEX, move |p: TableParams| {
        b.publish(MapEvent::SetLayerIndex {
            table_name: p.table_name,
        });
        Ok(())
    });

    let b = Arc::clone(&bus);
    registry.register_fn(REFRESH_ATTRIBUTE_TABLE, move |p: TableParams| {
        b.publish(MapEvent::RefreshAttributeTable {
            table_name: p.table_name,
        });
        Ok(())
    });

    let b = Arc::clone(&bus);
    registry.register_fn(REFRESH_CANVAS, move |_: NoParameters| {
        b.publish(MapEvent::RefreshCanvas);
        Ok(())
    });

    registry.register_fn(SHOW_MESSAGE, move |p: MessageParams| {
        bus.publish(MapEvent::ShowMessage {
            text: p.text,
            level: p.level,
            duration_secs: p.duration,
        });
        Ok(())
    });
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use gw_core::FunctionCall;
    use serde_json::json;

    use super::*;
    use crate::registry::DispatchError;

    #[test]
    fn registers_all_four_actions() {
        let registry = builtin_registry(Arc::new(EventBus::default()));
        assert_eq!(
            registry.names(),
            [
                REFRESH_ATTRIBUTE_TABLE,
                REFRESH_CANVAS,
                SET_LAYER_INDEX,
                SHOW_MESSAGE
            ]
        );
    }

    #[tokio::test]
    async fn set_layer_index_publishes_table() {
        let bus = Arc::new(EventBus::default());
        let mut rx = bus.subscribe();
        let registry = builtin_registry(Arc::clone(&bus));

        registry
            .invoke(&FunctionCall::new(SET_LAYER_INDEX).with_parameter("tableName", json!("v_edit_arc")))
            .expect("handler should run");

        let envelope = rx.recv().await.expect("event should be published");
        assert_eq!(
            envelope.event,
            MapEvent::SetLayerIndex {
                table_name: "v_edit_arc".into()
            }
        );
    }

    #[tokio::test]
    async fn show_message_applies_defaults() {
        let bus = Arc::new(EventBus::default());
        let mut rx = bus.subscribe();
        let registry = builtin_registry(Arc::clone(&bus));

        registry
            .invoke(&FunctionCall::new(SHOW_MESSAGE).with_parameter("text", json!("Psector updated")))
            .expect("handler should run");

        let envelope = rx.recv().await.expect("event should be published");
        assert_eq!(
            envelope.event,
            MapEvent::ShowMessage {
                text: "Psector updated".into(),
                level: MessageLevel::Warning,
                duration_secs: DEFAULT_MESSAGE_DURATION_SECS,
            }
        );
    }

    #[test]
    fn show_message_rejects_out_of_range_level() {
        let registry = builtin_registry(Arc::new(EventBus::default()));
        let call = FunctionCall::new(SHOW_MESSAGE)
            .with_parameter("text", json!("x"))
            .with_parameter("level", json!(7));

        assert_matches!(registry.invoke(&call), Err(DispatchError::InvalidParameters { .. }));
    }

    #[test]
    fn refresh_canvas_rejects_arguments() {
        let registry = builtin_registry(Arc::new(EventBus::default()));
        let call = FunctionCall::new(REFRESH_CANVAS).with_parameter("force", json!(true));

        assert_matches!(registry.invoke(&call), Err(DispatchError::InvalidParameters { .. }));
    }
}
