//! Map event bus.
//!
//! Notification handlers do not touch the map directly; they publish
//! [`MapEvent`]s that the presentation side subscribes to.
//!
//! - [`EventBus`] - in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`MapEvent`] / [`MapEventEnvelope`] - the typed event and its
//!   timestamped wrapper.
//! - [`EventLog`] - background task that traces every event.

pub mod bus;
pub mod log;

pub use bus::{EventBus, MapEvent, MapEventEnvelope, MessageLevel};
pub use log::EventLog;
