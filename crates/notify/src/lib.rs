//! Database notification dispatcher.
//!
//! Bridges `LISTEN/NOTIFY` messages into in-process handler calls:
//!
//! - [`Dispatcher`] - owns the subscribed channel set and a background
//!   poll loop that drains pending notifications once per second,
//!   coalesces repeated payloads, and dispatches the actions they name.
//! - [`HandlerRegistry`] - explicit map from action name to handler.
//! - [`builtin`] - handlers for the well-known map actions, publishing
//!   onto a [`gw_events::EventBus`].
//! - [`MemoryConnection`] - in-memory connection for embedding and tests.

pub mod builtin;
pub mod dispatcher;
pub mod memory;
pub mod registry;

pub use builtin::builtin_registry;
pub use dispatcher::{CycleReport, Dispatcher, POLL_INTERVAL};
pub use memory::MemoryConnection;
pub use registry::{BoxError, DispatchError, DispatchReport, HandlerRegistry, NoParameters};
