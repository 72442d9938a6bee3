//! Core domain types for the network notification listener.
//!
//! - [`Notification`] - a message delivered on a subscribed channel.
//! - [`ActionDescriptor`] - the JSON action list carried by a payload.
//! - [`NotifyConnection`] - the seam to the database connection that
//!   executes `LISTEN`/`UNLISTEN` and yields pending notifications.
//! - [`channel`] - builders for the subscribe/unsubscribe commands.

pub mod action;
pub mod channel;
pub mod connection;
pub mod error;
pub mod notification;

pub use action::{ActionDescriptor, FunctionCall, Parameters};
pub use connection::{ConnectionError, NotifyConnection};
pub use error::CoreError;
pub use notification::Notification;
