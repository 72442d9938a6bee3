/// A notification received on a subscribed channel.
///
/// The payload is opaque at this level; by convention it carries an
/// [`ActionDescriptor`](crate::ActionDescriptor) encoded as JSON.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Backend process id of the notifying session.
    pub process_id: u32,
    pub channel: String,
    pub payload: String,
}

impl Notification {
    pub fn new(process_id: u32, channel: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            process_id,
            channel: channel.into(),
            payload: payload.into(),
        }
    }

    /// Whether the payload carries anything worth dispatching.
    pub fn has_payload(&self) -> bool {
        !self.payload.is_empty()
    }
}
