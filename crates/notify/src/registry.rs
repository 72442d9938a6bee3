//! Named action handlers.
//!
//! A [`HandlerRegistry`] maps action names (the `name` of each entry in a
//! payload's function list) to handlers. It is filled at startup and then
//! shared read-only with the [`Dispatcher`](crate::Dispatcher).

use std::collections::HashMap;

use gw_core::{ActionDescriptor, FunctionCall, Parameters};
use serde::de::DeserializeOwned;
use serde::Deserialize;

/// Error type handlers may return.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

type Handler = Box<dyn Fn(&Parameters) -> Result<(), Fault> + Send + Sync>;

enum Fault {
    InvalidParameters(serde_json::Error),
    Failed(BoxError),
}

/// Parameter type for actions that take no arguments.
///
/// Rejects any key, so `{"foo": 1}` for such an action is reported as
/// [`DispatchError::InvalidParameters`].
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NoParameters {}

/// Why a single function entry was not carried out.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("No handler registered for action '{0}'")]
    UnknownAction(String),

    #[error("Invalid parameters for action '{action}': {source}")]
    InvalidParameters {
        action: String,
        source: serde_json::Error,
    },

    #[error("Handler for action '{action}' failed: {source}")]
    HandlerFailed { action: String, source: BoxError },
}

/// Outcome counts for one dispatched descriptor.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchReport {
    pub invoked: usize,
    pub unknown: usize,
    pub invalid: usize,
    pub failed: usize,
}

impl DispatchReport {
    pub fn merge(&mut self, other: DispatchReport) {
        self.invoked += other.invoked;
        self.unknown += other.unknown;
        self.invalid += other.invalid;
        self.failed += other.failed;
    }
}

/// Explicit action name → handler table.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Handler>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler that receives the raw parameter mapping.
    ///
    /// Replaces any handler previously registered under `name`.
    pub fn register<F>(&mut self, name: impl Into<String>, handler: F)
    where
        F: Fn(&Parameters) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.insert(
            name.into(),
            Box::new(move |params: &Parameters| handler(params).map_err(Fault::Failed)),
        );
    }

    /// Register a handler whose parameters are deserialized into `P`.
    ///
    /// If the payload's parameters do not fit `P` the handler is not
    /// called and the entry is reported as
    /// [`DispatchError::InvalidParameters`].
    pub fn register_fn<P, F>(&mut self, name: impl Into<String>, handler: F)
    where
        P: DeserializeOwned,
        F: Fn(P) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.insert(
            name.into(),
            Box::new(move |params: &Parameters| {
                let typed: P = serde_json::from_value(serde_json::Value::Object(params.clone()))
                    .map_err(Fault::InvalidParameters)?;
                handler(typed).map_err(Fault::Failed)
            }),
        );
    }

    fn insert(&mut self, name: String, handler: Handler) {
        if self.handlers.insert(name.clone(), handler).is_some() {
            tracing::debug!(action = %name, "Replaced existing action handler");
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Registered action names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Invoke the handler for a single function entry.
    pub fn invoke(&self, call: &FunctionCall) -> Result<(), DispatchError> {
        let handler = self
            .handlers
            .get(&call.name)
            .ok_or_else(|| DispatchError::UnknownAction(call.name.clone()))?;

        handler(&call.parameters).map_err(|fault| match fault {
            Fault::InvalidParameters(source) => DispatchError::InvalidParameters {
                action: call.name.clone(),
                source,
            },
            Fault::Failed(source) => DispatchError::HandlerFailed {
                action: call.name.clone(),
                source,
            },
        })
    }

    /// Invoke every function entry of `descriptor` in order.
    ///
    /// A failing entry is logged and counted; it never stops the entries
    /// after it.
    pub fn dispatch(&self, descriptor: &ActionDescriptor) -> DispatchReport {
        let mut report = DispatchReport::default();

        for call in descriptor.functions() {
            match self.invoke(call) {
                Ok(()) => report.invoked += 1,
                Err(e @ DispatchError::UnknownAction(_)) => {
                    tracing::warn!(action = %call.name, error = %e, "Skipping unknown action");
                    report.unknown += 1;
                }
                Err(e @ DispatchError::InvalidParameters { .. }) => {
                    tracing::warn!(action = %call.name, error = %e, "Skipping action with invalid parameters");
                    report.invalid += 1;
                }
                Err(e @ DispatchError::HandlerFailed { .. }) => {
                    tracing::error!(action = %call.name, error = %e, "Action handler failed");
                    report.failed += 1;
                }
            }
        }

        report
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("actions", &self.names())
            .finish()
    }
}
