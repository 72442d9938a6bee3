//! Action descriptors carried in notification payloads.
//!
//! A payload names one or more handler invocations:
//!
//! ```json
//! {"functionAction": {"functions": [
//!     {"name": "set_layer_index", "parameters": {"tableName": "v_edit_arc"}},
//!     {"name": "refresh_canvas", "parameters": {}}
//! ]}}
//! ```
//!
//! The order of `functions` is the dispatch order.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Keyword arguments passed to a handler.
pub type Parameters = serde_json::Map<String, serde_json::Value>;

/// Parsed form of a notification payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionDescriptor {
    #[serde(rename = "functionAction")]
    pub function_action: FunctionAction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionAction {
    pub functions: Vec<FunctionCall>,
}

/// A single named handler invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// Omitted parameters mean "call with no arguments".
    #[serde(default)]
    pub parameters: Parameters,
}

impl ActionDescriptor {
    /// Parse a raw payload.
    ///
    /// Invalid JSON and JSON lacking `functionAction.functions[].name` are
    /// both reported as [`CoreError::MalformedPayload`].
    pub fn parse(payload: &str) -> Result<Self, CoreError> {
        Ok(serde_json::from_str(payload)?)
    }

    /// Build a descriptor from a list of calls.
    pub fn from_calls(functions: Vec<FunctionCall>) -> Self {
        Self {
            function_action: FunctionAction { functions },
        }
    }

    pub fn functions(&self) -> &[FunctionCall] {
        &self.function_action.functions
    }

    /// Encode back to the wire format, e.g. for `pg_notify`.
    pub fn to_payload(&self) -> Result<String, CoreError> {
        Ok(serde_json::to_string(self)?)
    }
}

impl FunctionCall {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: Parameters::new(),
        }
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_functions_in_order() {
        let payload = r#"{"functionAction":{"functions":[
            {"name":"set_layer_index","parameters":{"tableName":"v_edit_arc"}},
            {"name":"refresh_canvas","parameters":{}}
        ]}}"#;

        let descriptor = ActionDescriptor::parse(payload).expect("payload should parse");
        let names: Vec<&str> = descriptor.functions().iter().map(|f| f.name.as_str()).collect();

        assert_eq!(names, ["set_layer_index", "refresh_canvas"]);
        assert_eq!(descriptor.functions()[0].parameters["tableName"], "v_edit_arc");
        assert!(descriptor.functions()[1].parameters.is_empty());
    }

    #[test]
    fn missing_parameters_default_to_empty() {
        let descriptor =
            ActionDescriptor::parse(r#"{"functionAction":{"functions":[{"name":"refresh_canvas"}]}}"#)
                .expect("payload should parse");

        assert!(descriptor.functions()[0].parameters.is_empty());
    }

    #[test]
    fn empty_function_list_is_valid() {
        let descriptor = ActionDescriptor::parse(r#"{"functionAction":{"functions":[]}}"#)
            .expect("payload should parse");
        assert!(descriptor.functions().is_empty());
    }

    #[test]
    fn truncated_json_is_malformed() {
        let result = ActionDescriptor::parse(r#"{"functionAction":{"functions":[{"name":"#);
        assert_matches!(result, Err(CoreError::MalformedPayload(_)));
    }

    #[test]
    fn plain_text_is_malformed() {
        assert_matches!(
            ActionDescriptor::parse("layer updated"),
            Err(CoreError::MalformedPayload(_))
        );
    }

    #[test]
    fn missing_function_action_is_malformed() {
        assert_matches!(
            ActionDescriptor::parse(r#"{"functions":[]}"#),
            Err(CoreError::MalformedPayload(_))
        );
    }

    #[test]
    fn function_without_name_is_malformed() {
        assert_matches!(
            ActionDescriptor::parse(r#"{"functionAction":{"functions":[{"parameters":{}}]}}"#),
            Err(CoreError::MalformedPayload(_))
        );
    }

    #[test]
    fn builder_produces_wire_shape() {
        let descriptor = ActionDescriptor::from_calls(vec![FunctionCall::new("show_message")
            .with_parameter("text", json!("Psector updated"))
            .with_parameter("level", json!(1))]);

        let value: serde_json::Value =
            serde_json::from_str(&descriptor.to_payload().expect("should encode"))
                .expect("should be valid JSON");

        assert_eq!(
            value,
            json!({"functionAction": {"functions": [
                {"name": "show_message", "parameters": {"text": "Psector updated", "level": 1}}
            ]}})
        );
    }
}
