//! Request and response envelopes.
//!
//! Every request carries a string `request_id` and an `action` verb naming one
//! of the [`Command`] variants. Every response echoes the id and reports
//! `result: "ok"` or `result: "error"` with a message.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Result marker of a successful envelope.
pub const RESULT_OK: &str = "ok";
/// Result marker of a failed envelope.
pub const RESULT_ERROR: &str = "error";

/// A data verb with its fields.
///
/// Fields are optional at the decoding level so a missing field is reported
/// with a protocol message rather than a decoder error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Command {
    GetProperties {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        object_name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        property_name: Option<String>,
    },
    SetProperty {
        #[serde(default)]
        object_name: Option<String>,
        #[serde(default)]
        property_name: Option<String>,
        #[serde(default)]
        value: Value,
    },
    Execute {
        #[serde(default)]
        object_name: Option<String>,
        #[serde(default)]
        action_name: Option<String>,
        #[serde(default)]
        parameters: Option<Map<String, Value>>,
    },
}

impl Command {
    /// Verbs understood by the dispatcher.
    pub const VERBS: [&'static str; 3] = ["get_properties", "set_property", "execute"];

    pub fn verb(&self) -> &'static str {
        match self {
            Command::GetProperties { .. } => "get_properties",
            Command::SetProperty { .. } => "set_property",
            Command::Execute { .. } => "execute",
        }
    }
}

/// A full request as sent by a client.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Request {
    pub request_id: String,
    #[serde(flatten)]
    pub command: Command,
}

/// A response envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub request_id: Option<String>,
    pub result: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Verb-specific fields (`objects`, `value`).
    #[serde(flatten)]
    pub body: Map<String, Value>,
}

impl Response {
    pub fn ok(request_id: impl Into<String>, body: Map<String, Value>) -> Self {
        Self {
            request_id: Some(request_id.into()),
            result: RESULT_OK.to_string(),
            message: None,
            body,
        }
    }

    pub fn error(request_id: Option<String>, message: impl Into<String>) -> Self {
        Self {
            request_id,
            result: RESULT_ERROR.to_string(),
            message: Some(message.into()),
            body: Map::new(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.result == RESULT_OK
    }

    /// Encode as JSON text.
    pub fn to_text(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            serde_json::json!({
                "request_id": self.request_id,
                "result": RESULT_ERROR,
                "message": format!("failed to encode response: {}", e),
            })
            .to_string()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_encoding() {
        let request = Request {
            request_id: "7".into(),
            command: Command::SetProperty {
                object_name: Some("Sample".into()),
                property_name: Some("rate".into()),
                value: json!(50),
            },
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "request_id": "7",
                "action": "set_property",
                "object_name": "Sample",
                "property_name": "rate",
                "value": 50
            })
        );
    }

    #[test]
    fn test_command_decoding_ignores_request_id() {
        let command: Command = serde_json::from_value(json!({
            "request_id": "1",
            "action": "get_properties",
            "object_name": "Sample"
        }))
        .unwrap();
        assert_eq!(
            command,
            Command::GetProperties {
                object_name: Some("Sample".into()),
                property_name: None
            }
        );
        assert_eq!(command.verb(), "get_properties");
    }

    #[test]
    fn test_error_envelope() {
        let response = Response::error(None, "Wrong request method");
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({"request_id": null, "result": "error", "message": "Wrong request method"})
        );
        assert!(!response.is_ok());

        let mut body = Map::new();
        body.insert("value".into(), json!(true));
        let response: Response =
            serde_json::from_str(&Response::ok("3", body).to_text()).unwrap();
        assert!(response.is_ok());
        assert_eq!(response.body["value"], json!(true));
    }
}
