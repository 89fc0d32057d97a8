//! Request dispatcher.
//!
//! Turns one request body into one reply. Stateless: everything goes through
//! the [`Registry`], which takes its reader lock only around lookup and host
//! access. JSON decoding and encoding happen outside the lock.

use crate::error::{Result, SjmpError};
use crate::protocol::{Command, Response};
use crate::registry::Registry;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Outcome of dispatching one body.
#[derive(Debug)]
pub enum Reply {
    /// Empty body: the cached schema text, sent verbatim.
    Schema(Arc<str>),
    /// A successful data verb.
    Ok(Response),
    /// A failed request. The id is `None` when it could not be decoded.
    Failed {
        request_id: Option<String>,
        error: SjmpError,
    },
}

impl Reply {
    pub fn is_ok(&self) -> bool {
        !matches!(self, Reply::Failed { .. })
    }

    pub fn error(&self) -> Option<&SjmpError> {
        match self {
            Reply::Failed { error, .. } => Some(error),
            _ => None,
        }
    }

    /// Encode the reply as response text.
    pub fn into_text(self) -> Arc<str> {
        match self {
            Reply::Schema(text) => text,
            Reply::Ok(response) => response.to_text().into(),
            Reply::Failed { request_id, error } => {
                Response::error(request_id, error.to_string()).to_text().into()
            }
        }
    }
}

/// Dispatch one raw request body.
pub fn handle_body(registry: &Registry, body: &[u8]) -> Reply {
    let text = match std::str::from_utf8(body) {
        Ok(text) => text,
        Err(_) => {
            return Reply::Failed {
                request_id: None,
                error: SjmpError::invalid_request("request body is not valid UTF-8"),
            }
        }
    };

    if text.trim().is_empty() {
        return Reply::Schema(registry.snapshot());
    }

    let (request_id, command) = match decode(text) {
        Ok(decoded) => decoded,
        Err((request_id, error)) => return Reply::Failed { request_id, error },
    };

    match run(registry, command) {
        Ok(body) => Reply::Ok(Response::ok(request_id, body)),
        Err(error) => Reply::Failed {
            request_id: Some(request_id),
            error,
        },
    }
}

type DecodeError = (Option<String>, SjmpError);

fn decode(text: &str) -> std::result::Result<(String, Command), DecodeError> {
    let value: Value = serde_json::from_str(text).map_err(|e| {
        (
            None,
            SjmpError::invalid_request(format!("malformed JSON: {}", e)),
        )
    })?;
    let fields = value
        .as_object()
        .ok_or_else(|| (None, SjmpError::invalid_request("request must be a JSON object")))?;

    let request_id = match fields.get("request_id") {
        Some(Value::String(id)) => id.clone(),
        _ => {
            return Err((
                None,
                SjmpError::invalid_request("request_id must be a string"),
            ))
        }
    };

    let verb = match fields.get("action") {
        Some(Value::String(verb)) => verb.as_str(),
        _ => {
            return Err((
                Some(request_id),
                SjmpError::invalid_request("action must be a string"),
            ))
        }
    };
    if !Command::VERBS.contains(&verb) {
        return Err((Some(request_id), SjmpError::UnsupportedVerb(verb.to_string())));
    }

    match serde_json::from_value::<Command>(value.clone()) {
        Ok(command) => Ok((request_id, command)),
        Err(e) => Err((Some(request_id), SjmpError::invalid_request(e.to_string()))),
    }
}

fn run(registry: &Registry, command: Command) -> Result<Map<String, Value>> {
    let mut body = Map::new();
    match command {
        Command::GetProperties {
            object_name,
            property_name,
        } => {
            let objects = registry.get_properties(object_name.as_deref(), property_name.as_deref())?;
            body.insert("objects".to_string(), Value::Object(objects));
        }
        Command::SetProperty {
            object_name: Some(object),
            property_name: Some(property),
            value,
        } => {
            registry.set_property(&object, &property, &value)?;
        }
        Command::SetProperty { .. } => {
            return Err(SjmpError::invalid_request(
                "You must set object_name and property_name fields",
            ))
        }
        Command::Execute {
            object_name: Some(object),
            action_name: Some(action),
            parameters: Some(parameters),
        } => {
            let value = registry.execute(&object, &action, &parameters)?;
            body.insert("value".to_string(), value.to_json());
        }
        Command::Execute { .. } => {
            return Err(SjmpError::invalid_request(
                "You must set object_name, action_name and parameters fields",
            ))
        }
    }
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ServerInfo;
    use serde_json::json;

    fn dispatch(registry: &Registry, body: Value) -> Value {
        let text = handle_body(registry, body.to_string().as_bytes()).into_text();
        serde_json::from_str(&text).unwrap()
    }

    #[test]
    fn test_empty_body_returns_schema() {
        let registry = Registry::new(ServerInfo::new("srv", "", ""));
        for body in ["", "   \r\n\t"] {
            let reply = handle_body(&registry, body.as_bytes());
            assert!(matches!(reply, Reply::Schema(_)));
            assert_eq!(reply.into_text(), registry.snapshot());
        }
    }

    #[test]
    fn test_malformed_requests() {
        let registry = Registry::new(ServerInfo::new("srv", "", ""));

        let reply = handle_body(&registry, b"{not json");
        assert!(matches!(reply.error(), Some(SjmpError::InvalidRequest { .. })));

        let response = dispatch(&registry, json!({"request_id": 5, "action": "get_properties"}));
        assert_eq!(response["request_id"], Value::Null);
        assert_eq!(response["result"], "error");

        let response = dispatch(&registry, json!({"request_id": "1", "action": "reboot"}));
        assert_eq!(response["request_id"], "1");
        assert!(response["message"].as_str().unwrap().contains("reboot"));

        let response = dispatch(
            &registry,
            json!({"request_id": "2", "action": "set_property", "object_name": "x"}),
        );
        assert_eq!(
            response["message"],
            "Invalid request: You must set object_name and property_name fields"
        );

        let response = dispatch(
            &registry,
            json!({"request_id": "3", "action": "execute", "object_name": "x", "action_name": "y"}),
        );
        assert!(response["message"].as_str().unwrap().contains("parameters"));

        let response = dispatch(
            &registry,
            json!({"request_id": "4", "action": "get_properties", "object_name": 12}),
        );
        assert_eq!(response["result"], "error");
    }

    #[test]
    fn test_get_properties_on_empty_registry() {
        let registry = Registry::new(ServerInfo::new("srv", "", ""));
        let response = dispatch(&registry, json!({"request_id": "9", "action": "get_properties"}));
        assert_eq!(
            response,
            json!({"request_id": "9", "result": "ok", "objects": {}})
        );
    }
}
