//! HTTP client stub for SJMP servers.
//!
//! Sends the three data verbs and the schema fetch, stamps every request with
//! a per-client increasing correlation id and unwraps the response envelope.
//!
//! A non-"ok" envelope becomes [`SjmpError::Protocol`] carrying the server's
//! message; anything wrong with the transport (connection failure, non-200
//! status, oversized or malformed body) becomes [`SjmpError::Transport`].

use crate::config::{ClientConfig, ProtocolConfig};
use crate::error::{Result, SjmpError};
use crate::protocol::{Command, Request, Response};
use crate::schema::Schema;
use reqwest::{header, Client, StatusCode};
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;
use url::Url;

#[derive(Debug, Clone)]
struct Credentials {
    username: String,
    password: String,
}

/// Client for one SJMP server.
#[derive(Debug)]
pub struct SjmpClient {
    client: Client,
    url: Url,
    credentials: Option<Credentials>,
    next_id: AtomicU64,
}

impl SjmpClient {
    /// Create a client for the server at `url`.
    pub fn new(url: &str) -> Result<Self> {
        let url = Url::parse(url).map_err(|e| SjmpError::Config {
            message: format!("invalid server url '{}': {}", url, e),
        })?;
        let client = Client::builder()
            .timeout(ClientConfig::REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            url,
            credentials: None,
            next_id: AtomicU64::new(1),
        })
    }

    /// Send HTTP Basic credentials with every request.
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some(Credentials {
            username: username.into(),
            password: password.into(),
        });
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Fetch the schema document.
    pub async fn schema(&self) -> Result<Schema> {
        let body = self.post(String::new()).await?;
        let value: Value = serde_json::from_slice(&body).map_err(transport_parse)?;
        check_result(&value)?;
        serde_json::from_value(value).map_err(transport_parse)
    }

    /// Read property values, keyed by object name.
    pub async fn get_properties(
        &self,
        object: Option<&str>,
        property: Option<&str>,
    ) -> Result<Map<String, Value>> {
        let mut response = self
            .call(Command::GetProperties {
                object_name: object.map(str::to_string),
                property_name: property.map(str::to_string),
            })
            .await?;
        match response.body.remove("objects") {
            Some(Value::Object(objects)) => Ok(objects),
            _ => Err(SjmpError::Transport {
                message: "response has no 'objects' map".to_string(),
            }),
        }
    }

    /// Read a single property value.
    pub async fn get_property(&self, object: &str, property: &str) -> Result<Value> {
        let mut objects = self.get_properties(Some(object), Some(property)).await?;
        objects
            .get_mut(object)
            .and_then(|values| values.get_mut(property))
            .map(Value::take)
            .ok_or_else(|| SjmpError::Transport {
                message: format!("response has no value for {}.{}", object, property),
            })
    }

    pub async fn set_property(&self, object: &str, property: &str, value: Value) -> Result<()> {
        self.call(Command::SetProperty {
            object_name: Some(object.to_string()),
            property_name: Some(property.to_string()),
            value,
        })
        .await?;
        Ok(())
    }

    /// Invoke an action and return its result value (`null` for void).
    pub async fn execute(
        &self,
        object: &str,
        action: &str,
        parameters: Map<String, Value>,
    ) -> Result<Value> {
        let mut response = self
            .call(Command::Execute {
                object_name: Some(object.to_string()),
                action_name: Some(action.to_string()),
                parameters: Some(parameters),
            })
            .await?;
        Ok(response.body.remove("value").unwrap_or(Value::Null))
    }

    async fn call(&self, command: Command) -> Result<Response> {
        let request_id = self.next_id.fetch_add(1, Ordering::Relaxed).to_string();
        debug!("SJMP {} request {} to {}", command.verb(), request_id, self.url);

        let request = Request {
            request_id: request_id.clone(),
            command,
        };
        let body = self.post(serde_json::to_string(&request)?).await?;
        let response: Response = serde_json::from_slice(&body).map_err(transport_parse)?;

        if !response.is_ok() {
            return Err(SjmpError::Protocol {
                message: response
                    .message
                    .unwrap_or_else(|| "no message".to_string()),
            });
        }
        if response.request_id.as_deref() != Some(request_id.as_str()) {
            return Err(SjmpError::Transport {
                message: format!(
                    "response id {:?} does not match request id {}",
                    response.request_id, request_id
                ),
            });
        }
        Ok(response)
    }

    async fn post(&self, body: String) -> Result<Vec<u8>> {
        let mut request = self
            .client
            .post(self.url.clone())
            .header(header::CONTENT_TYPE, ProtocolConfig::CONTENT_TYPE)
            .body(body);
        if let Some(credentials) = &self.credentials {
            request = request.basic_auth(&credentials.username, Some(&credentials.password));
        }

        let mut response = request.send().await?;
        if response.status() != StatusCode::OK {
            return Err(SjmpError::Transport {
                message: format!("server responded with HTTP {}", response.status()),
            });
        }

        read_capped(&mut response, ProtocolConfig::MAX_RESPONSE_LENGTH).await
    }
}

/// Read a response body, failing once it exceeds `limit` bytes.
pub async fn read_capped(response: &mut reqwest::Response, limit: usize) -> Result<Vec<u8>> {
    let mut body = Vec::new();
    while let Some(chunk) = response.chunk().await? {
        if body.len() + chunk.len() > limit {
            return Err(SjmpError::Transport {
                message: format!("response exceeds {} bytes", limit),
            });
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}

/// Check the `result` field of a decoded envelope.
pub fn check_result(value: &Value) -> Result<()> {
    match value.get("result").and_then(Value::as_str) {
        Some("ok") => Ok(()),
        Some(_) => Err(SjmpError::Protocol {
            message: value
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("no message")
                .to_string(),
        }),
        None => Err(SjmpError::Transport {
            message: "response has no result field".to_string(),
        }),
    }
}

fn transport_parse(e: serde_json::Error) -> SjmpError {
    SjmpError::Transport {
        message: format!("malformed response: {}", e),
    }
}
