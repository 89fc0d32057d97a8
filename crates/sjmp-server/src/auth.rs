//! Optional HTTP Basic authorization.

use axum::http::{header, HeaderMap, HeaderValue};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// Decides whether a username/password pair may use the server.
pub trait Authorizer: Send + Sync + 'static {
    fn check_access(&self, username: &str, password: &str) -> bool;
}

/// A single fixed username/password pair.
#[derive(Debug, Clone)]
pub struct StaticCredentials {
    username: String,
    password: String,
}

impl StaticCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl Authorizer for StaticCredentials {
    fn check_access(&self, username: &str, password: &str) -> bool {
        username == self.username && password == self.password
    }
}

/// Decode `Authorization: Basic ...` into its username and password.
pub fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, encoded) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }

    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

/// Check the request headers. Empty usernames or passwords never pass.
pub fn is_authorized(authorizer: &dyn Authorizer, headers: &HeaderMap) -> bool {
    match basic_credentials(headers) {
        Some((username, password)) if !username.is_empty() && !password.is_empty() => {
            authorizer.check_access(&username, &password)
        }
        _ => false,
    }
}

/// `WWW-Authenticate` value for a server name.
pub fn challenge(server_name: &str) -> HeaderValue {
    let realm: String = server_name
        .chars()
        .filter(|c| *c != '"' && !c.is_control())
        .collect();
    HeaderValue::from_str(&format!("Basic realm=\"{}\"", realm))
        .unwrap_or_else(|_| HeaderValue::from_static("Basic"))
}
