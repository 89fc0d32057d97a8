//! Centralized configuration for SJMP.
//!
//! Wire-level constants shared by the server and the client, and the defaults
//! used when a server is started without explicit settings.

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

/// Protocol-level constants.
pub struct ProtocolConfig;

impl ProtocolConfig {
    pub const VERSION: &'static str = "1.0";
    pub const SCHEMA_TYPE: &'static str = "SimpleJMP/schema";
    pub const MAX_REQUEST_LENGTH: usize = 1024 * 1024; // 1MB
    pub const MAX_RESPONSE_LENGTH: usize = 1024 * 1024; // 1MB
    pub const CONTENT_TYPE: &'static str = "text/json; charset=utf-8";
}

/// Server defaults.
pub struct ServerDefaults;

impl ServerDefaults {
    pub const PORT_MIN: u16 = 40234;
    pub const PORT_MAX: u16 = Self::PORT_MIN + 1000;
    pub const SCHEMA_PUSH_INTERVAL: Duration = Duration::from_secs(60);
    pub const BIND_HOST: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);
}

/// Client defaults.
pub struct ClientConfig;

impl ClientConfig {
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_port_range() {
        assert_eq!(ServerDefaults::PORT_MIN, 40234);
        assert_eq!(ServerDefaults::PORT_MAX, 41234);
        assert!(ServerDefaults::BIND_HOST.is_unspecified());
    }
}
