//! Service Configuration Module
//!
//! Server and event stream settings. Configuration is loaded from environment
//! variables with sensible defaults for development. Database settings live
//! in [`crate::db::DbConfig`], telemetry settings in
//! [`crate::telemetry::TelemetryConfig`].

use crate::constants::*;
use orderinfo_core::ConfigError;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

/// Look up a variable in the process environment.
pub(crate) fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Parse a boolean flag; anything but "false"/"0"/"no" counts as true.
pub(crate) fn parse_flag(value: Option<String>, default: bool) -> bool {
    match value {
        Some(v) => !matches!(v.trim().to_lowercase().as_str(), "false" | "0" | "no"),
        None => default,
    }
}

// ============================================================================
// API CONFIGURATION
// ============================================================================

/// HTTP server and lifecycle configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiConfig {
    /// Address to bind the listener to.
    pub bind_addr: IpAddr,

    /// Port to listen on.
    pub port: u16,

    /// Per-request timeout.
    pub request_timeout: Duration,

    /// How long in-flight requests may run after shutdown is signalled.
    pub shutdown_grace: Duration,

    /// Whether to rebuild the cache from the store at startup.
    pub cache_warmup: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: IpAddr::from([0, 0, 0, 0]),
            port: DEFAULT_API_PORT,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            shutdown_grace: Duration::from_secs(DEFAULT_SHUTDOWN_GRACE_SECS),
            cache_warmup: true,
        }
    }
}

impl ApiConfig {
    /// Create ApiConfig from environment variables.
    ///
    /// Environment variables:
    /// - `ORDERS_API_BIND`: Bind address (default: 0.0.0.0)
    /// - `ORDERS_API_PORT` or `PORT`: Listen port (default: 8080)
    /// - `ORDERS_REQUEST_TIMEOUT_SECS`: Per-request timeout (default: 10)
    /// - `ORDERS_SHUTDOWN_GRACE_SECS`: Graceful shutdown bound (default: 10)
    /// - `ORDERS_CACHE_WARMUP`: "true" or "false" (default: true)
    ///
    /// An unparsable port or bind address is an error; other unparsable
    /// values fall back to their defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_source(env_var)
    }

    /// Build from an arbitrary variable source.
    pub fn from_source(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let bind_addr = match get("ORDERS_API_BIND") {
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                field: "ORDERS_API_BIND".to_string(),
                value: raw.clone(),
                reason: "must be an IP address".to_string(),
            })?,
            None => defaults.bind_addr,
        };

        // ORDERS_API_PORT wins over the platform-provided PORT
        let port_var = get("ORDERS_API_PORT")
            .map(|v| ("ORDERS_API_PORT", v))
            .or_else(|| get("PORT").map(|v| ("PORT", v)));
        let port = match port_var {
            Some((field, raw)) => {
                raw.trim()
                    .parse::<u16>()
                    .map_err(|_| ConfigError::InvalidValue {
                        field: field.to_string(),
                        value: raw.clone(),
                        reason: "must be a port number".to_string(),
                    })?
            }
            None => defaults.port,
        };

        let request_timeout = get("ORDERS_REQUEST_TIMEOUT_SECS")
            .and_then(|s| s.trim().parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.request_timeout);

        let shutdown_grace = get("ORDERS_SHUTDOWN_GRACE_SECS")
            .and_then(|s| s.trim().parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.shutdown_grace);

        let cache_warmup = parse_flag(get("ORDERS_CACHE_WARMUP"), defaults.cache_warmup);

        Ok(Self {
            bind_addr,
            port,
            request_timeout,
            shutdown_grace,
            cache_warmup,
        })
    }

    /// Socket address for the listener.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.port)
    }
}

// ============================================================================
// EVENT STREAM CONFIGURATION
// ============================================================================

/// Event stream consumer configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConfig {
    /// Broker addresses.
    pub brokers: Vec<String>,

    /// Subject the orders are published on.
    pub topic: String,

    /// Stream that captures the subject.
    pub stream_name: String,

    /// Durable consumer name shared by all instances of the service.
    pub group: String,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            brokers: vec![DEFAULT_STREAM_BROKER.to_string()],
            topic: DEFAULT_STREAM_TOPIC.to_string(),
            stream_name: DEFAULT_STREAM_NAME.to_string(),
            group: DEFAULT_STREAM_GROUP.to_string(),
        }
    }
}

impl StreamConfig {
    /// Create StreamConfig from environment variables.
    ///
    /// Environment variables:
    /// - `ORDERS_STREAM_BROKERS`: Comma-separated broker URLs (default: nats://localhost:4222)
    /// - `ORDERS_STREAM_TOPIC`: Subject to consume (default: orders)
    /// - `ORDERS_STREAM_NAME`: Stream name (default: ORDERS)
    /// - `ORDERS_STREAM_GROUP`: Durable consumer name (default: order-service)
    pub fn from_env() -> Self {
        Self::from_source(env_var)
    }

    /// Build from an arbitrary variable source.
    pub fn from_source(get: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let brokers = get("ORDERS_STREAM_BROKERS")
            .map(|s| {
                s.split(',')
                    .map(|b| b.trim().to_string())
                    .filter(|b| !b.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|brokers| !brokers.is_empty())
            .unwrap_or(defaults.brokers);

        let non_empty = |key: &str| get(key).map(|s| s.trim().to_string()).filter(|s| !s.is_empty());

        Self {
            brokers,
            topic: non_empty("ORDERS_STREAM_TOPIC").unwrap_or(defaults.topic),
            stream_name: non_empty("ORDERS_STREAM_NAME").unwrap_or(defaults.stream_name),
            group: non_empty("ORDERS_STREAM_GROUP").unwrap_or(defaults.group),
        }
    }

    /// Broker addresses joined for the client connect call.
    pub fn broker_list(&self) -> String {
        self.brokers.join(",")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn source(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = ApiConfig::from_source(source(&[])).unwrap();
        assert_eq!(config, ApiConfig::default());
        assert_eq!(config.port, 8080);
        assert_eq!(config.shutdown_grace, Duration::from_secs(10));
        assert!(config.cache_warmup);
        assert_eq!(config.socket_addr().to_string(), "0.0.0.0:8080");
    }

    #[test]
    fn test_port_precedence() {
        let config = ApiConfig::from_source(source(&[("PORT", "9000")])).unwrap();
        assert_eq!(config.port, 9000);

        let config =
            ApiConfig::from_source(source(&[("PORT", "9000"), ("ORDERS_API_PORT", "9100")]))
                .unwrap();
        assert_eq!(config.port, 9100);
    }

    #[test]
    fn test_invalid_port_is_error() {
        let err = ApiConfig::from_source(source(&[("ORDERS_API_PORT", "eighty")])).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { ref field, .. } if field == "ORDERS_API_PORT"
        ));

        let err = ApiConfig::from_source(source(&[("PORT", "70000")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_unparsable_durations_fall_back() {
        let config = ApiConfig::from_source(source(&[
            ("ORDERS_REQUEST_TIMEOUT_SECS", "soon"),
            ("ORDERS_SHUTDOWN_GRACE_SECS", "3"),
            ("ORDERS_CACHE_WARMUP", "false"),
        ]))
        .unwrap();
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert_eq!(config.shutdown_grace, Duration::from_secs(3));
        assert!(!config.cache_warmup);
    }

    #[test]
    fn test_stream_config_defaults() {
        let config = StreamConfig::from_source(source(&[]));
        assert_eq!(config, StreamConfig::default());
        assert_eq!(config.broker_list(), "nats://localhost:4222");
        assert_eq!(config.topic, "orders");
        assert_eq!(config.group, "order-service");
    }

    #[test]
    fn test_stream_config_brokers_split() {
        let config = StreamConfig::from_source(source(&[
            ("ORDERS_STREAM_BROKERS", " nats://a:4222, ,nats://b:4222 "),
            ("ORDERS_STREAM_TOPIC", "orders.created"),
            ("ORDERS_STREAM_GROUP", "  "),
        ]));
        assert_eq!(config.brokers, vec!["nats://a:4222", "nats://b:4222"]);
        assert_eq!(config.topic, "orders.created");
        assert_eq!(config.group, "order-service");
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag(None, true));
        assert!(!parse_flag(None, false));
        assert!(!parse_flag(Some("FALSE".to_string()), true));
        assert!(!parse_flag(Some("0".to_string()), true));
        assert!(parse_flag(Some("yes".to_string()), false));
    }
}
