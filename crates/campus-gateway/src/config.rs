//! Gateway configuration types.
//!
//! This module defines configuration structures for the HTTP/WebSocket gateway.

use std::time::Duration;

use serde::Deserialize;

/// Configuration for the gateway service.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// Listen address (e.g., "0.0.0.0:8080").
    #[serde(default = "GatewayConfig::default_listen_addr")]
    pub listen_addr: String,

    /// `RocksDB` data directory.
    #[serde(default = "GatewayConfig::default_data_dir")]
    pub data_dir: String,

    /// Allowed CORS origins.
    #[serde(default)]
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes.
    #[serde(default = "GatewayConfig::default_max_body")]
    pub max_body_bytes: usize,

    /// Request timeout in seconds.
    #[serde(default = "GatewayConfig::default_request_timeout")]
    pub request_timeout_seconds: u64,

    /// A WebSocket that sends nothing for this long is closed.
    #[serde(default = "GatewayConfig::default_ws_timeout")]
    pub websocket_timeout_seconds: u64,

    /// Seconds between server pings on a WebSocket.
    #[serde(default = "GatewayConfig::default_heartbeat")]
    pub heartbeat_interval_seconds: u64,

    /// Outbound frames buffered per session before it counts as dead.
    #[serde(default = "GatewayConfig::default_outbound_buffer")]
    pub outbound_buffer: usize,

    /// History page size when the client gives none.
    #[serde(default = "GatewayConfig::default_history_limit")]
    pub default_history_limit: usize,

    /// Largest history page a client may request.
    #[serde(default = "GatewayConfig::default_max_history_limit")]
    pub max_history_limit: usize,
}

impl GatewayConfig {
    fn default_listen_addr() -> String {
        "0.0.0.0:8080".to_string()
    }

    fn default_data_dir() -> String {
        "/data/campus".to_string()
    }

    const fn default_max_body() -> usize {
        1024 * 1024 // 1 MB
    }

    const fn default_request_timeout() -> u64 {
        30
    }

    const fn default_ws_timeout() -> u64 {
        90
    }

    const fn default_heartbeat() -> u64 {
        30
    }

    const fn default_outbound_buffer() -> usize {
        campus_realtime::DEFAULT_OUTBOUND_BUFFER
    }

    const fn default_history_limit() -> usize {
        50
    }

    const fn default_max_history_limit() -> usize {
        200
    }

    /// Load configuration from environment variables, falling back to defaults.
    ///
    /// Supported environment variables:
    /// - `LISTEN_ADDR`, `DATA_DIR`
    /// - `CORS_ORIGINS`: comma-separated origins, `*` for any
    /// - `MAX_BODY_BYTES`, `REQUEST_TIMEOUT_SECONDS`
    /// - `WS_IDLE_TIMEOUT_SECONDS`, `WS_HEARTBEAT_SECONDS`, `WS_OUTBOUND_BUFFER`
    /// - `HISTORY_DEFAULT_LIMIT`, `HISTORY_MAX_LIMIT`
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("LISTEN_ADDR") {
            config.listen_addr = val;
        }
        if let Ok(val) = std::env::var("DATA_DIR") {
            config.data_dir = val;
        }
        if let Ok(val) = std::env::var("CORS_ORIGINS") {
            config.cors_origins = val
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(n) = env_parse("MAX_BODY_BYTES") {
            config.max_body_bytes = n;
        }
        if let Some(n) = env_parse("REQUEST_TIMEOUT_SECONDS") {
            config.request_timeout_seconds = n;
        }
        if let Some(n) = env_parse("WS_IDLE_TIMEOUT_SECONDS") {
            config.websocket_timeout_seconds = n;
        }
        if let Some(n) = env_parse("WS_HEARTBEAT_SECONDS") {
            config.heartbeat_interval_seconds = n;
        }
        if let Some(n) = env_parse("WS_OUTBOUND_BUFFER") {
            config.outbound_buffer = n;
        }
        if let Some(n) = env_parse("HISTORY_DEFAULT_LIMIT") {
            config.default_history_limit = n;
        }
        if let Some(n) = env_parse("HISTORY_MAX_LIMIT") {
            config.max_history_limit = n;
        }

        config
    }

    /// Get the WebSocket idle timeout as a `Duration`.
    #[must_use]
    pub fn websocket_timeout(&self) -> Duration {
        Duration::from_secs(self.websocket_timeout_seconds)
    }

    /// Get the WebSocket ping interval as a `Duration`.
    #[must_use]
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_seconds.max(1))
    }

    /// Get the request timeout as a `Duration`.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    /// Clamp a requested history page size.
    #[must_use]
    pub fn history_limit(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_history_limit)
            .clamp(1, self.max_history_limit.max(1))
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: Self::default_listen_addr(),
            data_dir: Self::default_data_dir(),
            cors_origins: vec!["*".to_string()],
            max_body_bytes: Self::default_max_body(),
            request_timeout_seconds: Self::default_request_timeout(),
            websocket_timeout_seconds: Self::default_ws_timeout(),
            heartbeat_interval_seconds: Self::default_heartbeat(),
            outbound_buffer: Self::default_outbound_buffer(),
            default_history_limit: Self::default_history_limit(),
            max_history_limit: Self::default_max_history_limit(),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = GatewayConfig::default();
        assert_eq!(config.listen_addr, "0.0.0.0:8080");
        assert_eq!(config.websocket_timeout_seconds, 90);
        assert_eq!(config.max_body_bytes, 1024 * 1024);
        assert_eq!(config.outbound_buffer, 64);
    }

    #[test]
    fn timeout_duration() {
        let config = GatewayConfig::default();
        assert_eq!(config.websocket_timeout(), Duration::from_secs(90));
        assert_eq!(config.heartbeat_interval(), Duration::from_secs(30));
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn history_limit_is_clamped() {
        let config = GatewayConfig::default();
        assert_eq!(config.history_limit(None), 50);
        assert_eq!(config.history_limit(Some(0)), 1);
        assert_eq!(config.history_limit(Some(10_000)), 200);
    }

    #[test]
    fn deserialize_with_defaults() {
        let config: GatewayConfig =
            serde_json::from_str(r#"{"listen_addr": "127.0.0.1:9000"}"#).unwrap();
        assert_eq!(config.listen_addr, "127.0.0.1:9000");
        assert_eq!(config.heartbeat_interval_seconds, 30);
        assert!(config.cors_origins.is_empty());
    }
}
