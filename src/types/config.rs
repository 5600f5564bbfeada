//! Configuration structures.
//!
//! Defaults describe the production deployment; `Config::from_env` overlays
//! environment variables on top of them.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Global gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Inbound server configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// Sandbox backend configuration.
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// Bearer auth and OAuth discovery configuration.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Path virtualization bounds.
    #[serde(default)]
    pub paths: PathMapConfig,

    /// Observability configuration.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Defaults overlaid with `PORT` and the `GATEWAY_*` environment variables.
    ///
    /// Unparseable values are ignored with a warning rather than aborting startup.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Config::default();

        if let Some(port) = lookup("PORT") {
            match port.trim().parse::<u16>() {
                Ok(p) => config.server.port = p,
                Err(_) => tracing::warn!(value = %port, "ignoring invalid PORT"),
            }
        }
        if let Some(host) = lookup("GATEWAY_HOST") {
            config.server.host = host;
        }
        if let Some(url) = lookup("GATEWAY_PUBLIC_URL") {
            config.server.public_url = Some(url);
        }
        if let Some(url) = lookup("GATEWAY_UPSTREAM_URL") {
            config.upstream.base_url = url;
        }
        if let Some(timeout) = lookup("GATEWAY_TOOL_TIMEOUT") {
            match humantime_serde::re::humantime::parse_duration(&timeout) {
                Ok(d) => config.upstream.tool_call_timeout = d,
                Err(_) => tracing::warn!(value = %timeout, "ignoring invalid GATEWAY_TOOL_TIMEOUT"),
            }
        }
        if let Some(format) = lookup("GATEWAY_LOG_FORMAT") {
            config.observability.json_logs = format.eq_ignore_ascii_case("json");
        }

        config
    }
}

/// Inbound server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Interface to bind.
    pub host: String,

    /// Listen port (`PORT`).
    pub port: u16,

    /// Path of the MCP endpoint.
    pub mcp_path: String,

    /// Externally visible base URL; derived from host/port when unset.
    pub public_url: Option<String>,

    /// Name and version reported in `initialize`.
    pub server_name: String,
    pub server_version: String,
}

impl ServerConfig {
    /// Base URL clients use to reach this gateway, without a trailing slash.
    pub fn public_base_url(&self) -> String {
        match &self.public_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("http://localhost:{}", self.port),
        }
    }

    /// Full URL of the protected MCP resource.
    pub fn resource_url(&self) -> String {
        format!("{}{}", self.public_base_url(), self.mcp_path)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            mcp_path: "/mcp".to_string(),
            public_url: None,
            server_name: "deepbits-mcp-server".to_string(),
            server_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Sandbox backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Backend origin; the MCP and upload paths are resolved against it.
    pub base_url: String,

    pub mcp_path: String,

    pub upload_path: String,

    /// Name and version this gateway presents when initializing upstream.
    pub client_name: String,

    /// Deadline for the initialize handshake and catalog listing.
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,

    /// Deadline for a single forwarded tool call.
    #[serde(with = "humantime_serde")]
    pub tool_call_timeout: Duration,

    /// Tools with these name prefixes are backend-internal and never mirrored.
    pub reserved_prefixes: Vec<String>,

    /// Tool whose invocation first uploads the local file into the sandbox.
    pub sandbox_open_tool: String,

    /// Argument carrying a caller-local file path.
    pub filepath_field: String,

    /// Prefix prepended to the `pathname` returned by the upload endpoint.
    pub sandbox_root: String,
}

impl UpstreamConfig {
    pub fn mcp_url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), self.mcp_path)
    }

    pub fn upload_url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), self.upload_path)
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "https://mcp.deepbits.com".to_string(),
            mcp_path: "/mcp".to_string(),
            upload_path: "/workspace/upload".to_string(),
            client_name: "deepbits-mcp-client".to_string(),
            connect_timeout: Duration::from_secs(30),
            tool_call_timeout: Duration::from_secs(60 * 60),
            reserved_prefixes: vec!["sandbox_".to_string(), "workspace_".to_string()],
            sandbox_open_tool: "ghidra_open_server".to_string(),
            filepath_field: "filepath".to_string(),
            sandbox_root: "/sandbox".to_string(),
        }
    }
}

/// Bearer auth and OAuth discovery configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Authorization server issuer; its `/authorize`, `/token` and `/revoke`
    /// endpoints are advertised in metadata.
    pub issuer_url: String,

    pub scopes_supported: Vec<String>,

    /// Scopes every token must carry. Empty means no scope check.
    pub required_scopes: Vec<String>,

    /// Redirect target handed out by the stub client registry.
    pub redirect_uri: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            issuer_url: "https://mcp.deepbits.com".to_string(),
            scopes_supported: ["openid", "profile", "email", "offline_access"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            required_scopes: Vec::new(),
            redirect_uri: "http://localhost:3000/callback".to_string(),
        }
    }
}

/// Path virtualization bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathMapConfig {
    /// Maximum retained mappings; the oldest insertion is evicted first.
    pub max_entries: usize,

    /// Age after which a mapping is treated as absent.
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,
}

impl Default for PathMapConfig {
    fn default() -> Self {
        Self {
            max_entries: 4096,
            ttl: Duration::from_secs(24 * 60 * 60),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Tracing log level used when `RUST_LOG` is unset.
    pub log_level: String,

    /// Enable JSON log formatting.
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(|_| None);
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.upstream.mcp_url(), "https://mcp.deepbits.com/mcp");
        assert_eq!(
            config.upstream.upload_url(),
            "https://mcp.deepbits.com/workspace/upload"
        );
        assert_eq!(config.upstream.tool_call_timeout, Duration::from_secs(3600));
        assert_eq!(config.server.resource_url(), "http://localhost:3000/mcp");
    }

    #[test]
    fn test_port_from_env() {
        let config = Config::from_lookup(lookup_from(&[("PORT", "8080")]));
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.resource_url(), "http://localhost:8080/mcp");
    }

    #[test]
    fn test_invalid_port_keeps_default() {
        let config = Config::from_lookup(lookup_from(&[("PORT", "not-a-port")]));
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn test_upstream_and_timeout_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("GATEWAY_UPSTREAM_URL", "http://127.0.0.1:9999/"),
            ("GATEWAY_TOOL_TIMEOUT", "90s"),
            ("GATEWAY_PUBLIC_URL", "https://gw.example.com/"),
        ]));
        assert_eq!(config.upstream.mcp_url(), "http://127.0.0.1:9999/mcp");
        assert_eq!(config.upstream.tool_call_timeout, Duration::from_secs(90));
        assert_eq!(config.server.resource_url(), "https://gw.example.com/mcp");
    }

    #[test]
    fn test_config_deserializes_humantime() {
        let config: Config = serde_json::from_value(serde_json::json!({
            "paths": {"max_entries": 10, "ttl": "5m"}
        }))
        .unwrap();
        assert_eq!(config.paths.max_entries, 10);
        assert_eq!(config.paths.ttl, Duration::from_secs(300));
        assert_eq!(config.server.port, 3000);
    }
}
