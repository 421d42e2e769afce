//! Configuration schema definitions.
//!
//! The container configuration is read from TOML. The `[webserver]` table is
//! kept raw and partitioned by [`WebServerConfig::from_table`]: `host`/`port`
//! are popped first, TLS keys are routed to [`TlsOptions`], and whatever is
//! left becomes [`ServerOptions`] for the HTTP engine.

use serde::{Deserialize, Serialize};

use crate::config::loader::ConfigError;

/// Name of the configuration table holding web server settings.
pub const WEBSERVER_CONFIG_KEY: &str = "webserver";

/// Host used when the configuration omits one (or leaves it empty).
pub const DEFAULT_WEBSERVER_HOST: &str = "0.0.0.0";

/// Port used when the configuration omits one.
pub const DEFAULT_WEBSERVER_PORT: u16 = 8000;

/// Every key in the `[webserver]` table that belongs to TLS setup.
pub const TLS_OPTION_KEYS: [&str; 9] = [
    "keyfile",
    "certfile",
    "server_side",
    "cert_reqs",
    "ssl_version",
    "ca_certs",
    "do_handshake_on_connect",
    "suppress_ragged_eofs",
    "ciphers",
];

/// Root configuration for a service container.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ContainerConfig {
    /// Service name, used as the first segment of every call id.
    pub service_name: String,

    /// Raw `[webserver]` table. See [`WebServerConfig::from_table`].
    pub webserver: toml::Table,

    /// Worker pool settings.
    pub worker: WorkerConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            service_name: "service".to_string(),
            webserver: toml::Table::new(),
            worker: WorkerConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl ContainerConfig {
    /// Partition the raw `[webserver]` table into a typed config.
    pub fn web_server(&self) -> Result<WebServerConfig, ConfigError> {
        WebServerConfig::from_table(&self.webserver)
    }
}

/// Worker pool configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Maximum number of business-logic workers running at once.
    pub max_workers: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self { max_workers: 10 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins when set.
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Typed web server configuration, read once at listener setup.
#[derive(Debug, Clone, PartialEq)]
pub struct WebServerConfig {
    pub host: String,
    pub port: u16,
    /// Present only when at least one TLS key was configured.
    pub tls: Option<TlsOptions>,
    pub server: ServerOptions,
}

impl Default for WebServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_WEBSERVER_HOST.to_string(),
            port: DEFAULT_WEBSERVER_PORT,
            tls: None,
            server: ServerOptions::default(),
        }
    }
}

impl WebServerConfig {
    /// Split a raw `[webserver]` table into host, port, TLS and engine options.
    ///
    /// An empty `host` falls back to the default. `port = 0` is kept and asks
    /// the OS for an ephemeral port.
    pub fn from_table(table: &toml::Table) -> Result<Self, ConfigError> {
        let mut rest = table.clone();

        let host = match rest.remove("host") {
            None => DEFAULT_WEBSERVER_HOST.to_string(),
            Some(toml::Value::String(h)) if h.trim().is_empty() => DEFAULT_WEBSERVER_HOST.to_string(),
            Some(toml::Value::String(h)) => h,
            Some(other) => return Err(ConfigError::invalid(field("host"), format!("expected a string, got {}", other.type_str()))),
        };

        let port = match rest.remove("port") {
            None => DEFAULT_WEBSERVER_PORT,
            Some(toml::Value::Integer(p)) => u16::try_from(p)
                .map_err(|_| ConfigError::invalid(field("port"), format!("{} is out of range", p)))?,
            Some(other) => return Err(ConfigError::invalid(field("port"), format!("expected an integer, got {}", other.type_str()))),
        };

        let mut tls_table = toml::Table::new();
        for key in TLS_OPTION_KEYS {
            if let Some(value) = rest.remove(key) {
                tls_table.insert(key.to_string(), value);
            }
        }

        let tls = if tls_table.is_empty() {
            None
        } else {
            let mut tls: TlsOptions = toml::Value::Table(tls_table)
                .try_into()
                .map_err(|e: toml::de::Error| ConfigError::invalid(field("tls"), e.to_string()))?;
            tls.server_side = true;
            Some(tls)
        };

        let mut server: ServerOptions = toml::Value::Table(rest)
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::invalid(field("server options"), e.to_string()))?;
        server.debug = true;

        Ok(Self { host, port, tls, server })
    }

    /// `host:port` string suitable for binding.
    pub fn bind_address(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

fn field(name: &str) -> String {
    format!("{}.{}", WEBSERVER_CONFIG_KEY, name)
}

/// Client certificate requirement, mirroring the classic `CERT_*` levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CertRequirement {
    #[default]
    #[serde(alias = "CERT_NONE")]
    None,
    #[serde(alias = "CERT_OPTIONAL")]
    Optional,
    #[serde(alias = "CERT_REQUIRED")]
    Required,
}

/// Accepted TLS protocol versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum TlsVersion {
    /// TLS 1.2 and 1.3.
    #[serde(rename = "tls", alias = "PROTOCOL_TLS", alias = "PROTOCOL_TLS_SERVER")]
    Any,
    #[serde(rename = "tls1.2", alias = "PROTOCOL_TLSv1_2")]
    Tls12,
    #[serde(rename = "tls1.3", alias = "PROTOCOL_TLSv1_3")]
    Tls13,
}

/// TLS parameters for the listening socket.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TlsOptions {
    /// Private key (PEM).
    pub keyfile: Option<String>,
    /// Certificate chain (PEM).
    pub certfile: Option<String>,
    /// Always true once parsed; the listener only ever plays the server role.
    pub server_side: bool,
    pub cert_reqs: CertRequirement,
    pub ssl_version: Option<TlsVersion>,
    /// Trusted CA bundle for client certificate verification.
    pub ca_certs: Option<String>,
    pub do_handshake_on_connect: bool,
    /// Treat a peer closing without `close_notify` as a normal close.
    pub suppress_ragged_eofs: bool,
    /// Colon separated rustls cipher suite names, e.g. `TLS13_AES_128_GCM_SHA256`.
    pub ciphers: Option<String>,
}

impl Default for TlsOptions {
    fn default() -> Self {
        Self {
            keyfile: None,
            certfile: None,
            server_side: true,
            cert_reqs: CertRequirement::None,
            ssl_version: None,
            ca_certs: None,
            do_handshake_on_connect: true,
            suppress_ragged_eofs: true,
            ciphers: None,
        }
    }
}

/// Options handed to the HTTP engine.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerOptions {
    /// Forced on. A handler panic answers 500 with the panic type and message
    /// instead of the standard error page.
    pub debug: bool,

    /// Keep HTTP/1.1 connections open between requests.
    pub keep_alive: bool,

    /// Maximum concurrent connections (backpressure on accept).
    pub max_connections: usize,

    /// Maximum request body size in bytes.
    pub max_body_size: usize,

    /// Time allowed for a client to send request headers.
    pub socket_timeout_secs: Option<u64>,

    /// Bound on the wait for a worker outcome. Unbounded when absent.
    pub worker_timeout_ms: Option<u64>,

    /// Options this engine does not understand; logged at startup.
    #[serde(flatten)]
    pub extra: toml::Table,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            debug: true,
            keep_alive: true,
            max_connections: 10_000,
            max_body_size: 2 * 1024 * 1024, // 2MB
            socket_timeout_secs: None,
            worker_timeout_ms: None,
            extra: toml::Table::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(src: &str) -> toml::Table {
        src.parse::<toml::Table>().unwrap()
    }

    #[test]
    fn empty_table_uses_defaults() {
        let config = WebServerConfig::from_table(&toml::Table::new()).unwrap();
        assert_eq!(config.host, DEFAULT_WEBSERVER_HOST);
        assert_eq!(config.port, DEFAULT_WEBSERVER_PORT);
        assert!(config.tls.is_none());
        assert!(config.server.debug);
    }

    #[test]
    fn empty_host_falls_back_to_default() {
        let config = WebServerConfig::from_table(&table(r#"host = """#)).unwrap();
        assert_eq!(config.host, DEFAULT_WEBSERVER_HOST);
    }

    #[test]
    fn tls_keys_are_routed_to_tls_options() {
        let config = WebServerConfig::from_table(&table(
            r#"
            host = "127.0.0.1"
            port = 8443
            certfile = "cert.pem"
            keyfile = "key.pem"
            server_side = false
            cert_reqs = "CERT_REQUIRED"
            ssl_version = "tls1.3"
            ciphers = "TLS13_AES_128_GCM_SHA256"
            keep_alive = false
            "#,
        ))
        .unwrap();

        let tls = config.tls.expect("tls options");
        assert!(tls.server_side, "server_side is forced on");
        assert_eq!(tls.certfile.as_deref(), Some("cert.pem"));
        assert_eq!(tls.keyfile.as_deref(), Some("key.pem"));
        assert_eq!(tls.cert_reqs, CertRequirement::Required);
        assert_eq!(tls.ssl_version, Some(TlsVersion::Tls13));
        assert!(!config.server.keep_alive);
        assert!(config.server.extra.is_empty());
    }

    #[test]
    fn unknown_keys_pass_through_with_debug_forced() {
        let config = WebServerConfig::from_table(&table(
            r#"
            debug = false
            log_format = "%(client_ip)s"
            worker_timeout_ms = 250
            "#,
        ))
        .unwrap();

        assert!(config.server.debug);
        assert_eq!(config.server.worker_timeout_ms, Some(250));
        assert!(config.server.extra.contains_key("log_format"));
    }

    #[test]
    fn out_of_range_port_is_rejected() {
        let err = WebServerConfig::from_table(&table("port = 70000")).unwrap_err();
        assert!(err.to_string().contains("port"));
    }

    #[test]
    fn ipv6_bind_address_is_bracketed() {
        let config = WebServerConfig {
            host: "::1".into(),
            port: 9000,
            ..WebServerConfig::default()
        };
        assert_eq!(config.bind_address(), "[::1]:9000");
    }
}
