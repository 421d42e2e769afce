//! Server registry: one [`WebServer`] per distinct listener configuration.
//!
//! Built at container assembly and passed to whoever binds handlers. Handlers
//! bound with an identical configuration share a listener and accept loop.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::config::WebServerConfig;
use crate::entrypoint::Bridge;
use crate::http::WebServer;
use crate::worker::{ContextExtractor, EmptyContext, WorkerScheduler};

/// Identity of a listener: its transport and bind address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServerKey {
    pub kind: &'static str,
    pub host: String,
    pub port: u16,
}

impl ServerKey {
    pub fn for_config(config: &WebServerConfig) -> Self {
        Self {
            kind: if config.tls.is_some() { "https" } else { "http" },
            host: config.host.clone(),
            port: config.port,
        }
    }
}

impl std::fmt::Display for ServerKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}://{}:{}", self.kind, self.host, self.port)
    }
}

/// Deduplicating registry of web servers.
pub struct ServerRegistry {
    servers: DashMap<ServerKey, Arc<WebServer>>,
    scheduler: Arc<dyn WorkerScheduler>,
    extractor: Arc<dyn ContextExtractor>,
}

impl std::fmt::Debug for ServerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerRegistry")
            .field("servers", &self.servers.len())
            .finish_non_exhaustive()
    }
}

impl ServerRegistry {
    pub fn new(scheduler: Arc<dyn WorkerScheduler>) -> Self {
        Self::with_extractor(scheduler, Arc::new(EmptyContext))
    }

    pub fn with_extractor(scheduler: Arc<dyn WorkerScheduler>, extractor: Arc<dyn ContextExtractor>) -> Self {
        Self {
            servers: DashMap::new(),
            scheduler,
            extractor,
        }
    }

    /// The server for `config`, created on first use.
    ///
    /// A later bind to the same address gets the existing server and its
    /// original settings; differing settings are logged and ignored.
    pub fn bind(&self, config: &WebServerConfig) -> Arc<WebServer> {
        let key = ServerKey::for_config(config);
        match self.servers.entry(key) {
            Entry::Occupied(entry) => {
                let server = Arc::clone(entry.get());
                if server.config() != config {
                    tracing::warn!(
                        server = %entry.key(),
                        "Listener already bound with different settings; keeping the original"
                    );
                }
                server
            }
            Entry::Vacant(entry) => {
                tracing::debug!(server = %entry.key(), "Creating web server");
                let bridge = Bridge::from_options(
                    Arc::clone(&self.scheduler),
                    Arc::clone(&self.extractor),
                    &config.server,
                );
                let server = Arc::new(WebServer::new(config.clone(), bridge));
                entry.insert(Arc::clone(&server));
                server
            }
        }
    }

    /// True if a server is bound for `config`'s address with other settings.
    pub fn conflicts_with(&self, config: &WebServerConfig) -> bool {
        self.servers
            .get(&ServerKey::for_config(config))
            .is_some_and(|server| server.config() != config)
    }

    pub fn get(&self, key: &ServerKey) -> Option<Arc<WebServer>> {
        self.servers.get(key).map(|entry| Arc::clone(entry.value()))
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    fn snapshot(&self) -> Vec<Arc<WebServer>> {
        self.servers.iter().map(|entry| Arc::clone(entry.value())).collect()
    }

    /// Start every registered server. Stops at the first failure.
    pub async fn start_all(&self) -> Result<(), crate::http::ServerError> {
        for server in self.snapshot() {
            server.start().await?;
        }
        Ok(())
    }

    /// Stop every registered server.
    pub async fn stop_all(&self) {
        for server in self.snapshot() {
            server.stop().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorkerConfig;
    use crate::worker::WorkerPool;

    fn config(src: &str) -> WebServerConfig {
        WebServerConfig::from_table(&src.parse::<toml::Table>().unwrap()).unwrap()
    }

    fn registry() -> ServerRegistry {
        ServerRegistry::new(Arc::new(WorkerPool::new("svc", &WorkerConfig::default())))
    }

    #[test]
    fn identical_configs_share_a_server() {
        let registry = registry();
        let a = registry.bind(&config("host = \"127.0.0.1\"\nport = 9100"));
        let b = registry.bind(&config("host = \"127.0.0.1\"\nport = 9100"));
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn different_ports_get_different_servers() {
        let registry = registry();
        let a = registry.bind(&config("port = 9100"));
        let b = registry.bind(&config("port = 9101"));
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 2);

        let key = ServerKey::for_config(&config("port = 9101"));
        assert_eq!(key.to_string(), "http://0.0.0.0:9101");
        assert!(Arc::ptr_eq(&registry.get(&key).unwrap(), &b));
    }

    #[test]
    fn rebinding_with_other_settings_keeps_the_first_server() {
        let registry = registry();
        let first = registry.bind(&config("port = 9102\nmax_body_size = 16"));

        let conflicting = config("port = 9102\nmax_body_size = 32");
        assert!(registry.conflicts_with(&conflicting));
        assert!(!registry.conflicts_with(&config("port = 9102\nmax_body_size = 16")));
        assert!(!registry.conflicts_with(&config("port = 9103")));

        let second = registry.bind(&conflicting);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.bridge().max_body_size(), 16);
    }

    #[test]
    fn bridge_follows_server_options() {
        let registry = registry();
        let server = registry.bind(&config("max_body_size = 16\nworker_timeout_ms = 250"));
        assert_eq!(server.bridge().max_body_size(), 16);
        assert_eq!(server.bridge().wait_timeout(), Some(std::time::Duration::from_millis(250)));
    }
}
