//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use http_entrypoint::config::{WebServerConfig, WorkerConfig};
use http_entrypoint::entrypoint::Handler;
use http_entrypoint::worker::{PrefixedHeaders, WorkerPool};
use http_entrypoint::{ServerRegistry, WebServer};

/// A running server plus the pieces a test may want to poke at.
pub struct TestServer {
    pub server: Arc<WebServer>,
    pub pool: Arc<WorkerPool>,
    pub addr: SocketAddr,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// Loopback config on an ephemeral port, plus extra `[webserver]` lines.
pub fn loopback_config(extra: &str) -> WebServerConfig {
    let src = format!("host = \"127.0.0.1\"\nport = 0\n{}", extra);
    let table = src.parse::<toml::Table>().unwrap();
    WebServerConfig::from_table(&table).unwrap()
}

/// Start a server on an ephemeral port with `handlers` registered.
pub async fn start_server(handlers: Vec<Arc<dyn Handler>>) -> TestServer {
    start_server_with(loopback_config(""), handlers).await
}

pub async fn start_server_with(config: WebServerConfig, handlers: Vec<Arc<dyn Handler>>) -> TestServer {
    let pool = Arc::new(WorkerPool::new("test", &WorkerConfig { max_workers: 16 }));
    let registry = ServerRegistry::with_extractor(pool.clone(), Arc::new(PrefixedHeaders::new("x-ctx-")));
    let server = registry.bind(&config);
    for handler in handlers {
        server.register_extension(handler);
    }
    let addr = server.start().await.unwrap();
    TestServer { server, pool, addr }
}

/// Client that never reuses connections.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
