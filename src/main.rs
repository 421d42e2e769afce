//! Demo service exposing one web and one API entrypoint.
//!
//! ```text
//! GET /ping                -> "pong"
//! GET|POST /api/greet/<n>  -> {"code":"Request:Success","data":{"greeting":...},...}
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use serde_json::json;

use http_entrypoint::app;
use http_entrypoint::config::{load_config, ContainerConfig};
use http_entrypoint::entrypoint::{Reply, ServiceError};
use http_entrypoint::observability::init_logging;
use http_entrypoint::worker::{PrefixedHeaders, ServiceCall, WorkerPool};
use http_entrypoint::ServerRegistry;

#[derive(Debug, Parser)]
#[command(name = "http-entrypoint", version, about = "Demo HTTP entrypoint service")]
struct Cli {
    /// Path to a TOML config file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

async fn greet(call: ServiceCall) -> Result<Reply, ServiceError> {
    let name = call.request.param("name").unwrap_or_default().to_string();
    if name.len() > 64 {
        return Err(ServiceError::remote("ValidationError", "name must be at most 64 characters"));
    }

    let caller = call.context.data.get("caller").cloned();
    Ok(Reply::from(json!({
        "greeting": format!("Hello, {}!", name),
        "caller": caller,
    })))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ContainerConfig::default(),
    };

    init_logging(&config.observability);
    tracing::info!(service = %config.service_name, "http-entrypoint v0.1.0 starting");

    let web_config = config.web_server()?;
    let pool = Arc::new(WorkerPool::new(config.service_name.clone(), &config.worker));
    let registry = ServerRegistry::with_extractor(pool.clone(), Arc::new(PrefixedHeaders::new("x-context-")));

    let server = registry.bind(&web_config);
    server.register_extension(
        app::web("/ping")
            .name("ping")
            .service(|_call: ServiceCall| async move { Ok(Reply::from("pong")) })?,
    );
    server.register_extension(app::api("/api/greet/<name>").name("greet").methods(&["GET", "POST"]).service(greet)?);

    registry.start_all().await?;

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");

    registry.stop_all().await;
    if !server.wait_connections_closed(Duration::from_secs(5)).await {
        tracing::warn!(active_connections = server.active_connections(), "Connections still open at exit");
    }
    pool.close();

    Ok(())
}
