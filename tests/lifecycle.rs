//! Server lifecycle, registry sharing and bridge limits.

use std::sync::Arc;
use std::time::Duration;

use http_entrypoint::app;
use http_entrypoint::config::WorkerConfig;
use http_entrypoint::entrypoint::{Handler, Reply};
use http_entrypoint::http::ServerError;
use http_entrypoint::worker::{ServiceCall, WorkerPool};
use http_entrypoint::ServerRegistry;
use serde_json::Value;

mod common;

fn ping() -> Arc<dyn Handler> {
    app::web("/ping")
        .service(|_call: ServiceCall| async move { Ok(Reply::from("pong")) })
        .unwrap()
}

fn sleepy(delay: Duration) -> Arc<dyn Handler> {
    app::api("/sleep")
        .name("sleep")
        .service(move |_call: ServiceCall| async move {
            tokio::time::sleep(delay).await;
            Ok(Reply::from("awake"))
        })
        .unwrap()
}

#[tokio::test]
async fn stop_closes_the_listener_and_is_terminal() {
    let server = common::start_server(vec![ping()]).await;
    let client = common::client();

    let res = client.get(server.url("/ping")).send().await.unwrap();
    assert_eq!(res.text().await.unwrap(), "pong");

    assert_eq!(server.server.start().await.unwrap(), server.addr);

    server.server.stop().await;
    assert!(client.get(server.url("/ping")).send().await.is_err());
    assert!(matches!(server.server.start().await, Err(ServerError::Stopped)));
    assert!(server.server.wait_connections_closed(Duration::from_secs(1)).await);
}

#[tokio::test]
async fn in_flight_requests_finish_after_stop() {
    let server = common::start_server(vec![sleepy(Duration::from_millis(200))]).await;

    let request = tokio::spawn(common::client().get(server.url("/sleep")).send());
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(server.server.active_connections(), 1);

    server.server.stop().await;
    let res = request.await.unwrap().unwrap();
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["data"], "awake");
    assert!(server.server.wait_connections_closed(Duration::from_secs(1)).await);
}

#[tokio::test]
async fn unregistered_handlers_are_absent_from_the_next_start() {
    let config = common::loopback_config("");
    let pool = Arc::new(WorkerPool::new("test", &WorkerConfig::default()));
    let registry = ServerRegistry::new(pool);

    let server = registry.bind(&config);
    let keep = ping();
    let drop_me = sleepy(Duration::from_millis(1));
    server.register_extension(Arc::clone(&keep));
    server.register_extension(Arc::clone(&drop_me));
    assert!(server.unregister_extension(&drop_me));

    assert!(Arc::ptr_eq(&server, &registry.bind(&config)));
    registry.start_all().await.unwrap();
    let addr = server.local_addr().unwrap();

    let client = common::client();
    let res = client.get(format!("http://{}/ping", addr)).send().await.unwrap();
    assert_eq!(res.status(), 200);
    let res = client.get(format!("http://{}/sleep", addr)).send().await.unwrap();
    assert_eq!(res.status(), 404);

    registry.stop_all().await;
}

#[tokio::test]
async fn worker_timeout_bounds_the_wait() {
    let config = common::loopback_config("worker_timeout_ms = 50");
    let server = common::start_server_with(config, vec![sleepy(Duration::from_millis(500))]).await;

    let res = common::client().get(server.url("/sleep")).send().await.unwrap();
    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["code"], "ServerError:WorkerTimeout");
    assert_eq!(body["call_id"], "");
}

#[tokio::test]
async fn closed_pool_reports_submission_failure() {
    let server = common::start_server(vec![ping()]).await;
    server.pool.close();

    let res = common::client().get(server.url("/ping")).send().await.unwrap();
    assert_eq!(res.status(), 500);
    assert!(res.text().await.unwrap().starts_with("WorkerSubmissionError\n"));
}

#[tokio::test]
async fn oversized_bodies_are_bad_requests() {
    let echo = app::web("/upload")
        .methods(&["POST"])
        .service(|call: ServiceCall| async move { Ok(Reply::from(call.request.body().clone())) })
        .unwrap();
    let config = common::loopback_config("max_body_size = 8");
    let server = common::start_server_with(config, vec![echo]).await;
    let client = common::client();

    let res = client.post(server.url("/upload")).body("small").send().await.unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.text().await.unwrap(), "small");

    let res = client.post(server.url("/upload")).body("this is far too large").send().await.unwrap();
    assert_eq!(res.status(), 400);
}
