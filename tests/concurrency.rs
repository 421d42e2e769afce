//! Concurrent requests through the worker bridge.

use std::sync::Arc;
use std::time::{Duration, Instant};

use http_entrypoint::app;
use http_entrypoint::entrypoint::{Handler, Reply};
use http_entrypoint::worker::ServiceCall;
use serde_json::Value;

mod common;

fn delayed(rule: &str, name: &str, delay: Duration) -> Arc<dyn Handler> {
    app::api(rule)
        .name(name)
        .service(move |call: ServiceCall| async move {
            tokio::time::sleep(delay).await;
            let tag = call.request.param("tag").unwrap_or_default().to_string();
            let caller = call.context.data.get("caller").cloned().unwrap_or_default();
            Ok(Reply::from(serde_json::json!({ "tag": tag, "caller": caller })))
        })
        .unwrap()
}

#[tokio::test]
async fn slow_and_fast_routes_do_not_interfere() {
    let server = common::start_server(vec![
        delayed("/slow/<tag>", "slow", Duration::from_millis(300)),
        delayed("/fast/<tag>", "fast", Duration::from_millis(10)),
    ])
    .await;
    let client = common::client();

    let slow = {
        let client = client.clone();
        let url = server.url("/slow/a");
        tokio::spawn(async move {
            let start = Instant::now();
            let res = client.get(url).header("x-ctx-caller", "one").send().await.unwrap();
            let body: Value = res.json().await.unwrap();
            (body, start.elapsed())
        })
    };

    tokio::time::sleep(Duration::from_millis(20)).await;

    let start = Instant::now();
    let res = client.get(server.url("/fast/b")).header("x-ctx-caller", "two").send().await.unwrap();
    let fast: Value = res.json().await.unwrap();
    let fast_elapsed = start.elapsed();

    let (slow, slow_elapsed) = slow.await.unwrap();

    assert_eq!(fast["data"]["tag"], "b");
    assert_eq!(fast["data"]["caller"], "two");
    assert_eq!(slow["data"]["tag"], "a");
    assert_eq!(slow["data"]["caller"], "one");
    assert_ne!(fast["call_id"], slow["call_id"]);

    assert!(fast_elapsed < Duration::from_millis(250), "fast request waited on slow one: {:?}", fast_elapsed);
    assert!(slow_elapsed >= Duration::from_millis(300));
}

#[tokio::test]
async fn many_concurrent_requests_each_get_their_own_outcome() {
    let server = common::start_server(vec![delayed("/echo/<tag>", "echo", Duration::from_millis(5))]).await;
    let client = common::client();

    let mut tasks = Vec::new();
    for i in 0..50 {
        let client = client.clone();
        let url = server.url(&format!("/echo/{}", i));
        tasks.push(tokio::spawn(async move {
            let res = client.get(url).header("x-ctx-caller", i.to_string()).send().await.unwrap();
            let body: Value = res.json().await.unwrap();
            (i, body)
        }));
    }

    let mut call_ids = std::collections::HashSet::new();
    for task in tasks {
        let (i, body) = task.await.unwrap();
        assert_eq!(body["code"], "Request:Success");
        assert_eq!(body["data"]["tag"], i.to_string());
        assert_eq!(body["data"]["caller"], i.to_string());
        assert!(call_ids.insert(body["call_id"].as_str().unwrap().to_string()));
    }
    assert_eq!(call_ids.len(), 50);
}

#[tokio::test]
async fn panicking_business_logic_leaves_the_server_serving() {
    let panicky = app::web("/panic")
        .service(|_call: ServiceCall| async move {
            if true {
                panic!("business logic bug");
            }
            Ok(Reply::from("unreachable"))
        })
        .unwrap();
    let ok = app::web("/ok")
        .service(|_call: ServiceCall| async move { Ok(Reply::from("fine")) })
        .unwrap();
    let server = common::start_server(vec![panicky, ok]).await;
    let client = common::client();

    for _ in 0..3 {
        let res = client.get(server.url("/panic")).send().await.unwrap();
        assert_eq!(res.status(), 500);
        assert_eq!(res.text().await.unwrap(), "Panic\nbusiness logic bug");
    }

    let res = client.get(server.url("/ok")).send().await.unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.text().await.unwrap(), "fine");
}
