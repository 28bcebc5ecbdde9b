//! Lifecycle integration tests: bootstrap subsets, idempotent close,
//! probe visibility during drain, bind-failure cleanup and deadline
//! behavior.

use std::time::{Duration, Instant};

use axum::routing::get;
use multiserve::{HealthReporter, LifecycleState, Server, ShutdownReport};
use tokio::net::{TcpListener, TcpStream};

fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

async fn start(server: &Server) -> tokio::task::JoinHandle<Result<(), multiserve::Error>> {
    let serving = server.clone();
    let task = tokio::spawn(async move { serving.serve().await });
    server.wait_for_state(LifecycleState::Listening).await;
    task
}

#[tokio::test]
async fn binds_exactly_the_configured_subset() {
    let server = Server::builder("subset")
        .with_debug_address("127.0.0.1:0")
        .with_rpc_address("127.0.0.1:0")
        .build()
        .unwrap();

    let serve_task = start(&server).await;

    let debug_address = server.debug_address();
    assert!(debug_address.starts_with("http://127.0.0.1:"));
    assert!(server.http_address().is_empty());

    let rpc_address = server.rpc_address();
    assert!(!rpc_address.is_empty());
    // The rpc accept loop is live even with no registered services.
    TcpStream::connect(&rpc_address).await.unwrap();

    let response = client().get(format!("{debug_address}/ready")).send().await.unwrap();
    assert_eq!(response.status(), 200);

    let report = server.close().await.unwrap();
    assert!(report.is_clean(), "unexpected close errors: {report}");
    assert!(serve_task.await.unwrap().is_ok());
    assert_eq!(server.state(), LifecycleState::Closed);
}

#[tokio::test]
async fn concurrent_close_runs_teardown_once() {
    let server = Server::builder("close-once")
        .with_debug_address("127.0.0.1:0")
        .build()
        .unwrap();

    let serve_task = start(&server).await;

    let mut closers = Vec::new();
    for _ in 0..8 {
        let server = server.clone();
        closers.push(tokio::spawn(async move { server.close().await.unwrap() }));
    }

    let mut reports: Vec<ShutdownReport> = Vec::new();
    for closer in closers {
        reports.push(closer.await.unwrap());
    }

    // Every caller sees the one report the winning teardown produced.
    for report in &reports[1..] {
        assert_eq!(report, &reports[0]);
    }

    // Closing again after the fact returns the same result once more.
    assert_eq!(server.close().await.unwrap(), reports[0]);
    assert!(serve_task.await.unwrap().is_ok());
}

#[tokio::test]
async fn debug_probes_remain_reachable_while_http_drains() {
    let router = axum::Router::new().route(
        "/slow",
        get(|| async {
            tokio::time::sleep(Duration::from_secs(2)).await;
            "done"
        }),
    );

    let server = Server::builder("drain-visibility")
        .with_debug_address("127.0.0.1:0")
        .with_http_address("127.0.0.1:0")
        .with_http_router(router)
        .with_close_timeout(Duration::from_secs(10))
        .build()
        .unwrap();

    let serve_task = start(&server).await;
    let debug_address = server.debug_address();
    let http_address = server.http_address();

    // Occupy the plain server with an in-flight request.
    let slow_request = tokio::spawn({
        let client = client();
        async move { client.get(format!("{http_address}/slow")).send().await }
    });
    tokio::time::sleep(Duration::from_millis(300)).await;

    let close_task = tokio::spawn({
        let server = server.clone();
        async move { server.close().await.unwrap() }
    });
    tokio::time::sleep(Duration::from_millis(300)).await;

    // The plain server is draining; the debug server must still answer,
    // reporting not-ready now that the lifecycle has left Listening.
    assert_eq!(server.state(), LifecycleState::Closing);
    let probe = client()
        .get(format!("{debug_address}/ready"))
        .send()
        .await
        .expect("debug server must stay reachable during drain");
    assert_eq!(probe.status(), 503);

    // The in-flight request still completes.
    assert_eq!(slow_request.await.unwrap().unwrap().status(), 200);

    let report = close_task.await.unwrap();
    assert!(report.is_clean(), "unexpected close errors: {report}");
    assert!(serve_task.await.unwrap().is_ok());

    // Everything is torn down now, probes included.
    assert!(client().get(format!("{debug_address}/ready")).send().await.is_err());
}

#[tokio::test]
async fn bind_conflict_aborts_startup_and_releases_listeners() {
    // Occupy a port so the rpc bind fails after debug already bound.
    let blocker = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let taken = blocker.local_addr().unwrap();

    let server = Server::builder("bind-conflict")
        .with_debug_address("127.0.0.1:29871")
        .with_rpc_address(taken.to_string())
        .build()
        .unwrap();

    let result = server.serve().await;
    assert!(matches!(result, Err(multiserve::Error::Bind(_))));

    // The debug listener from the failed attempt must be gone.
    let reclaimed = TcpListener::bind("127.0.0.1:29871").await;
    assert!(reclaimed.is_ok(), "debug listener leaked after failed startup");
}

#[tokio::test]
async fn close_returns_within_the_configured_timeout() {
    let router = axum::Router::new().route(
        "/hang",
        get(|| async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            "unreachable"
        }),
    );

    let server = Server::builder("deadline")
        .with_http_address("127.0.0.1:0")
        .with_http_router(router)
        .with_close_timeout(Duration::from_secs(1))
        .build()
        .unwrap();

    let serve_task = start(&server).await;
    let http_address = server.http_address();

    // Park a request that will never finish on its own.
    let hung_request = tokio::spawn({
        let client = client();
        let http_address = http_address.clone();
        async move {
            let _ = client.get(format!("{http_address}/hang")).send().await;
        }
    });
    tokio::time::sleep(Duration::from_millis(300)).await;

    let started = Instant::now();
    let report = server.close().await.unwrap();
    let elapsed = started.elapsed();

    // The drain was abandoned at the deadline, not awaited to the end.
    assert!(
        elapsed < Duration::from_secs(3),
        "close took {elapsed:?}, expected roughly the 1s timeout"
    );
    assert!(elapsed >= Duration::from_millis(900));
    assert!(report.elapsed < Duration::from_secs(3));

    hung_request.abort();
    let _ = serve_task.await;

    // The listener is released even though the connection was abandoned.
    assert!(TcpStream::connect(http_address.trim_start_matches("http://")).await.is_err());
}

#[tokio::test]
async fn close_before_serve_is_rejected() {
    let server = Server::builder("not-running")
        .with_debug_address("127.0.0.1:0")
        .build()
        .unwrap();
    assert!(matches!(server.close().await, Err(multiserve::Error::NotListening)));
}

struct NeverReady;

impl HealthReporter for NeverReady {
    fn ready(&self) -> bool {
        false
    }

    fn live(&self) -> bool {
        true
    }
}

#[tokio::test]
async fn readiness_delegates_to_the_health_reporter() {
    let server = Server::builder("health")
        .with_debug_address("127.0.0.1:0")
        .with_health(NeverReady)
        .build()
        .unwrap();

    let serve_task = start(&server).await;
    let debug_address = server.debug_address();

    let ready = client().get(format!("{debug_address}/ready")).send().await.unwrap();
    assert_eq!(ready.status(), 503);

    let live = client().get(format!("{debug_address}/live")).send().await.unwrap();
    assert_eq!(live.status(), 200);

    let metrics = client().get(format!("{debug_address}/metrics")).send().await.unwrap();
    assert_eq!(metrics.status(), 200);

    let pprof = client()
        .get(format!("{debug_address}/debug/pprof/heap"))
        .send()
        .await
        .unwrap();
    assert_eq!(pprof.status(), 200);
    let snapshot: serde_json::Value = pprof.json().await.unwrap();
    assert!(snapshot.get("pid").and_then(|v| v.as_u64()).unwrap() > 0);

    server.close().await.unwrap();
    let _ = serve_task.await;
}

#[tokio::test]
async fn termination_scenario_debug_and_rpc_only() {
    let server = Server::builder("scenario")
        .with_debug_address(":29500")
        .with_rpc_address(":29501")
        .with_close_timeout(Duration::from_secs(5))
        .build()
        .unwrap();

    let serve_task = start(&server).await;

    assert_eq!(server.debug_address(), "http://127.0.0.1:29500");
    assert_eq!(server.http_address(), "");
    assert_eq!(server.rpc_address(), "127.0.0.1:29501");

    // An explicit trigger drives the same path as a termination signal.
    server.shutdown().trigger();

    let result = tokio::time::timeout(Duration::from_secs(5), serve_task)
        .await
        .expect("serve did not return within the close timeout")
        .unwrap();
    assert!(result.is_ok(), "serve returned {result:?}");

    assert!(TcpStream::connect("127.0.0.1:29500").await.is_err());
    assert!(TcpStream::connect("127.0.0.1:29501").await.is_err());
}
