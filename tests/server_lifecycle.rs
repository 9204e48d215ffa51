//! Start/stop behaviour of the service bootstrap.

use std::io::ErrorKind;
use std::time::{Duration, Instant};

use service_bootstrap::{ListenerError, StopReport};
use tokio::net::TcpStream;

mod common;

#[tokio::test]
async fn second_start_on_same_port_is_a_bind_failure() {
    let server = common::liveness_server(common::local_config());

    let first = server.start("127.0.0.1", 0).await.unwrap();
    let port = first.local_addr().port();

    let err = server.start("127.0.0.1", port).await.unwrap_err();
    assert!(matches!(err, ListenerError::Bind { .. }), "got {err}");
    assert!(err.is_bind_failure());
    assert_eq!(err.io_kind(), ErrorKind::AddrInUse);

    // The failed attempt must not disturb the running instance.
    let res = common::client()
        .get(format!("http://{}/healthz", first.local_addr()))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);

    first.stop().await.unwrap();

    // Port is free again.
    let again = server.start("127.0.0.1", port).await.unwrap();
    assert_eq!(again.local_addr().port(), port);
    again.stop().await.unwrap();
}

#[tokio::test]
async fn stop_closes_the_listening_socket() {
    let handle = common::liveness_server(common::local_config())
        .start("127.0.0.1", 0)
        .await
        .unwrap();
    let addr = handle.local_addr();

    TcpStream::connect(addr).await.expect("listener accepts before stop");

    let report = handle.stop().await.unwrap();
    assert_eq!(report.forced, 0);

    let err = TcpStream::connect(addr).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConnectionRefused);
}

#[tokio::test]
async fn in_flight_request_finishes_within_grace_period() {
    let handle = common::slow_server(Duration::from_millis(500), common::local_config())
        .start("127.0.0.1", 0)
        .await
        .unwrap();
    let url = format!("http://{}/slow", handle.local_addr());

    let request = tokio::spawn(async move { common::client().get(url).send().await });
    common::wait_until_active(&handle).await;
    // Let the request head reach the handler.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(handle.active_connections(), 1);

    let report = handle.stop().await.unwrap();
    assert_eq!(report, StopReport { drained: 1, forced: 0 });

    let res = request.await.unwrap().expect("request should complete");
    assert_eq!(res.status(), 200);
    // Readiness flipped while the request was running.
    assert_eq!(res.text().await.unwrap(), "draining");
}

#[tokio::test]
async fn stragglers_are_forced_closed_after_grace_period() {
    let mut config = common::local_config();
    config.shutdown.grace_period_secs = 1;
    let handle = common::slow_server(Duration::from_secs(60), config)
        .start("127.0.0.1", 0)
        .await
        .unwrap();
    let url = format!("http://{}/slow", handle.local_addr());

    let request = tokio::spawn(async move { common::client().get(url).send().await });
    common::wait_until_active(&handle).await;
    // Let the request head reach the handler.
    tokio::time::sleep(Duration::from_millis(50)).await;

    let started = Instant::now();
    let report = handle.stop().await.unwrap();
    let elapsed = started.elapsed();

    assert_eq!(report, StopReport { drained: 0, forced: 1 });
    assert!(elapsed >= Duration::from_secs(1), "stopped after {elapsed:?}");
    assert!(elapsed < Duration::from_secs(10), "stopped after {elapsed:?}");

    let result = tokio::time::timeout(Duration::from_secs(5), request)
        .await
        .expect("client sees the connection drop")
        .unwrap();
    assert!(result.is_err());
}

#[tokio::test]
async fn idle_connections_do_not_hold_up_stop() {
    let handle = common::liveness_server(common::local_config())
        .start("127.0.0.1", 0)
        .await
        .unwrap();
    let _idle = TcpStream::connect(handle.local_addr()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let report = tokio::time::timeout(Duration::from_secs(3), handle.stop())
        .await
        .expect("idle connection closes on drain")
        .unwrap();
    assert_eq!(report, StopReport { drained: 1, forced: 0 });
}

#[tokio::test]
async fn connection_limit_applies_backpressure() {
    let mut config = common::local_config();
    config.listener.max_connections = 1;
    let handle = common::liveness_server(config)
        .start("127.0.0.1", 0)
        .await
        .unwrap();
    let addr = handle.local_addr();

    let holder = TcpStream::connect(addr).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let request = tokio::spawn(async move {
        common::client()
            .get(format!("http://{addr}/healthz"))
            .send()
            .await
    });
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!request.is_finished(), "second connection should wait for a permit");

    drop(holder);
    let res = tokio::time::timeout(Duration::from_secs(5), request)
        .await
        .expect("request proceeds once the slot frees")
        .unwrap()
        .unwrap();
    assert_eq!(res.status(), 200);

    handle.stop().await.unwrap();
}
