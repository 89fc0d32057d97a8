//! End-to-end tests: real sockets on loopback, talking through `SjmpClient`
//! and raw `reqwest`.

use axum::{http::StatusCode, routing::post, Router};
use serde_json::{json, Map, Value};
use sjmp_core::{SjmpClient, SjmpError};
use sjmp_server::{SampleObject, SchemaPusher, ServerOptions, SjmpServer};
use std::net::{IpAddr, Ipv4Addr, SocketAddr, TcpListener};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use url::Url;

const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

fn options(name: &str) -> ServerOptions {
    ServerOptions::new(name)
        .with_description("integration test server")
        .with_host(LOCALHOST)
        .with_port_range(45000, 45999)
}

fn client_for(server: &SjmpServer) -> SjmpClient {
    SjmpClient::new(&format!("http://127.0.0.1:{}/", server.port())).unwrap()
}

/// Find P such that P and P+1 can be held open while P+2 is free.
fn occupy_two_ports() -> (u16, TcpListener, TcpListener) {
    for start in (46000..47000).step_by(10) {
        let first = match TcpListener::bind((LOCALHOST, start)) {
            Ok(l) => l,
            Err(_) => continue,
        };
        let second = match TcpListener::bind((LOCALHOST, start + 1)) {
            Ok(l) => l,
            Err(_) => continue,
        };
        if TcpListener::bind((LOCALHOST, start + 2)).is_ok() {
            return (start, first, second);
        }
    }
    panic!("no free port triple found");
}

#[tokio::test]
async fn test_binder_skips_occupied_ports() {
    let (start, _first, _second) = occupy_two_ports();

    let server = SjmpServer::start(
        ServerOptions::new("binder")
            .with_host(LOCALHOST)
            .with_port_range(start, start + 5),
    )
    .await
    .unwrap();

    assert_eq!(server.port(), start + 2);
    let schema = client_for(&server).schema().await.unwrap();
    assert_eq!(schema.port, start + 2);
    server.stop().await;
}

#[tokio::test]
async fn test_exhausted_range_fails() {
    let occupied = TcpListener::bind((LOCALHOST, 0)).unwrap();
    let port = occupied.local_addr().unwrap().port();

    let result = SjmpServer::start(
        ServerOptions::new("full")
            .with_host(LOCALHOST)
            .with_port_range(port, port),
    )
    .await;
    assert!(matches!(result, Err(SjmpError::PortRangeExhausted { .. })));
}

#[tokio::test]
async fn test_client_round_trip() {
    let server = SjmpServer::start(options("round-trip")).await.unwrap();
    let sample = Arc::new(SampleObject::new());
    server
        .registry()
        .register(&sample, "SampleObjectName1", "First", "SampleObject Group")
        .unwrap();
    let client = client_for(&server);

    let schema = client.schema().await.unwrap();
    assert_eq!(schema.name, "round-trip");
    assert_eq!(schema.port, server.port());
    let object = schema.object("SampleObjectName1").unwrap();
    assert!(object.property("timed_value").unwrap().show_graph);
    assert!(object.action("start_timer").unwrap().require_confirm);

    client
        .set_property("SampleObjectName1", "int_limits", json!(-10))
        .await
        .unwrap();
    assert_eq!(
        client
            .get_property("SampleObjectName1", "int_limits")
            .await
            .unwrap(),
        json!(-10)
    );

    match client
        .set_property("SampleObjectName1", "int_limits", json!(6))
        .await
    {
        Err(SjmpError::Protocol { message }) => assert!(message.contains("greater than maximal")),
        other => panic!("expected protocol error, got {:?}", other),
    }

    let mut params = Map::new();
    params.insert("param".into(), json!("echo me"));
    let value = client
        .execute("SampleObjectName1", "return_same", params)
        .await
        .unwrap();
    assert_eq!(value, json!("echo me"));

    let value = client
        .execute("SampleObjectName1", "is_timer_running", Map::new())
        .await
        .unwrap();
    assert_eq!(value, json!(false));

    let objects = client.get_properties(None, None).await.unwrap();
    assert_eq!(objects["SampleObjectName1"]["boolean_field"], json!(false));

    match client.get_properties(Some("Nope"), None).await {
        Err(SjmpError::Protocol { message }) => assert!(message.contains("Unknown object")),
        other => panic!("expected protocol error, got {:?}", other),
    }

    server.stop().await;
}

#[tokio::test]
async fn test_basic_auth() {
    let server = SjmpServer::start(options("secured").with_credentials("admin", "secret"))
        .await
        .unwrap();
    let url = format!("http://127.0.0.1:{}/", server.port());

    let response = reqwest::Client::new().post(&url).send().await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.headers()["www-authenticate"],
        "Basic realm=\"secured\""
    );

    let anonymous = SjmpClient::new(&url).unwrap();
    assert!(matches!(
        anonymous.schema().await,
        Err(SjmpError::Transport { .. })
    ));

    let wrong = SjmpClient::new(&url)
        .unwrap()
        .with_credentials("admin", "wrong");
    assert!(wrong.schema().await.is_err());

    let authorized = SjmpClient::new(&url)
        .unwrap()
        .with_credentials("admin", "secret");
    assert_eq!(authorized.schema().await.unwrap().name, "secured");

    server.stop().await;
}

#[tokio::test]
async fn test_get_is_forbidden() {
    let server = SjmpServer::start(options("methods")).await.unwrap();
    let url = format!("http://127.0.0.1:{}/some/path", server.port());

    let response = reqwest::get(&url).await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::FORBIDDEN);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["request_id"], Value::Null);
    assert_eq!(body["result"], "error");

    server.stop().await;
}

/// Serve a registrar on loopback that answers every push with `status` and
/// `body`, forwarding the pushed documents to the returned channel.
async fn registrar(
    status: StatusCode,
    body: &'static str,
) -> (SocketAddr, mpsc::UnboundedReceiver<String>) {
    let (tx, rx) = mpsc::unbounded_channel::<String>();
    let app = Router::new().route(
        "/register",
        post(move |pushed: String| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(pushed);
                (status, body)
            }
        }),
    );
    let listener = tokio::net::TcpListener::bind((LOCALHOST, 0)).await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, rx)
}

/// Wait up to `limit` for a pushed document matching `accept`.
async fn next_push(
    rx: &mut mpsc::UnboundedReceiver<String>,
    limit: Duration,
    accept: impl Fn(&str) -> bool,
) -> Option<String> {
    tokio::time::timeout(limit, async {
        loop {
            let body = rx.recv().await?;
            if accept(&body) {
                return Some(body);
            }
        }
    })
    .await
    .ok()
    .flatten()
}

#[tokio::test]
async fn test_scheduled_push() {
    let (addr, mut rx) = registrar(StatusCode::OK, r#"{"result":"ok"}"#).await;
    let server = SjmpServer::start(
        options("pushing")
            .with_push_url(format!("http://{}/register", addr))
            .with_push_interval(Duration::from_millis(500)),
    )
    .await
    .unwrap();
    assert!(server.is_pushing());

    // First scheduled push lands after a tenth of the interval.
    let first = next_push(&mut rx, Duration::from_secs(5), |_| true)
        .await
        .unwrap();
    let schema: Value = serde_json::from_str(&first).unwrap();
    assert_eq!(schema["name"], "pushing");
    assert_eq!(schema["port"], server.port());
    assert_eq!(schema["type"], "SimpleJMP/schema");

    server.stop().await;
}

#[tokio::test]
async fn test_push_follows_registration() {
    let (addr, mut rx) = registrar(StatusCode::OK, r#"{"result":"ok"}"#).await;
    // The first scheduled push is 6 s away, so anything sooner comes from a
    // registry change.
    let server = SjmpServer::start(
        options("immediate")
            .with_push_url(format!("http://{}/register", addr))
            .with_push_interval(Duration::from_secs(60)),
    )
    .await
    .unwrap();
    let registry = server.registry().clone();
    let soon = Duration::from_secs(1);

    let sample = Arc::new(SampleObject::new());
    registry.register(&sample, "Pushed", "", "").unwrap();
    let pushed = next_push(&mut rx, soon, |body| body.contains("\"Pushed\""))
        .await
        .expect("no push after register");
    assert!(pushed.contains("SimpleJMP/schema"));

    registry.unregister(&sample).unwrap();
    next_push(&mut rx, soon, |body| !body.contains("\"Pushed\""))
        .await
        .expect("no push after unregister");

    // Quiet registrations wait for an explicit notification.
    let quiet = Arc::new(SampleObject::new());
    registry.register_quiet(&quiet, "Quiet", "", "").unwrap();
    assert!(next_push(&mut rx, Duration::from_millis(300), |_| true)
        .await
        .is_none());
    registry.notify_subscribers();
    next_push(&mut rx, soon, |body| body.contains("\"Quiet\""))
        .await
        .expect("no push after notify");

    server.stop().await;
}

#[tokio::test]
async fn test_failed_push_is_reported_and_swallowed() {
    let server = SjmpServer::start(options("rejected")).await.unwrap();
    let registry = server.registry().clone();

    let cases = [
        (StatusCode::INTERNAL_SERVER_ERROR, r#"{"result":"ok"}"#),
        (StatusCode::OK, r#"{"result":"error","message":"not welcome"}"#),
        (StatusCode::OK, "not json"),
    ];
    for (status, body) in cases {
        let (addr, mut rx) = registrar(status, body).await;
        let url = Url::parse(&format!("http://{}/register", addr)).unwrap();
        let pusher = SchemaPusher::new(registry.clone(), url, Duration::from_secs(60)).unwrap();
        assert!(pusher.push_once().await.is_err(), "{} {}", status, body);
        assert!(rx.recv().await.unwrap().contains("\"rejected\""));
    }

    // A running push loop keeps going and the server keeps serving.
    let (addr, mut rx) = registrar(StatusCode::BAD_GATEWAY, "").await;
    let failing = SjmpServer::start(
        options("failing-push")
            .with_push_url(format!("http://{}/register", addr))
            .with_push_interval(Duration::from_millis(200)),
    )
    .await
    .unwrap();
    for _ in 0..2 {
        next_push(&mut rx, Duration::from_secs(5), |_| true)
            .await
            .unwrap();
    }
    assert!(failing.is_pushing());
    assert_eq!(
        client_for(&failing).schema().await.unwrap().name,
        "failing-push"
    );

    failing.stop().await;
    server.stop().await;
}

#[tokio::test]
async fn test_invalid_push_url_disables_push() {
    let server = SjmpServer::start(options("bad-push").with_push_url("not a url"))
        .await
        .unwrap();
    assert!(!server.is_pushing());

    // The server itself still serves.
    assert_eq!(client_for(&server).schema().await.unwrap().name, "bad-push");
    server.stop().await;
}
