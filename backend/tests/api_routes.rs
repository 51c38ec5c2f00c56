use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::{
    body::{to_bytes, Body},
    extract::{connect_info::ConnectInfo, State},
    http::{header, HeaderMap, Method, Request, StatusCode},
    routing::post,
    Json, Router,
};
use serde_json::{json, Value};
use stylist_backend::{
    build_router,
    config::{Config, DEFAULT_PERSONA_ID},
    AppState,
};
use tower::ServiceExt;

/// Stand-in for the Tavus API, recording what it was sent.
struct FakeTavus {
    status: StatusCode,
    reply: Value,
    hits: AtomicUsize,
    last_api_key: Mutex<Option<String>>,
    last_body: Mutex<Option<Value>>,
}

impl FakeTavus {
    fn new(status: StatusCode, reply: Value) -> Arc<Self> {
        Arc::new(Self {
            status,
            reply,
            hits: AtomicUsize::new(0),
            last_api_key: Mutex::new(None),
            last_body: Mutex::new(None),
        })
    }

    fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

async fn fake_endpoint(
    State(fake): State<Arc<FakeTavus>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    fake.hits.fetch_add(1, Ordering::SeqCst);
    *fake.last_api_key.lock().unwrap() = headers
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    *fake.last_body.lock().unwrap() = Some(body);
    (fake.status, Json(fake.reply.clone()))
}

async fn spawn_fake_tavus(fake: Arc<FakeTavus>) -> String {
    let app = Router::new()
        .route("/v2/personas", post(fake_endpoint))
        .route("/v2/conversations", post(fake_endpoint))
        .with_state(fake);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn config_for(base: &str, api_key: Option<&str>) -> Config {
    Config {
        tavus_api_key: api_key.map(str::to_string),
        tavus_api_base: base.to_string(),
        replica_id: Some("r-default".to_string()),
        ..Config::default()
    }
}

fn app(config: Config) -> Router {
    build_router(Arc::new(AppState::new(config)))
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    (status, body)
}

fn post_json(path: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder().method(Method::POST).uri(path);
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

#[tokio::test]
async fn health_check_answers_ok() {
    let request = Request::builder().uri("/api/health").body(Body::empty()).unwrap();
    let (status, body) = send(app(Config::default()), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("OK".to_string()));
}

#[tokio::test]
async fn persona_setup_without_key_never_contacts_tavus() {
    let fake = FakeTavus::new(StatusCode::OK, json!({ "persona_id": "p4746574ac52" }));
    let base = spawn_fake_tavus(fake.clone()).await;

    let (status, body) = send(app(config_for(&base, None)), post_json("/api/persona/setup", None)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "TAVUS_API_KEY not configured");
    assert_eq!(fake.hits(), 0);
}

#[tokio::test]
async fn persona_setup_wraps_created_persona() {
    let fake = FakeTavus::new(
        StatusCode::OK,
        json!({ "persona_id": "p4746574ac52", "persona_name": "Adrian - Fashion Stylist" }),
    );
    let base = spawn_fake_tavus(fake.clone()).await;

    let (status, body) = send(
        app(config_for(&base, Some("secret-key"))),
        post_json("/api/persona/setup", None),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["persona"]["persona_id"], "p4746574ac52");
    assert_eq!(fake.hits(), 1);
    assert_eq!(fake.last_api_key.lock().unwrap().as_deref(), Some("secret-key"));

    let sent = fake.last_body.lock().unwrap().clone().unwrap();
    assert_eq!(sent["persona_name"], "Adrian - Fashion Stylist");
    assert_eq!(sent["persona_id"], "p4746574ac52");
    assert!(sent["system_prompt"].as_str().unwrap().starts_with("You are Adrian"));
}

#[tokio::test]
async fn persona_setup_propagates_upstream_status_and_details() {
    let fake = FakeTavus::new(StatusCode::BAD_REQUEST, json!({ "message": "persona exists" }));
    let base = spawn_fake_tavus(fake.clone()).await;

    let (status, body) = send(
        app(config_for(&base, Some("secret-key"))),
        post_json("/api/persona/setup", None),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Failed to create persona");
    assert_eq!(body["status"], 400);
    assert!(body["details"].as_str().unwrap().contains("persona exists"));
}

#[tokio::test]
async fn conversation_returns_only_the_join_url() {
    let fake = FakeTavus::new(
        StatusCode::OK,
        json!({
            "conversation_id": "c123",
            "conversation_url": "https://example.test/room/abc",
            "status": "active",
        }),
    );
    let base = spawn_fake_tavus(fake.clone()).await;

    let (status, body) = send(
        app(config_for(&base, Some("secret-key"))),
        post_json("/api/consultation/conversation", Some(json!({ "personaId": "p-custom" }))),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "conversation_url": "https://example.test/room/abc" }));

    let sent = fake.last_body.lock().unwrap().clone().unwrap();
    assert_eq!(sent["persona_id"], "p-custom");
    assert_eq!(sent["replica_id"], "r-default");
}

#[tokio::test]
async fn conversation_failure_hides_upstream_details() {
    let fake = FakeTavus::new(
        StatusCode::INTERNAL_SERVER_ERROR,
        json!({ "message": "internal stack trace" }),
    );
    let base = spawn_fake_tavus(fake.clone()).await;

    let (status, body) = send(
        app(config_for(&base, Some("secret-key"))),
        post_json("/api/consultation/conversation", None),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Failed to create conversation");
    assert_eq!(body["status"], 500);
    assert!(body.get("details").is_none());
}

#[tokio::test]
async fn conversation_rejects_malformed_body() {
    let fake = FakeTavus::new(StatusCode::OK, json!({ "conversation_url": "https://example.test/room/abc" }));
    let base = spawn_fake_tavus(fake.clone()).await;

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/consultation/conversation")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, _) = send(app(config_for(&base, Some("secret-key"))), request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(fake.hits(), 0);
}

fn conversation_from(peer: &str, forwarded_for: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri("/api/consultation/conversation");
    if let Some(forwarded_for) = forwarded_for {
        builder = builder.header("x-forwarded-for", forwarded_for);
    }
    let mut request = builder.body(Body::empty()).unwrap();
    let addr: SocketAddr = format!("{}:40000", peer).parse().unwrap();
    request.extensions_mut().insert(ConnectInfo(addr));
    request
}

#[tokio::test]
async fn conversation_is_rate_limited_per_client() {
    let fake = FakeTavus::new(StatusCode::OK, json!({ "conversation_url": "https://example.test/room/abc" }));
    let base = spawn_fake_tavus(fake.clone()).await;
    let router = app(config_for(&base, Some("secret-key")));

    for _ in 0..5 {
        let (status, _) = send(router.clone(), conversation_from("198.51.100.4", None)).await;
        assert_eq!(status, StatusCode::OK);
    }
    let (status, _) = send(router.clone(), conversation_from("198.51.100.4", None)).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(fake.hits(), 5);
}

#[tokio::test]
async fn visitors_without_forwarded_header_get_separate_buckets() {
    let fake = FakeTavus::new(StatusCode::OK, json!({ "conversation_url": "https://example.test/room/abc" }));
    let base = spawn_fake_tavus(fake.clone()).await;
    let router = app(config_for(&base, Some("secret-key")));

    for _ in 0..5 {
        let (status, _) = send(router.clone(), conversation_from("198.51.100.4", None)).await;
        assert_eq!(status, StatusCode::OK);
    }
    let (status, _) = send(router.clone(), conversation_from("198.51.100.4", None)).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);

    let (status, _) = send(router.clone(), conversation_from("203.0.113.9", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fake.hits(), 6);
}

#[tokio::test]
async fn rotating_forwarded_header_does_not_bypass_the_limit() {
    let fake = FakeTavus::new(StatusCode::OK, json!({ "conversation_url": "https://example.test/room/abc" }));
    let base = spawn_fake_tavus(fake.clone()).await;
    let router = app(config_for(&base, Some("secret-key")));

    let mut created = 0;
    for i in 0..20 {
        let forwarded = format!("10.0.0.{}", i);
        let (status, _) = send(router.clone(), conversation_from("198.51.100.4", Some(&forwarded))).await;
        if status == StatusCode::OK {
            created += 1;
        } else {
            assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        }
    }
    assert_eq!(created, 5);
    assert_eq!(fake.hits(), 5);
}

#[tokio::test]
async fn trusted_proxy_keys_buckets_by_forwarded_client() {
    let fake = FakeTavus::new(StatusCode::OK, json!({ "conversation_url": "https://example.test/room/abc" }));
    let base = spawn_fake_tavus(fake.clone()).await;
    let mut config = config_for(&base, Some("secret-key"));
    config.trust_forwarded_for = true;
    let router = app(config);

    for _ in 0..5 {
        let (status, _) = send(router.clone(), conversation_from("10.0.0.1", Some("198.51.100.4"))).await;
        assert_eq!(status, StatusCode::OK);
    }
    let (status, _) = send(router.clone(), conversation_from("10.0.0.1", Some("198.51.100.4"))).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);

    // Same proxy, different visitor behind it.
    let (status, _) = send(router.clone(), conversation_from("10.0.0.1", Some("203.0.113.9, 10.0.0.1"))).await;
    assert_eq!(status, StatusCode::OK);
}

#[test]
fn pruning_keeps_clients_that_are_still_limited() {
    let state = AppState::new(Config::default());
    let client = "198.51.100.4".to_string();
    for _ in 0..5 {
        assert!(state.conversation_limiter.check_key(&client).is_ok());
    }
    state.prune_rate_limits();
    assert!(state.conversation_limiter.check_key(&client).is_err());
}

#[tokio::test]
async fn conversation_without_replica_uses_default_persona_and_omits_replica() {
    let fake = FakeTavus::new(StatusCode::OK, json!({ "conversation_url": "https://example.test/room/abc" }));
    let base = spawn_fake_tavus(fake.clone()).await;
    let mut config = config_for(&base, Some("secret-key"));
    config.replica_id = None;

    let (status, body) = send(app(config), post_json("/api/consultation/conversation", None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["conversation_url"], "https://example.test/room/abc");
    let sent = fake.last_body.lock().unwrap().clone().unwrap();
    assert_eq!(sent, json!({ "persona_id": DEFAULT_PERSONA_ID }));
}

#[tokio::test]
async fn client_key_gate_rejects_missing_and_wrong_keys() {
    let fake = FakeTavus::new(StatusCode::OK, json!({ "conversation_url": "https://example.test/room/abc" }));
    let base = spawn_fake_tavus(fake.clone()).await;
    let mut config = config_for(&base, Some("secret-key"));
    config.client_api_key = Some("publishable".to_string());
    let router = app(config);

    let (status, body) = send(router.clone(), post_json("/api/consultation/conversation", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Missing client key");

    let wrong = Request::builder()
        .method(Method::POST)
        .uri("/api/consultation/conversation")
        .header(header::AUTHORIZATION, "Bearer nope")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(router.clone(), wrong).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(fake.hits(), 0);

    let right = Request::builder()
        .method(Method::POST)
        .uri("/api/consultation/conversation")
        .header(header::AUTHORIZATION, "Bearer publishable")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(router, right).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fake.hits(), 1);
}

#[tokio::test]
async fn cors_preflight_is_answered_for_the_frontend_origin() {
    let mut config = Config::default();
    config.client_api_key = Some("publishable".to_string());
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/consultation/conversation")
        .header(header::ORIGIN, "http://localhost:8080")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "authorization, content-type, apikey")
        .body(Body::empty())
        .unwrap();

    let response = app(config).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "http://localhost:8080"
    );
}
