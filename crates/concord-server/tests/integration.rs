use axum::http::StatusCode;
use concord_core::{Config, EngineLogging};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn test_config() -> Config {
    let mut config = Config::default();
    config.engine.logging = EngineLogging::Off;
    config.server.response_timeout_ms = 2_000;
    config
}

fn app(config: &Config) -> axum::Router {
    let state = concord_server::build_state(config).unwrap();
    concord_server::build_router(state, &config.server.base_url)
}

/// Read the body as JSON, or as a JSON string when it is plain text.
async fn read(response: axum::response::Response) -> (StatusCode, Value) {
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&body)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&body).into_owned()));
    (status, json)
}

/// Send a GET request via `oneshot` and return (status, parsed JSON body).
async fn get(app: axum::Router, uri: &str) -> (StatusCode, Value) {
    let req = axum::http::Request::builder()
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap();
    read(app.oneshot(req).await.unwrap()).await
}

/// Send a POST request with a JSON body, optionally carrying a bearer token.
async fn post_json(
    app: axum::Router,
    uri: &str,
    token: Option<&str>,
    body: Value,
) -> (StatusCode, Value) {
    let mut req = axum::http::Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(token) = token {
        req = req.header("authorization", format!("Bearer {token}"));
    }
    let req = req
        .body(axum::body::Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap();
    read(app.oneshot(req).await.unwrap()).await
}

async fn register(app: &axum::Router, name: &str) -> String {
    let (status, body) = post_json(
        app.clone(),
        "/api/Auth/register",
        None,
        json!({ "username": name, "mitKerberos": name, "password": "pw" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["success"], true, "{body}");
    body["token"].as_str().unwrap().to_string()
}

// ---------------------------------------------------------------------------
// Routing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_check_returns_text() {
    let (status, body) = get(app(&test_config()), "/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "Concept Server is running.");
}

#[tokio::test]
async fn unknown_operation_is_404() {
    let app = app(&test_config());
    let (status, body) = post_json(app.clone(), "/api/DesignPost/nope", None, json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("DesignPost.nope"));

    let (status, _) = post_json(app, "/api/Nope/nope", None, json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn requesting_is_not_reachable_over_http() {
    let (status, _) = post_json(
        app(&test_config()),
        "/api/Requesting/respond",
        None,
        json!({ "request": "anything" }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn non_object_body_is_400() {
    let req = axum::http::Request::builder()
        .method("POST")
        .uri("/api/DesignPost/getPost")
        .header("content-type", "application/json")
        .body(axum::body::Body::from("[1]"))
        .unwrap();
    let (status, body) = read(app(&test_config()).oneshot(req).await.unwrap()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "request body must be a JSON object");
}

#[tokio::test]
async fn route_listing_classifies_paths() {
    let (status, body) = get(app(&test_config()), "/api/_routes").await;
    assert_eq!(status, StatusCode::OK);
    let routes = body.as_array().unwrap();

    let find = |path: &str| {
        routes
            .iter()
            .find(|r| r["path"] == path)
            .unwrap_or_else(|| panic!("{path} not listed"))
    };
    assert_eq!(find("DesignPost/getPost")["kind"], "included");
    assert_eq!(find("DesignPost/createPost")["kind"], "excluded");
    assert_eq!(find("Auth/register")["registered"], false);
    assert_eq!(find("Session/endAllUserSessions")["kind"], "unverified");
    assert!(routes
        .iter()
        .all(|r| !r["path"].as_str().unwrap().starts_with("Requesting/")));
}

#[tokio::test]
async fn custom_base_url_is_honoured() {
    let mut config = test_config();
    config.server.base_url = "/v2/".into();
    let (status, _) = get(app(&config), "/v2/_routes").await;
    assert_eq!(status, StatusCode::OK);
}

// ---------------------------------------------------------------------------
// Direct calls
// ---------------------------------------------------------------------------

#[tokio::test]
async fn included_get_reads_the_query_string() {
    let (status, body) = get(
        app(&test_config()),
        "/api/RoomTemplate/findTemplates?dormName=Baker",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["templates"], json!([]));
}

#[tokio::test]
async fn concept_failure_on_a_direct_call_is_400() {
    let (status, body) = get(app(&test_config()), "/api/DesignPost/getPost?postID=missing").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Post not found");
}

// ---------------------------------------------------------------------------
// Requests answered by synchronizations
// ---------------------------------------------------------------------------

#[tokio::test]
async fn register_then_create_and_read_a_post() {
    let app = app(&test_config());
    let token = register(&app, "ada").await;

    let (status, created) = post_json(
        app.clone(),
        "/api/DesignPost/createPost",
        Some(&token),
        json!({ "templateID": "t1", "title": "Loft" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(created["success"], true, "{created}");
    let post_id = created["postID"].as_str().unwrap();

    let (status, fetched) = get(app, &format!("/api/DesignPost/getPost?postID={post_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["post"]["title"], "Loft");
}

#[tokio::test]
async fn excluded_route_without_session_reports_failure() {
    let (status, body) = post_json(
        app(&test_config()),
        "/api/DesignPost/createPost",
        None,
        json!({ "templateID": "t1", "title": "Loft" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Session required");
}

#[tokio::test]
async fn session_header_does_not_override_the_body() {
    let app = app(&test_config());
    let token = register(&app, "ada").await;
    let (_, body) = post_json(
        app,
        "/api/DesignPost/createPost",
        Some(&token),
        json!({ "session": "stale", "templateID": "t1", "title": "Loft" }),
    )
    .await;
    assert_eq!(body["error"], "Session required");
}

#[tokio::test]
async fn unanswered_request_times_out() {
    let mut config = test_config();
    config.server.response_timeout_ms = 50;
    config.routes.excluded.push("UserAccount/getUser".into());
    let state = concord_server::build_state(&config).unwrap();
    let requesting = state.requesting.clone();
    let app = concord_server::build_router(state, &config.server.base_url);

    let (status, body) = post_json(
        app,
        "/api/UserAccount/getUser",
        None,
        json!({ "userID": "u1" }),
    )
    .await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(body["error"], "no response within 50 ms");
    assert_eq!(requesting.pending().await, 0);
}
