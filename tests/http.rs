//! Router-level tests for request paths decided before any query runs (auth, id format, body shape).
//! The pool connects lazily and is never used by these requests.

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use crm_pack::{load_model, routes, AppState, Settings};
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use tower::ServiceExt;

const USER: &str = "2d1f3c9e-3c55-4a0e-9c59-6b6f0b0f6d11";

fn app() -> Router {
    let pool = PgPoolOptions::new()
        .connect_lazy("postgres://localhost/crm_never_used")
        .unwrap();
    let state = AppState::new(pool, load_model("crm").unwrap(), Settings::default());
    routes::app(state)
}

fn request(method: Method, uri: &str, user: Option<&str>, body: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header("X-User-Id", user);
    }
    match body {
        Some(b) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(b.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(req: Request<Body>) -> (StatusCode, Value) {
    let res = app().oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = axum::body::to_bytes(res.into_body(), 1024 * 1024).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

#[tokio::test]
async fn health_is_ok() {
    let (status, body) = send(request(Method::GET, "/health", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn create_without_session_is_unauthorized() {
    for uri in ["/api/contacts", "/api/companies", "/api/deals"] {
        let (status, body) = send(request(Method::POST, uri, None, Some(r#"{"name":"Acme"}"#))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{}", uri);
        assert_eq!(body["error"], "Unauthorized");
    }
}

#[tokio::test]
async fn malformed_user_header_counts_as_anonymous() {
    let (status, _) = send(request(Method::POST, "/api/contacts", Some("bob"), Some(r#"{"name":"Ann"}"#))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn contact_without_name_is_rejected() {
    let (status, body) = send(request(
        Method::POST,
        "/api/contacts",
        Some(USER),
        Some(r#"{"email":"ann@example.com"}"#),
    ))
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "name is required");
}

#[tokio::test]
async fn invalid_json_is_bad_request() {
    let (status, body) = send(request(Method::POST, "/api/companies", Some(USER), Some("{not json"))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid JSON body");
}

#[tokio::test]
async fn non_uuid_ids_are_bad_request() {
    let (status, body) = send(request(Method::GET, "/api/contacts/not-a-uuid", None, None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid contact ID format");

    let (status, body) = send(request(Method::GET, "/api/pipeline-stages/42", None, None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid pipeline stage ID format");
}

#[tokio::test]
async fn uuid_filters_are_validated() {
    let (status, body) = send(request(Method::GET, "/api/deals?companyId=acme", None, None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "companyId must be a valid UUID");
}

#[tokio::test]
async fn reassign_requires_distinct_users() {
    let body = format!(r#"{{"fromUserId":"{0}","toUserId":"{0}"}}"#, USER);
    let (status, json) = send(request(Method::POST, "/api/deals/reassign", Some(USER), Some(&body))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "fromUserId and toUserId must differ");
}

#[tokio::test]
async fn reorder_rejects_malformed_body() {
    let (status, _) = send(request(
        Method::PUT,
        "/api/pipeline-stages/reorder",
        Some(USER),
        Some(r#"{"order":1}"#),
    ))
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, json) = send(request(
        Method::PUT,
        "/api/pipeline-stages/reorder",
        Some(USER),
        Some(r#"[{"id":"x","order":1}]"#),
    ))
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Invalid pipeline stage ID format");
}

#[tokio::test]
async fn personal_notes_require_session() {
    let (status, _) = send(request(Method::GET, "/api/personal-notes", None, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = send(request(Method::GET, "/api/api-keys", None, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn webhook_delete_by_query_needs_id() {
    let (status, json) = send(request(Method::DELETE, "/api/webhooks", Some(USER), None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Webhook ID is required");
}

#[tokio::test]
async fn report_dates_are_validated() {
    let (status, json) = send(request(Method::GET, "/api/reports/close-rate?startDate=yesterday", None, None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "startDate must be a date (YYYY-MM-DD)");
}

#[tokio::test]
async fn data_export_requires_bearer_key() {
    let (status, json) = send(request(Method::GET, "/api/data-export", None, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(json["error"].is_string());

    let req = Request::builder()
        .uri("/api/data-export?format=csv")
        .header(header::AUTHORIZATION, "Basic dXNlcjpwYXNz")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    let big = format!(r#"{{"name":"{}"}}"#, "a".repeat(routes::MAX_BODY_BYTES));
    let req = Request::builder()
        .method(Method::POST)
        .uri("/api/contacts")
        .header("X-User-Id", USER)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::CONTENT_LENGTH, big.len())
        .body(Body::from(big))
        .unwrap();
    let (status, _) = send(req).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn oversized_body_without_length_header_is_rejected() {
    let big = format!(r#"{{"name":"{}"}}"#, "a".repeat(routes::MAX_BODY_BYTES));
    let req = request(Method::POST, "/api/contacts", Some(USER), Some(&big));
    assert!(req.headers().get(header::CONTENT_LENGTH).is_none());
    let (status, json) = send(req).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert!(json["error"].is_string());
}

#[tokio::test]
async fn body_without_json_content_type_is_unsupported() {
    let req = Request::builder()
        .method(Method::POST)
        .uri("/api/companies")
        .header("X-User-Id", USER)
        .body(Body::from(r#"{"name":"Acme"}"#))
        .unwrap();
    let (status, json) = send(req).await;
    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert!(json["error"].is_string());
}

#[tokio::test]
async fn wrongly_typed_fields_are_bad_requests() {
    let cases = [
        ("/api/activities", r#"{"type":"call","subject":"Intro","occurredAt":"garbage"}"#, "occurredAt must be an RFC 3339 timestamp"),
        ("/api/activities", r#"{"type":"call","subject":"Intro","completed":"maybe"}"#, "completed must be true or false"),
        ("/api/pipeline-stages", r#"{"code":"demo","name":"Demo","probability":50.5}"#, "probability must be an integer"),
        ("/api/pipeline-stages", r#"{"code":"demo","name":"Demo","order":2.5}"#, "order must be an integer"),
        ("/api/webhooks", r#"{"url":"https://example.com/hook","isActive":"nah"}"#, "isActive must be true or false"),
        ("/api/deals", r#"{"name":"Huge","amount":1e20}"#, "amount is out of range"),
    ];
    for (uri, body, message) in cases {
        let (status, json) = send(request(Method::POST, uri, Some(USER), Some(body))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{} {}", uri, body);
        assert_eq!(json["error"], message);
    }
}
