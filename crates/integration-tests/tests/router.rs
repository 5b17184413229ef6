//! Router tests that never reach the database.
//!
//! Everything here is rejected (or answered) before the first query, so the
//! router runs against a lazily connected pool pointing nowhere.

use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use serde_json::{Value, json};

use warung_integration_tests::{WEBHOOK_SECRET, json_body, offline_router, send};

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("valid request")
}

fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_owned()))
        .expect("valid request")
}

// ============================================================================
// Health and middleware
// ============================================================================

#[tokio::test]
async fn test_health_sets_request_id_and_security_headers() {
    let response = send(offline_router(), get("/health")).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    assert_eq!(response.headers()["x-frame-options"], "DENY");
    assert_eq!(response.headers()["x-content-type-options"], "nosniff");
}

#[tokio::test]
async fn test_upstream_request_id_is_echoed() {
    let request = Request::builder()
        .uri("/health")
        .header("x-request-id", "edge-1234")
        .body(Body::empty())
        .expect("valid request");
    let response = send(offline_router(), request).await;

    assert_eq!(response.headers()["x-request-id"], "edge-1234");
}

#[tokio::test]
async fn test_readiness_reports_unreachable_database() {
    let response = send(offline_router(), get("/health/ready")).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

// ============================================================================
// Anonymous reads
// ============================================================================

#[tokio::test]
async fn test_anonymous_session_is_null() {
    let response = send(offline_router(), get("/api/auth/session")).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, Value::Null);
}

#[tokio::test]
async fn test_anonymous_address_reads_are_empty() {
    let response = send(offline_router(), get("/api/addresses/main")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, Value::Null);

    let response = send(offline_router(), get("/api/addresses/others")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!([]));
}

#[tokio::test]
async fn test_anonymous_cart_contains_is_false() {
    let uri = format!("/api/cart/contains/{}", uuid::Uuid::new_v4());
    let response = send(offline_router(), get(&uri)).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!({"in_cart": false}));
}

// ============================================================================
// Authentication
// ============================================================================

#[tokio::test]
async fn test_customer_routes_require_sign_in() {
    let requests = [
        get("/api/cart"),
        get("/api/orders"),
        post_json("/api/cart", &json!({"product_id": uuid::Uuid::new_v4()}).to_string()),
        post_json(
            "/api/checkout",
            &json!({"address_id": uuid::Uuid::new_v4(), "courier": "jne", "service": "REG"})
                .to_string(),
        ),
    ];

    for request in requests {
        let uri = request.uri().to_string();
        let response = send(offline_router(), request).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{uri}");
        assert_eq!(
            json_body(response).await,
            json!({"error": "Sign in required"}),
            "{uri}"
        );
    }
}

#[tokio::test]
async fn test_admin_routes_require_sign_in() {
    for uri in [
        "/api/admin/products",
        "/api/admin/orders/summary",
        "/api/admin/users",
        "/api/admin/analytics/sales?range=last_30_days",
    ] {
        let response = send(offline_router(), get(uri)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{uri}");
    }
}

// ============================================================================
// Validation
// ============================================================================

#[tokio::test]
async fn test_product_listing_rejects_bad_paging() {
    for uri in [
        "/api/products?cursor=not-a-cursor",
        "/api/products?limit=0",
        "/api/products?limit=1000",
        "/api/products?min_price=500&max_price=100",
    ] {
        let response = send(offline_router(), get(uri)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
        let body = json_body(response).await;
        assert!(body["error"].is_string(), "{uri}: {body}");
    }
}

#[tokio::test]
async fn test_cities_require_province() {
    let response = send(offline_router(), get("/api/shipping/cities")).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(response).await,
        json!({"error": "province_id is required"})
    );
}

#[tokio::test]
async fn test_shipping_cost_rejects_zero_weight() {
    let body = json!({"destination": "23", "weight": 0, "courier": "jne"}).to_string();
    let response = send(offline_router(), post_json("/api/shipping/cost", &body)).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ============================================================================
// Webhooks
// ============================================================================

#[tokio::test]
async fn test_identity_webhook_requires_secret() {
    let body = json!({"type": "user.deleted", "data": {"id": "user_1"}}).to_string();

    let response = send(offline_router(), post_json("/api/webhooks/identity", &body)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let mut request = post_json("/api/webhooks/identity", &body);
    request.headers_mut().insert(
        header::AUTHORIZATION,
        "Bearer not-the-secret".parse().expect("valid header"),
    );
    let response = send(offline_router(), request).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_identity_webhook_rejects_malformed_payload() {
    let mut request = post_json("/api/webhooks/identity", "{not json");
    request.headers_mut().insert(
        header::AUTHORIZATION,
        format!("Bearer {WEBHOOK_SECRET}")
            .parse()
            .expect("valid header"),
    );
    let response = send(offline_router(), request).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_payment_webhook_rejects_malformed_payload() {
    let response = send(
        offline_router(),
        post_json("/api/webhooks/payment", "{not json"),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
