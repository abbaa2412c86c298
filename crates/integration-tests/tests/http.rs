//! HTTP handlers over the in-memory pipeline.

use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode, header};
use marigold_core::{PaymentMethod, ProductId};
use marigold_integration_tests::{ADMIN_TOKEN, TestContext, payment_proof, phone, submission};
use marigold_storefront::db::StockStore;
use rust_decimal::Decimal;
use serde_json::{Value, json};
use tower::ServiceExt;

fn request(method: Method, uri: &str, body: Option<&Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-forwarded-for", "203.0.113.7")
        .header(header::CONTENT_TYPE, "application/json");
    match body {
        Some(body) => builder.body(Body::from(body.to_string())).unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

fn admin(mut req: Request<Body>) -> Request<Body> {
    req.headers_mut().insert(
        header::AUTHORIZATION,
        format!("Bearer {ADMIN_TOKEN}").parse().unwrap(),
    );
    req
}

async fn send(ctx: &TestContext, req: Request<Body>) -> (StatusCode, Value) {
    let response = ctx.router().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn checkout_body(method: PaymentMethod) -> Value {
    let order = submission(method);
    json!({
        "line_items": order.line_items,
        "buyer": order.buyer,
        "shipping_address": order.shipping_address,
        "payment_method": order.payment_method,
        "client_total": "1",
    })
}

#[tokio::test]
async fn test_health() {
    let ctx = TestContext::new();
    let response = ctx
        .router()
        .oneshot(request(Method::GET, "/health", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_verification_round_trip() {
    let ctx = TestContext::new();

    let (status, body) = send(
        &ctx,
        request(
            Method::POST,
            "/api/verification/request",
            Some(&json!({"phone": "9876543210"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sent"], true);

    let code = ctx.notifier.last_code(&phone()).unwrap();
    let (status, body) = send(
        &ctx,
        request(
            Method::POST,
            "/api/verification/check",
            Some(&json!({"phone": "9876543210", "code": code})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["verified"], true);

    let (status, body) = send(
        &ctx,
        request(
            Method::POST,
            "/api/verification/check",
            Some(&json!({"phone": "9876543210", "code": code})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["reason"], "not_found");
}

#[tokio::test]
async fn test_unverified_checkout_is_forbidden() {
    let ctx = TestContext::new();

    let (status, body) = send(
        &ctx,
        request(
            Method::POST,
            "/api/checkout",
            Some(&checkout_body(PaymentMethod::Deferred)),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["reason"], "unverified");
    assert_eq!(ctx.carrier.create_calls(), 0);
}

#[tokio::test]
async fn test_oversized_cart_is_unprocessable() {
    let ctx = TestContext::new();
    ctx.verify_phone(&phone()).await;
    let mut body = checkout_body(PaymentMethod::Deferred);
    body["line_items"][0]["unit_price"] = json!(Decimal::MAX.to_string());

    let (status, body) = send(&ctx, request(Method::POST, "/api/checkout", Some(&body))).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["reason"], "invalid_cart");
    assert_eq!(ctx.carrier.create_calls(), 0);
}

#[tokio::test]
async fn test_checkout_returns_server_total() {
    let ctx = TestContext::new();
    let mut body = checkout_body(PaymentMethod::Prepaid);
    body["payment_proof"] = json!(payment_proof("order_H1", "pay_H1"));

    let (status, receipt) = send(&ctx, request(Method::POST, "/api/checkout", Some(&body))).await;

    assert_eq!(status, StatusCode::CREATED);
    let total: Decimal = receipt["total"].as_str().unwrap().parse().unwrap();
    assert_eq!(total, Decimal::from(1800));
    assert_eq!(receipt["status"], "confirmed");
    assert_eq!(ctx.orders.len(), 1);
}

#[tokio::test]
async fn test_fulfillment_failure_hides_carrier_detail() {
    let ctx = TestContext::new();
    ctx.carrier
        .push(200, r#"{"message": "Wrong Pickup location entered."}"#);
    let mut body = checkout_body(PaymentMethod::Prepaid);
    body["payment_proof"] = json!(payment_proof("order_H2", "pay_H2"));

    let (status, body) = send(&ctx, request(Method::POST, "/api/checkout", Some(&body))).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["reason"], "order_failed");
    assert!(!body["error"].as_str().unwrap().contains("Pickup"));
}

#[tokio::test]
async fn test_stock_endpoints() {
    let ctx = TestContext::new();
    ctx.stock.set_total_stock(ProductId::new(5), 6).await.unwrap();

    let (status, body) = send(&ctx, request(Method::GET, "/api/products/5/stock", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["available"], 6);

    let (status, body) = send(
        &ctx,
        request(Method::GET, "/api/products/5/availability?quantity=7", None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["available"], false);
    assert_eq!(body["max"], 6);

    let (status, _) = send(&ctx, request(Method::GET, "/api/products/99/stock", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_admin_routes_require_token() {
    let ctx = TestContext::new();
    ctx.stock.set_total_stock(ProductId::new(5), 6).await.unwrap();
    let update = json!({"total": 12});

    let (status, _) = send(
        &ctx,
        request(Method::PUT, "/api/admin/products/5/stock", Some(&update)),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &ctx,
        admin(request(Method::PUT, "/api/admin/products/5/stock", Some(&update))),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(ctx.stock.total_stock(ProductId::new(5)).await.unwrap(), Some(12));
}

#[tokio::test]
async fn test_admin_status_transitions() {
    let ctx = TestContext::new();
    let mut body = checkout_body(PaymentMethod::Prepaid);
    body["payment_proof"] = json!(payment_proof("order_H3", "pay_H3"));
    let (_, receipt) = send(&ctx, request(Method::POST, "/api/checkout", Some(&body))).await;
    let id = receipt["order_id"].as_str().unwrap().to_string();

    let (status, order) = send(&ctx, admin(request(Method::GET, &format!("/api/orders/{id}"), None))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["status"], "confirmed");

    let shipped = json!({"status": "shipped", "tracking_number": "AWB77", "carrier": "fake"});
    let (status, order) = send(
        &ctx,
        admin(request(
            Method::POST,
            &format!("/api/admin/orders/{id}/status"),
            Some(&shipped),
        )),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["status"], "shipped");
    assert_eq!(order["tracking_number"], "AWB77");

    let backwards = json!({"status": "confirmed"});
    let (status, _) = send(
        &ctx,
        admin(request(
            Method::POST,
            &format!("/api/admin/orders/{id}/status"),
            Some(&backwards),
        )),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_request_without_client_ip_is_not_served() {
    let ctx = TestContext::new();
    let req = Request::builder()
        .method(Method::POST)
        .uri("/api/checkout")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(checkout_body(PaymentMethod::Deferred).to_string()))
        .unwrap();

    let response = ctx.router().oneshot(req).await.unwrap();
    assert_ne!(response.status(), StatusCode::CREATED);
    assert_eq!(ctx.carrier.create_calls(), 0);
}
