//! Integration tests for the API server.

use std::str::FromStr;
use std::sync::{Arc, OnceLock};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{CustomerId, Money, ProductId};
use domain::{InMemoryRepository, Product, ProductRepository, StaticDiscounts};
use metrics_exporter_prometheus::PrometheusHandle;
use rust_decimal::Decimal;
use serde_json::{Value, json};
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

fn setup() -> (axum::Router, InMemoryRepository) {
    let repository = InMemoryRepository::new();
    let discounts = StaticDiscounts::new().with_discount("books", Decimal::from(10));
    let state = api::create_state(repository.clone(), Arc::new(discounts));
    let app = api::create_app(state, get_metrics_handle());
    (app, repository)
}

async fn seed_product(repository: &InMemoryRepository, cents: i64, stock: u32, category: &str) -> ProductId {
    let product = Product::new(
        ProductId::new(),
        "Item",
        Money::from_cents(cents),
        stock,
        category,
        "Acme",
    );
    repository.save_product(&product).await.unwrap();
    product.id()
}

async fn send(
    app: &axum::Router,
    method: &str,
    uri: &str,
    customer: Option<CustomerId>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(customer_id) = customer {
        builder = builder.header("x-customer-id", customer_id.to_string());
    }
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&json).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

fn amount(value: &Value) -> Decimal {
    Decimal::from_str(value.as_str().unwrap()).unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let (app, _) = setup();

    let (status, json) = send(&app, "GET", "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert!(json["version"].as_str().is_some());
}

#[tokio::test]
async fn test_cart_requires_identity() {
    let (app, _) = setup();

    let (status, json) = send(&app, "GET", "/cart", None, None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(json["error"].as_str().is_some());
}

#[tokio::test]
async fn test_get_cart_is_idempotent() {
    let (app, _) = setup();
    let customer = CustomerId::new();

    let (status, first) = send(&app, "GET", "/cart", Some(customer), None).await;
    let (_, second) = send(&app, "GET", "/cart", Some(customer), None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["status"], "CART");
    assert_eq!(first["id"], second["id"]);
    assert_eq!(first["customer_id"], customer.to_string());
    assert!(first["lines"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_add_line_reserves_stock() {
    let (app, repository) = setup();
    let customer = CustomerId::new();
    let product_id = seed_product(&repository, 1999, 5, "tools").await;

    let (status, cart) = send(
        &app,
        "POST",
        "/cart/lines",
        Some(customer),
        Some(json!({ "product_id": product_id.to_string(), "quantity": 2 })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(cart["lines"][0]["quantity"], 2);
    assert_eq!(amount(&cart["total"]), Decimal::from_str("39.98").unwrap());

    let (status, product) = send(&app, "GET", &format!("/products/{product_id}"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(product["stock"], 3);
}

#[tokio::test]
async fn test_add_line_beyond_stock_conflicts() {
    let (app, repository) = setup();
    let customer = CustomerId::new();
    let product_id = seed_product(&repository, 500, 1, "tools").await;

    let (status, json) = send(
        &app,
        "POST",
        "/cart/lines",
        Some(customer),
        Some(json!({ "product_id": product_id.to_string(), "quantity": 2 })),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert!(json["error"].as_str().unwrap().contains("Insufficient stock"));

    let (_, history) = send(&app, "GET", "/orders", Some(customer), None).await;
    assert!(history.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_add_unknown_product_is_not_found() {
    let (app, _) = setup();

    let (status, _) = send(
        &app,
        "POST",
        "/cart/lines",
        Some(CustomerId::new()),
        Some(json!({ "product_id": ProductId::new().to_string(), "quantity": 1 })),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_zero_quantity_is_bad_request() {
    let (app, repository) = setup();
    let product_id = seed_product(&repository, 500, 3, "tools").await;

    let (status, _) = send(
        &app,
        "POST",
        "/cart/lines",
        Some(CustomerId::new()),
        Some(json!({ "product_id": product_id.to_string(), "quantity": 0 })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_update_and_remove_lines() {
    let (app, repository) = setup();
    let customer = CustomerId::new();
    let product_id = seed_product(&repository, 1000, 10, "tools").await;

    let (_, cart) = send(
        &app,
        "POST",
        "/cart/lines",
        Some(customer),
        Some(json!({ "product_id": product_id.to_string(), "quantity": 2 })),
    )
    .await;
    let order_id = cart["id"].as_str().unwrap().to_string();
    let line_uri = format!("/orders/{order_id}/lines/{product_id}");

    let (status, updated) = send(&app, "PUT", &line_uri, Some(customer), Some(json!({ "quantity": 6 }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["lines"][0]["quantity"], 6);

    let (_, product) = send(&app, "GET", &format!("/products/{product_id}"), None, None).await;
    assert_eq!(product["stock"], 4);

    let (status, body) = send(&app, "DELETE", &line_uri, Some(customer), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, Value::Null);

    let (_, product) = send(&app, "GET", &format!("/products/{product_id}"), None, None).await;
    assert_eq!(product["stock"], 10);

    let (status, _) = send(&app, "GET", &format!("/orders/{order_id}"), Some(customer), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_checkout_applies_category_discount() {
    let (app, repository) = setup();
    let customer = CustomerId::new();
    let book = seed_product(&repository, 1999, 5, "books").await;
    let tool = seed_product(&repository, 1000, 5, "tools").await;

    for (product_id, quantity) in [(book, 2), (tool, 1)] {
        send(
            &app,
            "POST",
            "/cart/lines",
            Some(customer),
            Some(json!({ "product_id": product_id.to_string(), "quantity": quantity })),
        )
        .await;
    }
    let (_, cart) = send(&app, "GET", "/cart", Some(customer), None).await;
    let order_id = cart["id"].as_str().unwrap();

    let request = Request::builder()
        .method("POST")
        .uri(format!("/orders/{order_id}/checkout"))
        .header("x-customer-id", customer.to_string())
        .header("x-correlation-id", "checkout-1")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let order: Value = serde_json::from_slice(&bytes).unwrap();

    assert_eq!(order["status"], "COMPLETED");
    assert!(order["ordered_at"].as_str().is_some());
    // 2 × 17.99 + 10.00
    assert_eq!(amount(&order["total"]), Decimal::from_str("45.98").unwrap());

    let (_, product) = send(&app, "GET", &format!("/products/{book}"), None, None).await;
    assert_eq!(product["stock"], 3);

    let (_, next_cart) = send(&app, "GET", "/cart", Some(customer), None).await;
    assert_ne!(next_cart["id"], order["id"]);
}

#[tokio::test]
async fn test_checkout_empty_cart_is_bad_request() {
    let (app, _) = setup();
    let customer = CustomerId::new();
    let (_, cart) = send(&app, "GET", "/cart", Some(customer), None).await;
    let order_id = cart["id"].as_str().unwrap();

    let (status, _) = send(
        &app,
        "POST",
        &format!("/orders/{order_id}/checkout"),
        Some(customer),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_completed_order_is_frozen() {
    let (app, repository) = setup();
    let customer = CustomerId::new();
    let product_id = seed_product(&repository, 1000, 5, "tools").await;
    let (_, cart) = send(
        &app,
        "POST",
        "/cart/lines",
        Some(customer),
        Some(json!({ "product_id": product_id.to_string(), "quantity": 1 })),
    )
    .await;
    let order_id = cart["id"].as_str().unwrap();
    send(&app, "POST", &format!("/orders/{order_id}/checkout"), Some(customer), None).await;

    let (status, _) = send(
        &app,
        "PUT",
        &format!("/orders/{order_id}/lines/{product_id}"),
        Some(customer),
        Some(json!({ "quantity": 3 })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(&app, "DELETE", &format!("/orders/{order_id}"), Some(customer), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_cancel_cart_returns_stock() {
    let (app, repository) = setup();
    let customer = CustomerId::new();
    let product_id = seed_product(&repository, 1000, 4, "tools").await;
    let (_, cart) = send(
        &app,
        "POST",
        "/cart/lines",
        Some(customer),
        Some(json!({ "product_id": product_id.to_string(), "quantity": 4 })),
    )
    .await;
    let order_id = cart["id"].as_str().unwrap();

    let (status, _) = send(&app, "DELETE", &format!("/orders/{order_id}"), Some(customer), None).await;

    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, product) = send(&app, "GET", &format!("/products/{product_id}"), None, None).await;
    assert_eq!(product["stock"], 4);
}

#[tokio::test]
async fn test_other_customers_order_is_not_found() {
    let (app, repository) = setup();
    let owner = CustomerId::new();
    let product_id = seed_product(&repository, 1000, 5, "tools").await;
    let (_, cart) = send(
        &app,
        "POST",
        "/cart/lines",
        Some(owner),
        Some(json!({ "product_id": product_id.to_string(), "quantity": 1 })),
    )
    .await;
    let order_id = cart["id"].as_str().unwrap();
    let stranger = Some(CustomerId::new());

    let (status, _) = send(&app, "GET", &format!("/orders/{order_id}"), stranger, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "POST", &format!("/orders/{order_id}/checkout"), stranger, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, owned) = send(&app, "GET", &format!("/orders/{order_id}"), Some(owner), None).await;
    assert_eq!(owned["status"], "CART");
}

#[tokio::test]
async fn test_invalid_order_id_format() {
    let (app, _) = setup();

    let (status, json) = send(&app, "GET", "/orders/not-a-uuid", Some(CustomerId::new()), None).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("Invalid order id"));
}

#[tokio::test]
async fn test_create_and_get_product() {
    let (app, _) = setup();

    let (status, created) = send(
        &app,
        "POST",
        "/products",
        None,
        Some(json!({
            "name": "Rust in Action",
            "unit_price": "39.99",
            "stock": 12,
            "category": "books",
            "brand": "Manning"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let id = created["id"].as_str().unwrap();
    let (status, product) = send(&app, "GET", &format!("/products/{id}"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(product["name"], "Rust in Action");
    assert_eq!(product["stock"], 12);
}

#[tokio::test]
async fn test_product_price_must_fit_catalog_column() {
    let (app, _) = setup();
    let product = |price: &str| {
        json!({
            "name": "Gold-plated keyboard",
            "unit_price": price,
            "stock": 1,
            "category": "electronics"
        })
    };

    let (status, json) = send(&app, "POST", "/products", None, Some(product("1000000000000.00"))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("must not exceed"));

    let (status, created) = send(&app, "POST", "/products", None, Some(product("999999999999.99"))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(amount(&created["unit_price"]), "999999999999.99".parse::<Decimal>().unwrap());
}

#[tokio::test]
async fn test_warranty_validation_and_round_trip() {
    let (app, _) = setup();

    let (status, json) = send(
        &app,
        "POST",
        "/warranties",
        None,
        Some(json!({ "duration_months": 12, "warranty_type": "STANDARD" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(json["error"].as_str().unwrap().contains("terms"));

    let (status, saved) = send(
        &app,
        "POST",
        "/warranties",
        None,
        Some(json!({
            "duration_months": 24,
            "warranty_type": "EXTENDED",
            "terms": "Parts and labour",
            "details": "Return to any store"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let id = saved["id"].as_str().unwrap();
    let (status, loaded) = send(&app, "GET", &format!("/warranties/{id}"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(loaded["duration_months"], 24);
    assert_eq!(loaded["terms"], "Parts and labour");

    let (status, blank) = send(&app, "POST", "/warranties", None, Some(json!({}))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(blank["terms"], Value::Null);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let (app, repository) = setup();
    let customer = CustomerId::new();
    let product_id = seed_product(&repository, 1000, 5, "tools").await;
    send(
        &app,
        "POST",
        "/cart/lines",
        Some(customer),
        Some(json!({ "product_id": product_id.to_string(), "quantity": 1 })),
    )
    .await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("carts_created_total"));
    assert!(text.contains("inventory_reservations_total"));
}
