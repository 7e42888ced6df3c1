//! HTTP integration tests against a running storefront.
//!
//! These tests require:
//! - A running `PostgreSQL` database with migrations applied
//! - The storefront server running (cargo run -p keyhaven-storefront)
//!
//! Run with: cargo test -p keyhaven-integration-tests -- --ignored

use reqwest::StatusCode;
use serde_json::{Value, json};
use uuid::Uuid;

use keyhaven_integration_tests::{session_client, storefront_base_url};

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_health_endpoints() {
    let client = session_client();
    let base_url = storefront_base_url();

    let resp = client
        .get(format!("{base_url}/health"))
        .send()
        .await
        .expect("health request");
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = client
        .get(format!("{base_url}/health/ready"))
        .send()
        .await
        .expect("readiness request");
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_product_listing_shape() {
    let client = session_client();
    let base_url = storefront_base_url();

    let resp = client
        .get(format!("{base_url}/products"))
        .send()
        .await
        .expect("products request");
    assert_eq!(resp.status(), StatusCode::OK);

    let products: Vec<Value> = resp.json().await.expect("json body");
    for product in &products {
        assert!(product.get("name").is_some());
        assert!(product.get("available").is_some());
    }
}

#[tokio::test]
#[ignore = "Requires running storefront server with a seeded catalog"]
async fn test_guest_cart_lifecycle() {
    let client = session_client();
    let base_url = storefront_base_url();

    // The session cookie from the first request keys the guest cart.
    let resp = client
        .get(format!("{base_url}/cart"))
        .send()
        .await
        .expect("cart request");
    assert_eq!(resp.status(), StatusCode::OK);
    let cart: Value = resp.json().await.expect("json body");
    assert_eq!(cart["lines"].as_array().map(Vec::len), Some(0));

    // Pick something purchasable off the catalog.
    let products: Vec<Value> = client
        .get(format!("{base_url}/products"))
        .send()
        .await
        .expect("products request")
        .json()
        .await
        .expect("json body");
    let product = products
        .iter()
        .find(|p| p["available"].as_i64().unwrap_or(0) > 0)
        .expect("seeded catalog has available products");
    let product_id = product["id"].as_i64().expect("product id");

    // Add twice; the line merges.
    for _ in 0..2 {
        let resp = client
            .post(format!("{base_url}/cart/add"))
            .json(&json!({"product_id": product_id, "quantity": 1}))
            .send()
            .await
            .expect("add request");
        assert_eq!(resp.status(), StatusCode::OK);
    }

    let cart: Value = client
        .get(format!("{base_url}/cart"))
        .send()
        .await
        .expect("cart request")
        .json()
        .await
        .expect("json body");
    let lines = cart["lines"].as_array().expect("lines array");
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["quantity"].as_i64(), Some(2));

    // Clear it back down.
    let resp = client
        .post(format!("{base_url}/cart/clear"))
        .send()
        .await
        .expect("clear request");
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_ipn_rejects_unsigned_posts() {
    let client = session_client();
    let base_url = storefront_base_url();

    // No signature header at all.
    let resp = client
        .post(format!("{base_url}/payment/ipn"))
        .body(r#"{"order_id":"ORDER-x","payment_status":"finished"}"#)
        .send()
        .await
        .expect("ipn request");
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    // Wrong signature.
    let resp = client
        .post(format!("{base_url}/payment/ipn"))
        .header("x-nowpayments-sig", "deadbeef")
        .body(r#"{"order_id":"ORDER-x","payment_status":"finished"}"#)
        .send()
        .await
        .expect("ipn request");
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_orders_require_authentication() {
    let client = session_client();
    let base_url = storefront_base_url();

    let resp = client
        .get(format!("{base_url}/orders"))
        .send()
        .await
        .expect("orders request");
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_admin_routes_reject_non_admins() {
    let client = session_client();
    let base_url = storefront_base_url();

    // Anonymous: 401.
    let resp = client
        .get(format!("{base_url}/admin/orders"))
        .send()
        .await
        .expect("admin request");
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    // Signed in but not an admin: 403.
    let email = format!("user-{}@example.com", Uuid::new_v4());
    let resp = client
        .post(format!("{base_url}/auth/login"))
        .json(&json!({"email": email}))
        .send()
        .await
        .expect("login request");
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = client
        .get(format!("{base_url}/admin/orders"))
        .send()
        .await
        .expect("admin request");
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_review_requires_completed_purchase() {
    let client = session_client();
    let base_url = storefront_base_url();

    let email = format!("reviewer-{}@example.com", Uuid::new_v4());
    client
        .post(format!("{base_url}/auth/login"))
        .json(&json!({"email": email}))
        .send()
        .await
        .expect("login request");

    let products: Vec<Value> = client
        .get(format!("{base_url}/products"))
        .send()
        .await
        .expect("products request")
        .json()
        .await
        .expect("json body");
    let Some(product) = products.first() else {
        return;
    };
    let product_id = product["id"].as_i64().expect("product id");

    // Fresh account, no purchases: the gate rejects.
    let resp = client
        .post(format!("{base_url}/products/{product_id}/reviews"))
        .json(&json!({"rating": 5, "comment": "great"}))
        .send()
        .await
        .expect("review request");
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}
