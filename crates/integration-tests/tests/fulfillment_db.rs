//! Database integration tests for the claim and fulfillment paths.
//!
//! These tests require a running `PostgreSQL` database with migrations
//! applied (cargo run -p keyhaven-cli -- migrate). Each test seeds its own
//! product so tests don't interfere with one another.

use rust_decimal::Decimal;
use uuid::Uuid;

use keyhaven_core::{Buyer, CartId, CartItemId, Email, ProductCategory, ProductId};
use keyhaven_integration_tests::test_pool;
use keyhaven_storefront::db::{CartRepository, OrderRepository, ProductRepository};
use keyhaven_storefront::db::products::ProductInput;
use keyhaven_storefront::models::{CartLine, CartView, Order};
use keyhaven_storefront::services::payments::IpnPayload;
use keyhaven_storefront::services::{FulfillmentEngine, IpnOutcome};

fn price(s: &str) -> Decimal {
    s.parse().expect("valid decimal")
}

async fn seed_giftcard(pool: &sqlx::PgPool, codes: &str, stock: i32) -> ProductId {
    let repo = ProductRepository::new(pool);
    let id = repo
        .create(&ProductInput {
            name: format!("Test Gift Card {}", Uuid::new_v4()),
            description: "integration test product".to_string(),
            price: price("10.00"),
            image_url: String::new(),
            category: ProductCategory::Giftcard,
            stock,
        })
        .await
        .expect("create product");

    repo.replace_gift_codes(id, &keyhaven_core::parse_code_lines(codes))
        .await
        .expect("seed pool");
    id
}

/// A pending guest order for `quantity` of the product, bypassing checkout.
async fn seed_order(pool: &sqlx::PgPool, product_id: ProductId, quantity: i32) -> Order {
    let reference = format!("ORDER-{}", Uuid::new_v4());
    let view = CartView {
        cart_id: CartId::new(0),
        lines: vec![CartLine {
            id: CartItemId::new(0),
            product_id,
            product_name: "Test Gift Card".to_string(),
            unit_price: price("10.00"),
            quantity,
        }],
    };
    let buyer = Buyer::Guest {
        email: Email::parse("buyer@example.com").expect("valid email"),
    };

    OrderRepository::new(pool)
        .create(&buyer, &view, &reference, "inv-test", "https://pay.test/i")
        .await
        .expect("create order")
}

fn finished_ipn(order: &Order) -> IpnPayload {
    IpnPayload {
        order_id: order.payment_reference.clone(),
        payment_status: "finished".to_string(),
    }
}

#[tokio::test]
#[ignore = "Requires running PostgreSQL database with migrations applied"]
async fn test_fulfillment_assigns_codes_in_pool_order() {
    let pool = test_pool().await;
    let product = seed_giftcard(&pool, "CODE-1\nCODE-2\nCODE-3", 3).await;
    let order = seed_order(&pool, product, 2).await;

    let outcome = FulfillmentEngine::new(&pool)
        .process_ipn(&finished_ipn(&order))
        .await
        .expect("process IPN");

    match outcome {
        IpnOutcome::Completed {
            lines, shortfalls, ..
        } => {
            assert!(shortfalls.is_empty());
            assert_eq!(lines[0].assigned_codes, vec!["CODE-1", "CODE-2"]);
        }
        other => panic!("expected Completed, got {other:?}"),
    }

    // The claimed entries are consumed; the third survives.
    let codes = ProductRepository::new(&pool)
        .gift_codes(product)
        .await
        .expect("read pool");
    assert_eq!(codes.iter().filter(|c| c.used).count(), 2);
    assert!(!codes[2].used);
}

#[tokio::test]
#[ignore = "Requires running PostgreSQL database with migrations applied"]
async fn test_duplicate_ipn_is_a_noop() {
    let pool = test_pool().await;
    let product = seed_giftcard(&pool, "DUP-1\nDUP-2", 2).await;
    let order = seed_order(&pool, product, 1).await;

    let engine = FulfillmentEngine::new(&pool);
    let first = engine.process_ipn(&finished_ipn(&order)).await.expect("first IPN");
    assert!(matches!(first, IpnOutcome::Completed { .. }));

    // Replay: the conditional status flip fails, nothing else runs.
    let second = engine.process_ipn(&finished_ipn(&order)).await.expect("second IPN");
    assert!(matches!(second, IpnOutcome::AlreadyProcessed { .. }));

    let codes = ProductRepository::new(&pool)
        .gift_codes(product)
        .await
        .expect("read pool");
    assert_eq!(codes.iter().filter(|c| c.used).count(), 1);
}

#[tokio::test]
#[ignore = "Requires running PostgreSQL database with migrations applied"]
async fn test_concurrent_claims_of_last_code_have_one_winner() {
    let pool = test_pool().await;
    let product = seed_giftcard(&pool, "LAST-1", 1).await;

    let claim = |pool: sqlx::PgPool| async move {
        let mut tx = pool.begin().await.expect("begin");
        let result = ProductRepository::claim_codes(&mut *tx, product, 1)
            .await
            .expect("claim");
        tx.commit().await.expect("commit");
        result
    };

    let (a, b) = tokio::join!(claim(pool.clone()), claim(pool.clone()));

    let winners = [&a, &b].iter().filter(|r| r.is_some()).count();
    assert_eq!(winners, 1, "exactly one claimant must win the last code");

    let codes = ProductRepository::new(&pool)
        .gift_codes(product)
        .await
        .expect("read pool");
    assert!(codes[0].used);
}

#[tokio::test]
#[ignore = "Requires running PostgreSQL database with migrations applied"]
async fn test_shortfall_skips_line_but_completes_order() {
    let pool = test_pool().await;
    let product = seed_giftcard(&pool, "ONLY-1", 1).await;
    let order = seed_order(&pool, product, 2).await;

    let outcome = FulfillmentEngine::new(&pool)
        .process_ipn(&finished_ipn(&order))
        .await
        .expect("process IPN");

    match outcome {
        IpnOutcome::Completed {
            order,
            lines,
            shortfalls,
        } => {
            assert_eq!(shortfalls.len(), 1);
            assert!(lines[0].assigned_codes.is_empty());
            assert_eq!(order.status, keyhaven_core::OrderStatus::Completed);
        }
        other => panic!("expected Completed, got {other:?}"),
    }

    // Shortfall leaves the pool untouched.
    let codes = ProductRepository::new(&pool)
        .gift_codes(product)
        .await
        .expect("read pool");
    assert!(!codes[0].used);
}

#[tokio::test]
#[ignore = "Requires running PostgreSQL database with migrations applied"]
async fn test_cart_add_merges_into_existing_line() {
    let pool = test_pool().await;
    let product = seed_giftcard(&pool, "MERGE-1\nMERGE-2\nMERGE-3", 3).await;

    let repo = CartRepository::new(&pool);
    let owner = keyhaven_core::CartOwner::Guest {
        token: Uuid::new_v4(),
    };
    let cart = repo.resolve(owner).await.expect("resolve cart");

    repo.add_item(cart.id, product, 1).await.expect("first add");
    repo.add_item(cart.id, product, 2).await.expect("second add");

    let view = repo.view(cart.id).await.expect("view");
    assert_eq!(view.lines.len(), 1, "adds merge into one line");
    assert_eq!(view.lines[0].quantity, 3);

    // Same identity resolves to the same cart.
    let again = repo.resolve(owner).await.expect("re-resolve");
    assert_eq!(again.id, cart.id);
}

#[tokio::test]
#[ignore = "Requires running PostgreSQL database with migrations applied"]
async fn test_failed_ipn_only_transitions_pending_orders() {
    let pool = test_pool().await;
    let product = seed_giftcard(&pool, "FAIL-1", 1).await;
    let order = seed_order(&pool, product, 1).await;

    let engine = FulfillmentEngine::new(&pool);

    // Complete first; a late failure notice must not undo it.
    let completed = engine.process_ipn(&finished_ipn(&order)).await.expect("complete");
    assert!(matches!(completed, IpnOutcome::Completed { .. }));

    let failed = engine
        .process_ipn(&IpnPayload {
            order_id: order.payment_reference.clone(),
            payment_status: "failed".to_string(),
        })
        .await
        .expect("late failure");
    assert!(matches!(failed, IpnOutcome::AlreadyProcessed { .. }));
}
