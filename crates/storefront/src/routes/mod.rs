//! HTTP route handlers for the storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                  - Liveness check
//! GET  /health/ready            - Readiness check (DB ping)
//!
//! # Catalog
//! GET  /products                - Product listing with availability
//! GET  /products/{id}           - Product detail with reviews
//! GET  /products/{id}/reviews   - Product reviews
//! POST /products/{id}/reviews   - Add a review (auth + purchase gate)
//!
//! # Cart
//! GET    /cart                  - Cart with live total
//! POST   /cart/add              - Add product (merges into existing line)
//! POST   /cart/update           - Set line quantity (0 removes)
//! POST   /cart/remove           - Remove a line
//! POST   /cart/clear            - Empty the cart
//!
//! # Checkout & payment
//! GET  /checkout                - Checkout summary
//! POST /payment/create          - Create invoice + pending order, redirect
//! GET  /payment/success         - Post-payment landing (clears guest cart)
//! GET  /payment/cancel          - Abandoned-invoice landing
//! POST /payment/ipn             - Signed provider webhook
//!
//! # Orders (requires auth)
//! GET  /orders                  - Own order history
//! GET  /orders/{id}             - Own order with assigned secrets
//!
//! # Reviews (requires auth)
//! PUT    /reviews/{id}          - Edit own review
//! DELETE /reviews/{id}          - Delete own review (admins: any)
//!
//! # Auth
//! POST /auth/login              - Email sign-in (find-or-create)
//! POST /auth/logout             - Sign out
//!
//! # Admin (requires admin)
//! GET    /admin/products            - Full catalog
//! POST   /admin/products            - Create product (+ optional pool paste)
//! PUT    /admin/products/{id}       - Update product (+ pool replace)
//! DELETE /admin/products/{id}       - Delete product
//! GET    /admin/products/{id}/codes    - Gift-code pool
//! GET    /admin/products/{id}/accounts - Credential pool
//! GET    /admin/orders              - All orders
//! POST   /admin/orders/{id}/status  - Manual status override
//! ```

pub mod admin;
pub mod auth;
pub mod cart;
pub mod orders;
pub mod payment;
pub mod products;
pub mod reviews;

use axum::{
    Router,
    routing::{get, post, put},
};

use crate::state::AppState;

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index))
        .route("/{id}", get(products::show))
        .route(
            "/{id}/reviews",
            get(reviews::list_for_product).post(reviews::create),
        )
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/add", post(cart::add))
        .route("/update", post(cart::update))
        .route("/remove", post(cart::remove))
        .route("/clear", post(cart::clear))
}

/// Create the payment routes router.
pub fn payment_routes() -> Router<AppState> {
    Router::new()
        .route("/create", post(payment::create))
        .route("/success", get(payment::success))
        .route("/cancel", get(payment::cancel))
        .route("/ipn", post(payment::ipn))
}

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::index))
        .route("/{id}", get(orders::show))
}

/// Create the admin routes router.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/products",
            get(admin::list_products).post(admin::create_product),
        )
        .route(
            "/products/{id}",
            put(admin::update_product).delete(admin::delete_product),
        )
        .route("/products/{id}/codes", get(admin::gift_codes))
        .route("/products/{id}/accounts", get(admin::account_credentials))
        .route("/orders", get(admin::list_orders))
        .route("/orders/{id}/status", post(admin::override_order_status))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/products", product_routes())
        .nest("/cart", cart_routes())
        .route("/checkout", get(payment::checkout))
        .nest("/payment", payment_routes())
        .nest("/orders", order_routes())
        .route(
            "/reviews/{id}",
            put(reviews::update).delete(reviews::remove),
        )
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .nest("/admin", admin_routes())
}
