//! Domain models for the storefront.
//!
//! Thin structs over the database rows, using the newtypes from
//! `keyhaven-core`. Repositories in [`crate::db`] produce them.

pub mod cart;
pub mod order;
pub mod product;
pub mod review;
pub mod session;
pub mod user;

pub use cart::{Cart, CartLine, CartView};
pub use order::{DeliveredCredential, Order, OrderLine};
pub use product::{Product, ProductListing};
pub use review::Review;
pub use session::{CurrentUser, session_keys};
pub use user::User;
