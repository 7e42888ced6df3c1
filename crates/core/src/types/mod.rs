//! Core types for Keyhaven.

pub mod email;
pub mod id;
pub mod identity;
pub mod pool;
pub mod price;
pub mod status;

pub use email::{Email, EmailError};
pub use id::*;
pub use identity::{Buyer, CartOwner};
pub use pool::{
    AccountCredential, GiftCode, PoolParseError, PoolUnit, claim_first_unused, parse_account_lines,
    parse_code_lines, unused_count,
};
pub use price::{CurrencyCode, Price};
pub use status::{OrderStatus, PaymentDisposition, ProductCategory};
