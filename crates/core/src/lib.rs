//! Keyhaven Core - Shared domain types.
//!
//! This crate provides the common types used across all Keyhaven components:
//! - `storefront` - Public-facing shop, checkout, and fulfillment engine
//! - `cli` - Command-line tools for migrations and management
//!
//! # Architecture
//!
//! The core crate contains only types and pure logic - no I/O, no database
//! access, no HTTP clients. In particular it holds the pieces of the
//! fulfillment domain that are worth testing without a database: the order
//! status state machine, the tagged cart/order identity types, and the
//! inventory pool entry types with their deterministic first-available
//! selection policy.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, emails, prices, statuses, identities, pools

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
