//! Session-related types.
//!
//! Types stored in the session for authentication and guest-cart state.

use serde::{Deserialize, Serialize};

use keyhaven_core::{Email, UserId};

/// Session-stored user identity.
///
/// Minimal data stored in the session to identify the logged-in user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentUser {
    /// User's database ID.
    pub id: UserId,
    /// User's email address.
    pub email: Email,
    /// Whether the user may use the admin surface.
    pub is_admin: bool,
}

/// Session keys.
pub mod session_keys {
    /// Key for storing the current logged-in user.
    pub const CURRENT_USER: &str = "current_user";

    /// Key for the anonymous cart token (a UUID minted on first cart
    /// access; it is the guest side of the cart's owning identity).
    pub const CART_TOKEN: &str = "cart_token";
}
