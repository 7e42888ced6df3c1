//! User model.
//!
//! Authentication itself (passwords, sessions) is handled by the auth
//! collaborator; this is the minimal record fulfillment and reviews need:
//! a stable ID, a delivery email, and the admin flag.

use chrono::{DateTime, Utc};
use serde::Serialize;

use keyhaven_core::{Email, UserId};

/// A registered storefront user.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: UserId,
    pub email: Email,
    /// Grants access to the admin surface.
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}
