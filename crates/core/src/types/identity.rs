//! Tagged identity types for carts and orders.
//!
//! A cart belongs to exactly one of a signed-in user or an anonymous
//! session; an order belongs to exactly one of a user or a guest email.
//! Modeling each as an enum makes the "neither/both set" state
//! unrepresentable, instead of policing a pair of nullable columns in
//! application code. The database mirrors the same rule with a CHECK
//! constraint.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::email::Email;
use super::id::UserId;

/// Who a cart belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CartOwner {
    /// Cart of a signed-in user.
    User { id: UserId },
    /// Cart of an anonymous session, keyed by a session-scoped token.
    Guest { token: Uuid },
}

impl CartOwner {
    /// The user ID, if this cart belongs to a signed-in user.
    #[must_use]
    pub const fn user_id(self) -> Option<UserId> {
        match self {
            Self::User { id } => Some(id),
            Self::Guest { .. } => None,
        }
    }

    /// The guest token, if this cart belongs to an anonymous session.
    #[must_use]
    pub const fn guest_token(self) -> Option<Uuid> {
        match self {
            Self::User { .. } => None,
            Self::Guest { token } => Some(token),
        }
    }
}

/// Who an order was placed by.
///
/// Orders outlive sessions, so the guest side carries the contact email
/// collected at checkout rather than a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Buyer {
    /// Order placed by a signed-in user; email is resolved from the account.
    User { id: UserId },
    /// Guest checkout; the email is the only identity we have.
    Guest { email: Email },
}

impl Buyer {
    /// The user ID, if the order was placed by a signed-in user.
    #[must_use]
    pub const fn user_id(&self) -> Option<UserId> {
        match self {
            Self::User { id } => Some(*id),
            Self::Guest { .. } => None,
        }
    }

    /// The guest email, if this was a guest checkout.
    #[must_use]
    pub const fn guest_email(&self) -> Option<&Email> {
        match self {
            Self::User { .. } => None,
            Self::Guest { email } => Some(email),
        }
    }

    /// Whether the order belongs to the given user.
    #[must_use]
    pub fn is_owned_by(&self, user: UserId) -> bool {
        self.user_id() == Some(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cart_owner_exclusivity() {
        let user = CartOwner::User { id: UserId::new(1) };
        assert_eq!(user.user_id(), Some(UserId::new(1)));
        assert_eq!(user.guest_token(), None);

        let token = Uuid::new_v4();
        let guest = CartOwner::Guest { token };
        assert_eq!(guest.user_id(), None);
        assert_eq!(guest.guest_token(), Some(token));
    }

    #[test]
    fn test_buyer_ownership() {
        let buyer = Buyer::User { id: UserId::new(7) };
        assert!(buyer.is_owned_by(UserId::new(7)));
        assert!(!buyer.is_owned_by(UserId::new(8)));

        let guest = Buyer::Guest {
            email: Email::parse("guest@example.com").expect("valid"),
        };
        assert!(!guest.is_owned_by(UserId::new(7)));
        assert_eq!(
            guest.guest_email().map(Email::as_str),
            Some("guest@example.com")
        );
    }

    #[test]
    fn test_cart_owner_serde_tagged() {
        let owner = CartOwner::User { id: UserId::new(3) };
        let json = serde_json::to_string(&owner).expect("serialize");
        assert!(json.contains(r#""kind":"user""#));
        let back: CartOwner = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, owner);
    }
}
