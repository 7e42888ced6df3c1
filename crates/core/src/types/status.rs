//! Status and category enums with their transition rules.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// Order lifecycle status.
///
/// The state machine is deliberately small: an order is created `pending` at
/// checkout time and moves exactly once, to `completed` or `failed`, driven
/// by an authenticated payment event. Both targets are terminal; a payment
/// event for an order that is no longer `pending` is a no-op (the idempotency
/// guard against duplicate webhook delivery).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Pending,
    Completed,
    Failed,
}

impl OrderStatus {
    /// Whether no further transitions are allowed out of this state.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether a transition from `self` to `next` is legal.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Completed) | (Self::Pending, Self::Failed)
        )
    }

    /// The status as stored in the database.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("invalid order status: {s}")),
        }
    }
}

/// What a provider payment status means for an order.
///
/// The provider reports many intermediate statuses (`waiting`, `confirming`,
/// `partially_paid`, ...); only the terminal ones move the order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentDisposition {
    /// Payment captured; complete the order and fulfill it.
    Complete,
    /// Payment failed or expired; fail the order.
    Fail,
    /// Intermediate status; acknowledge and do nothing.
    Ignore,
}

impl PaymentDisposition {
    /// Classify a raw provider `payment_status` string.
    #[must_use]
    pub fn from_provider_status(status: &str) -> Self {
        match status {
            "confirmed" | "finished" => Self::Complete,
            "failed" | "expired" => Self::Fail,
            _ => Self::Ignore,
        }
    }
}

/// Product category, which determines how the product is fulfilled.
///
/// `Giftcard` and `Account` draw from private single-use pools;
/// `Currency` and `Other` are counted by the plain stock counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductCategory {
    Giftcard,
    Account,
    Currency,
    Other,
}

impl ProductCategory {
    /// Whether availability comes from a pool of single-use entries rather
    /// than the stock counter.
    #[must_use]
    pub const fn is_pooled(self) -> bool {
        matches!(self, Self::Giftcard | Self::Account)
    }

    /// The category as stored in the database.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Giftcard => "giftcard",
            Self::Account => "account",
            Self::Currency => "currency",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for ProductCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProductCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "giftcard" => Ok(Self::Giftcard),
            "account" => Ok(Self::Account),
            "currency" => Ok(Self::Currency),
            "other" => Ok(Self::Other),
            _ => Err(format!("invalid product category: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_pending_transitions() {
        use OrderStatus::{Completed, Failed, Pending};

        assert!(Pending.can_transition_to(Completed));
        assert!(Pending.can_transition_to(Failed));

        for terminal in [Completed, Failed] {
            assert!(terminal.is_terminal());
            for next in [Pending, Completed, Failed] {
                assert!(!terminal.can_transition_to(next));
            }
        }
        assert!(!Pending.is_terminal());
        assert!(!Pending.can_transition_to(Pending));
    }

    #[test]
    fn test_status_string_roundtrip() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::Completed,
            OrderStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<OrderStatus>(), Ok(status));
        }
        assert!("refunded".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_payment_disposition() {
        assert_eq!(
            PaymentDisposition::from_provider_status("confirmed"),
            PaymentDisposition::Complete
        );
        assert_eq!(
            PaymentDisposition::from_provider_status("finished"),
            PaymentDisposition::Complete
        );
        assert_eq!(
            PaymentDisposition::from_provider_status("failed"),
            PaymentDisposition::Fail
        );
        assert_eq!(
            PaymentDisposition::from_provider_status("expired"),
            PaymentDisposition::Fail
        );
        for intermediate in ["waiting", "confirming", "partially_paid", "sending", ""] {
            assert_eq!(
                PaymentDisposition::from_provider_status(intermediate),
                PaymentDisposition::Ignore
            );
        }
    }

    #[test]
    fn test_category_pooling() {
        assert!(ProductCategory::Giftcard.is_pooled());
        assert!(ProductCategory::Account.is_pooled());
        assert!(!ProductCategory::Currency.is_pooled());
        assert!(!ProductCategory::Other.is_pooled());
    }

    #[test]
    fn test_category_string_roundtrip() {
        for cat in [
            ProductCategory::Giftcard,
            ProductCategory::Account,
            ProductCategory::Currency,
            ProductCategory::Other,
        ] {
            assert_eq!(cat.as_str().parse::<ProductCategory>(), Ok(cat));
        }
        assert!("subscription".parse::<ProductCategory>().is_err());
    }
}
