//! Newtype IDs for type-safe entity references.
//!
//! Use the `define_id!` macro to create ID wrappers that prevent accidentally
//! mixing IDs from different entity types. The wrappers are plain `i32`
//! newtypes (matching `SERIAL` columns); database code binds them via
//! [`as_i32`](UserId::as_i32) rather than through sqlx trait impls, which
//! keeps this crate free of database dependencies.

/// Define a type-safe ID wrapper around `i32`.
///
/// # Example
///
/// ```rust
/// # use keyhaven_core::define_id;
/// define_id!(WidgetId);
///
/// let id = WidgetId::new(7);
/// assert_eq!(id.as_i32(), 7);
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            ::serde::Serialize,
            ::serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(i32);

        impl $name {
            /// Create a new ID from an i32 value.
            #[must_use]
            pub const fn new(id: i32) -> Self {
                Self(id)
            }

            /// Get the underlying i32 value.
            #[must_use]
            pub const fn as_i32(self) -> i32 {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i32> for $name {
            fn from(id: i32) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i32 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id!(UserId);
define_id!(ProductId);
define_id!(CartId);
define_id!(CartItemId);
define_id!(OrderId);
define_id!(OrderItemId);
define_id!(ReviewId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_distinct_types() {
        let user = UserId::new(1);
        let order = OrderId::new(1);
        // Same inner value, different types; equality only within a type.
        assert_eq!(user.as_i32(), order.as_i32());
        assert_eq!(user, UserId::from(1));
    }

    #[test]
    fn test_id_serde_transparent() {
        let id = ProductId::new(42);
        let json = serde_json::to_string(&id).expect("serialize");
        assert_eq!(json, "42");
        let back: ProductId = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, id);
    }

    #[test]
    fn test_id_display() {
        assert_eq!(OrderId::new(1001).to_string(), "1001");
    }
}
