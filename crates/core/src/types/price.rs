//! Price type using decimal arithmetic.
//!
//! Prices are stored and summed as [`Decimal`] (never floats). The shop runs
//! in a single currency; the currency code rides along for display and for
//! the payment provider's `price_currency` field.

use core::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A monetary amount with its currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Amount in the currency's standard unit (e.g., dollars, not cents).
    pub amount: Decimal,
    /// ISO 4217 currency code.
    pub currency: CurrencyCode,
}

impl Price {
    /// Create a new price.
    #[must_use]
    pub const fn new(amount: Decimal, currency: CurrencyCode) -> Self {
        Self { amount, currency }
    }

    /// The line total for `quantity` units at this price.
    #[must_use]
    pub fn line_total(&self, quantity: u32) -> Decimal {
        self.amount * Decimal::from(quantity)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:.2}", self.currency.symbol(), self.amount)
    }
}

/// ISO 4217 currency codes accepted by the payment provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    USD,
    EUR,
    GBP,
}

impl CurrencyCode {
    /// The code as the payment provider expects it.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::USD => "USD",
            Self::EUR => "EUR",
            Self::GBP => "GBP",
        }
    }

    /// Display symbol.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::USD => "$",
            Self::EUR => "€",
            Self::GBP => "£",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().expect("valid decimal")
    }

    #[test]
    fn test_line_total() {
        let price = Price::new(dec("19.99"), CurrencyCode::USD);
        assert_eq!(price.line_total(3), dec("59.97"));
        assert_eq!(price.line_total(0), dec("0.00"));
    }

    #[test]
    fn test_display() {
        let price = Price::new(dec("5.5"), CurrencyCode::USD);
        assert_eq!(price.to_string(), "$5.50");
        let price = Price::new(dec("10"), CurrencyCode::EUR);
        assert_eq!(price.to_string(), "€10.00");
    }

    #[test]
    fn test_currency_codes() {
        assert_eq!(CurrencyCode::USD.as_str(), "USD");
        assert_eq!(CurrencyCode::default(), CurrencyCode::USD);
    }
}
