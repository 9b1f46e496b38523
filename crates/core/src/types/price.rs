//! Vendor price structures and order quantity rounding.
//!
//! Offers carry a list of price structures, one per currency, each with
//! quantity breaks:
//!
//! ```json
//! [{ "currency": "USD", "discounts": [{ "qty": 1, "amount": "0.10" }, { "qty": 100, "amount": "0.04" }] }]
//! ```

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from pricing calculations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PriceError {
    /// Requested quantity must be positive.
    #[error("quantity must be positive, got {0}")]
    InvalidQuantity(i32),

    /// Rounding to MOQ / order multiple overflowed.
    #[error("order quantity overflow")]
    Overflow,

    /// Currency code is not a 3-letter ISO 4217 code.
    #[error("invalid currency code: {0:?}")]
    InvalidCurrency(String),

    /// Prices exist in several currencies and none was chosen.
    #[error("offer is priced in several currencies ({}), pick one", .0.join(", "))]
    MixedCurrencies(Vec<String>),
}

/// A single quantity break: at `quantity` units and above, each unit costs `amount`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceBreak {
    #[serde(rename = "qty")]
    pub quantity: i32,
    pub amount: Decimal,
}

/// Prices for one currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceStructure {
    pub currency: String,
    #[serde(default)]
    pub discounts: Vec<PriceBreak>,
}

impl PriceStructure {
    /// Unit price for the given quantity.
    ///
    /// Picks the break with the largest `quantity` not exceeding `quantity`.
    /// Returns `None` when `quantity` is below every break.
    #[must_use]
    pub fn unit_price(&self, quantity: i32) -> Option<Decimal> {
        self.discounts
            .iter()
            .filter(|b| b.quantity <= quantity)
            .max_by_key(|b| b.quantity)
            .map(|b| b.amount)
    }
}

/// The cheapest way to buy a requested quantity from an offer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Quote {
    pub requested: i32,
    pub order_quantity: i32,
    pub currency: String,
    pub unit_price: Decimal,
    pub total: Decimal,
}

/// Round a requested quantity up to satisfy MOQ and order multiple.
///
/// Non-positive `moq` or `multiple` values are treated as 1.
pub fn order_quantity(requested: i32, moq: i32, multiple: i32) -> Result<i32, PriceError> {
    if requested <= 0 {
        return Err(PriceError::InvalidQuantity(requested));
    }
    let multiple = multiple.max(1);
    let base = requested.max(moq.max(1));
    let rem = base % multiple;
    if rem == 0 {
        Ok(base)
    } else {
        base.checked_add(multiple - rem).ok_or(PriceError::Overflow)
    }
}

/// Quote the cheapest total, comparing prices within one currency.
///
/// With `currency`, only structures in that currency are considered.
/// Without it, every applicable structure must share one currency.
/// Returns `Ok(None)` when no structure has a break that applies to the
/// rounded order quantity.
pub fn quote(
    structures: &[PriceStructure],
    currency: Option<&str>,
    requested: i32,
    moq: i32,
    multiple: i32,
) -> Result<Option<Quote>, PriceError> {
    let qty = order_quantity(requested, moq, multiple)?;

    let candidates: Vec<Quote> = structures
        .iter()
        .filter(|s| currency.is_none_or(|c| s.currency == c))
        .filter_map(|s| {
            let unit_price = s.unit_price(qty)?;
            Some(Quote {
                requested,
                order_quantity: qty,
                currency: s.currency.clone(),
                unit_price,
                total: unit_price * Decimal::from(qty),
            })
        })
        .collect();

    let mut currencies: Vec<String> = candidates.iter().map(|q| q.currency.clone()).collect();
    currencies.sort();
    currencies.dedup();
    if currencies.len() > 1 {
        return Err(PriceError::MixedCurrencies(currencies));
    }

    Ok(candidates.into_iter().min_by(|a, b| a.total.cmp(&b.total)))
}

/// Validate an ISO 4217 currency code.
///
/// Empty strings are accepted (currency not recorded).
pub fn validate_currency(code: &str) -> Result<(), PriceError> {
    if code.is_empty() || (code.len() == 3 && code.chars().all(|c| c.is_ascii_uppercase())) {
        Ok(())
    } else {
        Err(PriceError::InvalidCurrency(code.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn usd() -> PriceStructure {
        PriceStructure {
            currency: "USD".to_string(),
            discounts: vec![
                PriceBreak {
                    quantity: 1,
                    amount: Decimal::new(10, 2),
                },
                PriceBreak {
                    quantity: 100,
                    amount: Decimal::new(4, 2),
                },
                PriceBreak {
                    quantity: 10,
                    amount: Decimal::new(7, 2),
                },
            ],
        }
    }

    #[test]
    fn test_unit_price_picks_highest_applicable_break() {
        let prices = usd();
        assert_eq!(prices.unit_price(1), Some(Decimal::new(10, 2)));
        assert_eq!(prices.unit_price(9), Some(Decimal::new(10, 2)));
        assert_eq!(prices.unit_price(10), Some(Decimal::new(7, 2)));
        assert_eq!(prices.unit_price(5000), Some(Decimal::new(4, 2)));
    }

    #[test]
    fn test_unit_price_below_first_break() {
        let prices = PriceStructure {
            currency: "EUR".to_string(),
            discounts: vec![PriceBreak {
                quantity: 50,
                amount: Decimal::ONE,
            }],
        };
        assert_eq!(prices.unit_price(49), None);
    }

    #[test]
    fn test_order_quantity_rounding() {
        assert_eq!(order_quantity(7, 1, 1), Ok(7));
        assert_eq!(order_quantity(7, 10, 1), Ok(10));
        assert_eq!(order_quantity(7, 1, 5), Ok(10));
        assert_eq!(order_quantity(12, 10, 4), Ok(12));
        assert_eq!(order_quantity(3, 0, 0), Ok(3));
        assert_eq!(order_quantity(0, 1, 1), Err(PriceError::InvalidQuantity(0)));
        assert_eq!(order_quantity(i32::MAX, 1, 2), Err(PriceError::Overflow));
    }

    #[test]
    fn test_quote_uses_rounded_quantity_for_breaks() {
        // 95 requested with a multiple of 50 rounds to 100 and hits the 100 break.
        let q = quote(&[usd()], None, 95, 1, 50)
            .expect("valid")
            .expect("has price");
        assert_eq!(q.order_quantity, 100);
        assert_eq!(q.unit_price, Decimal::new(4, 2));
        assert_eq!(q.total, Decimal::new(400, 2));
    }

    fn eur(amount: Decimal) -> PriceStructure {
        PriceStructure {
            currency: "EUR".to_string(),
            discounts: vec![PriceBreak {
                quantity: 1,
                amount,
            }],
        }
    }

    #[test]
    fn test_quote_picks_cheapest_structure_in_currency() {
        let structures = [eur(Decimal::new(9, 2)), eur(Decimal::new(5, 2))];
        let q = quote(&structures, None, 2, 1, 1)
            .expect("valid")
            .expect("has price");
        assert_eq!(q.unit_price, Decimal::new(5, 2));
        assert_eq!(q.total, Decimal::new(10, 2));
    }

    #[test]
    fn test_quote_never_compares_across_currencies() {
        let structures = [usd(), eur(Decimal::new(5, 2))];
        assert_eq!(
            quote(&structures, None, 2, 1, 1),
            Err(PriceError::MixedCurrencies(vec![
                "EUR".to_string(),
                "USD".to_string()
            ]))
        );

        let q = quote(&structures, Some("USD"), 2, 1, 1)
            .expect("valid")
            .expect("has price");
        assert_eq!(q.currency, "USD");
        assert_eq!(q.unit_price, Decimal::new(10, 2));

        assert_eq!(quote(&structures, Some("GBP"), 2, 1, 1), Ok(None));
    }

    #[test]
    fn test_quote_ignores_currencies_without_applicable_break() {
        let bulk_eur = PriceStructure {
            currency: "EUR".to_string(),
            discounts: vec![PriceBreak {
                quantity: 1000,
                amount: Decimal::new(1, 2),
            }],
        };
        let q = quote(&[usd(), bulk_eur], None, 5, 1, 1)
            .expect("valid")
            .expect("has price");
        assert_eq!(q.currency, "USD");
    }

    #[test]
    fn test_quote_without_prices() {
        assert_eq!(quote(&[], None, 5, 1, 1), Ok(None));
    }

    #[test]
    fn test_prices_json_shape() {
        let json = r#"[{"currency":"USD","discounts":[{"qty":1,"amount":0.10}]}]"#;
        let parsed: Vec<PriceStructure> = serde_json::from_str(json).expect("parse");
        assert_eq!(parsed[0].unit_price(1), Some(Decimal::new(10, 2)));
    }

    #[test]
    fn test_validate_currency() {
        assert!(validate_currency("").is_ok());
        assert!(validate_currency("USD").is_ok());
        assert!(validate_currency("usd").is_err());
        assert!(validate_currency("DOLLARS").is_err());
    }
}
