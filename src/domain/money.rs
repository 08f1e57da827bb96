use crate::error::EngineError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Sub, SubAssign};

/// A wallet balance: the signed fold of all ledger deltas from zero.
///
/// Wraps `rust_decimal::Decimal` so balances and prices cannot be mixed up
/// with raw numerics in the purchase path.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct Balance(pub Decimal);

/// A strictly positive monetary magnitude used for debits and credits.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self, EngineError> {
        if value > Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(EngineError::ValidationError(format!(
                "amount must be positive, got {value}"
            )))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = EngineError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl Balance {
    pub const ZERO: Self = Self(Decimal::ZERO);

    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    /// Whether a debit of `amount` would leave the balance non-negative.
    pub fn covers(&self, amount: Amount) -> bool {
        self.0 >= amount.0
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl Add<Amount> for Balance {
    type Output = Self;
    fn add(self, rhs: Amount) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub<Amount> for Balance {
    type Output = Self;
    fn sub(self, rhs: Amount) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl AddAssign<Amount> for Balance {
    fn add_assign(&mut self, rhs: Amount) {
        self.0 += rhs.0;
    }
}

impl SubAssign<Amount> for Balance {
    fn sub_assign(&mut self, rhs: Amount) {
        self.0 -= rhs.0;
    }
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_balance_amount_arithmetic() {
        let balance = Balance::new(dec!(10.0));
        let amount = Amount::new(dec!(2.5)).unwrap();
        assert_eq!(balance + amount, Balance::new(dec!(12.5)));
        assert_eq!(balance - amount, Balance::new(dec!(7.5)));

        let mut running = Balance::ZERO;
        running += amount;
        running += amount;
        running -= amount;
        assert_eq!(running, Balance::new(dec!(2.5)));
    }

    #[test]
    fn test_amount_validation() {
        assert!(Amount::new(dec!(0.01)).is_ok());
        assert!(matches!(
            Amount::new(dec!(0.0)),
            Err(EngineError::ValidationError(_))
        ));
        assert!(matches!(
            Amount::new(dec!(-1.0)),
            Err(EngineError::ValidationError(_))
        ));
    }

    #[test]
    fn test_covers_includes_exact_balance() {
        let balance = Balance::new(dec!(2.00));
        assert!(balance.covers(Amount::new(dec!(2.00)).unwrap()));
        assert!(balance.covers(Amount::new(dec!(1.99)).unwrap()));
        assert!(!balance.covers(Amount::new(dec!(2.01)).unwrap()));
    }

    #[test]
    fn test_display_two_decimal_places() {
        assert_eq!(Balance::new(dec!(4)).to_string(), "4.00");
        assert_eq!(Amount::new(dec!(0.15)).unwrap().to_string(), "0.15");
    }
}
