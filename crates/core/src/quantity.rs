//! Exact, non-negative decimal quantities (stock levels, movement sizes, thresholds).

use core::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::value_object::ValueObject;

/// A non-negative decimal amount of some unit of measure.
///
/// Stock may be fractional (kilograms, litres), so quantities are kept as
/// exact decimals rather than floats. Values are normalized on construction
/// so `2.50` and `2.5` are stored and rendered identically.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Quantity(Decimal);

impl Quantity {
    pub const ZERO: Quantity = Quantity(Decimal::ZERO);

    pub fn new(value: Decimal) -> Result<Self, DomainError> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(DomainError::validation(format!(
                "quantity cannot be negative (got {value})"
            )));
        }
        Ok(Self(value.normalize()))
    }

    /// A quantity that must be strictly greater than zero (movement sizes).
    pub fn positive(value: Decimal) -> Result<Self, DomainError> {
        let q = Self::new(value)?;
        if q.is_zero() {
            return Err(DomainError::validation("quantity must be greater than zero"));
        }
        Ok(q)
    }

    pub fn from_units(units: i64) -> Result<Self, DomainError> {
        Self::new(Decimal::from(units))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn checked_add(self, other: Quantity) -> Result<Quantity, DomainError> {
        self.0
            .checked_add(other.0)
            .map(|v| Quantity(v.normalize()))
            .ok_or_else(|| DomainError::validation("quantity overflow"))
    }

    /// Subtract, returning `None` when the result would be negative.
    pub fn checked_sub(self, other: Quantity) -> Option<Quantity> {
        let v = self.0.checked_sub(other.0)?;
        if v.is_sign_negative() && !v.is_zero() {
            return None;
        }
        Some(Quantity(v.normalize()))
    }
}

impl ValueObject for Quantity {}

impl Default for Quantity {
    fn default() -> Self {
        Self::ZERO
    }
}

impl core::fmt::Display for Quantity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for Quantity {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let d = Decimal::from_str(s.trim())
            .map_err(|e| DomainError::validation(format!("invalid quantity '{s}': {e}")))?;
        Self::new(d)
    }
}

impl TryFrom<Decimal> for Quantity {
    type Error = DomainError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl<'de> Deserialize<'de> for Quantity {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let d = <Decimal as Deserialize>::deserialize(deserializer)?;
        Quantity::new(d).map_err(serde::de::Error::custom)
    }
}
