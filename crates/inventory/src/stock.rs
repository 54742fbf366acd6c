//! Stock mutation rule: the only place where a movement turns into a new stock level.

use serde::{Deserialize, Serialize};

use stockroom_core::{DomainError, Quantity};

/// Direction of a stock movement.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    In,
    Out,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::In => "in",
            Direction::Out => "out",
        }
    }

    /// Reason recorded when the operator leaves the note empty.
    pub fn default_reason(&self) -> &'static str {
        match self {
            Direction::In => "stock in",
            Direction::Out => "stock out",
        }
    }
}

impl core::str::FromStr for Direction {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "in" => Ok(Direction::In),
            "out" => Ok(Direction::Out),
            other => Err(DomainError::validation(format!(
                "direction must be 'in' or 'out' (got '{other}')"
            ))),
        }
    }
}

/// Advisory outcome of an accepted movement. Never blocks the write.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockWarning {
    /// The movement took the item to exactly zero.
    StockDepleted,
}

impl StockWarning {
    pub fn code(&self) -> &'static str {
        match self {
            StockWarning::StockDepleted => "stock_depleted",
        }
    }
}

/// Result of applying a movement to a stock level.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct StockChange {
    pub stock_before: Quantity,
    pub stock_after: Quantity,
}

impl StockChange {
    pub fn warnings(&self) -> Vec<StockWarning> {
        let mut out = Vec::new();
        if self.stock_after.is_zero() {
            out.push(StockWarning::StockDepleted);
        }
        out
    }
}

/// Compute the stock level after a movement.
///
/// `out` movements larger than `current` fail with `InsufficientStock` and
/// produce nothing; reaching exactly zero is allowed.
pub fn apply_movement(
    current: Quantity,
    direction: Direction,
    quantity: Quantity,
) -> Result<StockChange, DomainError> {
    if quantity.is_zero() {
        return Err(DomainError::validation("quantity must be greater than zero"));
    }

    let stock_after = match direction {
        Direction::In => current.checked_add(quantity)?,
        Direction::Out => current
            .checked_sub(quantity)
            .ok_or_else(|| DomainError::insufficient_stock(current, quantity))?,
    };

    Ok(StockChange {
        stock_before: current,
        stock_after,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(s: &str) -> Quantity {
        s.parse().unwrap()
    }

    #[test]
    fn inbound_adds() {
        let c = apply_movement(q("2.5"), Direction::In, q("1.25")).unwrap();
        assert_eq!(c.stock_after, q("3.75"));
        assert!(c.warnings().is_empty());
    }

    #[test]
    fn outbound_over_stock_is_rejected() {
        let err = apply_movement(q("3"), Direction::Out, q("4")).unwrap_err();
        assert_eq!(err, DomainError::insufficient_stock(q("3"), q("4")));
    }

    #[test]
    fn outbound_to_zero_warns() {
        let c = apply_movement(q("3"), Direction::Out, q("3")).unwrap();
        assert!(c.stock_after.is_zero());
        assert_eq!(c.warnings(), vec![StockWarning::StockDepleted]);
    }

    #[test]
    fn zero_quantity_is_a_validation_error() {
        let err = apply_movement(q("3"), Direction::In, Quantity::ZERO).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn direction_parses_case_insensitively() {
        assert_eq!("OUT".parse::<Direction>().unwrap(), Direction::Out);
        assert!("sideways".parse::<Direction>().is_err());
    }
}
