//! Low-stock thresholds and the stock level classification.

use serde::{Deserialize, Serialize};

use stockroom_core::{Quantity, ValueObject};

/// Replenishment threshold configured on an item.
///
/// Serialized as a nullable decimal so that `null` clears it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Option<Quantity>", into = "Option<Quantity>")]
pub enum LowStockThreshold {
    #[default]
    NoThreshold,
    Threshold(Quantity),
}

impl LowStockThreshold {
    pub fn value(&self) -> Option<Quantity> {
        match self {
            LowStockThreshold::NoThreshold => None,
            LowStockThreshold::Threshold(q) => Some(*q),
        }
    }
}

impl ValueObject for LowStockThreshold {}

impl From<Option<Quantity>> for LowStockThreshold {
    fn from(value: Option<Quantity>) -> Self {
        match value {
            Some(q) => LowStockThreshold::Threshold(q),
            None => LowStockThreshold::NoThreshold,
        }
    }
}

impl From<LowStockThreshold> for Option<Quantity> {
    fn from(value: LowStockThreshold) -> Self {
        value.value()
    }
}

/// Two-tier stock level used by every listing.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StockLevel {
    Sufficient,
    Critical,
}

/// Classify a stock level. Without a threshold only an empty item is critical;
/// with one, the boundary is inclusive.
pub fn classify(stock: Quantity, threshold: LowStockThreshold) -> StockLevel {
    let critical = match threshold {
        LowStockThreshold::NoThreshold => stock.is_zero(),
        LowStockThreshold::Threshold(t) => stock <= t,
    };
    if critical {
        StockLevel::Critical
    } else {
        StockLevel::Sufficient
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(s: &str) -> Quantity {
        s.parse().unwrap()
    }

    #[test]
    fn empty_without_threshold_is_critical() {
        assert_eq!(classify(Quantity::ZERO, LowStockThreshold::NoThreshold), StockLevel::Critical);
        assert_eq!(classify(q("0.1"), LowStockThreshold::NoThreshold), StockLevel::Sufficient);
    }

    #[test]
    fn threshold_boundary_is_inclusive() {
        let t = LowStockThreshold::Threshold(q("3"));
        assert_eq!(classify(q("5"), t), StockLevel::Sufficient);
        assert_eq!(classify(q("3"), t), StockLevel::Critical);
        assert_eq!(classify(q("2.9"), t), StockLevel::Critical);
    }

    #[test]
    fn serializes_as_nullable_decimal() {
        let json = serde_json::to_value(LowStockThreshold::NoThreshold).unwrap();
        assert!(json.is_null());

        let json = serde_json::to_value(LowStockThreshold::Threshold(q("2.5"))).unwrap();
        assert_eq!(json, serde_json::json!("2.5"));

        let parsed: LowStockThreshold = serde_json::from_str("4").unwrap();
        assert_eq!(parsed, LowStockThreshold::Threshold(q("4")));
    }
}
