//! Ledger replay: rebuilding an item's stock from its movement records.
//!
//! Every `StockMoved` carries the `stock_after` snapshot. Replaying the
//! records in order from zero must reproduce each snapshot and, at the end,
//! the item's current stock.

use stockroom_core::{DomainError, Quantity};

use crate::item::StockMoved;
use crate::stock::apply_movement;

/// Check one record against the stock level before it.
pub fn next_stock(previous: Quantity, record: &StockMoved) -> Result<Quantity, DomainError> {
    let change = apply_movement(previous, record.direction, record.quantity)?;
    if change.stock_after != record.stock_after {
        return Err(DomainError::invariant(format!(
            "movement {} records stock_after {} but replay gives {}",
            record.movement_id, record.stock_after, change.stock_after
        )));
    }
    Ok(change.stock_after)
}

/// Replay records in creation order starting from zero stock.
pub fn replay<'a>(records: impl IntoIterator<Item = &'a StockMoved>) -> Result<Quantity, DomainError> {
    records
        .into_iter()
        .try_fold(Quantity::ZERO, |stock, record| next_stock(stock, record))
}
