//! Inventory domain module (event-sourced).
//!
//! Business rules for items, stock movements and low-stock classification,
//! implemented as deterministic domain logic (no IO, no HTTP, no storage).

pub mod item;
pub mod ledger;
pub mod stock;
pub mod threshold;

pub use item::{
    CreateItem, INITIAL_STOCK_REASON, InitialStock, Item, ItemCommand, ItemCreated, ItemDetails,
    ItemDetailsPatch, ItemDetailsUpdated, ItemEvent, ItemId, LowStockThresholdSet,
    MAX_IMAGES_PER_MOVEMENT, MovementId, RecordMovement, SetLowStockThreshold, StockMoved,
    UpdateItemDetails,
};
pub use stock::{Direction, StockChange, StockWarning, apply_movement};
pub use threshold::{LowStockThreshold, StockLevel, classify};
