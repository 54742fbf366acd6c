use chrono::{DateTime, Utc};

/// A domain event.
///
/// Events are:
/// - **immutable** (a stock movement, once recorded, is a permanent fact)
/// - **versioned** (schema evolution)
/// - **append-only**
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable event name (e.g. `"inventory.item.stock_moved"`).
    fn event_type(&self) -> &'static str;

    /// Schema version for this event type.
    fn version(&self) -> u32;

    /// When the event occurred (business time).
    fn occurred_at(&self) -> DateTime<Utc>;
}
