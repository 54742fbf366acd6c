use std::collections::HashMap;
use std::sync::RwLock;

use stockroom_core::{AggregateId, TenantId};

use super::ProjectionError;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
struct CursorKey {
    tenant_id: TenantId,
    aggregate_id: AggregateId,
}

/// Last applied sequence number per (tenant, aggregate) stream.
///
/// Makes projections idempotent under re-delivery: anything at or below the
/// cursor is skipped, and anything that would leave a gap is refused.
#[derive(Debug, Default)]
pub struct StreamCursors {
    inner: RwLock<HashMap<CursorKey, u64>>,
}

impl StreamCursors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position(&self, tenant_id: TenantId, aggregate_id: AggregateId) -> u64 {
        self.inner
            .read()
            .ok()
            .and_then(|m| m.get(&CursorKey { tenant_id, aggregate_id }).copied())
            .unwrap_or(0)
    }

    /// `Ok(true)` when `seq` is the next event to apply, `Ok(false)` for a replay.
    pub fn is_next(&self, tenant_id: TenantId, aggregate_id: AggregateId, seq: u64) -> Result<bool, ProjectionError> {
        let last = self.position(tenant_id, aggregate_id);
        if seq == 0 {
            return Err(ProjectionError::NonMonotonicSequence { last, found: seq });
        }
        if seq <= last {
            return Ok(false);
        }
        if seq != last + 1 {
            return Err(ProjectionError::NonMonotonicSequence { last, found: seq });
        }
        Ok(true)
    }

    /// Record `seq` as applied.
    pub fn advance(&self, tenant_id: TenantId, aggregate_id: AggregateId, seq: u64) {
        if let Ok(mut m) = self.inner.write() {
            m.insert(CursorKey { tenant_id, aggregate_id }, seq);
        }
    }

    pub fn clear(&self) {
        if let Ok(mut m) = self.inner.write() {
            m.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replays_are_skipped_and_gaps_refused() {
        let cursors = StreamCursors::new();
        let (t, a) = (TenantId::new(), AggregateId::new());

        assert!(cursors.is_next(t, a, 1).unwrap());
        cursors.advance(t, a, 1);

        assert!(!cursors.is_next(t, a, 1).unwrap());
        assert!(cursors.is_next(t, a, 2).unwrap());
        assert!(matches!(
            cursors.is_next(t, a, 4),
            Err(ProjectionError::NonMonotonicSequence { last: 1, found: 4 })
        ));
        assert!(cursors.is_next(t, a, 0).is_err());

        // Other tenants have their own cursor.
        assert_eq!(cursors.position(TenantId::new(), a), 0);
    }
}
