use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, PoisonError, RwLock};

use thiserror::Error;

use stockroom_core::TenantId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReadModelError {
    /// A writer panicked while holding the lock; the rows can no longer be trusted
    /// to reflect every applied event, so further writes are refused.
    #[error("read model storage poisoned by an earlier panic")]
    Poisoned,
}

/// Rows of a disposable read model, partitioned by tenant.
///
/// Writes report failure instead of dropping the row, so a projection that
/// could not record an event does not advance its cursor past it.
pub trait TenantStore<K, V>: Send + Sync {
    fn get(&self, tenant_id: TenantId, key: &K) -> Option<V>;
    fn upsert(&self, tenant_id: TenantId, key: K, value: V) -> Result<(), ReadModelError>;
    fn list(&self, tenant_id: TenantId) -> Vec<V>;
    /// Drop every row of a tenant (rebuild support).
    fn clear_tenant(&self, tenant_id: TenantId) -> Result<(), ReadModelError>;
}

impl<K, V, S> TenantStore<K, V> for Arc<S>
where
    S: TenantStore<K, V> + ?Sized,
{
    fn get(&self, tenant_id: TenantId, key: &K) -> Option<V> {
        (**self).get(tenant_id, key)
    }

    fn upsert(&self, tenant_id: TenantId, key: K, value: V) -> Result<(), ReadModelError> {
        (**self).upsert(tenant_id, key, value)
    }

    fn list(&self, tenant_id: TenantId) -> Vec<V> {
        (**self).list(tenant_id)
    }

    fn clear_tenant(&self, tenant_id: TenantId) -> Result<(), ReadModelError> {
        (**self).clear_tenant(tenant_id)
    }
}

/// Process-local store backing every read model.
#[derive(Debug)]
pub struct InMemoryTenantStore<K, V> {
    rows: RwLock<HashMap<TenantId, HashMap<K, V>>>,
}

impl<K, V> InMemoryTenantStore<K, V> {
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(HashMap::new()),
        }
    }
}

impl<K, V> Default for InMemoryTenantStore<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> TenantStore<K, V> for InMemoryTenantStore<K, V>
where
    K: Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    // Reads still serve what was committed before a poisoning write.
    fn get(&self, tenant_id: TenantId, key: &K) -> Option<V> {
        let rows = self.rows.read().unwrap_or_else(PoisonError::into_inner);
        rows.get(&tenant_id)?.get(key).cloned()
    }

    fn upsert(&self, tenant_id: TenantId, key: K, value: V) -> Result<(), ReadModelError> {
        let mut rows = self.rows.write().map_err(|_| ReadModelError::Poisoned)?;
        rows.entry(tenant_id).or_default().insert(key, value);
        Ok(())
    }

    fn list(&self, tenant_id: TenantId) -> Vec<V> {
        let rows = self.rows.read().unwrap_or_else(PoisonError::into_inner);
        rows.get(&tenant_id)
            .map(|tenant| tenant.values().cloned().collect())
            .unwrap_or_default()
    }

    fn clear_tenant(&self, tenant_id: TenantId) -> Result<(), ReadModelError> {
        let mut rows = self.rows.write().map_err(|_| ReadModelError::Poisoned)?;
        rows.remove(&tenant_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tenants_do_not_see_each_other() {
        let store = InMemoryTenantStore::<u32, &str>::new();
        let (a, b) = (TenantId::new(), TenantId::new());
        store.upsert(a, 1, "a1").unwrap();
        store.upsert(b, 1, "b1").unwrap();

        assert_eq!(store.get(a, &1), Some("a1"));
        assert_eq!(store.list(b), vec!["b1"]);

        store.clear_tenant(a).unwrap();
        assert!(store.list(a).is_empty());
        assert_eq!(store.list(b), vec!["b1"]);
    }

    #[test]
    fn writes_after_a_panicking_writer_are_refused() {
        let store = Arc::new(InMemoryTenantStore::<u32, &str>::new());
        let t = TenantId::new();
        store.upsert(t, 1, "kept").unwrap();

        let poisoner = Arc::clone(&store);
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.rows.write().unwrap();
            panic!("writer died mid-update");
        })
        .join();

        assert_eq!(store.upsert(t, 2, "lost"), Err(ReadModelError::Poisoned));
        assert_eq!(store.clear_tenant(t), Err(ReadModelError::Poisoned));
        assert_eq!(store.get(t, &1), Some("kept"));
        assert_eq!(store.get(t, &2), None);
    }
}
