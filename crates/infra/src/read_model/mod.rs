//! Tenant-isolated read model storage abstractions.

pub mod pagination;
pub mod tenant_store;

pub use pagination::{Page, Pagination};
pub use tenant_store::{InMemoryTenantStore, ReadModelError, TenantStore};
