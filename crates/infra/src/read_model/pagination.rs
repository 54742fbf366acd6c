use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: u32 = 50;
pub const MAX_PAGE_SIZE: u32 = 500;

/// Offset pagination for list reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub limit: u32,
    pub offset: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PAGE_SIZE,
            offset: 0,
        }
    }
}

impl Pagination {
    /// Missing values fall back to defaults; the limit is clamped to `1..=MAX_PAGE_SIZE`.
    pub fn new(limit: Option<u32>, offset: Option<u32>) -> Self {
        Self {
            limit: limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
            offset: offset.unwrap_or(0),
        }
    }

    /// Slice an already ordered list.
    pub fn apply<T>(&self, items: Vec<T>) -> Page<T> {
        let total = items.len() as u64;
        let items = items
            .into_iter()
            .skip(self.offset as usize)
            .take(self.limit as usize)
            .collect();
        Page {
            items,
            total,
            limit: self.limit,
            offset: self.offset,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub limit: u32,
    pub offset: u32,
}

impl<T> Page<T> {
    pub fn has_more(&self) -> bool {
        (self.offset as u64 + self.items.len() as u64) < self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limits_are_clamped() {
        assert_eq!(Pagination::new(None, None), Pagination::default());
        assert_eq!(Pagination::new(Some(0), None).limit, 1);
        assert_eq!(Pagination::new(Some(10_000), Some(3)).limit, MAX_PAGE_SIZE);
    }

    #[test]
    fn apply_slices_and_counts() {
        let page = Pagination::new(Some(2), Some(1)).apply(vec![1, 2, 3, 4]);
        assert_eq!(page.items, vec![2, 3]);
        assert_eq!(page.total, 4);
        assert!(page.has_more());

        let last = Pagination::new(Some(2), Some(3)).apply(vec![1, 2, 3, 4]);
        assert_eq!(last.items, vec![4]);
        assert!(!last.has_more());
    }
}
