use serde::{Deserialize, Serialize};

/// Paginated listing envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u32,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: u64, page: u32, limit: u32) -> Self {
        let total_pages = if limit == 0 {
            0
        } else {
            total.div_ceil(limit as u64) as u32
        };
        Self { items, total, page, limit, total_pages }
    }

    /// Offset of the first item on this page.
    pub fn offset(page: u32, limit: u32) -> u64 {
        (page.saturating_sub(1) as u64) * limit as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_pages_rounds_up() {
        let page: Page<u8> = Page::new(vec![], 21, 1, 10);
        assert_eq!(page.total_pages, 3);
        assert_eq!(Page::<u8>::offset(3, 10), 20);

        let empty: Page<u8> = Page::new(vec![], 0, 1, 10);
        assert_eq!(empty.total_pages, 0);
    }
}
