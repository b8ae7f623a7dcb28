//! Page-number pagination shared by the list endpoints.

/// A normalized page request. Pages are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub limit: u64,
}

impl PageRequest {
    /// Clamp raw query values: page at least 1, limit in `1..=max_limit`.
    #[must_use]
    pub fn new(page: Option<u64>, limit: Option<u64>, default_limit: u64, max_limit: u64) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(default_limit).clamp(1, max_limit),
        }
    }

    /// Rows to skip.
    #[must_use]
    pub const fn offset(&self) -> u64 {
        (self.page - 1) * self.limit
    }
}

/// One page of results plus the total row count.
#[derive(Debug, Clone)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub page: u64,
    pub limit: u64,
    pub total: u64,
}

impl<T> Paginated<T> {
    #[must_use]
    pub const fn new(items: Vec<T>, request: PageRequest, total: u64) -> Self {
        Self {
            items,
            page: request.page,
            limit: request.limit,
            total,
        }
    }

    #[must_use]
    pub const fn total_pages(&self) -> u64 {
        self.total.div_ceil(self.limit)
    }

    #[must_use]
    pub const fn has_more(&self) -> bool {
        self.page < self.total_pages()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_request_defaults() {
        let request = PageRequest::new(None, None, 10, 50);
        assert_eq!(request.page, 1);
        assert_eq!(request.limit, 10);
        assert_eq!(request.offset(), 0);
    }

    #[test]
    fn test_page_request_clamps() {
        let request = PageRequest::new(Some(0), Some(500), 10, 50);
        assert_eq!(request.page, 1);
        assert_eq!(request.limit, 50);

        let request = PageRequest::new(Some(3), Some(0), 10, 50);
        assert_eq!(request.limit, 1);
        assert_eq!(request.offset(), 2);
    }

    #[test]
    fn test_has_more() {
        let request = PageRequest::new(Some(2), Some(10), 10, 50);
        let page = Paginated::new(vec![0; 10], request, 25);
        assert_eq!(page.total_pages(), 3);
        assert!(page.has_more());

        let request = PageRequest::new(Some(3), Some(10), 10, 50);
        let page = Paginated::new(vec![0; 5], request, 25);
        assert!(!page.has_more());
    }

    #[test]
    fn test_empty_total() {
        let page: Paginated<u8> = Paginated::new(vec![], PageRequest::new(None, None, 20, 50), 0);
        assert_eq!(page.total_pages(), 0);
        assert!(!page.has_more());
    }
}
