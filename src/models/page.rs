use serde::{Deserialize, Serialize};

use crate::error::VocabularyError;

/// Largest page size a caller may request.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Offset-based page selection. Page numbers start at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    page: u32,
    size: u32,
}

impl PageRequest {
    /// Creates a page request.
    ///
    /// # Errors
    ///
    /// Returns `VocabularyError::InvalidRequest` when `page` is zero or `size`
    /// is outside `1..=MAX_PAGE_SIZE`.
    pub fn new(page: u32, size: u32) -> Result<Self, VocabularyError> {
        if page == 0 {
            return Err(VocabularyError::InvalidRequest(
                "page numbers start at 1".to_string(),
            ));
        }
        if size == 0 || size > MAX_PAGE_SIZE {
            return Err(VocabularyError::InvalidRequest(format!(
                "page size must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }
        Ok(Self { page, size })
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    /// Number of rows to skip before this page.
    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.size)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self { page: 1, size: 10 }
    }
}

/// One page of results plus totals for the whole query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub total_pages: u64,
    pub page: u32,
    pub size: u32,
}

impl<T> Page<T> {
    /// Assembles a page from the selected rows and the unpaged row count.
    ///
    /// `total_pages` is never below 1, so an empty result still reports one
    /// (empty) page.
    pub fn new(items: Vec<T>, total: u64, request: PageRequest) -> Self {
        let size = u64::from(request.size());
        Self {
            items,
            total,
            total_pages: total.div_ceil(size).max(1),
            page: request.page(),
            size: request.size(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_page_has_zero_offset() {
        let request = PageRequest::new(1, 10).unwrap();
        assert_eq!(request.offset(), 0);
        assert_eq!(PageRequest::new(3, 25).unwrap().offset(), 50);
    }

    #[test]
    fn zero_page_and_oversized_pages_are_rejected() {
        assert!(PageRequest::new(0, 10).is_err());
        assert!(PageRequest::new(1, 0).is_err());
        assert!(PageRequest::new(1, MAX_PAGE_SIZE + 1).is_err());
        assert!(PageRequest::new(1, MAX_PAGE_SIZE).is_ok());
    }

    #[test]
    fn total_pages_rounds_up() {
        let request = PageRequest::new(1, 10).unwrap();
        assert_eq!(Page::<()>::new(Vec::new(), 0, request).total_pages, 1);
        assert_eq!(Page::<()>::new(Vec::new(), 10, request).total_pages, 1);
        assert_eq!(Page::<()>::new(Vec::new(), 11, request).total_pages, 2);
    }
}
