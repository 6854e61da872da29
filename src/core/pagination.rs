//! Skip/take pagination.
//!
//! A page is produced with two queries: one `COUNT` over the full filtered
//! query and one fetch of the requested slice. Page numbers are 1-based.
//! There is no upper bound on the page size.

use crate::errors::Result;
use sea_orm::{ConnectionTrait, PaginatorTrait, SelectorTrait};
use serde::Serialize;

/// Page size used when a filter does not specify one
pub const DEFAULT_PAGE_SIZE: i64 = 25;

/// A clamped, 1-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u64,
    page_size: u64,
}

impl PageRequest {
    /// Builds a request, treating `page <= 0` as 1 and `page_size <= 0` as 1.
    #[must_use]
    pub fn new(page: i64, page_size: i64) -> Self {
        Self {
            page: u64::try_from(page).unwrap_or(0).max(1),
            page_size: u64::try_from(page_size).unwrap_or(0).max(1),
        }
    }

    /// 1-based page number
    #[must_use]
    pub const fn page(&self) -> u64 {
        self.page
    }

    /// Number of items per page
    #[must_use]
    pub const fn page_size(&self) -> u64 {
        self.page_size
    }

    /// Number of items skipped before this page
    #[must_use]
    pub const fn offset(&self) -> u64 {
        (self.page - 1).saturating_mul(self.page_size)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(1, DEFAULT_PAGE_SIZE)
    }
}

/// One page of results together with the size of the full result set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    /// Items on this page, in query order
    pub items: Vec<T>,
    /// Number of items across all pages
    pub total_items: u64,
    /// 1-based page number
    pub page: u64,
    /// Requested page size
    pub page_size: u64,
    /// `ceil(total_items / page_size)`
    pub total_pages: u64,
    /// Whether a page precedes this one
    pub has_previous_page: bool,
    /// Whether a page follows this one
    pub has_next_page: bool,
}

impl<T> Page<T> {
    /// Wraps a fetched slice.
    #[must_use]
    pub fn new(items: Vec<T>, total_items: u64, request: PageRequest) -> Self {
        let total_pages = total_items.div_ceil(request.page_size);
        Self {
            items,
            total_items,
            page: request.page,
            page_size: request.page_size,
            total_pages,
            has_previous_page: request.page > 1,
            has_next_page: request.page < total_pages,
        }
    }

    /// Replaces the items, keeping the counts.
    #[must_use]
    pub fn with_items<U>(self, items: Vec<U>) -> Page<U> {
        Page {
            items,
            total_items: self.total_items,
            page: self.page,
            page_size: self.page_size,
            total_pages: self.total_pages,
            has_previous_page: self.has_previous_page,
            has_next_page: self.has_next_page,
        }
    }
}

/// Counts the full result set of `query`, then fetches the requested slice.
///
/// A page that starts at or past the last item is returned empty, with the
/// real counts, without issuing the slice query.
pub async fn fetch_page<'db, C, Q>(
    db: &'db C,
    query: Q,
    request: PageRequest,
) -> Result<Page<<Q::Selector as SelectorTrait>::Item>>
where
    C: ConnectionTrait,
    Q: PaginatorTrait<'db, C>,
{
    let paginator = query.paginate(db, request.page_size);
    let total_items = paginator.num_items().await?;
    if request.offset() >= total_items {
        return Ok(Page::new(Vec::new(), total_items, request));
    }

    let items = paginator.fetch_page(request.page - 1).await?;
    Ok(Page::new(items, total_items, request))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_clamps_to_one() {
        let request = PageRequest::new(0, 0);
        assert_eq!(request.page(), 1);
        assert_eq!(request.page_size(), 1);

        let request = PageRequest::new(-4, -10);
        assert_eq!(request.page(), 1);
        assert_eq!(request.page_size(), 1);

        let request = PageRequest::new(3, 20);
        assert_eq!(request.page(), 3);
        assert_eq!(request.page_size(), 20);
        assert_eq!(request.offset(), 40);
    }

    #[test]
    fn test_offset_saturates() {
        let request = PageRequest::new(i64::MAX, i64::MAX);
        assert_eq!(request.offset(), u64::MAX);
    }

    #[test]
    fn test_page_size_is_not_capped() {
        let request = PageRequest::new(1, 1_000_000);
        assert_eq!(request.page_size(), 1_000_000);
    }

    #[test]
    fn test_derived_fields() {
        let page = Page::new(vec![1, 2, 3], 10, PageRequest::new(1, 3));
        assert_eq!(page.total_pages, 4);
        assert!(!page.has_previous_page);
        assert!(page.has_next_page);

        let last = Page::new(vec![10], 10, PageRequest::new(4, 3));
        assert!(last.has_previous_page);
        assert!(!last.has_next_page);

        let empty: Page<i32> = Page::new(Vec::new(), 0, PageRequest::default());
        assert_eq!(empty.total_pages, 0);
        assert!(!empty.has_next_page);
        assert!(!empty.has_previous_page);
    }

    #[test]
    fn test_total_pages_is_ceiling() {
        for total in 0..40_u64 {
            for size in 1..8_i64 {
                let page: Page<()> = Page::new(Vec::new(), total, PageRequest::new(1, size));
                let size = size.unsigned_abs();
                assert_eq!(page.total_pages, total.div_ceil(size));
                assert!(page.total_pages * size >= total);
                assert!(page.total_pages == 0 || (page.total_pages - 1) * size < total);
            }
        }
    }

    #[test]
    fn test_with_items_keeps_counts() {
        let page = Page::new(vec![1, 2], 5, PageRequest::new(2, 2)).with_items(vec!["a", "b"]);
        assert_eq!(page.items, vec!["a", "b"]);
        assert_eq!(page.total_items, 5);
        assert_eq!(page.page, 2);
        assert_eq!(page.total_pages, 3);
        assert!(page.has_next_page);
    }
}
