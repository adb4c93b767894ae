//! Paginator: page/size -> skip/take window and the page descriptor that is
//! returned next to a listing.
//!
//! `total_page` is always `ceil(total / size)`; the requested page is never
//! clamped to it. An empty result (nothing matched, or the page points past the
//! end) is reported as `NotFound` rather than as an empty page.

use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::storage::{Slice, Window};

pub const DEFAULT_PAGE: u64 = 1;
pub const DEFAULT_PAGE_SIZE: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u64,
    size: u64,
}

impl Default for PageRequest {
    fn default() -> Self { Self { page: DEFAULT_PAGE, size: DEFAULT_PAGE_SIZE } }
}

impl PageRequest {
    pub fn new(page: u64, size: u64) -> AppResult<Self> {
        if page < 1 {
            return Err(AppError::validation("page", "page must be at least 1"));
        }
        if size < 1 {
            return Err(AppError::validation("size", "size must be at least 1"));
        }
        Ok(Self { page, size })
    }

    /// Lenient constructor for query-string input: missing, non-numeric or
    /// non-positive values fall back to the defaults instead of failing.
    pub fn from_query(page: Option<&str>, size: Option<&str>, default_size: u64) -> Self {
        fn positive(raw: Option<&str>) -> Option<u64> {
            raw.and_then(|s| s.trim().parse::<u64>().ok()).filter(|n| *n >= 1)
        }
        Self {
            page: positive(page).unwrap_or(DEFAULT_PAGE),
            size: positive(size).unwrap_or(default_size.max(1)),
        }
    }

    pub fn page(&self) -> u64 { self.page }
    pub fn size(&self) -> u64 { self.size }

    pub fn window(&self) -> Window {
        Window { offset: (self.page - 1).saturating_mul(self.size), limit: self.size }
    }

    pub fn describe(&self, total: u64) -> PageDescriptor {
        PageDescriptor { current_page: self.page, total_page: total.div_ceil(self.size), size: self.size }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageDescriptor {
    pub current_page: u64,
    pub total_page: u64,
    pub size: u64,
}

/// List response body: `{ data: [...], page: {...} }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Paged<T> {
    pub data: Vec<T>,
    pub page: PageDescriptor,
}

impl<T> Paged<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Paged<U> {
        Paged { data: self.data.into_iter().map(f).collect(), page: self.page }
    }
}

/// Turn a storage slice into a page, or `NotFound` when there is nothing to show.
pub fn paginate<T>(req: PageRequest, slice: Slice<T>, what: &str) -> AppResult<Paged<T>> {
    if slice.total == 0 || slice.rows.is_empty() {
        return Err(AppError::not_found(format!("{}_not_found", what), format!("{} could not be found", what)));
    }
    Ok(Paged { data: slice.rows, page: req.describe(slice.total) })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slice(n: usize, total: u64) -> Slice<usize> { Slice { rows: (0..n).collect(), total } }

    #[test]
    fn window_math() {
        let r = PageRequest::new(3, 5).unwrap();
        assert_eq!(r.window(), Window { offset: 10, limit: 5 });
        assert_eq!(PageRequest::default().window(), Window { offset: 0, limit: 10 });
    }

    #[test]
    fn total_page_is_ceiling_and_not_clamped() {
        let r = PageRequest::new(4, 5).unwrap();
        assert_eq!(r.describe(12), PageDescriptor { current_page: 4, total_page: 3, size: 5 });
        assert_eq!(PageRequest::new(1, 5).unwrap().describe(10).total_page, 2);
        assert_eq!(PageRequest::new(1, 5).unwrap().describe(0).total_page, 0);
    }

    #[test]
    fn last_partial_page_and_past_the_end() {
        let last = paginate(PageRequest::new(3, 5).unwrap(), slice(2, 12), "contact").unwrap();
        assert_eq!(last.data.len(), 2);
        assert_eq!(last.page.total_page, 3);

        let past = paginate(PageRequest::new(4, 5).unwrap(), slice(0, 12), "contact").unwrap_err();
        assert!(past.is_not_found());
        assert_eq!(past.message(), "contact could not be found");
    }

    #[test]
    fn nothing_matched_is_not_found() {
        let err = paginate(PageRequest::default(), slice(0, 0), "address").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn query_values_fall_back_to_defaults() {
        assert_eq!(PageRequest::from_query(None, None, 10), PageRequest::default());
        assert_eq!(PageRequest::from_query(Some("abc"), Some("x"), 10), PageRequest::default());
        assert_eq!(PageRequest::from_query(Some("0"), Some("-3"), 10), PageRequest::default());
        let r = PageRequest::from_query(Some("2"), Some("25"), 10);
        assert_eq!((r.page(), r.size()), (2, 25));
        assert_eq!(PageRequest::from_query(None, None, 20).size(), 20);
    }

    #[test]
    fn strict_constructor_rejects_zero() {
        assert!(matches!(PageRequest::new(0, 10), Err(AppError::Validation { .. })));
        assert!(matches!(PageRequest::new(1, 0), Err(AppError::Validation { .. })));
    }
}
